//! Fatal diagnostics for precondition violations.
//!
//! A precondition violation (mismatched shape on insert, wrong
//! coordinate arity, unavailable memory space) is a programming error
//! in the caller. The policy is to print a descriptive message and
//! terminate the process: no unwinding, no recovery, and no cost added
//! to the hot path for the non-violating case.

/// Print `msg` to stderr and abort the process.
///
/// Prefer the [`crate::fatal!`] macro, which accepts format arguments.
#[cold]
pub fn fatal_msg(msg: &str) -> ! {
    eprintln!("strata fatal: {msg}");
    std::process::abort();
}

/// Report a fatal precondition violation and abort.
///
/// Accepts `format!`-style arguments. The message is written to stderr
/// before the process terminates; it should name the offending shapes
/// or allocator ids where available.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::diag::fatal_msg(&format!($($arg)*))
    };
}
