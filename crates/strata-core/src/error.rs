//! Error types for memory operations.
//!
//! Only recoverable conditions are modelled as errors. Precondition
//! violations (mismatched shapes, wrong coordinate arity, unavailable
//! spaces) go through [`crate::fatal!`] instead and never unwind.

use std::error::Error;
use std::fmt;

use crate::id::AllocatorId;
use crate::space::MemorySpace;

/// Errors that can occur during allocation and buffer management.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemError {
    /// The backend allocator could not satisfy the request. The caller
    /// must check; nothing aborts or retries on exhaustion.
    AllocationFailed {
        /// Number of bytes requested.
        requested: usize,
        /// The space the request was directed at.
        space: MemorySpace,
    },
    /// An allocator id that the registry does not know about.
    UnknownAllocator {
        /// The unrecognised id.
        id: AllocatorId,
    },
    /// A pointer that is not attributed to any live tracked allocation.
    UntrackedPointer {
        /// The offending address.
        addr: usize,
    },
}

impl fmt::Display for MemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed { requested, space } => {
                write!(
                    f,
                    "allocation of {requested} bytes failed in {space} space"
                )
            }
            Self::UnknownAllocator { id } => {
                write!(f, "unknown allocator: {id}")
            }
            Self::UntrackedPointer { addr } => {
                write!(f, "pointer {addr:#x} is not a tracked allocation")
            }
        }
    }
}

impl Error for MemError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_request_details() {
        let e = MemError::AllocationFailed {
            requested: 4096,
            space: MemorySpace::Device,
        };
        let msg = e.to_string();
        assert!(msg.contains("4096"));
        assert!(msg.contains("device"));
    }

    #[test]
    fn display_unknown_allocator() {
        let e = MemError::UnknownAllocator {
            id: AllocatorId(7),
        };
        assert!(e.to_string().contains('7'));
    }
}
