//! Test fixtures for Strata development.
//!
//! Small element types with observable lifecycle behavior, used to
//! check that construction, cloning, and destruction happen the right
//! number of times regardless of which memory space holds the
//! elements.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Element whose drops are tallied in a shared counter.
///
/// Clones share the counter, so after filling a buffer with clones of
/// one prototype, destroying the buffer bumps the counter once per
/// element.
pub struct DropCounter {
    hits: Arc<AtomicUsize>,
}

impl DropCounter {
    /// A fresh shared tally to hand to [`DropCounter::new`].
    pub fn new_shared() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    pub fn new(hits: &Arc<AtomicUsize>) -> Self {
        Self {
            hits: Arc::clone(hits),
        }
    }

    /// Drops recorded so far in the shared tally.
    pub fn drops(hits: &Arc<AtomicUsize>) -> usize {
        hits.load(Ordering::SeqCst)
    }
}

impl Clone for DropCounter {
    fn clone(&self) -> Self {
        Self {
            hits: Arc::clone(&self.hits),
        }
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

/// Heap-owning element for clone-independence checks: mutating one
/// copy must never affect another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label(pub String);

impl Label {
    pub fn new(text: &str) -> Self {
        Label(text.to_string())
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Element without a `Default` impl, for checking that fill/insert
/// paths work where default-initializing growth is unavailable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoDefault(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_counter_tallies_every_clone() {
        let tally = DropCounter::new_shared();
        {
            let a = DropCounter::new(&tally);
            let _b = a.clone();
            let _c = a.clone();
        }
        assert_eq!(DropCounter::drops(&tally), 3);
    }

    #[test]
    fn labels_clone_independently() {
        let a = Label::new("x");
        let mut b = a.clone();
        b.0.push('y');
        assert_eq!(a, Label::new("x"));
        assert_eq!(b, Label::new("xy"));
    }
}
