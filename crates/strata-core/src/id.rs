//! Allocator identity.

use std::fmt;

/// Opaque handle naming the concrete allocation strategy bound to one
/// memory-space instance.
///
/// Every buffer-owning entity records the allocator id that was used
/// at allocation time. Two arrays compare equal only when their ids
/// match; cross-space copies are explicit operations, never implicit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocatorId(pub u32);

impl AllocatorId {
    /// Sentinel for a pointer that cannot be attributed to any tracked
    /// allocation (e.g. a view wrapped around foreign memory).
    pub const INVALID: AllocatorId = AllocatorId(u32::MAX);

    /// Whether this id names a tracked allocator.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for AllocatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("invalid")
        }
    }
}

impl From<u32> for AllocatorId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sentinel() {
        assert!(!AllocatorId::INVALID.is_valid());
        assert!(AllocatorId(0).is_valid());
        assert_eq!(AllocatorId::INVALID.to_string(), "invalid");
    }
}
