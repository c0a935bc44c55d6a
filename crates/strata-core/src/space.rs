//! Memory-space tags.
//!
//! A [`MemorySpace`] names a distinct addressable pool with its own
//! host-accessibility rule. Which spaces are actually available is a
//! property of the registry configuration; [`MemorySpace::Dynamic`]
//! defers resolution to a runtime lookup.

use std::fmt;

/// Enumerates the memory spaces a buffer may live in.
///
/// `Host` is always available. The accelerator-side spaces are backed
/// by whatever pools the registry was configured with; requesting an
/// unavailable space is a fatal precondition violation at allocation
/// time, not an error value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemorySpace {
    /// Ordinary host heap memory.
    Host,
    /// Page-locked host memory (host-accessible, distinct pool identity).
    HostPinned,
    /// Accelerator-resident memory. Not dereferenceable from the
    /// controlling thread; reachable only through bulk copies.
    Device,
    /// Accelerator constant memory. Same accessibility rule as `Device`.
    DeviceConstant,
    /// Unified memory, migrated on demand. Treated as host-accessible.
    Unified,
    /// No space declared; resolve against the process default (or a
    /// reverse pointer lookup) at runtime.
    Dynamic,
}

impl MemorySpace {
    /// Whether the controlling thread may dereference memory in this
    /// space directly.
    ///
    /// Returns `None` for [`MemorySpace::Dynamic`], which only becomes
    /// concrete once resolved through the registry.
    pub fn host_accessible(&self) -> Option<bool> {
        match self {
            Self::Host | Self::HostPinned | Self::Unified => Some(true),
            Self::Device | Self::DeviceConstant => Some(false),
            Self::Dynamic => None,
        }
    }

    /// All concrete (non-`Dynamic`) spaces, in registration order.
    pub const CONCRETE: [MemorySpace; 5] = [
        Self::Host,
        Self::HostPinned,
        Self::Device,
        Self::DeviceConstant,
        Self::Unified,
    ];
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Host => "host",
            Self::HostPinned => "host-pinned",
            Self::Device => "device",
            Self::DeviceConstant => "device-constant",
            Self::Unified => "unified",
            Self::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_side_spaces_are_accessible() {
        assert_eq!(MemorySpace::Host.host_accessible(), Some(true));
        assert_eq!(MemorySpace::HostPinned.host_accessible(), Some(true));
        assert_eq!(MemorySpace::Unified.host_accessible(), Some(true));
    }

    #[test]
    fn device_side_spaces_are_not() {
        assert_eq!(MemorySpace::Device.host_accessible(), Some(false));
        assert_eq!(MemorySpace::DeviceConstant.host_accessible(), Some(false));
    }

    #[test]
    fn dynamic_defers_resolution() {
        assert_eq!(MemorySpace::Dynamic.host_accessible(), None);
    }

    #[test]
    fn concrete_excludes_dynamic() {
        assert!(!MemorySpace::CONCRETE.contains(&MemorySpace::Dynamic));
    }
}
