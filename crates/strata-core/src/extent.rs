//! Extent and stride vectors.

use smallvec::SmallVec;

/// An ordered sequence of per-axis lengths (or strides).
///
/// Uses `SmallVec<[usize; 4]>` to avoid heap allocation for arrays up
/// to 4 dimensions, which covers every consumer in this workspace.
/// Higher ranks spill to the heap transparently.
pub type Extents = SmallVec<[usize; 4]>;

/// Total logical element count for a set of extents.
///
/// The empty extent list has product 1 (a rank-0 scalar).
pub fn extents_product(extents: &[usize]) -> usize {
    extents.iter().product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_of_extents() {
        assert_eq!(extents_product(&[2, 3, 4]), 24);
        assert_eq!(extents_product(&[7]), 7);
        assert_eq!(extents_product(&[]), 1);
    }

    #[test]
    fn zero_extent_zeroes_the_product() {
        assert_eq!(extents_product(&[4, 0, 2]), 0);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn product_splits_multiplicatively(
            a in prop::collection::vec(1usize..8, 0..4),
            b in prop::collection::vec(1usize..8, 0..4),
        ) {
            let mut joined = a.clone();
            joined.extend(&b);
            prop_assert_eq!(
                extents_product(&joined),
                extents_product(&a) * extents_product(&b)
            );
        }
    }
}
