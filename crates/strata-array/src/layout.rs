//! Shape and stride bookkeeping.
//!
//! A [`Layout`] is the compile-time-selected indexing representation
//! shared by owning arrays and views. It never stores the buffer
//! pointer; containers resolve everything else through the
//! [`crate::ArrayLike`] capability set, statically.
//!
//! Two representations exist: [`Flat`] for 1-D containers (scalar
//! stride, no stored state; the shape is the container's own size)
//! and [`Grid`] for N-D containers (explicit extents and eagerly
//! recomputed row-major strides).

use std::fmt;

use smallvec::smallvec;
use strata_core::{extents_product, fatal, Extents};

/// Dimension/stride policy for an array-like container.
///
/// Implementations are plain value types copied freely between owners
/// and views. All coordinate-arity violations are fatal; bounds are
/// the container's concern.
pub trait Layout:
    Copy + Clone + PartialEq + Eq + fmt::Debug + Default + Send + Sync + 'static
{
    /// Number of axes.
    const RANK: usize;

    /// Build a layout from one extent per axis.
    ///
    /// Aborts when `extents.len() != RANK`.
    fn from_extents(extents: &[usize]) -> Self;

    /// The per-axis extents. `len` supplies the logical element count
    /// for stateless layouts; stateful layouts ignore it.
    fn shape(&self, len: usize) -> Extents;

    /// The per-axis strides (row-major).
    fn strides(&self) -> Extents;

    /// Flat offset of an N-coordinate: `dot(coords, strides)`.
    ///
    /// Aborts when `coords.len() != RANK`. Range checking against the
    /// extents is left to debug assertions in the containers.
    fn offset(&self, coords: &[usize]) -> usize;

    /// The logical element count this layout implies for a container
    /// holding `len` elements.
    fn element_count(&self, len: usize) -> usize;

    /// Leading-axis stride: the minimum chunk a capacity should be a
    /// multiple of (one "row").
    fn block_size(&self) -> usize;

    /// Replace all extents, recomputing strides.
    ///
    /// Aborts when `extents.len() != RANK`.
    fn assign(&mut self, extents: &[usize]);

    /// Grow the leading extent by `rows`, recomputing strides.
    fn grow_leading(&mut self, rows: usize);

    /// Set the leading extent to `rows`, recomputing strides.
    fn set_leading(&mut self, rows: usize);

    /// Whether `other_shape` matches this layout on every axis except
    /// the leading one (the compatibility rule for `insert`).
    fn trailing_matches(&self, len: usize, other_shape: &[usize]) -> bool;
}

/// Stateless 1-D layout with an implicit scalar stride of one.
///
/// The shape is derived from the container's own size, so growth and
/// shrink never touch the layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flat;

impl Layout for Flat {
    const RANK: usize = 1;

    fn from_extents(extents: &[usize]) -> Self {
        if extents.len() != 1 {
            fatal!(
                "1-D layout constructed with {} extents",
                extents.len()
            );
        }
        Flat
    }

    fn shape(&self, len: usize) -> Extents {
        smallvec![len]
    }

    fn strides(&self) -> Extents {
        smallvec![1]
    }

    fn offset(&self, coords: &[usize]) -> usize {
        if coords.len() != 1 {
            fatal!(
                "1-D access requires exactly 1 coordinate, got {}",
                coords.len()
            );
        }
        coords[0]
    }

    fn element_count(&self, len: usize) -> usize {
        len
    }

    fn block_size(&self) -> usize {
        1
    }

    fn assign(&mut self, extents: &[usize]) {
        if extents.len() != 1 {
            fatal!(
                "1-D layout assigned {} extents",
                extents.len()
            );
        }
    }

    fn grow_leading(&mut self, _rows: usize) {}

    fn set_leading(&mut self, _rows: usize) {}

    fn trailing_matches(&self, _len: usize, other_shape: &[usize]) -> bool {
        other_shape.len() == 1
    }
}

/// Explicit N-D layout: stored extents plus eagerly derived row-major
/// strides.
///
/// Strides satisfy `strides[DIM-1] == 1` and
/// `strides[i] == strides[i+1] * extents[i+1]`; they are recomputed on
/// every shape change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid<const DIM: usize> {
    dims: [usize; DIM],
    strides: [usize; DIM],
}

impl<const DIM: usize> Grid<DIM> {
    fn update_strides(&mut self) {
        self.strides[DIM - 1] = 1;
        for i in (0..DIM - 1).rev() {
            self.strides[i] = self.strides[i + 1] * self.dims[i + 1];
        }
    }
}

impl<const DIM: usize> Default for Grid<DIM> {
    fn default() -> Self {
        let mut grid = Self {
            dims: [0; DIM],
            strides: [0; DIM],
        };
        grid.update_strides();
        grid
    }
}

impl<const DIM: usize> Layout for Grid<DIM> {
    const RANK: usize = DIM;

    fn from_extents(extents: &[usize]) -> Self {
        let mut grid = Self::default();
        grid.assign(extents);
        grid
    }

    fn shape(&self, _len: usize) -> Extents {
        self.dims.iter().copied().collect()
    }

    fn strides(&self) -> Extents {
        self.strides.iter().copied().collect()
    }

    fn offset(&self, coords: &[usize]) -> usize {
        if coords.len() != DIM {
            fatal!(
                "{}-D access requires exactly {} coordinates, got {}",
                DIM,
                DIM,
                coords.len()
            );
        }
        coords
            .iter()
            .zip(self.strides.iter())
            .map(|(c, s)| c * s)
            .sum()
    }

    fn element_count(&self, _len: usize) -> usize {
        extents_product(&self.dims)
    }

    fn block_size(&self) -> usize {
        self.strides[0]
    }

    fn assign(&mut self, extents: &[usize]) {
        if extents.len() != DIM {
            fatal!(
                "{}-D layout assigned {} extents",
                DIM,
                extents.len()
            );
        }
        self.dims.copy_from_slice(extents);
        self.update_strides();
    }

    fn grow_leading(&mut self, rows: usize) {
        self.dims[0] += rows;
        self.update_strides();
    }

    fn set_leading(&mut self, rows: usize) {
        self.dims[0] = rows;
        self.update_strides();
    }

    fn trailing_matches(&self, _len: usize, other_shape: &[usize]) -> bool {
        other_shape.len() == DIM && self.dims[1..] == other_shape[1..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn flat_shape_follows_container_size() {
        let flat = Flat;
        assert_eq!(flat.shape(5).as_slice(), &[5]);
        assert_eq!(flat.strides().as_slice(), &[1]);
        assert_eq!(flat.offset(&[3]), 3);
        assert_eq!(flat.block_size(), 1);
    }

    #[test]
    fn grid_strides_are_row_major() {
        let grid = Grid::<3>::from_extents(&[2, 3, 4]);
        assert_eq!(grid.shape(0).as_slice(), &[2, 3, 4]);
        assert_eq!(grid.strides().as_slice(), &[12, 4, 1]);
        assert_eq!(grid.element_count(0), 24);
        assert_eq!(grid.block_size(), 12);
    }

    #[test]
    fn grid_offset_is_dot_product() {
        let grid = Grid::<2>::from_extents(&[3, 5]);
        assert_eq!(grid.offset(&[0, 0]), 0);
        assert_eq!(grid.offset(&[1, 0]), 5);
        assert_eq!(grid.offset(&[2, 4]), 14);
    }

    #[test]
    fn grow_leading_updates_extent_only() {
        let mut grid = Grid::<2>::from_extents(&[2, 3]);
        grid.grow_leading(4);
        assert_eq!(grid.shape(0).as_slice(), &[6, 3]);
        assert_eq!(grid.strides().as_slice(), &[3, 1]);
    }

    #[test]
    fn trailing_compatibility() {
        let grid = Grid::<2>::from_extents(&[2, 3]);
        assert!(grid.trailing_matches(0, &[7, 3]));
        assert!(!grid.trailing_matches(0, &[2, 4]));
        assert!(!grid.trailing_matches(0, &[3]));
    }

    fn arb_extents() -> impl Strategy<Value = [usize; 3]> {
        prop::array::uniform3(1usize..8)
    }

    proptest! {
        #[test]
        fn stride_recurrence_holds(dims in arb_extents()) {
            let grid = Grid::<3>::from_extents(&dims);
            let strides = grid.strides();
            prop_assert_eq!(strides[2], 1);
            prop_assert_eq!(strides[1], strides[2] * dims[2]);
            prop_assert_eq!(strides[0], strides[1] * dims[1]);
        }

        #[test]
        fn offset_round_trips_coordinates(
            dims in arb_extents(),
            frac in prop::array::uniform3(0.0f64..1.0),
        ) {
            let coords = [
                (frac[0] * dims[0] as f64) as usize,
                (frac[1] * dims[1] as f64) as usize,
                (frac[2] * dims[2] as f64) as usize,
            ];
            let grid = Grid::<3>::from_extents(&dims);
            let flat = grid.offset(&coords);
            // Decode through the strides and recover the coordinates.
            let strides = grid.strides();
            let mut rem = flat;
            let mut decoded = [0usize; 3];
            for axis in 0..3 {
                decoded[axis] = rem / strides[axis];
                rem %= strides[axis];
            }
            prop_assert_eq!(decoded, coords);
        }

        #[test]
        fn offsets_stay_in_bounds(dims in arb_extents()) {
            let grid = Grid::<3>::from_extents(&dims);
            let last = [dims[0] - 1, dims[1] - 1, dims[2] - 1];
            prop_assert!(grid.offset(&last) < grid.element_count(0));
        }
    }
}
