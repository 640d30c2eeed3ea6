//! Computation and caching of value ranges of data arrays.

use crate::{array::DataArray, num::Scalar, with_scalar_type};
use rayon::prelude::*;
use std::collections::HashMap;

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Range reported for an array without any contributing values.
pub const EMPTY_RANGE: [f64; 2] = [f64::MAX, f64::MIN];

/// Which values of each tuple a range covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum RangeComponent {
    /// The Euclidean norm of all the components.
    Magnitude,
    /// A single component.
    Index(usize),
}

impl RangeComponent {
    /// Returns the equivalent component for an array with the given number of components.
    ///
    /// The magnitude of a single-component array is the component itself.
    pub fn normalized(self, num_components: usize) -> Self {
        match self {
            Self::Magnitude if num_components == 1 => Self::Index(0),
            component => component,
        }
    }

    /// Whether the component exists in an array with the given number of components.
    pub fn is_valid_for(self, num_components: usize) -> bool {
        match self {
            Self::Magnitude => true,
            Self::Index(component) => component < num_components,
        }
    }
}

/// Specifies an array in a container either by index or by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayTarget<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for ArrayTarget<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl<'a> From<&'a str> for ArrayTarget<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

/// A computed range together with the modification times it was computed for.
///
/// The array and ghost array times are tracked separately, since the ghost
/// array can change without the array itself changing.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct CachedRange {
    array_modification_time: u64,
    ghost_modification_time: u64,
    range: [f64; 2],
}

impl CachedRange {
    /// Creates a new cached range.
    pub fn new(
        array_modification_time: u64,
        ghost_modification_time: u64,
        range: [f64; 2],
    ) -> Self {
        Self {
            array_modification_time,
            ghost_modification_time,
            range,
        }
    }

    /// Whether the cached range is still valid for the given modification times.
    pub fn is_valid(&self, array_modification_time: u64, ghost_modification_time: u64) -> bool {
        self.array_modification_time == array_modification_time
            && self.ghost_modification_time == ghost_modification_time
    }

    /// Returns the cached range.
    pub fn range(&self) -> [f64; 2] {
        self.range
    }
}

/// Cached ranges of a single array, for every component and for the
/// raw and finite-only flavours.
#[derive(Clone, Debug, Default)]
pub struct RangeCache {
    entries: HashMap<(RangeComponent, bool), CachedRange>,
}

impl RangeCache {
    /// Returns the cached range if it is valid for the given modification times.
    pub fn lookup(
        &self,
        component: RangeComponent,
        finite_only: bool,
        array_modification_time: u64,
        ghost_modification_time: u64,
    ) -> Option<[f64; 2]> {
        self.entries
            .get(&(component, finite_only))
            .filter(|cached| cached.is_valid(array_modification_time, ghost_modification_time))
            .map(CachedRange::range)
    }

    /// Stores a freshly computed range.
    pub fn store(&mut self, component: RangeComponent, finite_only: bool, cached: CachedRange) {
        self.entries.insert((component, finite_only), cached);
    }

    /// Removes all cached ranges.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of cached ranges.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no ranges are cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ghost values together with the mask of ghost bits to skip.
#[derive(Clone, Copy, Debug)]
pub struct GhostMask<'a> {
    values: &'a [u8],
    ghosts_to_skip: u8,
}

impl<'a> GhostMask<'a> {
    /// Creates a new ghost mask.
    pub fn new(values: &'a [u8], ghosts_to_skip: u8) -> Self {
        Self {
            values,
            ghosts_to_skip,
        }
    }

    /// Whether the given tuple should be excluded. Tuples beyond the end of
    /// the ghost array are never excluded.
    pub fn skips(&self, tuple: usize) -> bool {
        self.values
            .get(tuple)
            .map_or(false, |&ghost| ghost & self.ghosts_to_skip != 0)
    }
}

/// Computes the range of the given component of a numeric array.
///
/// # Parameters
///
/// - `array`: Array to compute the range of.
/// - `component`: Component (or magnitude) to compute the range of.
/// - `ghosts`: Ghost values used for excluding tuples, if any.
/// - `finite_only`: Whether infinite values should be excluded along with NaN.
///
/// # Returns
///
/// The `[min, max]` range, `EMPTY_RANGE` if no values contribute, or `None` if the
/// array is not numeric or the component is out of bounds.
pub fn compute_range(
    array: &DataArray,
    component: RangeComponent,
    ghosts: Option<GhostMask>,
    finite_only: bool,
) -> Option<[f64; 2]> {
    let num_components = array.num_components();
    if !component.is_valid_for(num_components) {
        return None;
    }
    let component = component.normalized(num_components);
    with_scalar_type!(
        array.kind(),
        T => Some(compute_typed_range(
            array.as_slice::<T>()?,
            num_components,
            component,
            ghosts,
            finite_only
        )),
        None
    )
}

fn compute_typed_range<T: Scalar>(
    values: &[T],
    num_components: usize,
    component: RangeComponent,
    ghosts: Option<GhostMask>,
    finite_only: bool,
) -> [f64; 2] {
    values
        .par_chunks_exact(num_components)
        .enumerate()
        .filter(|(tuple, _)| !ghosts.map_or(false, |ghosts| ghosts.skips(*tuple)))
        .map(|(_, values)| match component {
            RangeComponent::Magnitude => values
                .iter()
                .map(|value| value.as_f64().powi(2))
                .sum::<f64>()
                .sqrt(),
            RangeComponent::Index(component) => values[component].as_f64(),
        })
        .filter(|value| {
            if finite_only {
                value.is_finite()
            } else {
                !value.is_nan()
            }
        })
        .fold(|| EMPTY_RANGE, |[min, max], value| [min.min(value), max.max(value)])
        .reduce(
            || EMPTY_RANGE,
            |[min_a, max_a], [min_b, max_b]| [min_a.min(min_b), max_a.max(max_b)],
        )
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::array::DataArray;

    #[test]
    fn component_ranges_ignore_nan() {
        let array = DataArray::from_values("a", 2, vec![1.0, -5.0, f64::NAN, 2.0, 3.0, 8.0]);
        assert_eq!(
            compute_range(&array, RangeComponent::Index(0), None, false),
            Some([1.0, 3.0])
        );
        assert_eq!(
            compute_range(&array, RangeComponent::Index(1), None, false),
            Some([-5.0, 8.0])
        );
        assert_eq!(compute_range(&array, RangeComponent::Index(2), None, false), None);
    }

    #[test]
    fn finite_ranges_ignore_infinities() {
        let array = DataArray::from_values("a", 1, vec![f32::NEG_INFINITY, 1.0, 4.0]);
        assert_eq!(
            compute_range(&array, RangeComponent::Index(0), None, false),
            Some([f64::NEG_INFINITY, 4.0])
        );
        assert_eq!(
            compute_range(&array, RangeComponent::Index(0), None, true),
            Some([1.0, 4.0])
        );
    }

    #[test]
    fn magnitude_of_single_component_is_signed_value() {
        let array = DataArray::from_values("a", 1, vec![-3_i32, 2]);
        assert_eq!(
            compute_range(&array, RangeComponent::Magnitude, None, false),
            Some([-3.0, 2.0])
        );
        let vectors = DataArray::from_values("v", 2, vec![3.0_f64, 4.0, 0.0, 1.0]);
        assert_eq!(
            compute_range(&vectors, RangeComponent::Magnitude, None, false),
            Some([1.0, 5.0])
        );
    }

    #[test]
    fn ghost_tuples_are_skipped() {
        let array = DataArray::from_values("a", 1, vec![1_u8, 100, 7]);
        let ghosts = [0_u8, 2, 0];
        assert_eq!(
            compute_range(
                &array,
                RangeComponent::Index(0),
                Some(GhostMask::new(&ghosts, 0xff)),
                false
            ),
            Some([1.0, 7.0])
        );
        assert_eq!(
            compute_range(
                &array,
                RangeComponent::Index(0),
                Some(GhostMask::new(&ghosts, 1)),
                false
            ),
            Some([1.0, 100.0])
        );
    }

    #[test]
    fn arrays_without_values_have_empty_range() {
        let array = DataArray::from_values::<f64>("a", 1, Vec::new());
        assert_eq!(
            compute_range(&array, RangeComponent::Index(0), None, false),
            Some(EMPTY_RANGE)
        );
        let text = DataArray::from_values("t", 1, vec!["x".to_string()]);
        assert_eq!(compute_range(&text, RangeComponent::Index(0), None, false), None);
    }

    #[test]
    fn cached_ranges_track_both_modification_times() {
        let mut cache = RangeCache::default();
        cache.store(
            RangeComponent::Index(0),
            false,
            CachedRange::new(4, 0, [1.0, 2.0]),
        );
        assert_eq!(
            cache.lookup(RangeComponent::Index(0), false, 4, 0),
            Some([1.0, 2.0])
        );
        assert_eq!(cache.lookup(RangeComponent::Index(0), false, 5, 0), None);
        assert_eq!(cache.lookup(RangeComponent::Index(0), false, 4, 9), None);
        assert_eq!(cache.lookup(RangeComponent::Index(0), true, 4, 0), None);
    }
}
