//! Ordered collections of named data arrays.

pub mod range;

use self::range::{compute_range, ArrayTarget, CachedRange, GhostMask, RangeCache, RangeComponent};
use crate::{
    array::{
        modification_time::{next_modification_time, NEVER_MODIFIED},
        DataArray, ScalarKind, SharedArray,
    },
    warn_and_continue,
};
use std::sync::{Mutex, PoisonError};

/// Name of the array holding the ghost flags of each tuple.
pub const GHOST_ARRAY_NAME: &str = "vtkGhostType";

/// An ordered collection of shared data arrays.
///
/// The index of an array is its insertion position, and stays fixed until an
/// earlier array is removed. Adding an array with the name of an existing
/// array replaces the existing array at its index.
#[derive(Debug)]
pub struct FieldData {
    arrays: Vec<SharedArray>,
    range_caches: Vec<Mutex<RangeCache>>,
    ghost_array: Option<SharedArray>,
    ghosts_to_skip: u8,
    field_flags: Vec<(String, bool)>,
    copy_all: bool,
    modification_time: u64,
}

impl FieldData {
    /// Ghost bits excluded from range computations unless configured otherwise.
    pub const DEFAULT_GHOSTS_TO_SKIP: u8 = 0xff;

    /// Creates a new empty container.
    pub fn new() -> Self {
        Self {
            arrays: Vec::new(),
            range_caches: Vec::new(),
            ghost_array: None,
            ghosts_to_skip: Self::DEFAULT_GHOSTS_TO_SKIP,
            field_flags: Vec::new(),
            copy_all: true,
            modification_time: next_modification_time(),
        }
    }

    /// Releases all arrays and resets the copy flags.
    pub fn initialize(&mut self) {
        self.arrays.clear();
        self.range_caches.clear();
        self.ghost_array = None;
        self.clear_field_flags();
        self.copy_all = true;
        self.modified();
    }

    /// Makes room for the given total number of arrays.
    pub fn allocate_arrays(&mut self, num_arrays: usize) {
        let additional = num_arrays.saturating_sub(self.arrays.len());
        self.arrays.reserve(additional);
        self.range_caches.reserve(additional);
    }

    /// Returns the number of arrays that fit without reallocating the slots.
    pub fn allocated_capacity(&self) -> usize {
        self.arrays.capacity()
    }

    /// Returns the number of arrays in the container.
    pub fn number_of_arrays(&self) -> usize {
        self.arrays.len()
    }

    /// Returns the arrays in index order.
    pub fn arrays(&self) -> &[SharedArray] {
        &self.arrays
    }

    /// Adds the given array to the container.
    ///
    /// If an array with the same name exists it is replaced, otherwise the
    /// array is appended.
    ///
    /// # Returns
    ///
    /// The index of the array, or `None` if no array was given.
    pub fn add_array(&mut self, array: Option<SharedArray>) -> Option<usize> {
        let array = array?;
        let existing_index = array.name().and_then(|name| self.array_index(&name));
        let index = match existing_index {
            Some(index) => {
                self.arrays[index] = array;
                self.reset_range_cache(index);
                index
            }
            None => {
                self.arrays.push(array);
                self.range_caches.push(Mutex::new(RangeCache::default()));
                self.arrays.len() - 1
            }
        };
        self.update_ghost_array();
        self.modified();
        Some(index)
    }

    /// Puts the given array in the slot with the given index.
    ///
    /// An index equal to the number of arrays appends the array. Larger
    /// indices are ignored with a warning.
    pub fn set_array(&mut self, index: usize, array: SharedArray) {
        match index.cmp(&self.arrays.len()) {
            std::cmp::Ordering::Less => {
                self.arrays[index] = array;
                self.reset_range_cache(index);
            }
            std::cmp::Ordering::Equal => {
                self.arrays.push(array);
                self.range_caches.push(Mutex::new(RangeCache::default()));
            }
            std::cmp::Ordering::Greater => {
                warn_and_continue!(
                    "Can not set array {} in container with {} arrays",
                    index,
                    self.arrays.len()
                );
                return;
            }
        }
        self.update_ghost_array();
        self.modified();
    }

    /// Removes the array with the given index, shifting later arrays down.
    ///
    /// Out-of-range indices are ignored with a warning.
    ///
    /// # Returns
    ///
    /// The removed array, or `None` if the index was out of range.
    pub fn remove_array(&mut self, index: usize) -> Option<SharedArray> {
        if index >= self.arrays.len() {
            warn_and_continue!(
                "Can not remove array {} from container with {} arrays",
                index,
                self.arrays.len()
            );
            return None;
        }
        let removed = self.arrays.remove(index);
        self.range_caches.remove(index);
        if self
            .ghost_array
            .as_ref()
            .map_or(false, |ghost_array| ghost_array.same_array(&removed))
        {
            self.ghost_array = None;
        }
        self.modified();
        Some(removed)
    }

    /// Removes the first array with the given name, if any.
    pub fn remove_array_by_name(&mut self, name: &str) -> Option<SharedArray> {
        let index = self.array_index(name)?;
        self.remove_array(index)
    }

    /// Returns a handle to the array with the given index.
    pub fn array(&self, index: usize) -> Option<SharedArray> {
        self.arrays.get(index).cloned()
    }

    /// Returns a handle to the first array with the given name.
    pub fn array_by_name(&self, name: &str) -> Option<SharedArray> {
        self.array_index(name).map(|index| self.arrays[index].clone())
    }

    /// Returns the index of the first array with the given name.
    ///
    /// Empty names never match.
    pub fn array_index(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.arrays
            .iter()
            .position(|array| array.read().name() == Some(name))
    }

    /// Returns the index of the given array instance.
    pub fn index_of(&self, array: &SharedArray) -> Option<usize> {
        self.arrays
            .iter()
            .position(|candidate| candidate.same_array(array))
    }

    /// Returns the name of the array with the given index.
    pub fn array_name(&self, index: usize) -> Option<String> {
        self.arrays.get(index).and_then(SharedArray::name)
    }

    /// Whether an array with the given name exists.
    pub fn has_array(&self, name: &str) -> bool {
        self.array_index(name).is_some()
    }

    /// Returns the total number of components over all arrays.
    pub fn number_of_components(&self) -> usize {
        self.arrays.iter().map(SharedArray::num_components).sum()
    }

    /// Returns the number of tuples of the first array, or zero if there are no arrays.
    pub fn number_of_tuples(&self) -> usize {
        self.arrays.first().map_or(0, SharedArray::num_tuples)
    }

    /// Sets the number of tuples of every array.
    pub fn set_number_of_tuples(&mut self, num_tuples: usize) {
        self.arrays
            .iter()
            .for_each(|array| array.write().set_number_of_tuples(num_tuples));
        self.modified();
    }

    /// Removes all tuples from every array, keeping the arrays themselves.
    pub fn reset(&mut self) {
        self.set_number_of_tuples(0);
    }

    /// Releases unused storage of the container and of every array.
    pub fn squeeze(&mut self) {
        self.arrays.shrink_to_fit();
        self.range_caches.shrink_to_fit();
        self.arrays.iter().for_each(|array| array.write().squeeze());
    }

    /// Finds the array holding the given component when the components of
    /// all arrays are laid out after each other.
    ///
    /// # Returns
    ///
    /// The index of the array and the index of the component within that array.
    pub fn array_containing_component(&self, component: usize) -> Option<(usize, usize)> {
        let mut offset = 0;
        for (index, array) in self.arrays.iter().enumerate() {
            let num_components = array.num_components();
            if component < offset + num_components {
                return Some((index, component - offset));
            }
            offset += num_components;
        }
        None
    }

    /// Computes the range of the given component of the given array,
    /// excluding NaN and flagged ghost tuples.
    ///
    /// The range is cached and only recomputed when the array or the ghost
    /// array has been modified since the last computation.
    ///
    /// # Returns
    ///
    /// The `[min, max]` range, or `None` if the array does not exist, is not
    /// numeric or lacks the component.
    pub fn range<'a, A: Into<ArrayTarget<'a>>>(
        &self,
        target: A,
        component: RangeComponent,
    ) -> Option<[f64; 2]> {
        self.cached_range(target.into(), component, false)
    }

    /// Like `range`, but also excludes infinite values.
    pub fn finite_range<'a, A: Into<ArrayTarget<'a>>>(
        &self,
        target: A,
        component: RangeComponent,
    ) -> Option<[f64; 2]> {
        self.cached_range(target.into(), component, true)
    }

    /// Like `range`, but returns `[NaN, NaN]` when the range is not available.
    pub fn range_or_nan<'a, A: Into<ArrayTarget<'a>>>(
        &self,
        target: A,
        component: RangeComponent,
    ) -> [f64; 2] {
        self.range(target, component).unwrap_or([f64::NAN, f64::NAN])
    }

    fn cached_range(
        &self,
        target: ArrayTarget,
        component: RangeComponent,
        finite_only: bool,
    ) -> Option<[f64; 2]> {
        let index = match target {
            ArrayTarget::Index(index) => index,
            ArrayTarget::Name(name) => self.array_index(name)?,
        };
        let array = self.arrays.get(index)?;
        let guard = array.read();
        if !guard.is_numeric() || !component.is_valid_for(guard.num_components()) {
            return None;
        }
        let component = component.normalized(guard.num_components());

        let ghost_is_target = self
            .ghost_array
            .as_ref()
            .map_or(false, |ghost_array| ghost_array.same_array(array));
        let other_ghost_guard = if ghost_is_target {
            None
        } else {
            self.ghost_array.as_ref().map(SharedArray::read)
        };
        let ghost_array: Option<&DataArray> = if ghost_is_target {
            Some(&*guard)
        } else {
            other_ghost_guard.as_deref()
        };
        let ghost_modification_time =
            ghost_array.map_or(NEVER_MODIFIED, DataArray::modification_time);
        let array_modification_time = guard.modification_time();

        let mut cache = self.range_caches[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(range) = cache.lookup(
            component,
            finite_only,
            array_modification_time,
            ghost_modification_time,
        ) {
            return Some(range);
        }
        let ghosts = ghost_array
            .and_then(DataArray::as_slice::<u8>)
            .map(|values| GhostMask::new(values, self.ghosts_to_skip));
        let range = compute_range(&guard, component, ghosts, finite_only)?;
        cache.store(
            component,
            finite_only,
            CachedRange::new(array_modification_time, ghost_modification_time, range),
        );
        Some(range)
    }

    /// Returns the mask of ghost bits whose tuples are excluded from ranges.
    pub fn ghosts_to_skip(&self) -> u8 {
        self.ghosts_to_skip
    }

    /// Sets the mask of ghost bits whose tuples are excluded from ranges.
    ///
    /// Changing the mask invalidates all cached ranges.
    pub fn set_ghosts_to_skip(&mut self, ghosts_to_skip: u8) {
        if ghosts_to_skip != self.ghosts_to_skip {
            self.ghosts_to_skip = ghosts_to_skip;
            self.range_caches.iter_mut().for_each(|cache| {
                cache
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear()
            });
            self.modified();
        }
    }

    /// Returns the ghost array, if present.
    pub fn ghost_array(&self) -> Option<&SharedArray> {
        self.ghost_array.as_ref()
    }

    /// Looks up the ghost array among the arrays again.
    ///
    /// Only a one-component `U8` array with the ghost array name qualifies.
    pub fn update_ghost_array(&mut self) {
        self.ghost_array = self
            .array_by_name(GHOST_ARRAY_NAME)
            .filter(|array| {
                let array = array.read();
                array.kind() == ScalarKind::U8 && array.num_components() == 1
            });
    }

    /// Whether any ghost value has any of the given bits set.
    pub fn has_any_ghost_bit_set(&self, mask: u8) -> bool {
        self.ghost_array.as_ref().map_or(false, |ghost_array| {
            ghost_array
                .read()
                .as_slice::<u8>()
                .map_or(false, |values| values.iter().any(|&ghost| ghost & mask != 0))
        })
    }

    /// Replaces the arrays with empty arrays of the same structure as those of `other`.
    pub fn copy_structure(&mut self, other: &FieldData) {
        self.arrays.clear();
        self.range_caches.clear();
        self.allocate_arrays(other.number_of_arrays());
        for array in other.arrays.iter() {
            let array = array.read();
            let mut empty = array.new_instance();
            if let Some(name) = array.name() {
                empty.set_name(name);
            }
            empty.copy_component_names(&array);
            empty.copy_metadata(&array);
            self.arrays.push(SharedArray::new(empty));
            self.range_caches.push(Mutex::new(RangeCache::default()));
        }
        self.update_ghost_array();
        self.modified();
    }

    /// Makes the container share the arrays of `other`.
    pub fn shallow_copy(&mut self, other: &FieldData) {
        self.arrays = other.arrays.clone();
        self.range_caches = other
            .arrays
            .iter()
            .map(|_| Mutex::new(RangeCache::default()))
            .collect();
        self.ghost_array = other.ghost_array.clone();
        self.copy_settings_from(other);
        self.modified();
    }

    /// Makes the container hold independent copies of the arrays of `other`.
    pub fn deep_copy(&mut self, other: &FieldData) {
        self.arrays = other.arrays.iter().map(SharedArray::deep_copy).collect();
        self.range_caches = other
            .arrays
            .iter()
            .map(|_| Mutex::new(RangeCache::default()))
            .collect();
        self.update_ghost_array();
        self.copy_settings_from(other);
        self.modified();
    }

    fn copy_settings_from(&mut self, other: &FieldData) {
        self.ghosts_to_skip = other.ghosts_to_skip;
        self.field_flags = other.field_flags.clone();
        self.copy_all = other.copy_all;
    }

    /// Adds the arrays of `other` that the copy flags of this container allow,
    /// sharing them rather than copying.
    pub fn pass_data(&mut self, other: &FieldData) {
        for array in other.arrays.iter() {
            let flag = array.name().and_then(|name| self.field_flag(&name));
            if self.passes_field_flag(flag) {
                self.add_array(Some(array.clone()));
            }
        }
    }

    /// Whether an array with the given name-level flag should be copied
    /// according to the name-level and global flags.
    pub fn passes_field_flag(&self, flag: Option<bool>) -> bool {
        flag != Some(false) && !(self.is_copy_all_off() && flag != Some(true))
    }

    /// Copies a tuple from every array of `source` into the array with the
    /// same index in this container.
    pub fn copy_tuple_from(&mut self, source: &FieldData, source_tuple: usize, tuple: usize) {
        for (array, source_array) in self.arrays.iter().zip(source.arrays.iter()) {
            let values = source_array.read().extract_tuple(source_tuple);
            array.write().insert_tuple_from(tuple, &values, 0);
        }
        self.modified();
    }

    /// Fills the given tuple of every array with zeros (or empty text).
    pub fn null_data(&mut self, tuple: usize) {
        self.arrays
            .iter()
            .for_each(|array| array.write().fill_tuple_null(tuple));
        self.modified();
    }

    /// Gathers the tuples of `source` with the given ids into consecutive
    /// tuples of this container, starting from tuple 0.
    pub fn gather_tuples(&mut self, source: &FieldData, ids: &[usize]) {
        for (tuple, &source_tuple) in ids.iter().enumerate() {
            self.copy_tuple_from(source, source_tuple, tuple);
        }
    }

    /// Returns the number of bytes held by all the arrays.
    pub fn actual_memory_size(&self) -> usize {
        self.arrays
            .iter()
            .map(|array| array.read().actual_memory_size())
            .sum()
    }

    /// Returns the latest modification time of the container and its arrays.
    pub fn modification_time(&self) -> u64 {
        self.arrays
            .iter()
            .map(SharedArray::modification_time)
            .fold(self.modification_time, u64::max)
    }

    /// Marks the container as modified.
    pub fn modified(&mut self) {
        self.modification_time = next_modification_time();
    }

    /// Requests that the array with the given name is copied.
    pub fn copy_field_on(&mut self, name: &str) {
        self.set_field_flag(name, true);
    }

    /// Requests that the array with the given name is not copied.
    pub fn copy_field_off(&mut self, name: &str) {
        self.set_field_flag(name, false);
    }

    fn set_field_flag(&mut self, name: &str, on: bool) {
        if name.is_empty() {
            return;
        }
        match self.field_flags.iter_mut().find(|(flag_name, _)| flag_name == name) {
            Some((_, flag)) => *flag = on,
            None => self.field_flags.push((name.to_string(), on)),
        }
        self.modified();
    }

    /// Returns the name-level copy flag of the given array name, if set.
    pub fn field_flag(&self, name: &str) -> Option<bool> {
        self.field_flags
            .iter()
            .find(|(flag_name, _)| flag_name == name)
            .map(|&(_, flag)| flag)
    }

    /// Removes all name-level copy flags.
    pub fn clear_field_flags(&mut self) {
        self.field_flags.clear();
    }

    /// Copies arrays without a name-level flag by default.
    pub fn copy_all_on(&mut self) {
        self.copy_all = true;
        self.modified();
    }

    /// Skips arrays without a name-level flag by default.
    pub fn copy_all_off(&mut self) {
        self.copy_all = false;
        self.modified();
    }

    /// Whether arrays without a name-level flag are copied.
    pub fn is_copy_all_on(&self) -> bool {
        self.copy_all
    }

    /// Whether arrays without a name-level flag are skipped.
    pub fn is_copy_all_off(&self) -> bool {
        !self.copy_all
    }

    fn reset_range_cache(&mut self, index: usize) {
        self.range_caches[index] = Mutex::new(RangeCache::default());
    }
}

impl Default for FieldData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn shared<T: crate::array::Element>(
        name: &str,
        num_components: usize,
        values: Vec<T>,
    ) -> SharedArray {
        SharedArray::new(DataArray::from_values(name, num_components, values))
    }

    #[test]
    fn adding_array_with_existing_name_replaces_it() {
        let mut field = FieldData::new();
        assert_eq!(field.add_array(None), None);
        assert_eq!(field.add_array(Some(shared("a", 1, vec![1.0_f64]))), Some(0));
        assert_eq!(field.add_array(Some(shared("b", 1, vec![2.0_f64]))), Some(1));
        let replacement = shared("a", 2, vec![3_i32, 4]);
        assert_eq!(field.add_array(Some(replacement.clone())), Some(0));
        assert_eq!(field.number_of_arrays(), 2);
        assert!(field.array_by_name("a").unwrap().same_array(&replacement));
        assert!(field.allocated_capacity() >= field.number_of_arrays());
    }

    #[test]
    fn unnamed_arrays_are_always_appended() {
        let mut field = FieldData::new();
        field.add_array(Some(SharedArray::new(DataArray::new(ScalarKind::F32, 1))));
        field.add_array(Some(SharedArray::new(DataArray::new(ScalarKind::F32, 1))));
        assert_eq!(field.number_of_arrays(), 2);
        assert_eq!(field.array_index(""), None);
    }

    #[test]
    fn removing_arrays_shifts_later_arrays() {
        let mut field = FieldData::new();
        field.add_array(Some(shared("a", 1, vec![1_u8])));
        field.add_array(Some(shared("b", 1, vec![2_u8])));
        field.add_array(Some(shared("c", 1, vec![3_u8])));
        assert!(field.remove_array(7).is_none());
        assert_eq!(field.number_of_arrays(), 3);
        assert!(field.remove_array_by_name("b").is_some());
        assert_eq!(field.array_name(1).as_deref(), Some("c"));
        assert_eq!(field.number_of_arrays(), 2);
    }

    #[test]
    fn set_array_appends_at_end_and_ignores_larger_indices() {
        let mut field = FieldData::new();
        field.set_array(0, shared("a", 1, vec![1_u8]));
        field.set_array(5, shared("b", 1, vec![1_u8]));
        assert_eq!(field.number_of_arrays(), 1);
        field.set_array(0, shared("c", 1, vec![1_u8]));
        assert_eq!(field.array_name(0).as_deref(), Some("c"));
    }

    #[test]
    fn ranges_are_recomputed_after_modification() {
        let mut field = FieldData::new();
        let array = shared("a", 1, vec![1.0_f64, 5.0]);
        field.add_array(Some(array.clone()));
        assert_eq!(field.range("a", RangeComponent::Index(0)), Some([1.0, 5.0]));
        array.write().set_component(1, 0, -2.0);
        assert_eq!(field.range(0, RangeComponent::Index(0)), Some([-2.0, 1.0]));
        assert_eq!(field.range("missing", RangeComponent::Index(0)), None);
        assert!(field.range_or_nan(0, RangeComponent::Index(3))[0].is_nan());
    }

    #[test]
    fn ghost_tuples_are_excluded_from_ranges() {
        let mut field = FieldData::new();
        field.add_array(Some(shared("a", 1, vec![1.0_f32, 50.0, 3.0])));
        let ghosts = shared(GHOST_ARRAY_NAME, 1, vec![0_u8, 1, 0]);
        field.add_array(Some(ghosts.clone()));
        assert!(field.ghost_array().is_some());
        assert!(field.has_any_ghost_bit_set(1));
        assert!(!field.has_any_ghost_bit_set(2));
        assert_eq!(field.range("a", RangeComponent::Index(0)), Some([1.0, 3.0]));

        field.set_ghosts_to_skip(2);
        assert_eq!(field.range("a", RangeComponent::Index(0)), Some([1.0, 50.0]));

        field.set_ghosts_to_skip(FieldData::DEFAULT_GHOSTS_TO_SKIP);
        ghosts.write().set_component(1, 0, 0.0);
        assert_eq!(field.range("a", RangeComponent::Index(0)), Some([1.0, 50.0]));

        field.remove_array_by_name(GHOST_ARRAY_NAME);
        assert!(field.ghost_array().is_none());
        assert!(!field.has_any_ghost_bit_set(0xff));
    }

    #[test]
    fn ghost_array_must_be_single_component_bytes() {
        let mut field = FieldData::new();
        field.add_array(Some(shared(GHOST_ARRAY_NAME, 1, vec![0_i32])));
        assert!(field.ghost_array().is_none());
    }

    #[test]
    fn copy_structure_creates_empty_arrays() {
        let mut source = FieldData::new();
        let mut array = DataArray::from_values("v", 3, vec![1.0_f64; 6]);
        array.set_component_name(2, "z");
        array.set_metadata("units", "m");
        source.add_array(Some(SharedArray::new(array)));

        let mut target = FieldData::new();
        target.copy_structure(&source);
        let copied = target.array(0).unwrap();
        let copied = copied.read();
        assert_eq!(copied.num_tuples(), 0);
        assert_eq!(copied.num_components(), 3);
        assert_eq!(copied.name(), Some("v"));
        assert_eq!(copied.component_name(2), Some("z"));
        assert_eq!(copied.metadata().get("units").map(String::as_str), Some("m"));
    }

    #[test]
    fn copy_flags_control_passed_arrays() {
        let mut source = FieldData::new();
        source.add_array(Some(shared("a", 1, vec![1_u8])));
        source.add_array(Some(shared("b", 1, vec![1_u8])));
        source.add_array(Some(shared("c", 1, vec![1_u8])));

        let mut target = FieldData::new();
        target.copy_field_off("a");
        target.pass_data(&source);
        assert_eq!(target.number_of_arrays(), 2);

        let mut target = FieldData::new();
        target.copy_all_off();
        target.copy_field_on("c");
        target.pass_data(&source);
        assert_eq!(target.number_of_arrays(), 1);
        assert!(target.array(0).unwrap().same_array(&source.array(2).unwrap()));
    }

    #[test]
    fn tuples_can_be_copied_and_gathered() {
        let mut source = FieldData::new();
        source.add_array(Some(shared("a", 1, vec![1_i64, 2, 3])));
        source.add_array(Some(shared("b", 2, vec![0.5_f64, 1.0, 1.5, 2.0, 2.5, 3.0])));
        let mut target = FieldData::new();
        target.copy_structure(&source);
        target.gather_tuples(&source, &[2, 0]);
        assert_eq!(target.number_of_tuples(), 2);
        assert_eq!(target.array(0).unwrap().read().as_slice::<i64>().unwrap(), &[3, 1]);
        assert_eq!(target.array(1).unwrap().read().tuple(0), Some(vec![2.5, 3.0]));
        assert_eq!(target.number_of_components(), 3);
        assert_eq!(target.array_containing_component(2), Some((1, 1)));
        assert_eq!(target.array_containing_component(3), None);
    }

    #[test]
    fn tuples_can_be_copied_within_shared_arrays() {
        let mut field = FieldData::new();
        field.add_array(Some(shared("a", 1, vec![1_i64, 2])));
        let mut alias = FieldData::new();
        alias.shallow_copy(&field);
        field.copy_tuple_from(&alias, 1, 0);
        assert_eq!(field.array(0).unwrap().read().as_slice::<i64>().unwrap(), &[2, 2]);
    }

    #[test]
    fn memory_size_and_modification_time_cover_arrays() {
        let mut field = FieldData::new();
        let array = shared("a", 1, vec![0.0_f64; 16]);
        field.add_array(Some(array.clone()));
        assert!(field.actual_memory_size() >= 128);
        let before = field.modification_time();
        array.write().modified();
        assert!(field.modification_time() > before);
    }
}
