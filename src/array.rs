//! Typed data arrays with shared ownership.

pub mod modification_time;

use self::modification_time::next_modification_time;
use crate::{
    num::{position_of_largest_weight, Scalar},
    with_scalar_type,
};
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use std::{
    collections::BTreeMap,
    fmt, mem,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

#[cfg(feature = "serialization")]
use serde::Serialize;

#[cfg(any(test, feature = "for-testing"))]
use approx::{AbsDiffEq, RelativeEq};

/// Kind of the values stored in a data array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum ScalarKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Text,
}

impl ScalarKind {
    /// Kind used for arrays of ids.
    pub const ID: Self = Self::I64;

    /// All kinds, numeric ones first.
    pub const ALL: [Self; 11] = [
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::F32,
        Self::F64,
        Self::Text,
    ];

    /// Whether values of this kind are numbers.
    pub fn is_numeric(self) -> bool {
        self != Self::Text
    }

    /// Whether values of this kind are integers.
    pub fn is_integer(self) -> bool {
        self.is_numeric() && !self.is_floating_point()
    }

    /// Whether values of this kind are floating point numbers.
    pub fn is_floating_point(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Size in bytes of a single element (not counting heap data of text).
    pub fn element_size(self) -> usize {
        with_scalar_type!(self, T => mem::size_of::<T>(), mem::size_of::<String>())
    }

    /// Returns a lowercase name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::I8 => "int8",
            Self::U8 => "uint8",
            Self::I16 => "int16",
            Self::U16 => "uint16",
            Self::I32 => "int32",
            Self::U32 => "uint32",
            Self::I64 => "int64",
            Self::U64 => "uint64",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Flat, tuple-major values of a data array, tagged with their kind.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayValues {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Text(Vec<String>),
}

/// Evaluates `$numeric` with `$vec` bound to the vector inside a numeric
/// `ArrayValues` variant, or `$text_body` with `$text` bound to the vector
/// of strings.
macro_rules! dispatch_values {
    ($values:expr, $vec:ident => $numeric:expr, $text:ident => $text_body:expr) => {
        match $values {
            ArrayValues::I8($vec) => $numeric,
            ArrayValues::U8($vec) => $numeric,
            ArrayValues::I16($vec) => $numeric,
            ArrayValues::U16($vec) => $numeric,
            ArrayValues::I32($vec) => $numeric,
            ArrayValues::U32($vec) => $numeric,
            ArrayValues::I64($vec) => $numeric,
            ArrayValues::U64($vec) => $numeric,
            ArrayValues::F32($vec) => $numeric,
            ArrayValues::F64($vec) => $numeric,
            ArrayValues::Text($text) => $text_body,
        }
    };
}

impl ArrayValues {
    /// Creates empty values of the given kind.
    pub fn empty(kind: ScalarKind) -> Self {
        with_scalar_type!(kind, T => T::wrap(Vec::new()), Self::Text(Vec::new()))
    }

    /// Returns the kind of the values.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::I8(_) => ScalarKind::I8,
            Self::U8(_) => ScalarKind::U8,
            Self::I16(_) => ScalarKind::I16,
            Self::U16(_) => ScalarKind::U16,
            Self::I32(_) => ScalarKind::I32,
            Self::U32(_) => ScalarKind::U32,
            Self::I64(_) => ScalarKind::I64,
            Self::U64(_) => ScalarKind::U64,
            Self::F32(_) => ScalarKind::F32,
            Self::F64(_) => ScalarKind::F64,
            Self::Text(_) => ScalarKind::Text,
        }
    }

    /// Returns the total number of values.
    pub fn len(&self) -> usize {
        dispatch_values!(self, values => values.len(), values => values.len())
    }

    /// Whether there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize {
        dispatch_values!(self, values => values.capacity(), values => values.capacity())
    }

    fn memory_size(&self) -> usize {
        dispatch_values!(
            self,
            values => values.capacity() * self.kind().element_size(),
            values => values.capacity() * mem::size_of::<String>()
                + values.iter().map(String::capacity).sum::<usize>()
        )
    }

    fn resize_default(&mut self, len: usize) {
        dispatch_values!(self, values => values.resize(len, Default::default()), values => values.resize(len, String::new()))
    }

    fn resize_filled(&mut self, len: usize, fill: f64) {
        dispatch_values!(self, values => resize_with_value(values, len, fill), values => values.resize(len, String::new()))
    }

    fn reserve_total(&mut self, len: usize) {
        let additional = len.saturating_sub(self.len());
        dispatch_values!(self, values => values.reserve(additional), values => values.reserve(additional))
    }

    fn truncate(&mut self, len: usize) {
        dispatch_values!(self, values => values.truncate(len), values => values.truncate(len))
    }

    fn shrink_to_fit(&mut self) {
        dispatch_values!(self, values => values.shrink_to_fit(), values => values.shrink_to_fit())
    }
}

fn resize_with_value<T: Scalar>(values: &mut Vec<T>, len: usize, fill: f64) {
    values.resize(len, T::from_f64(fill));
}

fn wrap_slice<T: Element>(values: &[T]) -> ArrayValues {
    T::wrap(values.to_vec())
}

/// Type that can be stored as an element of a data array.
pub trait Element: Clone + Default + Send + Sync + fmt::Debug + 'static {
    /// Kind of arrays holding elements of this type.
    const KIND: ScalarKind;

    /// Returns the vector of elements if the values are of this type.
    fn vec(values: &ArrayValues) -> Option<&Vec<Self>>;

    /// Returns the mutable vector of elements if the values are of this type.
    fn vec_mut(values: &mut ArrayValues) -> Option<&mut Vec<Self>>;

    /// Wraps a vector of elements into tagged values.
    fn wrap(values: Vec<Self>) -> ArrayValues;
}

macro_rules! impl_element {
    ($T:ty, $variant:ident) => {
        impl Element for $T {
            const KIND: ScalarKind = ScalarKind::$variant;

            fn vec(values: &ArrayValues) -> Option<&Vec<Self>> {
                match values {
                    ArrayValues::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn vec_mut(values: &mut ArrayValues) -> Option<&mut Vec<Self>> {
                match values {
                    ArrayValues::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn wrap(values: Vec<Self>) -> ArrayValues {
                ArrayValues::$variant(values)
            }
        }
    };
}

impl_element!(i8, I8);
impl_element!(u8, U8);
impl_element!(i16, I16);
impl_element!(u16, U16);
impl_element!(i32, I32);
impl_element!(u32, U32);
impl_element!(i64, I64);
impl_element!(u64, U64);
impl_element!(f32, F32);
impl_element!(f64, F64);
impl_element!(String, Text);

/// Values of a single tuple, in the representation used for blending.
#[derive(Clone, Debug, PartialEq)]
pub enum TupleValues {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl TupleValues {
    /// Blends the tuple with another one as `(1 - t)*self + t*other`.
    ///
    /// Text can not be blended, so the text of `self` is kept for `t < 0.5`
    /// and the text of `other` otherwise.
    pub fn blended(self, other: Self, t: f64) -> Self {
        match (self, other) {
            (Self::Numeric(first), Self::Numeric(second)) => Self::Numeric(
                first
                    .iter()
                    .zip(second.iter())
                    .map(|(&a, &b)| (1.0 - t) * a + t * b)
                    .collect(),
            ),
            (Self::Text(first), Self::Text(second)) => {
                if t < 0.5 {
                    Self::Text(first)
                } else {
                    Self::Text(second)
                }
            }
            _ => panic!("Can not blend numeric and text tuples"),
        }
    }
}

#[cfg(any(test, feature = "for-testing"))]
impl AbsDiffEq for TupleValues {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        match (self, other) {
            (Self::Numeric(first), Self::Numeric(second)) => {
                first[..].abs_diff_eq(&second[..], epsilon)
            }
            (Self::Text(first), Self::Text(second)) => first == second,
            _ => false,
        }
    }
}

#[cfg(any(test, feature = "for-testing"))]
impl RelativeEq for TupleValues {
    fn default_max_relative() -> Self::Epsilon {
        f64::default_max_relative()
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        max_relative: Self::Epsilon,
    ) -> bool {
        match (self, other) {
            (Self::Numeric(first), Self::Numeric(second)) => {
                first[..].relative_eq(&second[..], epsilon, max_relative)
            }
            (Self::Text(first), Self::Text(second)) => first == second,
            _ => false,
        }
    }
}

/// A named, resizable two-dimensional array (tuples x components) of values
/// of a single kind.
#[derive(Clone, Debug)]
pub struct DataArray {
    name: Option<String>,
    num_components: usize,
    component_names: Vec<Option<String>>,
    metadata: BTreeMap<String, String>,
    values: ArrayValues,
    modification_time: u64,
}

impl DataArray {
    /// Creates a new unnamed array of the given kind with no tuples.
    pub fn new(kind: ScalarKind, num_components: usize) -> Self {
        assert!(
            num_components > 0,
            "Number of components must be larger than zero."
        );
        Self {
            name: None,
            num_components,
            component_names: Vec::new(),
            metadata: BTreeMap::new(),
            values: ArrayValues::empty(kind),
            modification_time: next_modification_time(),
        }
    }

    /// Creates a new named array holding the given flat, tuple-major values.
    pub fn from_values<T: Element>(name: &str, num_components: usize, values: Vec<T>) -> Self {
        let mut array = Self::new(T::KIND, num_components);
        assert_eq!(
            values.len() % num_components,
            0,
            "Number of values ({}) is not a multiple of the number of components ({})",
            values.len(),
            num_components
        );
        array.values = T::wrap(values);
        array.set_name(name);
        array
    }

    /// Creates a new named array from a two-dimensional array with one row per tuple.
    pub fn from_array2<T: Element>(name: &str, values: Array2<T>) -> Self {
        let num_components = values.ncols();
        Self::from_values(name, num_components, values.iter().cloned().collect())
    }

    /// Returns the kind of the stored values.
    pub fn kind(&self) -> ScalarKind {
        self.values.kind()
    }

    /// Whether the stored values are numbers.
    pub fn is_numeric(&self) -> bool {
        self.kind().is_numeric()
    }

    /// Returns the name of the array, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the name of the array. An empty name removes the name.
    pub fn set_name(&mut self, name: &str) {
        self.name = if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        };
        self.modified();
    }

    /// Returns the number of components of each tuple.
    pub fn num_components(&self) -> usize {
        self.num_components
    }

    /// Returns the number of tuples.
    pub fn num_tuples(&self) -> usize {
        self.values.len() / self.num_components
    }

    /// Returns the number of tuples that fit without reallocating.
    pub fn capacity_tuples(&self) -> usize {
        self.values.capacity() / self.num_components
    }

    /// Returns the name of the given component, if it has one.
    pub fn component_name(&self, component: usize) -> Option<&str> {
        self.component_names
            .get(component)
            .and_then(|name| name.as_deref())
    }

    /// Sets the name of the given component.
    pub fn set_component_name(&mut self, component: usize, name: &str) {
        assert!(
            component < self.num_components,
            "Component {} out of range for array with {} components",
            component,
            self.num_components
        );
        if self.component_names.len() < self.num_components {
            self.component_names.resize(self.num_components, None);
        }
        self.component_names[component] = Some(name.to_string());
        self.modified();
    }

    /// Whether any component has a name.
    pub fn has_component_names(&self) -> bool {
        self.component_names.iter().any(Option::is_some)
    }

    /// Copies the component names of another array.
    pub fn copy_component_names(&mut self, other: &DataArray) {
        self.component_names = other.component_names.clone();
        self.component_names.truncate(self.num_components);
        self.modified();
    }

    /// Returns the metadata attached to the array.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Attaches a metadata entry to the array.
    pub fn set_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
        self.modified();
    }

    /// Replaces the metadata with a copy of the metadata of another array.
    pub fn copy_metadata(&mut self, other: &DataArray) {
        self.metadata = other.metadata.clone();
        self.modified();
    }

    /// Sets the number of tuples. New tuples are filled with zeros (or empty text).
    pub fn set_number_of_tuples(&mut self, num_tuples: usize) {
        self.values.resize_default(num_tuples * self.num_components);
        self.modified();
    }

    /// Sets the number of tuples, filling new numeric tuples with the given value.
    pub fn set_number_of_tuples_filled(&mut self, num_tuples: usize, fill: f64) {
        self.values
            .resize_filled(num_tuples * self.num_components, fill);
        self.modified();
    }

    /// Makes room for the given number of tuples.
    ///
    /// A size smaller than the current number of tuples truncates the array.
    /// The storage may be relocated.
    pub fn resize(&mut self, num_tuples: usize) {
        let len = num_tuples * self.num_components;
        if len < self.values.len() {
            self.values.truncate(len);
        } else {
            self.values.reserve_total(len);
        }
        self.modified();
    }

    /// Releases any unused storage.
    pub fn squeeze(&mut self) {
        self.values.shrink_to_fit();
    }

    /// Creates a new empty array with the same kind and number of components.
    pub fn new_instance(&self) -> Self {
        Self::new(self.kind(), self.num_components)
    }

    /// Creates an independent copy of the array.
    pub fn deep_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.modification_time = next_modification_time();
        copy
    }

    /// Returns the number of bytes of storage held by the array.
    pub fn actual_memory_size(&self) -> usize {
        self.values.memory_size()
    }

    /// Returns the time of the last modification.
    pub fn modification_time(&self) -> u64 {
        self.modification_time
    }

    /// Marks the array as modified.
    pub fn modified(&mut self) {
        self.modification_time = next_modification_time();
    }

    /// Returns the tagged values.
    pub fn values(&self) -> &ArrayValues {
        &self.values
    }

    /// Returns the values as a slice if they have the given element type.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::vec(&self.values).map(Vec::as_slice)
    }

    /// Returns the values as a mutable slice if they have the given element type.
    ///
    /// The array is marked as modified.
    pub fn as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        self.modification_time = next_modification_time();
        T::vec_mut(&mut self.values).map(Vec::as_mut_slice)
    }

    /// Returns a view of the values with one row per tuple.
    pub fn as_array_view<T: Element>(&self) -> Option<ArrayView2<'_, T>> {
        let (num_tuples, num_components) = (self.num_tuples(), self.num_components);
        let values = self.as_slice::<T>()?;
        ArrayView2::from_shape((num_tuples, num_components), values).ok()
    }

    /// Returns a mutable view of the values with one row per tuple.
    pub fn as_array_view_mut<T: Element>(&mut self) -> Option<ArrayViewMut2<'_, T>> {
        let (num_tuples, num_components) = (self.num_tuples(), self.num_components);
        let values = self.as_mut_slice::<T>()?;
        ArrayViewMut2::from_shape((num_tuples, num_components), values).ok()
    }

    /// Returns the text values if the array holds text.
    pub fn as_text_slice(&self) -> Option<&[String]> {
        self.as_slice::<String>()
    }

    /// Returns the given component of the given tuple as `f64`.
    ///
    /// Returns `None` for text arrays or out-of-range indices.
    pub fn component(&self, tuple: usize, component: usize) -> Option<f64> {
        if component >= self.num_components {
            return None;
        }
        let idx = tuple * self.num_components + component;
        dispatch_values!(&self.values, values => values.get(idx).map(|value| value.as_f64()), _values => None)
    }

    /// Sets the given component of the given tuple of a numeric array.
    pub fn set_component(&mut self, tuple: usize, component: usize, value: f64) {
        let idx = self.checked_value_idx(tuple, component);
        dispatch_values!(
            &mut self.values,
            values => set_from_f64(values, idx, value),
            _values => panic!("Can not set numeric component of text array")
        );
        self.modified();
    }

    /// Returns the given component of the given tuple of a text array.
    pub fn text(&self, tuple: usize, component: usize) -> Option<&str> {
        if component >= self.num_components {
            return None;
        }
        self.as_text_slice()?
            .get(tuple * self.num_components + component)
            .map(String::as_str)
    }

    /// Sets the given component of the given tuple of a text array.
    pub fn set_text(&mut self, tuple: usize, component: usize, value: &str) {
        let idx = self.checked_value_idx(tuple, component);
        match &mut self.values {
            ArrayValues::Text(values) => values[idx] = value.to_string(),
            _ => panic!("Can not set text component of numeric array"),
        }
        self.modified();
    }

    /// Returns the components of the given tuple as `f64`, or `None` for text
    /// arrays or an out-of-range tuple.
    pub fn tuple(&self, tuple: usize) -> Option<Vec<f64>> {
        if tuple >= self.num_tuples() || !self.is_numeric() {
            return None;
        }
        (0..self.num_components)
            .map(|component| self.component(tuple, component))
            .collect()
    }

    /// Appends a tuple to a numeric array.
    pub fn push_tuple(&mut self, values: &[f64]) {
        let tuple = self.num_tuples();
        self.store_tuple(tuple, TupleValues::Numeric(values.to_vec()));
    }

    /// Appends a tuple to a text array.
    pub fn push_text_tuple(&mut self, values: &[&str]) {
        let tuple = self.num_tuples();
        self.store_tuple(
            tuple,
            TupleValues::Text(values.iter().map(|value| value.to_string()).collect()),
        );
    }

    /// Returns a new single-tuple array holding a copy of the given tuple.
    pub fn extract_tuple(&self, tuple: usize) -> DataArray {
        self.check_tuple(tuple);
        let start = tuple * self.num_components;
        let end = start + self.num_components;
        let mut extracted = self.new_instance();
        extracted.values = dispatch_values!(&self.values, values => wrap_slice(&values[start..end]), values => wrap_slice(&values[start..end]));
        extracted
    }

    /// Copies tuple `source_tuple` of `source` into tuple `tuple` of this array,
    /// growing the array if necessary.
    ///
    /// Values of the same kind are copied exactly, other numeric values are
    /// converted with rounding for integer kinds.
    pub fn insert_tuple_from(&mut self, tuple: usize, source: &DataArray, source_tuple: usize) {
        assert_eq!(
            self.num_components, source.num_components,
            "Can not copy tuple between arrays with {} and {} components",
            self.num_components, source.num_components
        );
        source.check_tuple(source_tuple);
        self.ensure_tuples(tuple + 1);
        let start = tuple * self.num_components;
        let source_start = source_tuple * source.num_components;
        let num_components = self.num_components;
        dispatch_values!(
            &mut self.values,
            values => copy_numeric_into(&mut values[start..start + num_components], &source.values, source_start),
            values => copy_text_into(&mut values[start..start + num_components], &source.values, source_start)
        );
        self.modified();
    }

    /// Returns the values of the given tuple.
    pub fn tuple_values(&self, tuple: usize) -> TupleValues {
        self.check_tuple(tuple);
        let start = tuple * self.num_components;
        let end = start + self.num_components;
        dispatch_values!(
            &self.values,
            values => TupleValues::Numeric(values[start..end].iter().map(|value| value.as_f64()).collect()),
            values => TupleValues::Text(values[start..end].to_vec())
        )
    }

    /// Computes the weighted sum of the given tuples.
    ///
    /// Text can not be blended, so the text of the tuple with the largest weight
    /// is used instead.
    pub fn interpolated_tuple(&self, ids: &[usize], weights: &[f64]) -> TupleValues {
        assert_eq!(
            ids.len(),
            weights.len(),
            "Number of ids ({}) differs from number of weights ({})",
            ids.len(),
            weights.len()
        );
        ids.iter().for_each(|&id| self.check_tuple(id));
        let num_components = self.num_components;
        match &self.values {
            ArrayValues::Text(values) => TupleValues::Text(match position_of_largest_weight(weights) {
                Some(position) => {
                    let start = ids[position] * num_components;
                    values[start..start + num_components].to_vec()
                }
                None => vec![String::new(); num_components],
            }),
            _ => TupleValues::Numeric(
                (0..num_components)
                    .map(|component| {
                        ids.iter()
                            .zip(weights.iter())
                            .map(|(&id, &weight)| {
                                weight * self.component(id, component).unwrap_or(f64::NAN)
                            })
                            .sum()
                    })
                    .collect(),
            ),
        }
    }

    /// Writes the given values into tuple `tuple`, growing the array if necessary.
    ///
    /// Numeric values are rounded for integer kinds.
    pub fn store_tuple(&mut self, tuple: usize, values: TupleValues) {
        let num_components = self.num_components;
        self.ensure_tuples(tuple + 1);
        let start = tuple * num_components;
        match (&mut self.values, values) {
            (ArrayValues::Text(target), TupleValues::Text(values)) => {
                assert_eq!(values.len(), num_components, "Wrong number of tuple components");
                target[start..start + num_components].clone_from_slice(&values);
            }
            (ArrayValues::Text(_), TupleValues::Numeric(_)) => {
                panic!("Can not store numeric tuple in text array")
            }
            (_, TupleValues::Text(_)) => panic!("Can not store text tuple in numeric array"),
            (target, TupleValues::Numeric(values)) => {
                assert_eq!(values.len(), num_components, "Wrong number of tuple components");
                dispatch_values!(
                    target,
                    target => store_rounded(&mut target[start..start + num_components], &values),
                    _target => unreachable!()
                )
            }
        }
        self.modified();
    }

    /// Fills tuple `tuple` with zeros (or empty text), growing the array if necessary.
    pub fn fill_tuple_null(&mut self, tuple: usize) {
        let num_components = self.num_components;
        self.ensure_tuples(tuple + 1);
        let start = tuple * num_components;
        dispatch_values!(
            &mut self.values,
            values => values[start..start + num_components].iter_mut().for_each(|value| *value = Default::default()),
            values => values[start..start + num_components].iter_mut().for_each(String::clear)
        );
        self.modified();
    }

    /// Returns an untyped pointer to the first value and the number of values.
    pub(crate) fn raw_values(&self) -> (*const (), usize) {
        dispatch_values!(
            &self.values,
            values => (values.as_ptr() as *const (), values.len()),
            values => (values.as_ptr() as *const (), values.len())
        )
    }

    /// Returns an untyped mutable pointer to the first value and the number of values.
    pub(crate) fn raw_values_mut(&mut self) -> (*mut (), usize) {
        dispatch_values!(
            &mut self.values,
            values => (values.as_mut_ptr() as *mut (), values.len()),
            values => (values.as_mut_ptr() as *mut (), values.len())
        )
    }

    fn ensure_tuples(&mut self, num_tuples: usize) {
        if self.num_tuples() < num_tuples {
            self.values
                .resize_default(num_tuples * self.num_components);
        }
    }

    fn check_tuple(&self, tuple: usize) {
        assert!(
            tuple < self.num_tuples(),
            "Tuple {} out of range for array {} with {} tuples",
            tuple,
            self.name().unwrap_or("<unnamed>"),
            self.num_tuples()
        );
    }

    fn checked_value_idx(&self, tuple: usize, component: usize) -> usize {
        self.check_tuple(tuple);
        assert!(
            component < self.num_components,
            "Component {} out of range for array with {} components",
            component,
            self.num_components
        );
        tuple * self.num_components + component
    }
}

fn set_from_f64<T: Scalar>(values: &mut [T], idx: usize, value: f64) {
    values[idx] = T::from_f64(value);
}

fn store_rounded<T: Scalar>(target: &mut [T], values: &[f64]) {
    target
        .iter_mut()
        .zip(values.iter())
        .for_each(|(target, &value)| *target = T::from_f64_rounded(value));
}

fn copy_numeric_into<T: Scalar>(target: &mut [T], source: &ArrayValues, source_start: usize) {
    let n = target.len();
    dispatch_values!(
        source,
        source => target
            .iter_mut()
            .zip(source[source_start..source_start + n].iter())
            .for_each(|(target, &value)| *target = convert_rounded(value)),
        _source => panic!("Can not copy text values into numeric array")
    )
}

fn convert_rounded<S: Scalar, T: Scalar>(value: S) -> T {
    if S::IS_FLOATING_POINT && !T::IS_FLOATING_POINT {
        T::from_f64_rounded(value.as_f64())
    } else {
        T::cast_from(value)
    }
}

fn copy_text_into(target: &mut [String], source: &ArrayValues, source_start: usize) {
    let n = target.len();
    match source {
        ArrayValues::Text(source) => {
            target.clone_from_slice(&source[source_start..source_start + n])
        }
        _ => panic!("Can not copy numeric values into text array"),
    }
}

/// Reference counted handle to a data array shared between any number of holders.
///
/// Modifications made through one handle are visible through all the others.
#[derive(Clone, Debug)]
pub struct SharedArray(Arc<RwLock<DataArray>>);

impl SharedArray {
    /// Wraps the given array in a new shared handle.
    pub fn new(array: DataArray) -> Self {
        Self(Arc::new(RwLock::new(array)))
    }

    /// Locks the array for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, DataArray> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the array for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, DataArray> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles refer to the same array.
    pub fn same_array(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Key identifying the array, used for locking several arrays in a
    /// consistent order.
    pub(crate) fn lock_order_key(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Creates a handle to an independent copy of the array.
    pub fn deep_copy(&self) -> Self {
        Self::new(self.read().deep_copy())
    }

    /// Returns the number of handles referring to the array.
    pub fn holder_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Returns a copy of the name of the array.
    pub fn name(&self) -> Option<String> {
        self.read().name().map(str::to_string)
    }

    /// Returns the kind of the array.
    pub fn kind(&self) -> ScalarKind {
        self.read().kind()
    }

    /// Returns the number of components of the array.
    pub fn num_components(&self) -> usize {
        self.read().num_components()
    }

    /// Returns the number of tuples of the array.
    pub fn num_tuples(&self) -> usize {
        self.read().num_tuples()
    }

    /// Returns the modification time of the array.
    pub fn modification_time(&self) -> u64 {
        self.read().modification_time()
    }
}

impl From<DataArray> for SharedArray {
    fn from(array: DataArray) -> Self {
        Self::new(array)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::{assert_abs_diff_eq, assert_abs_diff_ne, assert_relative_eq};
    use ndarray::array;

    #[test]
    fn arrays_report_their_shape() {
        let array = DataArray::from_values("v", 3, vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(array.kind(), ScalarKind::F32);
        assert_eq!(array.num_components(), 3);
        assert_eq!(array.num_tuples(), 2);
        assert_eq!(array.tuple(1), Some(vec![4.0, 5.0, 6.0]));
        assert_eq!(array.name(), Some("v"));
        let view = array.as_array_view::<f32>().unwrap();
        assert_eq!(view[[1, 2]], 6.0);
        assert!(array.as_array_view::<f64>().is_none());
    }

    #[test]
    fn arrays_can_be_created_from_ndarray() {
        let array = DataArray::from_array2("m", array![[1_i32, 2], [3, 4], [5, 6]]);
        assert_eq!(array.num_tuples(), 3);
        assert_eq!(array.num_components(), 2);
        assert_eq!(array.as_slice::<i32>().unwrap(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn setting_number_of_tuples_fills_with_zeros() {
        let mut array = DataArray::new(ScalarKind::U16, 2);
        array.set_number_of_tuples(2);
        assert_eq!(array.as_slice::<u16>().unwrap(), &[0, 0, 0, 0]);
        array.set_number_of_tuples_filled(3, 7.0);
        assert_eq!(array.tuple(2), Some(vec![7.0, 7.0]));
        array.resize(1);
        assert_eq!(array.num_tuples(), 1);
        array.resize(100);
        assert_eq!(array.num_tuples(), 1);
        assert!(array.capacity_tuples() >= 100);
    }

    #[test]
    fn modification_bumps_modification_time() {
        let mut array = DataArray::from_values("a", 1, vec![1.0_f64]);
        let before = array.modification_time();
        array.set_component(0, 0, 2.0);
        assert!(array.modification_time() > before);
        let before = array.modification_time();
        array.as_mut_slice::<f64>().unwrap()[0] = 3.0;
        assert!(array.modification_time() > before);
    }

    #[test]
    fn tuple_copies_of_same_kind_are_exact() {
        let large = 9_007_199_254_740_993_i64;
        let source = DataArray::from_values("ids", 1, vec![0_i64, large]);
        let mut target = source.new_instance();
        target.insert_tuple_from(3, &source, 1);
        assert_eq!(target.num_tuples(), 4);
        assert_eq!(target.as_slice::<i64>().unwrap(), &[0, 0, 0, large]);
    }

    #[test]
    fn tuple_copies_between_kinds_round() {
        let source = DataArray::from_values("f", 2, vec![1.6_f64, -2.5]);
        let mut target = DataArray::new(ScalarKind::I32, 2);
        target.insert_tuple_from(0, &source, 0);
        assert_eq!(target.as_slice::<i32>().unwrap(), &[2, -3]);
    }

    #[test]
    fn extracted_tuples_are_independent() {
        let source = DataArray::from_values(
            "s",
            2,
            vec!["a".to_string(), "b".into(), "c".into(), "d".into()],
        );
        let extracted = source.extract_tuple(1);
        assert_eq!(extracted.num_tuples(), 1);
        assert_eq!(extracted.text(0, 1), Some("d"));
    }

    #[test]
    fn interpolated_tuples_blend_numbers_and_pick_text() {
        let numbers = DataArray::from_values("n", 1, vec![10_i32, 20, 30]);
        let values = numbers.interpolated_tuple(&[0, 2], &[0.5, 0.5]);
        assert_eq!(values, TupleValues::Numeric(vec![20.0]));

        let mut target = numbers.new_instance();
        target.store_tuple(0, numbers.interpolated_tuple(&[0, 1], &[0.49, 0.51]));
        assert_eq!(target.as_slice::<i32>().unwrap(), &[15]);

        let text = DataArray::from_values("t", 1, vec!["x".to_string(), "y".into()]);
        assert_eq!(
            text.interpolated_tuple(&[0, 1], &[0.3, 0.7]),
            TupleValues::Text(vec!["y".to_string()])
        );
    }

    #[test]
    fn blending_is_exact_at_endpoints() {
        let first = TupleValues::Numeric(vec![0.1, -3.0]);
        let second = TupleValues::Numeric(vec![0.3, 5.0]);
        assert_eq!(first.clone().blended(second.clone(), 0.0), first);
        assert_eq!(first.clone().blended(second.clone(), 1.0), second);
    }

    #[test]
    fn blended_tuples_compare_approximately() {
        let first = TupleValues::Numeric(vec![0.1, 1.0 / 3.0]);
        let second = TupleValues::Numeric(vec![0.3, 2.0 / 3.0]);
        let middle = first.blended(second, 0.5);
        assert_relative_eq!(middle, TupleValues::Numeric(vec![0.2, 0.5]));
        assert_abs_diff_eq!(middle, TupleValues::Numeric(vec![0.2, 0.5]), epsilon = 1e-12);
        assert_abs_diff_ne!(middle, TupleValues::Numeric(vec![0.2, 0.6]));
        assert_abs_diff_ne!(middle, TupleValues::Text(vec!["0.2".to_string(), "0.5".into()]));
        assert_relative_eq!(
            TupleValues::Text(vec!["a".to_string()]),
            TupleValues::Text(vec!["a".to_string()])
        );
    }

    #[test]
    fn shared_arrays_share_storage() {
        let shared = SharedArray::new(DataArray::from_values("a", 1, vec![1_u8, 2]));
        let other = shared.clone();
        assert!(shared.same_array(&other));
        assert_eq!(shared.holder_count(), 2);
        other.write().set_component(0, 0, 9.0);
        assert_eq!(shared.read().component(0, 0), Some(9.0));

        let copy = shared.deep_copy();
        assert!(!copy.same_array(&shared));
        shared.write().set_component(1, 0, 5.0);
        assert_eq!(copy.read().component(1, 0), Some(2.0));
    }

    #[test]
    fn memory_size_follows_capacity() {
        let mut array = DataArray::new(ScalarKind::F64, 1);
        array.resize(10);
        assert!(array.actual_memory_size() >= 80);
    }
}
