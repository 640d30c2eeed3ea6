//! Typed pairs of input and output arrays, and the kernels executing tuple
//! operations on them.

use super::TupleOperation;
use crate::{
    array::{Element, ScalarKind, SharedArray},
    num::{Scalar, TupleIds},
    with_scalar_type, with_tuple_ids,
};
use std::{fmt, marker::PhantomData};

/// Raw view of the values of a locked array.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RawValues {
    data: *mut (),
    len: usize,
    kind: ScalarKind,
}

impl RawValues {
    pub(crate) fn new(data: *mut (), len: usize, kind: ScalarKind) -> Self {
        Self { data, len, kind }
    }

    fn typed<T: Element>(self) -> (*mut T, usize) {
        assert_eq!(
            self.kind,
            T::KIND,
            "Bound {} values as {}",
            self.kind,
            T::KIND
        );
        (self.data as *mut T, self.len)
    }
}

/// An input array paired with an output array of a kind it can be stored in.
pub(crate) trait ArrayPair: Send + Sync + fmt::Debug {
    fn input(&self) -> &SharedArray;

    fn output(&self) -> &SharedArray;

    /// Grows the output to the given number of tuples, filling new tuples
    /// with the null value.
    fn realloc(&self, num_tuples: usize);

    /// Creates a kernel operating on the given views of the locked input
    /// and output values.
    ///
    /// The kernel must not be used after the locks are released.
    fn bind(&self, input: RawValues, output: RawValues) -> Box<dyn TupleKernel>;
}

/// Executes tuple operations for one bound array pair.
pub(crate) trait TupleKernel: Send + Sync {
    /// Applies the operation, writing output tuple `out_id`.
    ///
    /// # Safety
    ///
    /// The bound values must still be locked, no other thread may access
    /// output tuple `out_id` during the call, and no other thread may write
    /// any tuple read by the operation.
    unsafe fn apply(&self, operation: &TupleOperation, out_id: usize);
}

/// Pair of numeric arrays, computing in `f64` and storing the results
/// truncated towards zero for integer outputs.
pub(crate) struct NumericArrayPair<I, O> {
    input: SharedArray,
    output: SharedArray,
    num_components: usize,
    null_value: f64,
    kinds: PhantomData<fn() -> (I, O)>,
}

impl<I: Scalar, O: Scalar> NumericArrayPair<I, O> {
    pub(crate) fn new(input: SharedArray, output: SharedArray, null_value: f64) -> Self {
        let num_components = input.num_components();
        Self {
            input,
            output,
            num_components,
            null_value,
            kinds: PhantomData,
        }
    }
}

impl<I, O> fmt::Debug for NumericArrayPair<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumericArrayPair")
            .field("input", &self.input.name())
            .field("output", &self.output.name())
            .field("num_components", &self.num_components)
            .field("null_value", &self.null_value)
            .finish()
    }
}

impl<I: Scalar, O: Scalar> ArrayPair for NumericArrayPair<I, O> {
    fn input(&self) -> &SharedArray {
        &self.input
    }

    fn output(&self) -> &SharedArray {
        &self.output
    }

    fn realloc(&self, num_tuples: usize) {
        let mut output = self.output.write();
        if num_tuples > output.num_tuples() {
            output.set_number_of_tuples_filled(num_tuples, self.null_value);
        }
    }

    fn bind(&self, input: RawValues, output: RawValues) -> Box<dyn TupleKernel> {
        let (input, input_len) = input.typed::<I>();
        let (output, output_len) = output.typed::<O>();
        Box::new(NumericKernel {
            input,
            input_tuples: input_len / self.num_components,
            output,
            output_tuples: output_len / self.num_components,
            num_components: self.num_components,
            null_value: O::from_f64(self.null_value),
        })
    }
}

struct NumericKernel<I, O> {
    input: *const I,
    input_tuples: usize,
    output: *mut O,
    output_tuples: usize,
    num_components: usize,
    null_value: O,
}

// The pointers are only dereferenced under the contract of `TupleKernel::apply`.
unsafe impl<I: Scalar, O: Scalar> Send for NumericKernel<I, O> {}
unsafe impl<I: Scalar, O: Scalar> Sync for NumericKernel<I, O> {}

impl<I: Scalar, O: Scalar> NumericKernel<I, O> {
    unsafe fn input_value(&self, id: usize, component: usize) -> f64 {
        assert!(
            id < self.input_tuples,
            "Input tuple {} out of range for array with {} tuples",
            id,
            self.input_tuples
        );
        (*self.input.add(id * self.num_components + component)).as_f64()
    }

    unsafe fn output_value(&self, id: usize, component: usize) -> f64 {
        assert!(
            id < self.output_tuples,
            "Output tuple {} out of range for array with {} tuples",
            id,
            self.output_tuples
        );
        (*self.output.add(id * self.num_components + component)).as_f64()
    }

    unsafe fn copy_input(&self, in_id: usize, out_id: usize) {
        assert!(
            in_id < self.input_tuples,
            "Input tuple {} out of range for array with {} tuples",
            in_id,
            self.input_tuples
        );
        let source = self.input.add(in_id * self.num_components);
        let out = self.output.add(out_id * self.num_components);
        for component in 0..self.num_components {
            *out.add(component) = O::cast_from(*source.add(component));
        }
    }

    unsafe fn copy_output(&self, from_id: usize, out_id: usize) {
        assert!(
            from_id < self.output_tuples,
            "Output tuple {} out of range for array with {} tuples",
            from_id,
            self.output_tuples
        );
        let source = self.output.add(from_id * self.num_components);
        let out = self.output.add(out_id * self.num_components);
        for component in 0..self.num_components {
            *out.add(component) = *source.add(component);
        }
    }

    unsafe fn store(&self, out_id: usize, value_of_component: impl Fn(usize) -> f64) {
        let out = self.output.add(out_id * self.num_components);
        for component in 0..self.num_components {
            *out.add(component) = O::from_f64(value_of_component(component));
        }
    }

    unsafe fn store_null(&self, out_id: usize) {
        let out = self.output.add(out_id * self.num_components);
        for component in 0..self.num_components {
            *out.add(component) = self.null_value;
        }
    }

    unsafe fn weighted_sum(
        &self,
        ids: TupleIds,
        weights: &[f64],
        component: usize,
        from_output: bool,
    ) -> f64 {
        with_tuple_ids!(ids, ids => ids
            .iter()
            .zip(weights.iter())
            .map(|(&id, &weight)| {
                let id = crate::num::TupleIndex::idx(id);
                weight
                    * if from_output {
                        self.output_value(id, component)
                    } else {
                        self.input_value(id, component)
                    }
            })
            .sum())
    }
}

/// Returns the single id of an interpolation with one unit weight.
/// Such interpolations are exact copies, also for 64-bit integers.
fn unit_weight_id(ids: TupleIds, weights: &[f64]) -> Option<usize> {
    match weights {
        [weight] if *weight == 1.0 => ids.get(0),
        _ => None,
    }
}

impl<I: Scalar, O: Scalar> TupleKernel for NumericKernel<I, O> {
    unsafe fn apply(&self, operation: &TupleOperation, out_id: usize) {
        assert!(
            out_id < self.output_tuples,
            "Output tuple {} out of range for array with {} tuples",
            out_id,
            self.output_tuples
        );
        match *operation {
            TupleOperation::Copy { in_id } => self.copy_input(in_id, out_id),
            TupleOperation::Interpolate { ids, weights } => match unit_weight_id(ids, weights) {
                Some(in_id) => self.copy_input(in_id, out_id),
                None => self.store(out_id, |component| {
                    self.weighted_sum(ids, weights, component, false)
                }),
            },
            TupleOperation::InterpolateOutput { ids, weights } => {
                match unit_weight_id(ids, weights) {
                    Some(from_id) => self.copy_output(from_id, out_id),
                    None => self.store(out_id, |component| {
                        self.weighted_sum(ids, weights, component, true)
                    }),
                }
            }
            TupleOperation::Average { ids } => {
                if ids.is_empty() {
                    self.store_null(out_id);
                } else {
                    let count = ids.len() as f64;
                    self.store(out_id, |component| {
                        ids.iter()
                            .map(|id| self.input_value(id, component))
                            .sum::<f64>()
                            / count
                    });
                }
            }
            TupleOperation::WeightedAverage { ids, weights } => {
                let total_weight: f64 = weights.iter().sum();
                if total_weight == 0.0 {
                    self.store_null(out_id);
                } else {
                    self.store(out_id, |component| {
                        self.weighted_sum(ids, weights, component, false) / total_weight
                    });
                }
            }
            TupleOperation::InterpolateEdge { v0, v1, t } => {
                self.store(out_id, |component| {
                    let start = self.input_value(v0, component);
                    let end = self.input_value(v1, component);
                    (1.0 - t) * start + t * end
                });
            }
            TupleOperation::AssignNullValue => self.store_null(out_id),
        }
    }
}

/// Pair of text arrays. Text can not be blended, so interpolation and
/// averaging take the first source tuple, and edge interpolation
/// concatenates the end point values.
#[derive(Debug)]
pub(crate) struct TextArrayPair {
    input: SharedArray,
    output: SharedArray,
    num_components: usize,
}

impl TextArrayPair {
    pub(crate) fn new(input: SharedArray, output: SharedArray) -> Self {
        let num_components = input.num_components();
        Self {
            input,
            output,
            num_components,
        }
    }
}

impl ArrayPair for TextArrayPair {
    fn input(&self) -> &SharedArray {
        &self.input
    }

    fn output(&self) -> &SharedArray {
        &self.output
    }

    fn realloc(&self, num_tuples: usize) {
        let mut output = self.output.write();
        if num_tuples > output.num_tuples() {
            output.set_number_of_tuples(num_tuples);
        }
    }

    fn bind(&self, input: RawValues, output: RawValues) -> Box<dyn TupleKernel> {
        let (input, input_len) = input.typed::<String>();
        let (output, output_len) = output.typed::<String>();
        Box::new(TextKernel {
            input,
            input_tuples: input_len / self.num_components,
            output,
            output_tuples: output_len / self.num_components,
            num_components: self.num_components,
        })
    }
}

struct TextKernel {
    input: *const String,
    input_tuples: usize,
    output: *mut String,
    output_tuples: usize,
    num_components: usize,
}

// The pointers are only dereferenced under the contract of `TupleKernel::apply`.
unsafe impl Send for TextKernel {}
unsafe impl Sync for TextKernel {}

impl TextKernel {
    unsafe fn tuple(&self, id: usize, from_output: bool) -> Vec<String> {
        let (values, num_tuples) = if from_output {
            (self.output as *const String, self.output_tuples)
        } else {
            (self.input, self.input_tuples)
        };
        assert!(
            id < num_tuples,
            "Tuple {} out of range for array with {} tuples",
            id,
            num_tuples
        );
        let start = values.add(id * self.num_components);
        (0..self.num_components)
            .map(|component| (*start.add(component)).clone())
            .collect()
    }

    unsafe fn store(&self, out_id: usize, values: Vec<String>) {
        let out = self.output.add(out_id * self.num_components);
        for (component, value) in values.into_iter().enumerate() {
            *out.add(component) = value;
        }
    }

    unsafe fn store_first(&self, out_id: usize, ids: TupleIds, from_output: bool) {
        match ids.get(0) {
            Some(id) => self.store(out_id, self.tuple(id, from_output)),
            None => self.store_null(out_id),
        }
    }

    unsafe fn store_null(&self, out_id: usize) {
        let out = self.output.add(out_id * self.num_components);
        for component in 0..self.num_components {
            (*out.add(component)).clear();
        }
    }
}

impl TupleKernel for TextKernel {
    unsafe fn apply(&self, operation: &TupleOperation, out_id: usize) {
        assert!(
            out_id < self.output_tuples,
            "Output tuple {} out of range for array with {} tuples",
            out_id,
            self.output_tuples
        );
        match *operation {
            TupleOperation::Copy { in_id } => self.store(out_id, self.tuple(in_id, false)),
            TupleOperation::Interpolate { ids, .. }
            | TupleOperation::Average { ids }
            | TupleOperation::WeightedAverage { ids, .. } => self.store_first(out_id, ids, false),
            TupleOperation::InterpolateOutput { ids, .. } => self.store_first(out_id, ids, true),
            TupleOperation::InterpolateEdge { v0, v1, .. } => {
                let start = self.tuple(v0, false);
                let end = self.tuple(v1, false);
                self.store(
                    out_id,
                    start
                        .into_iter()
                        .zip(end)
                        .map(|(start, end)| start + &end)
                        .collect(),
                );
            }
            TupleOperation::AssignNullValue => self.store_null(out_id),
        }
    }
}

/// Creates the pair matching the kinds of the given arrays.
///
/// The kinds are dispatched on once here, so that the operations of the
/// pair run without any further kind checks.
pub(crate) fn create_pair(
    input: SharedArray,
    output: SharedArray,
    null_value: f64,
) -> Box<dyn ArrayPair> {
    let input_kind = input.kind();
    let output_kind = output.kind();
    with_scalar_type!(
        input_kind,
        I => with_scalar_type!(
            output_kind,
            O => Box::new(NumericArrayPair::<I, O>::new(input, output, null_value)) as Box<dyn ArrayPair>,
            panic!("Can not pair numeric input with text output")
        ),
        {
            assert_eq!(
                output_kind,
                ScalarKind::Text,
                "Can not pair text input with numeric output"
            );
            Box::new(TextArrayPair::new(input, output)) as Box<dyn ArrayPair>
        }
    )
}
