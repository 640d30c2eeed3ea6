//! Execution of tuple operations on all pairs of an array list.

use super::{
    pair::{ArrayPair, RawValues, TupleKernel},
    TupleOperation,
};
use crate::{
    array::{DataArray, SharedArray},
    num::TupleIndex,
    verbosity::Verbosity,
};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use std::{
    cell::Cell,
    marker::PhantomData,
    ops::Range,
    sync::{RwLockReadGuard, RwLockWriteGuard},
};

enum LockedArray<'a> {
    Read(RwLockReadGuard<'a, DataArray>),
    Write(RwLockWriteGuard<'a, DataArray>),
}

impl<'a> LockedArray<'a> {
    fn raw_values(&mut self) -> RawValues {
        match self {
            Self::Read(array) => {
                let (data, len) = array.raw_values();
                RawValues::new(data as *mut (), len, array.kind())
            }
            Self::Write(array) => {
                array.modified();
                let kind = array.kind();
                let (data, len) = array.raw_values_mut();
                RawValues::new(data, len, kind)
            }
        }
    }
}

/// Applies tuple operations to every pair of an array list at once.
///
/// All arrays of the list stay locked while the executor lives, outputs
/// for writing and the remaining inputs for reading. Each distinct array is
/// locked once, in an order that is the same for every executor, so
/// executors of different lists sharing arrays can not deadlock each other.
pub struct TupleExecutor<'a> {
    // Declared before the locks so that the kernels are dropped first.
    kernels: Vec<Box<dyn TupleKernel>>,
    reads_outputs: bool,
    _locks: Vec<LockedArray<'a>>,
}

impl<'a> TupleExecutor<'a> {
    /// Smallest number of output tuples handled by a single parallel task.
    pub const MIN_TUPLES_PER_TASK: usize = 64;

    pub(crate) fn new(pairs: &'a [Box<dyn ArrayPair>]) -> Self {
        let mut arrays: Vec<&'a SharedArray> = Vec::new();
        let mut is_output: Vec<bool> = Vec::new();
        let mut slot_of = |array: &'a SharedArray, output: bool| -> usize {
            match arrays.iter().position(|other| other.same_array(array)) {
                Some(slot) => {
                    is_output[slot] |= output;
                    slot
                }
                None => {
                    arrays.push(array);
                    is_output.push(output);
                    arrays.len() - 1
                }
            }
        };
        let pair_slots: Vec<(usize, usize)> = pairs
            .iter()
            .map(|pair| (slot_of(pair.input(), false), slot_of(pair.output(), true)))
            .collect();

        let reads_outputs = pair_slots
            .iter()
            .any(|&(input_slot, _)| is_output[input_slot]);

        let mut lock_order: Vec<usize> = (0..arrays.len()).collect();
        lock_order.sort_by_key(|&slot| arrays[slot].lock_order_key());
        let mut locked: Vec<Option<LockedArray<'a>>> = (0..arrays.len()).map(|_| None).collect();
        for slot in lock_order {
            locked[slot] = Some(if is_output[slot] {
                LockedArray::Write(arrays[slot].write())
            } else {
                LockedArray::Read(arrays[slot].read())
            });
        }
        let mut locks: Vec<LockedArray<'a>> = locked.into_iter().flatten().collect();

        let raw_values: Vec<RawValues> = locks.iter_mut().map(LockedArray::raw_values).collect();
        let kernels = pairs
            .iter()
            .zip(pair_slots.iter())
            .map(|(pair, &(input_slot, output_slot))| {
                pair.bind(raw_values[input_slot], raw_values[output_slot])
            })
            .collect();

        Self {
            kernels,
            reads_outputs,
            _locks: locks,
        }
    }

    /// Returns the number of array pairs operated on.
    pub fn number_of_arrays(&self) -> usize {
        self.kernels.len()
    }

    /// Applies the given operation to every pair, writing output tuple `out_id`.
    pub fn apply(&mut self, operation: &TupleOperation, out_id: usize) {
        operation.validate();
        for kernel in self.kernels.iter() {
            // Exclusive access to the executor means no other thread touches the locked values.
            unsafe { kernel.apply(operation, out_id) };
        }
    }

    /// Copies input tuple `in_id` into output tuple `out_id`.
    pub fn copy<T: TupleIndex>(&mut self, in_id: T, out_id: usize) {
        self.apply(&TupleOperation::Copy { in_id: in_id.idx() }, out_id);
    }

    /// Stores the weighted sum of the given input tuples in output tuple `out_id`.
    pub fn interpolate<T: TupleIndex>(&mut self, ids: &[T], weights: &[f64], out_id: usize) {
        self.apply(&TupleOperation::interpolate(ids, weights), out_id);
    }

    /// Stores the weighted sum of the given output tuples in output tuple `out_id`.
    pub fn interpolate_output<T: TupleIndex>(
        &mut self,
        ids: &[T],
        weights: &[f64],
        out_id: usize,
    ) {
        self.apply(&TupleOperation::interpolate_output(ids, weights), out_id);
    }

    /// Stores the mean of the given input tuples in output tuple `out_id`.
    pub fn average<T: TupleIndex>(&mut self, ids: &[T], out_id: usize) {
        self.apply(&TupleOperation::average(ids), out_id);
    }

    /// Stores the mean of the given input tuples weighted by the given
    /// weights in output tuple `out_id`.
    pub fn weighted_average<T: TupleIndex>(&mut self, ids: &[T], weights: &[f64], out_id: usize) {
        self.apply(&TupleOperation::weighted_average(ids, weights), out_id);
    }

    /// Stores `(1 - t)*input[v0] + t*input[v1]` in output tuple `out_id`.
    pub fn interpolate_edge<T: TupleIndex>(&mut self, v0: T, v1: T, t: f64, out_id: usize) {
        self.apply(&TupleOperation::interpolate_edge(v0, v1, t), out_id);
    }

    /// Fills output tuple `out_id` with the null value of each pair.
    pub fn assign_null_value(&mut self, out_id: usize) {
        self.apply(&TupleOperation::AssignNullValue, out_id);
    }

    /// Calls the given closure in parallel for every output tuple id in the
    /// given range, handing it the output tuple to write.
    ///
    /// # Parameters
    ///
    /// - `out_ids`: Range of output tuples to compute. Each id is visited exactly once.
    /// - `compute`: Closure applying operations to its output tuple.
    ///
    /// # Panics
    ///
    /// If an operation reads output tuples, either explicitly or because an
    /// array is paired with itself or used as input to another pair, the
    /// tuples it reads must lie outside `out_ids`.
    pub fn par_apply<F>(&mut self, out_ids: Range<usize>, compute: F)
    where
        F: Fn(OutputTuple<'_>) + Sync + Send,
    {
        let kernels = &self.kernels;
        let reads_outputs = self.reads_outputs;
        let written = &out_ids;
        out_ids
            .clone()
            .into_par_iter()
            .with_min_len(Self::MIN_TUPLES_PER_TASK)
            .for_each(|out_id| compute(OutputTuple::new(kernels, out_id, reads_outputs, written)));
    }

    /// Like `par_apply`, but shows a progress bar if the verbosity asks for it.
    pub fn par_apply_with_progress<F>(
        &mut self,
        out_ids: Range<usize>,
        verbosity: &Verbosity,
        compute: F,
    ) where
        F: Fn(OutputTuple<'_>) + Sync + Send,
    {
        let kernels = &self.kernels;
        let reads_outputs = self.reads_outputs;
        let written = &out_ids;
        let progress_bar = verbosity.create_progress_bar(out_ids.len());
        out_ids
            .clone()
            .into_par_iter()
            .with_min_len(Self::MIN_TUPLES_PER_TASK)
            .progress_with(progress_bar)
            .for_each(|out_id| compute(OutputTuple::new(kernels, out_id, reads_outputs, written)));
    }
}

/// Handle for writing a single output tuple of every pair during
/// `TupleExecutor::par_apply`.
///
/// The handle can not be shared between threads, so at most one operation
/// writes a given output tuple at any time.
pub struct OutputTuple<'e> {
    kernels: &'e [Box<dyn TupleKernel>],
    out_id: usize,
    reads_outputs: bool,
    written: &'e Range<usize>,
    not_sync: PhantomData<Cell<()>>,
}

impl<'e> OutputTuple<'e> {
    fn new(
        kernels: &'e [Box<dyn TupleKernel>],
        out_id: usize,
        reads_outputs: bool,
        written: &'e Range<usize>,
    ) -> Self {
        Self {
            kernels,
            out_id,
            reads_outputs,
            written,
            not_sync: PhantomData,
        }
    }

    /// Returns the id of the output tuple.
    pub fn out_id(&self) -> usize {
        self.out_id
    }

    /// Applies the given operation to every pair, writing this output tuple.
    pub fn apply(&self, operation: &TupleOperation) {
        operation.validate();
        let reads_outputs =
            self.reads_outputs || matches!(operation, TupleOperation::InterpolateOutput { .. });
        if reads_outputs {
            operation.for_each_source_id(|id| {
                assert!(
                    !self.written.contains(&id),
                    "Tuple {} is read while tuples {:?} are written in parallel",
                    id,
                    self.written
                )
            });
        }
        for kernel in self.kernels.iter() {
            // Each output id is handed out once and the handle is not `Sync`,
            // and tuples read from outputs were checked to lie outside the written range.
            unsafe { kernel.apply(operation, self.out_id) };
        }
    }

    /// Copies input tuple `in_id` into this output tuple.
    pub fn copy<T: TupleIndex>(&self, in_id: T) {
        self.apply(&TupleOperation::Copy { in_id: in_id.idx() });
    }

    /// Stores the weighted sum of the given input tuples.
    pub fn interpolate<T: TupleIndex>(&self, ids: &[T], weights: &[f64]) {
        self.apply(&TupleOperation::interpolate(ids, weights));
    }

    /// Stores the weighted sum of the given output tuples, which must lie
    /// outside the range being computed.
    pub fn interpolate_output<T: TupleIndex>(&self, ids: &[T], weights: &[f64]) {
        self.apply(&TupleOperation::interpolate_output(ids, weights));
    }

    /// Stores the mean of the given input tuples.
    pub fn average<T: TupleIndex>(&self, ids: &[T]) {
        self.apply(&TupleOperation::average(ids));
    }

    /// Stores the weighted mean of the given input tuples.
    pub fn weighted_average<T: TupleIndex>(&self, ids: &[T], weights: &[f64]) {
        self.apply(&TupleOperation::weighted_average(ids, weights));
    }

    /// Stores `(1 - t)*input[v0] + t*input[v1]`.
    pub fn interpolate_edge<T: TupleIndex>(&self, v0: T, v1: T, t: f64) {
        self.apply(&TupleOperation::interpolate_edge(v0, v1, t));
    }

    /// Fills the tuple with the null value of each pair.
    pub fn assign_null_value(&self) {
        self.apply(&TupleOperation::AssignNullValue);
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::{array::DataArray, interpolation::ArrayList};

    fn shared(name: &str, num_components: usize, values: Vec<f64>) -> SharedArray {
        SharedArray::new(DataArray::from_values(name, num_components, values))
    }

    #[test]
    fn parallel_and_sequential_execution_agree() {
        let n = 1000;
        let input = shared("x", 2, (0..2 * n).map(|value| value as f64).collect());

        let compute = |parallel: bool| {
            let mut list = ArrayList::new();
            let output = list
                .add_array_pair(n - 1, &input, "x", 0.0, false)
                .unwrap();
            {
                let mut executor = list.executor();
                if parallel {
                    executor.par_apply(0..n - 1, |tuple| {
                        let id = tuple.out_id();
                        tuple.interpolate_edge(id, id + 1, 0.25);
                    });
                } else {
                    for id in 0..n - 1 {
                        executor.interpolate_edge(id, id + 1, 0.25, id);
                    }
                }
            }
            let values = output.read().as_slice::<f64>().unwrap().to_vec();
            values
        };
        assert_eq!(compute(true), compute(false));
    }

    #[test]
    fn self_pairs_may_read_tuples_outside_written_range() {
        let array = shared("x", 1, vec![2.0, 4.0]);
        let mut attributes = crate::attributes::DataSetAttributes::new();
        attributes.add_array(Some(array.clone()));
        let mut list = ArrayList::new();
        list.add_self_interpolating_arrays(6, &attributes, 0.0);
        list.executor().par_apply(2..6, |tuple| {
            tuple.interpolate(&[0_u16, 1], &[0.5, 0.5]);
        });
        assert_eq!(
            array.read().as_slice::<f64>().unwrap(),
            &[2.0, 4.0, 3.0, 3.0, 3.0, 3.0]
        );
    }

    #[test]
    #[should_panic]
    fn reading_written_output_tuples_in_parallel_panics() {
        let input = shared("x", 1, vec![1.0, 2.0, 3.0]);
        let mut list = ArrayList::new();
        list.add_array_pair(3, &input, "y", 0.0, false).unwrap();
        list.executor().par_apply(0..3, |tuple| {
            tuple.interpolate_output(&[0_u32], &[1.0]);
        });
    }

    #[test]
    fn executor_marks_outputs_as_modified() {
        let input = shared("x", 1, vec![1.0]);
        let mut list = ArrayList::new();
        let output = list.add_array_pair(1, &input, "y", 0.0, false).unwrap();
        let before = output.modification_time();
        let input_before = input.modification_time();
        list.executor().copy(0_usize, 0);
        assert!(output.modification_time() > before);
        assert_eq!(input.modification_time(), input_before);
    }
}
