//! Engine for copying and interpolating tuples between paired arrays.
//!
//! An `ArrayList` pairs input arrays with output arrays once, resolving
//! their kinds up front. A `TupleExecutor` obtained from the list then
//! applies tuple operations to all pairs, either one output tuple at a time
//! or in parallel over a range of output tuples.

mod executor;
mod pair;

pub use executor::{OutputTuple, TupleExecutor};

use self::pair::{create_pair, ArrayPair};
use crate::{
    array::{DataArray, ScalarKind, SharedArray},
    attributes::{AttributeType, DataSetAttributes},
    error::AttributeError,
    num::{TupleIds, TupleIndex},
    verbosity::Verbosity,
};

/// Operation producing a single output tuple.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TupleOperation<'a> {
    /// Copies an input tuple.
    Copy { in_id: usize },
    /// Weighted sum of input tuples.
    Interpolate {
        ids: TupleIds<'a>,
        weights: &'a [f64],
    },
    /// Weighted sum of tuples of the output arrays.
    InterpolateOutput {
        ids: TupleIds<'a>,
        weights: &'a [f64],
    },
    /// Mean of input tuples. Without any ids the null value is stored.
    Average { ids: TupleIds<'a> },
    /// Weighted sum of input tuples divided by the sum of the weights.
    /// A zero weight sum gives the null value.
    WeightedAverage {
        ids: TupleIds<'a>,
        weights: &'a [f64],
    },
    /// Linear interpolation between two input tuples.
    InterpolateEdge { v0: usize, v1: usize, t: f64 },
    /// Fills the output tuple with the null value.
    AssignNullValue,
}

impl<'a> TupleOperation<'a> {
    pub fn interpolate<T: TupleIndex>(ids: &'a [T], weights: &'a [f64]) -> Self {
        Self::Interpolate {
            ids: T::tuple_ids(ids),
            weights,
        }
    }

    pub fn interpolate_output<T: TupleIndex>(ids: &'a [T], weights: &'a [f64]) -> Self {
        Self::InterpolateOutput {
            ids: T::tuple_ids(ids),
            weights,
        }
    }

    pub fn average<T: TupleIndex>(ids: &'a [T]) -> Self {
        Self::Average {
            ids: T::tuple_ids(ids),
        }
    }

    pub fn weighted_average<T: TupleIndex>(ids: &'a [T], weights: &'a [f64]) -> Self {
        Self::WeightedAverage {
            ids: T::tuple_ids(ids),
            weights,
        }
    }

    pub fn interpolate_edge<T: TupleIndex>(v0: T, v1: T, t: f64) -> Self {
        Self::InterpolateEdge {
            v0: v0.idx(),
            v1: v1.idx(),
            t,
        }
    }

    /// Calls the given closure with every tuple id the operation reads.
    pub fn for_each_source_id(&self, mut f: impl FnMut(usize)) {
        match *self {
            Self::Copy { in_id } => f(in_id),
            Self::Interpolate { ids, .. }
            | Self::InterpolateOutput { ids, .. }
            | Self::Average { ids }
            | Self::WeightedAverage { ids, .. } => ids.iter().for_each(f),
            Self::InterpolateEdge { v0, v1, .. } => {
                f(v0);
                f(v1);
            }
            Self::AssignNullValue => {}
        }
    }

    fn validate(&self) {
        match *self {
            Self::Interpolate { ids, weights }
            | Self::InterpolateOutput { ids, weights }
            | Self::WeightedAverage { ids, weights } => assert_eq!(
                ids.len(),
                weights.len(),
                "Number of ids must match number of weights"
            ),
            _ => {}
        }
    }
}

/// Configuration parameters for adding array pairs from attribute containers.
#[derive(Clone, Debug)]
pub struct ArrayListConfig {
    /// Value stored in output tuples without any contribution, and used to
    /// fill newly allocated output tuples.
    pub null_value: f64,
    /// Whether integer inputs are paired with `F32` outputs.
    pub promote: bool,
    /// Whether to print status messages.
    pub verbosity: Verbosity,
}

impl ArrayListConfig {
    pub const DEFAULT_NULL_VALUE: f64 = 0.0;
    pub const DEFAULT_PROMOTE: bool = false;

    /// Panics if any of the configuration parameter values are invalid.
    fn validate(&self) {
        assert!(
            self.null_value.is_finite(),
            "Null value must be finite, is {}",
            self.null_value
        );
    }
}

impl Default for ArrayListConfig {
    fn default() -> Self {
        Self {
            null_value: Self::DEFAULT_NULL_VALUE,
            promote: Self::DEFAULT_PROMOTE,
            verbosity: Verbosity::default(),
        }
    }
}

/// List of input and output array pairs operated on together.
#[derive(Debug, Default)]
pub struct ArrayList {
    pairs: Vec<Box<dyn ArrayPair>>,
    excluded: Vec<SharedArray>,
}

impl ArrayList {
    /// Creates a new empty array list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of array pairs.
    pub fn number_of_arrays(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the list has no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns the input and output arrays of each pair.
    pub fn pairs(&self) -> impl Iterator<Item = (&SharedArray, &SharedArray)> + '_ {
        self.pairs.iter().map(|pair| (pair.input(), pair.output()))
    }

    /// Prevents the given array from being added as input to any later pair.
    pub fn exclude_array(&mut self, array: &SharedArray) {
        if !self.is_excluded(array) {
            self.excluded.push(array.clone());
        }
    }

    /// Whether the given array has been excluded.
    pub fn is_excluded(&self, array: &SharedArray) -> bool {
        self.excluded.iter().any(|excluded| excluded.same_array(array))
    }

    /// Creates an output array for the given input array and pairs them.
    ///
    /// # Parameters
    ///
    /// - `num_tuples`: Number of tuples of the new output array, all set to the null value.
    /// - `input`: Input array.
    /// - `output_name`: Name of the new output array.
    /// - `null_value`: Value stored in output tuples without any contribution.
    /// - `promote`: Whether an integer input should get an `F32` output.
    ///
    /// # Returns
    ///
    /// The new output array, or `None` if the input is excluded.
    pub fn add_array_pair(
        &mut self,
        num_tuples: usize,
        input: &SharedArray,
        output_name: &str,
        null_value: f64,
        promote: bool,
    ) -> Option<SharedArray> {
        if self.is_excluded(input) {
            return None;
        }
        let output = {
            let input = input.read();
            let kind = if promote && input.kind().is_integer() {
                ScalarKind::F32
            } else {
                input.kind()
            };
            let mut output = DataArray::new(kind, input.num_components());
            output.set_name(output_name);
            output.copy_component_names(&input);
            output.copy_metadata(&input);
            output.set_number_of_tuples_filled(num_tuples, null_value);
            SharedArray::new(output)
        };
        self.pairs
            .push(create_pair(input.clone(), output.clone(), null_value));
        Some(output)
    }

    /// Pairs the given existing arrays.
    ///
    /// The output must have the kind of the input, or be floating point
    /// for a numeric input, and the same number of components.
    pub fn add_pair(
        &mut self,
        input: &SharedArray,
        output: &SharedArray,
        null_value: f64,
    ) -> Result<(), AttributeError> {
        if self.is_excluded(input) {
            return Err(AttributeError::Excluded(
                input.name().unwrap_or_else(|| "<unnamed>".to_string()),
            ));
        }
        let (input_kind, input_components) = (input.kind(), input.num_components());
        let (output_kind, output_components) = (output.kind(), output.num_components());
        if input_components != output_components {
            return Err(AttributeError::ComponentMismatch {
                input: input_components,
                output: output_components,
            });
        }
        if !(input_kind == output_kind
            || (input_kind.is_numeric() && output_kind.is_floating_point()))
        {
            return Err(AttributeError::KindMismatch {
                input: input_kind,
                output: output_kind,
            });
        }
        self.pairs
            .push(create_pair(input.clone(), output.clone(), null_value));
        Ok(())
    }

    /// Pairs every array of the source with a new output array added to the
    /// destination.
    ///
    /// Excluded arrays and arrays whose name is already present in the
    /// destination are skipped. Outputs of arrays with a role in the source
    /// get the same role in the destination.
    pub fn add_arrays(
        &mut self,
        num_out_tuples: usize,
        source: &DataSetAttributes,
        destination: &mut DataSetAttributes,
        null_value: f64,
        promote: bool,
    ) {
        self.add_arrays_with_config(
            num_out_tuples,
            source,
            destination,
            &ArrayListConfig {
                null_value,
                promote,
                verbosity: Verbosity::Quiet,
            },
        );
    }

    /// Like `add_arrays`, with the parameters taken from the given configuration.
    pub fn add_arrays_with_config(
        &mut self,
        num_out_tuples: usize,
        source: &DataSetAttributes,
        destination: &mut DataSetAttributes,
        config: &ArrayListConfig,
    ) {
        config.validate();
        let first_new_pair = self.pairs.len();
        for input in source.arrays() {
            if self.is_excluded(input) {
                continue;
            }
            let name = input.name();
            if let Some(name) = name.as_deref() {
                if destination.has_array(name) {
                    continue;
                }
            }
            if let Some(output) = self.add_array_pair(
                num_out_tuples,
                input,
                name.as_deref().unwrap_or(""),
                config.null_value,
                config.promote,
            ) {
                destination.add_array(Some(output));
            }
        }

        for role in AttributeType::ALL {
            let input = match source.attribute(role) {
                Some(input) => input,
                None => continue,
            };
            let output_index = self.pairs[first_new_pair..]
                .iter()
                .find(|pair| pair.input().same_array(&input))
                .and_then(|pair| destination.index_of(pair.output()));
            if let Some(index) = output_index {
                destination.set_active_attribute(index, role);
            }
        }

        if config.verbosity.print_messages() {
            println!(
                "Paired {} of {} arrays for interpolation",
                self.pairs.len() - first_new_pair,
                source.number_of_arrays()
            );
        }
    }

    /// Pairs every array of the given container with itself, after growing
    /// it to the given number of tuples filled with the null value.
    ///
    /// Operations on such pairs read and write the same array, so output
    /// tuples can be computed from existing tuples of the container.
    pub fn add_self_interpolating_arrays(
        &mut self,
        num_out_tuples: usize,
        attributes: &DataSetAttributes,
        null_value: f64,
    ) {
        for array in attributes.arrays() {
            if self.is_excluded(array) {
                continue;
            }
            {
                let mut array = array.write();
                if array.num_tuples() < num_out_tuples {
                    array.set_number_of_tuples_filled(num_out_tuples, null_value);
                }
            }
            self.pairs
                .push(create_pair(array.clone(), array.clone(), null_value));
        }
    }

    /// Grows every output array to at least the given number of tuples,
    /// filling new tuples with the null value.
    pub fn realloc(&mut self, num_tuples: usize) {
        for pair in self.pairs.iter() {
            pair.realloc(num_tuples);
        }
    }

    /// Locks the arrays of all pairs and returns an executor applying tuple
    /// operations to them.
    pub fn executor(&mut self) -> TupleExecutor<'_> {
        TupleExecutor::new(&self.pairs)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::array::Element;
    use approx::assert_abs_diff_eq;

    fn shared<T: Element>(name: &str, num_components: usize, values: Vec<T>) -> SharedArray {
        SharedArray::new(DataArray::from_values(name, num_components, values))
    }

    #[test]
    fn interpolating_temperature_gives_weighted_sum() {
        let mut source = DataSetAttributes::new();
        source.set_scalars(Some(shared("Temp", 1, vec![10.0_f64, 20.0, 30.0])));
        let mut destination = DataSetAttributes::new();
        let mut list = ArrayList::new();
        list.add_arrays(1, &source, &mut destination, 0.0, false);
        list.executor().interpolate(&[0_u32, 2], &[0.25, 0.75], 0);

        let temperature = destination.array_by_name("Temp").unwrap();
        assert_abs_diff_eq!(temperature.read().component(0, 0).unwrap(), 25.0);
        assert_eq!(
            destination.scalars().map(|scalars| scalars.same_array(&temperature)),
            Some(true)
        );
    }

    #[test]
    fn integer_results_are_truncated_unless_promoted() {
        let input = shared("n", 1, vec![1_i32, 2]);
        let mut list = ArrayList::new();
        let truncated = list.add_array_pair(1, &input, "t", 0.0, false).unwrap();
        let promoted = list.add_array_pair(1, &input, "p", 0.0, true).unwrap();
        assert_eq!(truncated.kind(), ScalarKind::I32);
        assert_eq!(promoted.kind(), ScalarKind::F32);
        list.executor().interpolate_edge(0_usize, 1, 0.5, 0);
        assert_eq!(truncated.read().as_slice::<i32>().unwrap(), &[1]);
        assert_eq!(promoted.read().as_slice::<f32>().unwrap(), &[1.5]);
    }

    #[test]
    fn averages_handle_empty_and_zero_weight_inputs() {
        let input = shared("x", 2, vec![1.0_f64, 10.0, 3.0, 30.0]);
        let mut list = ArrayList::new();
        let output = list.add_array_pair(4, &input, "x", -1.0, false).unwrap();
        {
            let mut executor = list.executor();
            executor.average(&[0_u16, 1], 0);
            executor.average::<u16>(&[], 1);
            executor.weighted_average(&[0_usize, 1], &[1.0, 3.0], 2);
            executor.weighted_average(&[0_usize, 1], &[0.0, 0.0], 3);
        }
        assert_eq!(
            output.read().as_slice::<f64>().unwrap(),
            &[2.0, 20.0, -1.0, -1.0, 2.5, 25.0, -1.0, -1.0]
        );
    }

    #[test]
    fn text_pairs_take_first_tuple_and_concatenate_edges() {
        let input = shared("label", 1, vec!["a".to_string(), "b".to_string()]);
        let mut list = ArrayList::new();
        let output = list.add_array_pair(4, &input, "label", 0.0, true).unwrap();
        assert_eq!(output.kind(), ScalarKind::Text);
        {
            let mut executor = list.executor();
            executor.interpolate(&[1_u32, 0], &[0.1, 0.9], 0);
            executor.interpolate_edge(0_u32, 1, 0.5, 1);
            executor.copy(1_u32, 2);
            executor.average::<u32>(&[], 3);
        }
        assert_eq!(
            output.read().as_text_slice().unwrap(),
            &["b".to_string(), "ab".to_string(), "b".to_string(), String::new()]
        );
    }

    #[test]
    fn interpolation_with_unit_weight_equals_copy_for_all_kinds() {
        for kind in ScalarKind::ALL {
            let mut input = DataArray::new(kind, 2);
            input.set_name("x");
            if kind.is_numeric() {
                input.push_tuple(&[1.0, 2.0]);
                input.push_tuple(&[100.0, 120.0]);
            } else {
                input.push_text_tuple(&["p", "q"]);
                input.push_text_tuple(&["r", "s"]);
            }
            let input = SharedArray::new(input);
            let mut list = ArrayList::new();
            let output = list.add_array_pair(2, &input, "x", 0.0, false).unwrap();
            {
                let mut executor = list.executor();
                executor.copy(1_usize, 0);
                executor.interpolate(&[1_usize], &[1.0], 1);
            }
            let output = output.read();
            assert_eq!(output.tuple_values(0), output.tuple_values(1), "{}", kind);
            assert_eq!(output.tuple_values(0), input.read().tuple_values(1), "{}", kind);
        }
    }

    #[test]
    fn unit_weight_interpolation_keeps_every_digit_of_64_bit_integers() {
        let signed = shared("signed", 1, vec![9_007_199_254_740_993_i64, -9_007_199_254_740_993]);
        let unsigned = shared("unsigned", 1, vec![18_000_000_000_000_001_u64, 1]);
        let mut source = DataSetAttributes::new();
        source.add_array(Some(signed));
        source.add_array(Some(unsigned));
        let mut destination = DataSetAttributes::new();
        let mut list = ArrayList::new();
        list.add_arrays(3, &source, &mut destination, 0.0, false);
        {
            let mut executor = list.executor();
            executor.copy(0_u32, 0);
            executor.interpolate(&[0_u32], &[1.0], 1);
            executor.interpolate(&[1_u32], &[1.0], 2);
        }
        let signed = destination.array_by_name("signed").unwrap();
        assert_eq!(
            signed.read().as_slice::<i64>().unwrap(),
            &[9_007_199_254_740_993, 9_007_199_254_740_993, -9_007_199_254_740_993]
        );
        let unsigned = destination.array_by_name("unsigned").unwrap();
        assert_eq!(
            unsigned.read().as_slice::<u64>().unwrap(),
            &[18_000_000_000_000_001, 18_000_000_000_000_001, 1]
        );

        let mut own = DataSetAttributes::new();
        own.add_array(Some(shared("own", 1, vec![9_007_199_254_740_993_i64])));
        let mut list = ArrayList::new();
        list.add_self_interpolating_arrays(2, &own, 0.0);
        list.executor().interpolate_output(&[0_u16], &[1.0], 1);
        assert_eq!(
            own.array_by_name("own").unwrap().read().as_slice::<i64>().unwrap(),
            &[9_007_199_254_740_993, 9_007_199_254_740_993]
        );
    }

    #[test]
    fn excluded_arrays_are_not_paired() {
        let mut source = DataSetAttributes::new();
        let excluded = shared("a", 1, vec![1.0_f64]);
        source.add_array(Some(excluded.clone()));
        source.add_array(Some(shared("b", 1, vec![2.0_f64])));
        let mut destination = DataSetAttributes::new();
        let mut list = ArrayList::new();
        list.exclude_array(&excluded);
        list.add_arrays(1, &source, &mut destination, 0.0, false);
        assert_eq!(list.number_of_arrays(), 1);
        assert!(!destination.has_array("a"));
        assert_eq!(
            list.add_pair(&excluded, &shared("c", 1, vec![0.0_f64]), 0.0),
            Err(AttributeError::Excluded("a".to_string()))
        );
    }

    #[test]
    fn arrays_already_in_destination_are_skipped() {
        let mut source = DataSetAttributes::new();
        source.add_array(Some(shared("a", 1, vec![1.0_f64])));
        source.add_array(Some(shared("b", 1, vec![2.0_f64])));
        let mut destination = DataSetAttributes::new();
        destination.add_array(Some(shared("a", 1, vec![5.0_f64])));
        let mut list = ArrayList::new();
        list.add_arrays(1, &source, &mut destination, 0.0, false);
        assert_eq!(list.number_of_arrays(), 1);
        assert_eq!(destination.number_of_arrays(), 2);
    }

    #[test]
    fn incompatible_pairs_are_rejected() {
        let input = shared("x", 2, vec![1_u8, 2]);
        let mut list = ArrayList::new();
        assert_eq!(
            list.add_pair(&input, &shared("y", 1, vec![0.0_f64]), 0.0),
            Err(AttributeError::ComponentMismatch {
                input: 2,
                output: 1
            })
        );
        assert_eq!(
            list.add_pair(&input, &shared("y", 2, vec![0_i32, 0]), 0.0),
            Err(AttributeError::KindMismatch {
                input: ScalarKind::U8,
                output: ScalarKind::I32
            })
        );
        assert!(list
            .add_pair(&input, &shared("y", 2, vec![0.0_f64, 0.0]), 0.0)
            .is_ok());
        assert_eq!(list.number_of_arrays(), 1);
    }

    #[test]
    fn realloc_grows_outputs_with_null_value() {
        let input = shared("x", 1, vec![1.0_f64]);
        let mut list = ArrayList::new();
        let output = list.add_array_pair(1, &input, "x", 7.0, false).unwrap();
        list.realloc(3);
        assert_eq!(output.read().as_slice::<f64>().unwrap(), &[7.0, 7.0, 7.0]);
        list.executor().copy(0_u16, 2);
        assert_eq!(output.read().as_slice::<f64>().unwrap(), &[7.0, 7.0, 1.0]);
    }

    #[test]
    fn edge_interpolation_is_linear() {
        let input = shared("x", 1, vec![-2.0_f64, 6.0]);
        let mut list = ArrayList::new();
        let output = list.add_array_pair(3, &input, "x", 0.0, false).unwrap();
        {
            let mut executor = list.executor();
            for (out_id, &t) in [0.0, 0.5, 1.0].iter().enumerate() {
                executor.interpolate_edge(0_u16, 1, t, out_id);
            }
        }
        assert_eq!(output.read().as_slice::<f64>().unwrap(), &[-2.0, 2.0, 6.0]);
    }

    #[test]
    #[should_panic]
    fn mismatched_weights_panic() {
        let input = shared("x", 1, vec![1.0_f64]);
        let mut list = ArrayList::new();
        list.add_array_pair(1, &input, "x", 0.0, false);
        list.executor().interpolate(&[0_u16], &[0.5, 0.5], 0);
    }
}
