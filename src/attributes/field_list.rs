//! Reconciliation of the arrays of several attribute containers into a
//! common set of output columns.

use super::{AttributeType, DataSetAttributes};
use crate::array::{DataArray, ScalarKind};

/// An output column of a field list.
#[derive(Clone, Debug)]
pub struct FieldListColumn {
    prototype: DataArray,
    role: Option<AttributeType>,
}

impl FieldListColumn {
    /// Returns the name of the column.
    pub fn name(&self) -> Option<&str> {
        self.prototype.name()
    }

    /// Returns the kind of the arrays in the column.
    pub fn kind(&self) -> ScalarKind {
        self.prototype.kind()
    }

    /// Returns the number of components of the arrays in the column.
    pub fn num_components(&self) -> usize {
        self.prototype.num_components()
    }

    /// Returns the role shared by every input array in the column, if any.
    pub fn role(&self) -> Option<AttributeType> {
        self.role
    }

    /// Creates an empty array for the column with room for the given number of tuples.
    pub fn instantiate(&self, capacity: usize) -> DataArray {
        let mut array = self.prototype.new_instance();
        if let Some(name) = self.prototype.name() {
            array.set_name(name);
        }
        array.copy_component_names(&self.prototype);
        array.copy_metadata(&self.prototype);
        array.resize(capacity);
        array
    }

    fn matches(&self, array: &DataArray) -> bool {
        array.kind() == self.kind() && array.num_components() == self.num_components()
    }
}

/// Correspondence between the arrays of several input containers and a
/// shared ordering of output columns.
#[derive(Clone, Debug)]
pub struct FieldList {
    columns: Vec<FieldListColumn>,
    input_columns: Vec<Vec<Option<usize>>>,
    input_locals: Vec<Vec<Option<usize>>>,
}

impl FieldList {
    /// Creates a field list with the arrays present in every input with
    /// the same name, kind and number of components.
    ///
    /// Columns are ordered by first occurrence among the inputs.
    pub fn intersection(inputs: &[&DataSetAttributes]) -> Self {
        Self::build(inputs, true)
    }

    /// Creates a field list with the named arrays present in any input,
    /// as long as all inputs having an array agree on its kind and number
    /// of components.
    ///
    /// Inputs lacking a column have no local array for it, and receive
    /// null tuples when copied from.
    pub fn union(inputs: &[&DataSetAttributes]) -> Self {
        Self::build(inputs, false)
    }

    fn build(inputs: &[&DataSetAttributes], require_all: bool) -> Self {
        let mut candidate_names: Vec<String> = Vec::new();
        for input in inputs {
            for array in input.arrays() {
                if let Some(name) = array.name() {
                    if !candidate_names.contains(&name) {
                        candidate_names.push(name);
                    }
                }
            }
        }

        let mut columns = Vec::new();
        let mut input_columns: Vec<Vec<Option<usize>>> = inputs
            .iter()
            .map(|input| vec![None; input.number_of_arrays()])
            .collect();
        let mut input_locals: Vec<Vec<Option<usize>>> = vec![Vec::new(); inputs.len()];

        for name in candidate_names.iter() {
            let locals: Vec<Option<usize>> = inputs
                .iter()
                .map(|input| input.array_index(name))
                .collect();
            if require_all && locals.iter().any(Option::is_none) {
                continue;
            }
            let (first_input, first_local) = match locals
                .iter()
                .enumerate()
                .find_map(|(input, local)| local.map(|local| (input, local)))
            {
                Some(first) => first,
                None => continue,
            };
            let prototype = {
                let array = inputs[first_input].arrays()[first_local].read();
                let mut prototype = array.new_instance();
                prototype.set_name(name);
                prototype.copy_component_names(&array);
                prototype.copy_metadata(&array);
                prototype
            };
            let mut column = FieldListColumn {
                prototype,
                role: None,
            };
            let consistent = inputs.iter().zip(locals.iter()).all(|(input, local)| {
                local.map_or(true, |local| column.matches(&input.arrays()[local].read()))
            });
            if !consistent {
                continue;
            }
            column.role = common_role(inputs, &locals);

            let column_index = columns.len();
            for (input, local) in locals.iter().enumerate() {
                if let Some(local) = *local {
                    input_columns[input][local] = Some(column_index);
                }
                input_locals[input].push(*local);
            }
            columns.push(column);
        }

        Self {
            columns,
            input_columns,
            input_locals,
        }
    }

    /// Returns the number of input containers.
    pub fn number_of_inputs(&self) -> usize {
        self.input_columns.len()
    }

    /// Returns the number of output columns.
    pub fn number_of_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns the output columns in order.
    pub fn columns(&self) -> &[FieldListColumn] {
        &self.columns
    }

    /// Returns the output column of the array with the given local index in
    /// the given input, or `None` if the array is excluded.
    pub fn column_for(&self, input: usize, local_index: usize) -> Option<usize> {
        self.input_columns
            .get(input)
            .and_then(|columns| columns.get(local_index).copied().flatten())
    }

    /// Returns the local index in the given input of the array in the
    /// given output column, or `None` if the input lacks the column.
    pub fn local_index(&self, input: usize, column: usize) -> Option<usize> {
        assert!(
            input < self.number_of_inputs(),
            "Input {} out of range for field list with {} inputs",
            input,
            self.number_of_inputs()
        );
        self.input_locals[input].get(column).copied().flatten()
    }
}

fn common_role(inputs: &[&DataSetAttributes], locals: &[Option<usize>]) -> Option<AttributeType> {
    let mut roles = inputs
        .iter()
        .zip(locals.iter())
        .filter_map(|(input, local)| local.map(|local| input.is_array_an_attribute(local)));
    let first = roles.next()??;
    roles.all(|role| role == Some(first)).then(|| first)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::array::{Element, SharedArray};

    fn shared<T: Element>(name: &str, num_components: usize, values: Vec<T>) -> SharedArray {
        SharedArray::new(DataArray::from_values(name, num_components, values))
    }

    fn input(names: &[&str]) -> DataSetAttributes {
        let mut attributes = DataSetAttributes::new();
        for &name in names {
            let array = match name {
                "A" => shared(name, 1, vec![1.0_f32]),
                "B" => shared(name, 3, vec![1_i32, 2, 3]),
                _ => shared(name, 1, vec![0.5_f64]),
            };
            attributes.add_array(Some(array));
        }
        attributes
    }

    #[test]
    fn intersection_keeps_columns_common_to_all_inputs() {
        let first = input(&["C", "A", "B"]);
        let second = input(&["B", "A"]);
        let third = input(&["A", "C", "B"]);
        let list = FieldList::intersection(&[&first, &second, &third]);
        let names: Vec<_> = list.columns().iter().map(|column| column.name()).collect();
        assert_eq!(names, vec![Some("A"), Some("B")]);
        assert_eq!(list.column_for(0, 0), None);
        assert_eq!(list.column_for(2, 1), None);
        assert_eq!(list.column_for(1, 0), Some(1));
        assert_eq!(list.local_index(1, 0), Some(1));
        assert_eq!(list.local_index(2, 1), Some(2));
    }

    #[test]
    fn mismatched_structure_is_excluded() {
        let first = input(&["A"]);
        let mut second = DataSetAttributes::new();
        second.add_array(Some(shared("A", 1, vec![1.0_f64])));
        assert_eq!(FieldList::intersection(&[&first, &second]).number_of_columns(), 0);
        assert_eq!(FieldList::union(&[&first, &second]).number_of_columns(), 0);
    }

    #[test]
    fn union_keeps_columns_of_any_input() {
        let first = input(&["A", "C"]);
        let second = input(&["B", "A"]);
        let list = FieldList::union(&[&first, &second]);
        assert_eq!(list.number_of_columns(), 3);
        assert_eq!(list.local_index(0, 2), None);
        assert_eq!(list.local_index(1, 2), Some(0));
        assert_eq!(list.local_index(1, 1), None);
    }

    #[test]
    fn columns_inherit_common_roles() {
        let mut first = DataSetAttributes::new();
        first.set_scalars(Some(shared("A", 1, vec![1.0_f32])));
        first.add_array(Some(shared("B", 3, vec![1_i32, 2, 3])));
        let mut second = DataSetAttributes::new();
        second.set_scalars(Some(shared("A", 1, vec![2.0_f32])));
        second.set_vectors(Some(shared("B", 3, vec![4_i32, 5, 6])));
        let list = FieldList::intersection(&[&first, &second]);
        assert_eq!(list.columns()[0].role(), Some(AttributeType::Scalars));
        assert_eq!(list.columns()[1].role(), None);
        assert_eq!(list.columns()[1].kind(), ScalarKind::I32);
        assert_eq!(list.columns()[1].num_components(), 3);
    }
}
