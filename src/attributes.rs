//! Attribute containers, where arrays can be given semantic roles and are
//! copied or interpolated between containers according to copy flags.

pub mod copy_control;
pub mod field_list;

use self::{
    copy_control::{resolve, CopyContext, CopyFlag, CopyFlags, CopyOperation},
    field_list::FieldList,
};
use crate::{
    array::{DataArray, ScalarKind, SharedArray},
    expect_precondition,
    field::FieldData,
    num::position_of_largest_weight,
    warn_and_continue,
};
use lazy_static::lazy_static;
use paste::paste;
use std::{collections::HashMap, fmt, ops::Deref, str::FromStr};

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Semantic role that an array can have in an attribute container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum AttributeType {
    Scalars,
    Vectors,
    Normals,
    TCoords,
    Tensors,
    GlobalIds,
    PedigreeIds,
    EdgeFlag,
    Tangents,
    RationalWeights,
    HigherOrderDegrees,
    ProcessIds,
}

lazy_static! {
    static ref ATTRIBUTE_TYPES_BY_NAME: HashMap<String, AttributeType> = AttributeType::ALL
        .iter()
        .map(|&role| (role.name().to_lowercase(), role))
        .collect();
}

impl AttributeType {
    pub const COUNT: usize = 12;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Scalars,
        Self::Vectors,
        Self::Normals,
        Self::TCoords,
        Self::Tensors,
        Self::GlobalIds,
        Self::PedigreeIds,
        Self::EdgeFlag,
        Self::Tangents,
        Self::RationalWeights,
        Self::HigherOrderDegrees,
        Self::ProcessIds,
    ];

    /// Returns the position of the role in `ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Scalars => "Scalars",
            Self::Vectors => "Vectors",
            Self::Normals => "Normals",
            Self::TCoords => "TCoords",
            Self::Tensors => "Tensors",
            Self::GlobalIds => "GlobalIds",
            Self::PedigreeIds => "PedigreeIds",
            Self::EdgeFlag => "EdgeFlag",
            Self::Tangents => "Tangents",
            Self::RationalWeights => "RationalWeights",
            Self::HigherOrderDegrees => "HigherOrderDegrees",
            Self::ProcessIds => "ProcessIds",
        }
    }

    /// Whether arrays with the given number of components can have this role.
    pub fn accepts_num_components(self, num_components: usize) -> bool {
        match self {
            Self::Scalars => (1..=4).contains(&num_components),
            Self::Vectors | Self::Normals | Self::Tangents | Self::HigherOrderDegrees => {
                num_components == 3
            }
            Self::TCoords => (1..=3).contains(&num_components),
            Self::Tensors => num_components == 9 || num_components == 6,
            Self::GlobalIds
            | Self::PedigreeIds
            | Self::EdgeFlag
            | Self::RationalWeights
            | Self::ProcessIds => num_components == 1,
        }
    }

    /// Whether arrays of the given kind can have this role.
    pub fn accepts_kind(self, kind: ScalarKind) -> bool {
        match self {
            Self::PedigreeIds => true,
            Self::GlobalIds | Self::ProcessIds => kind == ScalarKind::ID,
            _ => kind.is_numeric(),
        }
    }

    /// Whether the given array can have this role.
    pub fn accepts(self, array: &DataArray) -> bool {
        self.accepts_num_components(array.num_components()) && self.accepts_kind(array.kind())
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AttributeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ATTRIBUTE_TYPES_BY_NAME
            .get(&s.to_lowercase())
            .copied()
            .ok_or_else(|| format!("Invalid attribute type: {}", s))
    }
}

#[derive(Clone, Debug)]
struct CopyPlan {
    correspondences: Vec<(usize, usize)>,
}

#[derive(Clone, Debug)]
struct ListPlan {
    targets: Vec<Option<usize>>,
}

/// A field data container where arrays can be given semantic roles.
///
/// Read-only field data queries are available through `Deref`. Mutations
/// go through the methods of this type so that the role mappings stay valid.
#[derive(Debug)]
pub struct DataSetAttributes {
    field: FieldData,
    attribute_indices: [Option<usize>; AttributeType::COUNT],
    copy_flags: CopyFlags,
    copy_plan: Option<CopyPlan>,
    list_plan: Option<ListPlan>,
}

impl DataSetAttributes {
    /// Creates a new empty container copying everything by default.
    pub fn new() -> Self {
        Self {
            field: FieldData::new(),
            attribute_indices: [None; AttributeType::COUNT],
            copy_flags: CopyFlags::new(),
            copy_plan: None,
            list_plan: None,
        }
    }

    /// Returns the underlying field data.
    pub fn field(&self) -> &FieldData {
        &self.field
    }

    /// Releases all arrays, role mappings and copy flags.
    pub fn initialize(&mut self) {
        self.field.initialize();
        self.attribute_indices = [None; AttributeType::COUNT];
        self.copy_flags = CopyFlags::new();
        self.forget_plans();
    }

    /// Adds the given array, replacing any array with the same name.
    ///
    /// If the replaced array had roles that the new array can not have,
    /// those roles are unset.
    pub fn add_array(&mut self, array: Option<SharedArray>) -> Option<usize> {
        let array = array?;
        if let Some(index) = array.name().and_then(|name| self.field.array_index(&name)) {
            self.unset_rejected_roles(index, &array);
        }
        self.field.add_array(Some(array))
    }

    /// Puts the given array in the slot with the given index, unsetting
    /// roles of the slot that the new array can not have.
    pub fn set_array(&mut self, index: usize, array: SharedArray) {
        if index < self.field.number_of_arrays() {
            self.unset_rejected_roles(index, &array);
        }
        self.field.set_array(index, array);
    }

    fn unset_rejected_roles(&mut self, index: usize, array: &SharedArray) {
        let array = array.read();
        for role in AttributeType::ALL {
            if self.attribute_indices[role.index()] == Some(index) && !role.accepts(&array) {
                self.attribute_indices[role.index()] = None;
            }
        }
    }

    /// Removes the array with the given index.
    ///
    /// A role mapped to the array becomes unset, and roles mapped to later
    /// arrays follow them down.
    pub fn remove_array(&mut self, index: usize) -> Option<SharedArray> {
        let removed = self.field.remove_array(index)?;
        for attribute_index in self.attribute_indices.iter_mut() {
            *attribute_index = match *attribute_index {
                Some(mapped) if mapped == index => None,
                Some(mapped) if mapped > index => Some(mapped - 1),
                other => other,
            };
        }
        self.forget_plans();
        Some(removed)
    }

    /// Removes the first array with the given name, if any.
    pub fn remove_array_by_name(&mut self, name: &str) -> Option<SharedArray> {
        let index = self.field.array_index(name)?;
        self.remove_array(index)
    }

    /// Gives the given array the given role.
    ///
    /// Without an array the role is unset, leaving the previously mapped
    /// array in the container. An array that can not have the role is
    /// rejected without changing anything. Otherwise the array is added
    /// like with `add_array` and mapped to the role.
    ///
    /// # Returns
    ///
    /// The index of the array, or `None` if the role was unset or the array rejected.
    pub fn set_attribute(
        &mut self,
        array: Option<SharedArray>,
        role: AttributeType,
    ) -> Option<usize> {
        let array = match array {
            Some(array) => array,
            None => {
                self.attribute_indices[role.index()] = None;
                self.field.modified();
                return None;
            }
        };
        if !role.accepts(&array.read()) {
            return None;
        }
        self.attribute_indices[role.index()] = None;
        let index = self.add_array(Some(array))?;
        self.attribute_indices[role.index()] = Some(index);
        self.field.modified();
        Some(index)
    }

    /// Gives the array with the given index the given role, if the array
    /// exists and can have the role.
    pub fn set_active_attribute(&mut self, index: usize, role: AttributeType) -> Option<usize> {
        let accepted = self
            .field
            .arrays()
            .get(index)
            .map_or(false, |array| role.accepts(&array.read()));
        if !accepted {
            return None;
        }
        self.attribute_indices[role.index()] = Some(index);
        self.field.modified();
        Some(index)
    }

    /// Gives the first array with the given name the given role, if the
    /// array exists and can have the role.
    pub fn set_active_attribute_by_name(
        &mut self,
        name: &str,
        role: AttributeType,
    ) -> Option<usize> {
        let index = self.field.array_index(name)?;
        self.set_active_attribute(index, role)
    }

    /// Returns the array with the given role.
    pub fn attribute(&self, role: AttributeType) -> Option<SharedArray> {
        self.attribute_index(role)
            .and_then(|index| self.field.array(index))
    }

    /// Returns the index of the array with the given role.
    pub fn attribute_index(&self, role: AttributeType) -> Option<usize> {
        self.attribute_indices[role.index()]
    }

    /// Returns the first role of the array with the given index, if it has one.
    pub fn is_array_an_attribute(&self, index: usize) -> Option<AttributeType> {
        AttributeType::ALL
            .iter()
            .copied()
            .find(|role| self.attribute_indices[role.index()] == Some(index))
    }

    /// Sets the flag of the given role for the given operation.
    pub fn set_copy_attribute(
        &mut self,
        role: AttributeType,
        flag: CopyFlag,
        operation: CopyOperation,
    ) {
        self.copy_flags.set(role, flag, operation);
        self.field.modified();
    }

    /// Sets the flag of the given role for all operations.
    pub fn set_copy_attribute_all(&mut self, role: AttributeType, flag: CopyFlag) {
        for operation in CopyOperation::ALL {
            self.set_copy_attribute(role, flag, operation);
        }
    }

    /// Returns the flag of the given role for the given operation.
    pub fn copy_attribute(&self, role: AttributeType, operation: CopyOperation) -> CopyFlag {
        self.copy_flags.get(role, operation)
    }

    /// Copies every array by default and turns on every role flag.
    pub fn copy_all_on(&mut self) {
        self.field.copy_all_on();
        self.copy_flags.set_all_on();
    }

    /// Skips every array by default and turns off every role flag.
    pub fn copy_all_off(&mut self) {
        self.field.copy_all_off();
        self.copy_flags.set_all_off();
    }

    /// Requests that the array with the given name is copied.
    pub fn copy_field_on(&mut self, name: &str) {
        self.field.copy_field_on(name);
    }

    /// Requests that the array with the given name is not copied.
    pub fn copy_field_off(&mut self, name: &str) {
        self.field.copy_field_off(name);
    }

    /// Removes all name-level copy flags.
    pub fn clear_field_flags(&mut self) {
        self.field.clear_field_flags();
    }

    /// Sets the mask of ghost bits whose tuples are excluded from ranges.
    pub fn set_ghosts_to_skip(&mut self, ghosts_to_skip: u8) {
        self.field.set_ghosts_to_skip(ghosts_to_skip);
    }

    /// Sets the number of tuples of every array.
    pub fn set_number_of_tuples(&mut self, num_tuples: usize) {
        self.field.set_number_of_tuples(num_tuples);
    }

    /// Removes all tuples from every array.
    pub fn reset(&mut self) {
        self.field.reset();
    }

    /// Releases unused storage.
    pub fn squeeze(&mut self) {
        self.field.squeeze();
    }

    /// Fills the given tuple of every array with zeros (or empty text).
    pub fn null_data(&mut self, tuple: usize) {
        self.field.null_data(tuple);
    }

    /// Replaces the arrays with empty arrays structured like those of
    /// `other`, with the same roles.
    pub fn copy_structure(&mut self, other: &DataSetAttributes) {
        self.field.copy_structure(&other.field);
        self.attribute_indices = other.attribute_indices;
        self.forget_plans();
    }

    /// Makes the container share the arrays, roles and copy flags of `other`.
    pub fn shallow_copy(&mut self, other: &DataSetAttributes) {
        self.field.shallow_copy(&other.field);
        self.attribute_indices = other.attribute_indices;
        self.copy_flags = other.copy_flags.clone();
        self.forget_plans();
    }

    /// Makes the container hold independent copies of the arrays of
    /// `other`, with the same roles and copy flags.
    pub fn deep_copy(&mut self, other: &DataSetAttributes) {
        self.field.deep_copy(&other.field);
        self.attribute_indices = other.attribute_indices;
        self.copy_flags = other.copy_flags.clone();
        self.forget_plans();
    }

    /// Decides how an array with the given name and role takes part in the given operation.
    pub fn copy_decision(
        &self,
        name: Option<&str>,
        role: Option<AttributeType>,
        operation: CopyOperation,
    ) -> CopyFlag {
        resolve(&CopyContext {
            role_flag: role.map(|role| self.copy_flags.get(role, operation)),
            name_flag: name.and_then(|name| self.field.field_flag(name)),
            copy_all: self.field.is_copy_all_on(),
        })
    }

    fn source_decision(
        &self,
        source: &DataSetAttributes,
        source_index: usize,
        operation: CopyOperation,
    ) -> CopyFlag {
        let name = source.field.array_name(source_index);
        self.copy_decision(
            name.as_deref(),
            source.is_array_an_attribute(source_index),
            operation,
        )
    }

    /// Shares the arrays of `source` whose pass flag is on, along with their roles.
    pub fn pass_data(&mut self, source: &DataSetAttributes) {
        for (source_index, array) in source.field.arrays().iter().enumerate() {
            if !self
                .source_decision(source, source_index, CopyOperation::PassData)
                .is_on()
            {
                continue;
            }
            if let Some(index) = self.add_array(Some(array.clone())) {
                if let Some(role) = source.is_array_an_attribute(source_index) {
                    self.set_active_attribute(index, role);
                }
            }
        }
    }

    /// Prepares the container for receiving tuples of `source` through
    /// `copy_data` and its variants.
    ///
    /// # Parameters
    ///
    /// - `source`: Container that tuples will be copied from.
    /// - `size_hint`: Number of tuples to reserve room for, or 0 to use the tuple count of each source array.
    /// - `reuse_input_arrays`: Whether to share the source arrays instead of creating new ones.
    pub fn copy_allocate(
        &mut self,
        source: &DataSetAttributes,
        size_hint: usize,
        reuse_input_arrays: bool,
    ) {
        self.allocate_for(source, CopyOperation::CopyTuple, size_hint, reuse_input_arrays);
    }

    /// Prepares the container for receiving interpolated tuples of `source`
    /// through `interpolate_point` and `interpolate_edge`.
    ///
    /// # Parameters
    ///
    /// - `source`: Container that tuples will be interpolated from.
    /// - `size_hint`: Number of tuples to reserve room for, or 0 to use the tuple count of each source array.
    /// - `reuse_input_arrays`: Whether to share the source arrays instead of creating new ones.
    pub fn interpolate_allocate(
        &mut self,
        source: &DataSetAttributes,
        size_hint: usize,
        reuse_input_arrays: bool,
    ) {
        self.allocate_for(source, CopyOperation::Interpolate, size_hint, reuse_input_arrays);
    }

    fn allocate_for(
        &mut self,
        source: &DataSetAttributes,
        operation: CopyOperation,
        size_hint: usize,
        reuse_input_arrays: bool,
    ) {
        let mut correspondences = Vec::with_capacity(source.field.number_of_arrays());
        for (source_index, array) in source.field.arrays().iter().enumerate() {
            if !self.source_decision(source, source_index, operation).is_on() {
                continue;
            }
            let target = if reuse_input_arrays {
                array.clone()
            } else {
                let array = array.read();
                let capacity = if size_hint > 0 {
                    size_hint
                } else {
                    array.num_tuples()
                };
                SharedArray::new(empty_array_like(&array, capacity))
            };
            if let Some(target_index) = self.add_array(Some(target)) {
                if let Some(role) = source.is_array_an_attribute(source_index) {
                    self.set_active_attribute(target_index, role);
                }
                correspondences.push((source_index, target_index));
            }
        }
        self.copy_plan = Some(CopyPlan { correspondences });
    }

    fn copy_plan(&self) -> &CopyPlan {
        expect_precondition!(
            self.copy_plan.as_ref(),
            "Tuples can not be copied or interpolated before copy_allocate or interpolate_allocate"
        )
    }

    /// Copies tuple `from_id` of every allocated array of `source` into tuple `to_id`.
    pub fn copy_data(&mut self, source: &DataSetAttributes, from_id: usize, to_id: usize) {
        for &(source_index, target_index) in self.copy_plan().correspondences.iter() {
            Self::copy_tuple(
                &source.field.arrays()[source_index],
                &self.field.arrays()[target_index],
                from_id,
                to_id,
            );
        }
    }

    /// Copies `n` consecutive tuples of `source`, starting from `source_start`,
    /// to consecutive tuples starting from `target_start`.
    pub fn copy_data_range(
        &mut self,
        source: &DataSetAttributes,
        target_start: usize,
        n: usize,
        source_start: usize,
    ) {
        for offset in 0..n {
            self.copy_data(source, source_start + offset, target_start + offset);
        }
    }

    /// Copies the tuples of `source` with the given ids into the tuples with
    /// the corresponding target ids.
    pub fn copy_data_ids(
        &mut self,
        source: &DataSetAttributes,
        from_ids: &[usize],
        to_ids: &[usize],
    ) {
        assert_eq!(
            from_ids.len(),
            to_ids.len(),
            "Number of source ids ({}) differs from number of target ids ({})",
            from_ids.len(),
            to_ids.len()
        );
        for (&from_id, &to_id) in from_ids.iter().zip(to_ids.iter()) {
            self.copy_data(source, from_id, to_id);
        }
    }

    /// Copies tuple `from_id` of one array into tuple `to_id` of another.
    ///
    /// The arrays may be the same array.
    pub fn copy_tuple(
        from_array: &SharedArray,
        to_array: &SharedArray,
        from_id: usize,
        to_id: usize,
    ) {
        let values = from_array.read().extract_tuple(from_id);
        to_array.write().insert_tuple_from(to_id, &values, 0);
    }

    /// Returns the interpolation flag currently in effect for the array
    /// with the given index.
    fn interpolation_flag(&self, index: usize) -> CopyFlag {
        self.is_array_an_attribute(index)
            .map_or(CopyFlag::On, |role| {
                self.copy_flags.get(role, CopyOperation::Interpolate)
            })
    }

    /// Interpolates tuple `to_id` of every allocated array from the tuples
    /// of `source` with the given ids and weights.
    ///
    /// Arrays whose role has interpolation turned off are left untouched.
    /// Arrays with a nearest flag get the tuple with the largest weight,
    /// the earliest one among equal weights.
    pub fn interpolate_point(
        &mut self,
        source: &DataSetAttributes,
        to_id: usize,
        ids: &[usize],
        weights: &[f64],
    ) {
        for &(source_index, target_index) in self.copy_plan().correspondences.iter() {
            interpolate_tuple(
                &source.field.arrays()[source_index],
                &self.field.arrays()[target_index],
                self.interpolation_flag(target_index),
                to_id,
                ids,
                weights,
            );
        }
    }

    /// Interpolates tuple `to_id` of every allocated array between tuples
    /// `id0` and `id1` of `source`, where `t = 0` gives tuple `id0`.
    pub fn interpolate_edge(
        &mut self,
        source: &DataSetAttributes,
        to_id: usize,
        id0: usize,
        id1: usize,
        t: f64,
    ) {
        for &(source_index, target_index) in self.copy_plan().correspondences.iter() {
            let from_array = &source.field.arrays()[source_index];
            let to_array = &self.field.arrays()[target_index];
            match self.interpolation_flag(target_index) {
                CopyFlag::Off => {}
                CopyFlag::Nearest => {
                    Self::copy_tuple(from_array, to_array, if t < 0.5 { id0 } else { id1 }, to_id)
                }
                CopyFlag::On => {
                    let first = from_array.read().tuple_values(id0);
                    let second = from_array.read().tuple_values(id1);
                    to_array.write().store_tuple(to_id, first.blended(second, t));
                }
            }
        }
    }

    /// Interpolates tuple `id` of every role array between the same tuple
    /// of the role arrays of two containers, where `t = 0` gives `from1`.
    pub fn interpolate_time(
        &mut self,
        from1: &DataSetAttributes,
        from2: &DataSetAttributes,
        id: usize,
        t: f64,
    ) {
        for role in AttributeType::ALL {
            let flag = self.copy_flags.get(role, CopyOperation::Interpolate);
            if !flag.is_on() {
                continue;
            }
            if let (Some(first_array), Some(second_array), Some(to_array)) = (
                from1.attribute(role),
                from2.attribute(role),
                self.attribute(role),
            ) {
                if !blendable(&first_array, &second_array, &to_array) {
                    warn_and_continue!(
                        "Can not interpolate {} in time between arrays of kinds {:?} and {:?} \
                         into array of kind {:?}, skipping",
                        role,
                        first_array.kind(),
                        second_array.kind(),
                        to_array.kind()
                    );
                    continue;
                }
                let values = if flag == CopyFlag::Nearest {
                    if t < 0.5 {
                        first_array.read().tuple_values(id)
                    } else {
                        second_array.read().tuple_values(id)
                    }
                } else {
                    let first = first_array.read().tuple_values(id);
                    let second = second_array.read().tuple_values(id);
                    first.blended(second, t)
                };
                to_array.write().store_tuple(id, values);
            }
        }
    }

    /// Prepares the container for receiving tuples from the inputs of the
    /// given field list through `copy_data_from_list`.
    pub fn copy_allocate_from_list(&mut self, list: &FieldList, size_hint: usize) {
        self.allocate_for_list(list, CopyOperation::CopyTuple, size_hint);
    }

    /// Prepares the container for receiving interpolated tuples from the
    /// inputs of the given field list through `interpolate_point_from_list`.
    pub fn interpolate_allocate_from_list(&mut self, list: &FieldList, size_hint: usize) {
        self.allocate_for_list(list, CopyOperation::Interpolate, size_hint);
    }

    fn allocate_for_list(&mut self, list: &FieldList, operation: CopyOperation, size_hint: usize) {
        let mut targets = Vec::with_capacity(list.number_of_columns());
        for column in list.columns() {
            if !self
                .copy_decision(column.name(), column.role(), operation)
                .is_on()
            {
                targets.push(None);
                continue;
            }
            let target_index =
                self.add_array(Some(SharedArray::new(column.instantiate(size_hint))));
            if let (Some(index), Some(role)) = (target_index, column.role()) {
                self.set_active_attribute(index, role);
            }
            targets.push(target_index);
        }
        self.list_plan = Some(ListPlan { targets });
    }

    fn list_plan(&self, list: &FieldList) -> &ListPlan {
        let plan = expect_precondition!(
            self.list_plan.as_ref(),
            "Tuples can not be copied from a field list before allocating from it"
        );
        assert_eq!(
            plan.targets.len(),
            list.number_of_columns(),
            "Field list has {} columns but {} were allocated",
            list.number_of_columns(),
            plan.targets.len()
        );
        plan
    }

    /// Copies tuple `from_id` of the given input of the field list into
    /// tuple `to_id`. Columns missing from the input get a null tuple.
    pub fn copy_data_from_list(
        &mut self,
        list: &FieldList,
        input: usize,
        source: &DataSetAttributes,
        from_id: usize,
        to_id: usize,
    ) {
        for (column, target) in self.list_plan(list).targets.iter().enumerate() {
            if let Some(target_index) = *target {
                let to_array = &self.field.arrays()[target_index];
                match list.local_index(input, column) {
                    Some(local_index) => Self::copy_tuple(
                        &source.field.arrays()[local_index],
                        to_array,
                        from_id,
                        to_id,
                    ),
                    None => to_array.write().fill_tuple_null(to_id),
                }
            }
        }
    }

    /// Copies `n` consecutive tuples of the given input of the field list,
    /// starting from `source_start`, to consecutive tuples starting from `target_start`.
    pub fn copy_data_range_from_list(
        &mut self,
        list: &FieldList,
        input: usize,
        source: &DataSetAttributes,
        target_start: usize,
        n: usize,
        source_start: usize,
    ) {
        for offset in 0..n {
            self.copy_data_from_list(
                list,
                input,
                source,
                source_start + offset,
                target_start + offset,
            );
        }
    }

    /// Interpolates tuple `to_id` from tuples of the given input of the
    /// field list. Columns missing from the input get a null tuple.
    pub fn interpolate_point_from_list(
        &mut self,
        list: &FieldList,
        input: usize,
        source: &DataSetAttributes,
        to_id: usize,
        ids: &[usize],
        weights: &[f64],
    ) {
        for (column, target) in self.list_plan(list).targets.iter().enumerate() {
            if let Some(target_index) = *target {
                let to_array = &self.field.arrays()[target_index];
                match list.local_index(input, column) {
                    Some(local_index) => interpolate_tuple(
                        &source.field.arrays()[local_index],
                        to_array,
                        self.interpolation_flag(target_index),
                        to_id,
                        ids,
                        weights,
                    ),
                    None => to_array.write().fill_tuple_null(to_id),
                }
            }
        }
    }

    fn forget_plans(&mut self) {
        self.copy_plan = None;
        self.list_plan = None;
    }
}

fn empty_array_like(array: &DataArray, capacity: usize) -> DataArray {
    let mut empty = array.new_instance();
    if let Some(name) = array.name() {
        empty.set_name(name);
    }
    empty.copy_component_names(array);
    empty.copy_metadata(array);
    empty.resize(capacity);
    empty
}

/// Whether tuples of the first two arrays can be blended and stored in the
/// third: the sources share a kind, all three share the number of components,
/// and text is only stored in text.
fn blendable(first: &SharedArray, second: &SharedArray, target: &SharedArray) -> bool {
    let kind = first.kind();
    let num_components = first.num_components();
    kind == second.kind()
        && (kind == ScalarKind::Text) == (target.kind() == ScalarKind::Text)
        && num_components == second.num_components()
        && num_components == target.num_components()
}

fn interpolate_tuple(
    from_array: &SharedArray,
    to_array: &SharedArray,
    flag: CopyFlag,
    to_id: usize,
    ids: &[usize],
    weights: &[f64],
) {
    match flag {
        CopyFlag::Off => {}
        CopyFlag::Nearest => match position_of_largest_weight(weights) {
            Some(position) => {
                DataSetAttributes::copy_tuple(from_array, to_array, ids[position], to_id)
            }
            None => to_array.write().fill_tuple_null(to_id),
        },
        CopyFlag::On => match (ids, weights) {
            ([from_id], [weight]) if *weight == 1.0 => {
                DataSetAttributes::copy_tuple(from_array, to_array, *from_id, to_id)
            }
            _ => {
                let values = from_array.read().interpolated_tuple(ids, weights);
                to_array.write().store_tuple(to_id, values);
            }
        },
    }
}

impl Default for DataSetAttributes {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for DataSetAttributes {
    type Target = FieldData;

    fn deref(&self) -> &Self::Target {
        &self.field
    }
}

macro_rules! impl_role_accessors {
    ($($role:ident => $name:ident),*) => {
        paste! {
            impl DataSetAttributes {
                $(
                    #[doc = concat!("Returns the array with the `", stringify!($role), "` role.")]
                    pub fn $name(&self) -> Option<SharedArray> {
                        self.attribute(AttributeType::$role)
                    }

                    #[doc = concat!("Gives the given array the `", stringify!($role), "` role.")]
                    pub fn [<set_ $name>](&mut self, array: Option<SharedArray>) -> Option<usize> {
                        self.set_attribute(array, AttributeType::$role)
                    }

                    #[doc = concat!("Gives the array with the given name the `", stringify!($role), "` role.")]
                    pub fn [<set_active_ $name>](&mut self, name: &str) -> Option<usize> {
                        self.set_active_attribute_by_name(name, AttributeType::$role)
                    }

                    #[doc = concat!("Sets the copy flag of the `", stringify!($role), "` role for the given operation.")]
                    pub fn [<set_copy_ $name>](&mut self, flag: CopyFlag, operation: CopyOperation) {
                        self.set_copy_attribute(AttributeType::$role, flag, operation)
                    }
                )*
            }
        }
    };
}

impl_role_accessors!(
    Scalars => scalars,
    Vectors => vectors,
    Normals => normals,
    TCoords => tcoords,
    Tensors => tensors,
    GlobalIds => global_ids,
    PedigreeIds => pedigree_ids,
    EdgeFlag => edge_flag,
    Tangents => tangents,
    RationalWeights => rational_weights,
    HigherOrderDegrees => higher_order_degrees,
    ProcessIds => process_ids
);
