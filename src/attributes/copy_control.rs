//! Flags deciding which arrays are copied, interpolated or passed between
//! attribute containers.

use super::AttributeType;
use crate::warn_and_continue;

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Operation that copy flags apply to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum CopyOperation {
    CopyTuple,
    Interpolate,
    PassData,
}

impl CopyOperation {
    pub const ALL: [Self; 3] = [Self::CopyTuple, Self::Interpolate, Self::PassData];

    fn index(self) -> usize {
        self as usize
    }
}

/// How an array takes part in an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub enum CopyFlag {
    /// The array is skipped.
    Off,
    /// The array is copied, or interpolated with the given weights.
    On,
    /// The array is interpolated by copying the tuple with the largest weight.
    Nearest,
}

impl CopyFlag {
    /// Whether the array takes part in the operation at all.
    pub fn is_on(self) -> bool {
        self != Self::Off
    }

    /// Converts a boolean to `On` or `Off`.
    pub fn from_bool(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

/// Copy flags of every role for every operation.
#[derive(Clone, Debug, PartialEq)]
pub struct CopyFlags {
    flags: [[CopyFlag; 3]; AttributeType::COUNT],
}

impl CopyFlags {
    /// Creates flags with everything on, except the flags of the id roles
    /// for operations that would make their values meaningless.
    pub fn new() -> Self {
        let mut flags = Self {
            flags: [[CopyFlag::On; 3]; AttributeType::COUNT],
        };
        flags.reset_id_flags();
        flags
    }

    /// Returns the flag of the given role for the given operation.
    pub fn get(&self, role: AttributeType, operation: CopyOperation) -> CopyFlag {
        self.flags[role.index()][operation.index()]
    }

    /// Sets the flag of the given role for the given operation.
    ///
    /// `Nearest` only applies to interpolation and is stored as `On` for other operations.
    pub fn set(&mut self, role: AttributeType, flag: CopyFlag, operation: CopyOperation) {
        let flag = if flag == CopyFlag::Nearest && operation != CopyOperation::Interpolate {
            warn_and_continue!(
                "Nearest copy flag of {} only applies to interpolation, using On for {:?}",
                role,
                operation
            );
            CopyFlag::On
        } else {
            flag
        };
        self.flags[role.index()][operation.index()] = flag;
    }

    /// Sets the flag of every role for every operation to on, including
    /// the id roles.
    pub fn set_all_on(&mut self) {
        self.flags = [[CopyFlag::On; 3]; AttributeType::COUNT];
    }

    /// Sets the flag of every role for every operation to off.
    pub fn set_all_off(&mut self) {
        self.flags = [[CopyFlag::Off; 3]; AttributeType::COUNT];
    }

    fn reset_id_flags(&mut self) {
        self.flags[AttributeType::GlobalIds.index()][CopyOperation::CopyTuple.index()] =
            CopyFlag::Off;
        self.flags[AttributeType::GlobalIds.index()][CopyOperation::Interpolate.index()] =
            CopyFlag::Off;
        self.flags[AttributeType::PedigreeIds.index()][CopyOperation::Interpolate.index()] =
            CopyFlag::Off;
        self.flags[AttributeType::ProcessIds.index()][CopyOperation::Interpolate.index()] =
            CopyFlag::Off;
    }
}

impl Default for CopyFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything known about an array when deciding whether to copy it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CopyContext {
    /// Flag of the role the array is mapped to, if any.
    pub role_flag: Option<CopyFlag>,
    /// Name-level flag of the array, if any.
    pub name_flag: Option<bool>,
    /// Whether arrays are copied by default.
    pub copy_all: bool,
}

type CopyRule = fn(&CopyContext) -> Option<CopyFlag>;

/// Rules in order of decreasing precedence. The first rule with an
/// opinion decides.
const COPY_RULES: [CopyRule; 3] = [role_rule, name_rule, global_rule];

fn role_rule(context: &CopyContext) -> Option<CopyFlag> {
    context.role_flag
}

fn name_rule(context: &CopyContext) -> Option<CopyFlag> {
    context.name_flag.map(CopyFlag::from_bool)
}

fn global_rule(context: &CopyContext) -> Option<CopyFlag> {
    Some(CopyFlag::from_bool(context.copy_all))
}

/// Decides how an array takes part in an operation.
pub fn resolve(context: &CopyContext) -> CopyFlag {
    COPY_RULES
        .iter()
        .find_map(|rule| rule(context))
        .unwrap_or(CopyFlag::Off)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn role_flag_takes_precedence() {
        let context = CopyContext {
            role_flag: Some(CopyFlag::Nearest),
            name_flag: Some(false),
            copy_all: false,
        };
        assert_eq!(resolve(&context), CopyFlag::Nearest);
        let context = CopyContext {
            role_flag: Some(CopyFlag::Off),
            name_flag: Some(true),
            copy_all: true,
        };
        assert_eq!(resolve(&context), CopyFlag::Off);
    }

    #[test]
    fn name_flag_overrides_global_default() {
        let context = CopyContext {
            role_flag: None,
            name_flag: Some(true),
            copy_all: false,
        };
        assert_eq!(resolve(&context), CopyFlag::On);
        let context = CopyContext {
            role_flag: None,
            name_flag: Some(false),
            copy_all: true,
        };
        assert_eq!(resolve(&context), CopyFlag::Off);
    }

    #[test]
    fn global_default_applies_last() {
        for copy_all in [true, false] {
            let context = CopyContext {
                role_flag: None,
                name_flag: None,
                copy_all,
            };
            assert_eq!(resolve(&context), CopyFlag::from_bool(copy_all));
        }
    }

    #[test]
    fn id_roles_are_not_interpolated_by_default() {
        let flags = CopyFlags::new();
        assert_eq!(
            flags.get(AttributeType::GlobalIds, CopyOperation::CopyTuple),
            CopyFlag::Off
        );
        assert_eq!(
            flags.get(AttributeType::GlobalIds, CopyOperation::PassData),
            CopyFlag::On
        );
        assert_eq!(
            flags.get(AttributeType::PedigreeIds, CopyOperation::Interpolate),
            CopyFlag::Off
        );
        assert_eq!(
            flags.get(AttributeType::PedigreeIds, CopyOperation::CopyTuple),
            CopyFlag::On
        );
        assert_eq!(
            flags.get(AttributeType::Scalars, CopyOperation::Interpolate),
            CopyFlag::On
        );
    }

    #[test]
    fn nearest_is_only_kept_for_interpolation() {
        let mut flags = CopyFlags::new();
        flags.set(AttributeType::Vectors, CopyFlag::Nearest, CopyOperation::CopyTuple);
        assert_eq!(
            flags.get(AttributeType::Vectors, CopyOperation::CopyTuple),
            CopyFlag::On
        );
        flags.set(AttributeType::Vectors, CopyFlag::Nearest, CopyOperation::Interpolate);
        assert_eq!(
            flags.get(AttributeType::Vectors, CopyOperation::Interpolate),
            CopyFlag::Nearest
        );
        flags.set_all_off();
        assert_eq!(
            flags.get(AttributeType::Vectors, CopyOperation::Interpolate),
            CopyFlag::Off
        );
    }
}
