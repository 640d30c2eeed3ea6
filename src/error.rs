//! Error types and reporting macros.

use crate::array::ScalarKind;
use std::{error, fmt};

/// Prints a warning about a malformed but harmless request and carries on.
#[macro_export]
macro_rules! warn_and_continue {
    ($($print_arg:tt)*) => {{
        eprintln!("Warning: {}", format_args!($($print_arg)*));
    }};
}

/// Evaluates to the contained value, or panics with the given message
/// if a precondition of the caller was violated.
#[macro_export]
macro_rules! expect_precondition {
    ($option:expr, $($print_arg:tt)*) => {
        $option.unwrap_or_else(|| panic!("Precondition violated: {}", format_args!($($print_arg)*)))
    };
}

/// Reasons why two arrays can not be paired for copying or interpolation.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeError {
    /// The input kind can neither be stored directly nor promoted into the output kind.
    KindMismatch {
        input: ScalarKind,
        output: ScalarKind,
    },
    /// The arrays have different numbers of components.
    ComponentMismatch { input: usize, output: usize },
    /// The input array has been explicitly excluded.
    Excluded(String),
}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KindMismatch { input, output } => write!(
                f,
                "Can not pair {} input array with {} output array",
                input, output
            ),
            Self::ComponentMismatch { input, output } => write!(
                f,
                "Input array has {} components but output array has {}",
                input, output
            ),
            Self::Excluded(name) => write!(f, "Array {} is excluded", name),
        }
    }
}

impl error::Error for AttributeError {}
