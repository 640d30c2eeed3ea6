//! The `fieldstaff` crate provides typed attribute arrays, containers
//! assigning roles to them, and a thread-safe engine for copying and
//! interpolating tuples between them.
pub mod error;
pub mod num;
pub mod verbosity;
pub mod array;
pub mod field;
pub mod attributes;
pub mod interpolation;
