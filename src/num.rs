//! Utilities related to numbers.

use crate::array::Element;
use num;
use std::fmt;

/// Numeric element type that can be stored in a data array.
///
/// All arithmetic on array values is carried out in `f64`, so the trait
/// mainly governs how values are converted to and from that representation.
pub trait Scalar:
    Element + Copy + PartialOrd + num::NumCast + num::ToPrimitive + num::Bounded + fmt::Debug
{
    /// Whether the type is a floating point type.
    const IS_FLOATING_POINT: bool;

    /// Converts the value to `f64`.
    fn as_f64(self) -> f64 {
        num::ToPrimitive::to_f64(&self).unwrap_or(f64::NAN)
    }

    /// Converts the given `f64` to this type, truncating towards zero and
    /// saturating at the bounds of the type. NaN becomes zero for integer types.
    fn from_f64(value: f64) -> Self {
        num::cast(value).unwrap_or_else(|| Self::saturated(value))
    }

    /// Like `from_f64`, but integer types receive the rounded value.
    fn from_f64_rounded(value: f64) -> Self {
        if Self::IS_FLOATING_POINT {
            Self::from_f64(value)
        } else {
            Self::from_f64(value.round())
        }
    }

    /// Converts a value of another scalar type to this type, exactly when the
    /// value is representable.
    fn cast_from<S: Scalar>(value: S) -> Self {
        num::cast(value).unwrap_or_else(|| Self::from_f64(value.as_f64()))
    }

    /// Whether the value is neither infinite nor NaN.
    fn is_finite_value(self) -> bool {
        !Self::IS_FLOATING_POINT || self.as_f64().is_finite()
    }

    /// Returns the bound of the type closest to the given out-of-range value.
    fn saturated(value: f64) -> Self {
        if value.is_nan() {
            Self::default()
        } else if value > 0.0 {
            Self::max_value()
        } else {
            Self::min_value()
        }
    }
}

macro_rules! impl_scalar {
    ($T:ty, $is_floating_point:expr) => {
        impl Scalar for $T {
            const IS_FLOATING_POINT: bool = $is_floating_point;
        }
    };
}

impl_scalar!(i8, false);
impl_scalar!(u8, false);
impl_scalar!(i16, false);
impl_scalar!(u16, false);
impl_scalar!(i32, false);
impl_scalar!(u32, false);
impl_scalar!(i64, false);
impl_scalar!(u64, false);
impl_scalar!(f32, true);
impl_scalar!(f64, true);

/// Evaluates the given expression with `$T` bound to the Rust type
/// corresponding to a numeric `ScalarKind`, or the fallback for `Text`.
#[macro_export]
macro_rules! with_scalar_type {
    ($kind:expr, $T:ident => $body:expr, $text:expr) => {
        match $kind {
            $crate::array::ScalarKind::I8 => {
                type $T = i8;
                $body
            }
            $crate::array::ScalarKind::U8 => {
                type $T = u8;
                $body
            }
            $crate::array::ScalarKind::I16 => {
                type $T = i16;
                $body
            }
            $crate::array::ScalarKind::U16 => {
                type $T = u16;
                $body
            }
            $crate::array::ScalarKind::I32 => {
                type $T = i32;
                $body
            }
            $crate::array::ScalarKind::U32 => {
                type $T = u32;
                $body
            }
            $crate::array::ScalarKind::I64 => {
                type $T = i64;
                $body
            }
            $crate::array::ScalarKind::U64 => {
                type $T = u64;
                $body
            }
            $crate::array::ScalarKind::F32 => {
                type $T = f32;
                $body
            }
            $crate::array::ScalarKind::F64 => {
                type $T = f64;
                $body
            }
            $crate::array::ScalarKind::Text => $text,
        }
    };
}

/// Integer type usable for tuple ids passed to the interpolation engine.
///
/// Three widths are supported so that callers can pick the narrowest one
/// that fits their data set.
pub trait TupleIndex: Copy + Send + Sync + fmt::Debug + 'static {
    /// Returns the id as a `usize`.
    fn idx(self) -> usize;

    /// Wraps a slice of ids in the width-tagged `TupleIds`.
    fn tuple_ids(ids: &[Self]) -> TupleIds<'_>;
}

/// Slice of tuple ids of one of the supported widths.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TupleIds<'a> {
    Narrow(&'a [u16]),
    Medium(&'a [u32]),
    Wide(&'a [usize]),
}

impl<'a> TupleIds<'a> {
    /// Returns the number of ids.
    pub fn len(&self) -> usize {
        match self {
            Self::Narrow(ids) => ids.len(),
            Self::Medium(ids) => ids.len(),
            Self::Wide(ids) => ids.len(),
        }
    }

    /// Whether there are no ids.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the id at the given position as a `usize`.
    pub fn get(&self, position: usize) -> Option<usize> {
        match self {
            Self::Narrow(ids) => ids.get(position).map(|&id| id.idx()),
            Self::Medium(ids) => ids.get(position).map(|&id| id.idx()),
            Self::Wide(ids) => ids.get(position).copied(),
        }
    }

    /// Iterates over the ids as `usize`.
    pub fn iter(&self) -> impl Iterator<Item = usize> + 'a {
        let ids = *self;
        (0..ids.len()).filter_map(move |position| ids.get(position))
    }
}

/// Evaluates the given expression with `$ids` bound to the typed slice
/// inside a `TupleIds`, so that the expression is monomorphized per width.
#[macro_export]
macro_rules! with_tuple_ids {
    ($tuple_ids:expr, $ids:ident => $body:expr) => {
        match $tuple_ids {
            $crate::num::TupleIds::Narrow($ids) => $body,
            $crate::num::TupleIds::Medium($ids) => $body,
            $crate::num::TupleIds::Wide($ids) => $body,
        }
    };
}

impl TupleIndex for u16 {
    fn idx(self) -> usize {
        self as usize
    }
    fn tuple_ids(ids: &[Self]) -> TupleIds<'_> {
        TupleIds::Narrow(ids)
    }
}

impl TupleIndex for u32 {
    fn idx(self) -> usize {
        self as usize
    }
    fn tuple_ids(ids: &[Self]) -> TupleIds<'_> {
        TupleIds::Medium(ids)
    }
}

impl TupleIndex for usize {
    fn idx(self) -> usize {
        self
    }
    fn tuple_ids(ids: &[Self]) -> TupleIds<'_> {
        TupleIds::Wide(ids)
    }
}

/// Returns the position of the largest weight, preferring the earliest
/// position among equal weights.
pub fn position_of_largest_weight(weights: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (position, &weight) in weights.iter().enumerate() {
        match best {
            Some((_, best_weight)) if weight <= best_weight => {}
            _ if weight.is_nan() => {}
            _ => best = Some((position, weight)),
        }
    }
    best.map(|(position, _)| position)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn conversion_from_f64_truncates_and_saturates() {
        assert_eq!(i32::from_f64(2.7), 2);
        assert_eq!(i32::from_f64(-2.7), -2);
        assert_eq!(u8::from_f64(300.0), u8::MAX);
        assert_eq!(u8::from_f64(-4.0), 0);
        assert_eq!(i16::from_f64(f64::NAN), 0);
        assert_eq!(f32::from_f64(0.5), 0.5_f32);
    }

    #[test]
    fn rounded_conversion_rounds_integers_only() {
        assert_eq!(i32::from_f64_rounded(2.5), 3);
        assert_eq!(i32::from_f64_rounded(-2.5), -3);
        assert_eq!(u16::from_f64_rounded(7.49), 7);
        assert_eq!(f64::from_f64_rounded(2.5), 2.5);
    }

    #[test]
    fn casting_between_scalars_is_exact_when_representable() {
        let large = 9_007_199_254_740_993_i64;
        assert_eq!(i64::cast_from(large), large);
        assert_eq!(u64::cast_from(large), large as u64);
        assert_eq!(u8::cast_from(-1_i32), 0);
        assert_eq!(f64::cast_from(3_u16), 3.0);
    }

    #[test]
    fn tuple_ids_of_all_widths_iterate_identically() {
        let narrow: [u16; 3] = [4, 0, 7];
        let medium: [u32; 3] = [4, 0, 7];
        let wide: [usize; 3] = [4, 0, 7];
        let expected = vec![4, 0, 7];
        assert_eq!(u16::tuple_ids(&narrow).iter().collect::<Vec<_>>(), expected);
        assert_eq!(u32::tuple_ids(&medium).iter().collect::<Vec<_>>(), expected);
        assert_eq!(usize::tuple_ids(&wide).iter().collect::<Vec<_>>(), expected);
        assert_eq!(u32::tuple_ids(&medium).len(), 3);
    }

    #[test]
    fn largest_weight_prefers_earliest_position() {
        assert_eq!(position_of_largest_weight(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(position_of_largest_weight(&[0.5, 0.5]), Some(0));
        assert_eq!(position_of_largest_weight(&[f64::NAN, 0.1]), Some(1));
        assert_eq!(position_of_largest_weight(&[]), None);
    }
}
