use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, DurationMicrosecondType, DurationMillisecondType,
    DurationNanosecondType, DurationSecondType, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, Time32MillisecondType, Time32SecondType, Time64MicrosecondType,
    Time64NanosecondType, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow_array::{Array, ArrayRef, BooleanArray, PrimitiveArray, StringArray};
use arrow_schema::TimeUnit;
use tessera_error::{TesseraResult, tessera_bail, tessera_err};

use crate::LogicalType;

/// A logical scalar boxed out of (or destined for) the physical storage.
///
/// `Scalar::Null` is the NA sentinel: every physical null boxes to it on
/// read, and it writes back as a physical null. Temporal variants carry the
/// raw tick value; the unit and zone live on the owning array's
/// [`LogicalType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Utf8(String),
    Date(i64),
    Time(i64),
    Timestamp(i64),
    Duration(i64),
}

impl Scalar {
    /// True iff this is the NA sentinel.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for the NA sentinel and for float NaN, which the numeric host
    /// treats as missing.
    pub fn is_na(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// A hashable stand-in used by the generic (engine-free) kernels.
    pub(crate) fn key(&self) -> ScalarKey {
        match self {
            Self::Null => ScalarKey::Null,
            Self::Bool(v) => ScalarKey::Bool(*v),
            Self::Int(v) => ScalarKey::Int(*v),
            Self::UInt(v) => ScalarKey::UInt(*v),
            Self::Float(v) => ScalarKey::Bits(v.to_bits()),
            Self::Utf8(v) => ScalarKey::Str(v.clone()),
            Self::Date(v) => ScalarKey::Date(*v),
            Self::Time(v) => ScalarKey::Time(*v),
            Self::Timestamp(v) => ScalarKey::Timestamp(*v),
            Self::Duration(v) => ScalarKey::Duration(*v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ScalarKey {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Bits(u64),
    Str(String),
    Date(i64),
    Time(i64),
    Timestamp(i64),
    Duration(i64),
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Null)
    }
}

macro_rules! build_primitive {
    ($dtype:expr, $scalars:expr, $T:ty, $($V:ident),+) => {{
        let mut values = Vec::with_capacity($scalars.len());
        for scalar in $scalars {
            values.push(match scalar {
                Scalar::Null => None,
                $(Scalar::$V(v) => Some(num_traits::cast(*v).ok_or_else(
                    || tessera_err!(InvalidArgument: "value {v} out of range for {}", $dtype),
                )?),)+
                other => {
                    tessera_bail!(MismatchedTypes: $dtype, format!("{other:?}"))
                }
            });
        }
        let array = PrimitiveArray::<$T>::from_iter(values).with_data_type($dtype.to_arrow());
        Arc::new(array) as ArrayRef
    }};
}

/// Build one physical array from logical scalars, null-aware.
///
/// Every scalar must be NA or carry the variant matching `dtype`; signed
/// values coerce into unsigned/float storage when they fit.
pub(crate) fn array_from_scalars(
    dtype: &LogicalType,
    scalars: &[Scalar],
) -> TesseraResult<ArrayRef> {
    Ok(match dtype {
        LogicalType::Bool => {
            let mut values = Vec::with_capacity(scalars.len());
            for scalar in scalars {
                values.push(match scalar {
                    Scalar::Null => None,
                    Scalar::Bool(v) => Some(*v),
                    other => tessera_bail!(MismatchedTypes: dtype, format!("{other:?}")),
                });
            }
            Arc::new(BooleanArray::from(values)) as ArrayRef
        }
        LogicalType::Utf8 => {
            let mut values = Vec::with_capacity(scalars.len());
            for scalar in scalars {
                values.push(match scalar {
                    Scalar::Null => None,
                    Scalar::Utf8(v) => Some(v.clone()),
                    other => tessera_bail!(MismatchedTypes: dtype, format!("{other:?}")),
                });
            }
            Arc::new(StringArray::from_iter(values)) as ArrayRef
        }
        LogicalType::Int8 => build_primitive!(dtype, scalars, Int8Type, Int),
        LogicalType::Int16 => build_primitive!(dtype, scalars, Int16Type, Int),
        LogicalType::Int32 => build_primitive!(dtype, scalars, Int32Type, Int),
        LogicalType::Int64 => build_primitive!(dtype, scalars, Int64Type, Int, UInt),
        LogicalType::UInt8 => build_primitive!(dtype, scalars, UInt8Type, UInt, Int),
        LogicalType::UInt16 => build_primitive!(dtype, scalars, UInt16Type, UInt, Int),
        LogicalType::UInt32 => build_primitive!(dtype, scalars, UInt32Type, UInt, Int),
        LogicalType::UInt64 => build_primitive!(dtype, scalars, UInt64Type, UInt, Int),
        LogicalType::Float32 => build_primitive!(dtype, scalars, Float32Type, Float, Int),
        LogicalType::Float64 => build_primitive!(dtype, scalars, Float64Type, Float, Int),
        LogicalType::Date32 => build_primitive!(dtype, scalars, Date32Type, Date),
        LogicalType::Date64 => build_primitive!(dtype, scalars, Date64Type, Date),
        LogicalType::Time32(TimeUnit::Second) => {
            build_primitive!(dtype, scalars, Time32SecondType, Time)
        }
        LogicalType::Time32(_) => build_primitive!(dtype, scalars, Time32MillisecondType, Time),
        LogicalType::Time64(TimeUnit::Microsecond) => {
            build_primitive!(dtype, scalars, Time64MicrosecondType, Time)
        }
        LogicalType::Time64(_) => build_primitive!(dtype, scalars, Time64NanosecondType, Time),
        LogicalType::Timestamp(TimeUnit::Second, _) => {
            build_primitive!(dtype, scalars, TimestampSecondType, Timestamp)
        }
        LogicalType::Timestamp(TimeUnit::Millisecond, _) => {
            build_primitive!(dtype, scalars, TimestampMillisecondType, Timestamp)
        }
        LogicalType::Timestamp(TimeUnit::Microsecond, _) => {
            build_primitive!(dtype, scalars, TimestampMicrosecondType, Timestamp)
        }
        LogicalType::Timestamp(TimeUnit::Nanosecond, _) => {
            build_primitive!(dtype, scalars, TimestampNanosecondType, Timestamp)
        }
        LogicalType::Duration(TimeUnit::Second) => {
            build_primitive!(dtype, scalars, DurationSecondType, Duration)
        }
        LogicalType::Duration(TimeUnit::Millisecond) => {
            build_primitive!(dtype, scalars, DurationMillisecondType, Duration)
        }
        LogicalType::Duration(TimeUnit::Microsecond) => {
            build_primitive!(dtype, scalars, DurationMicrosecondType, Duration)
        }
        LogicalType::Duration(TimeUnit::Nanosecond) => {
            build_primitive!(dtype, scalars, DurationNanosecondType, Duration)
        }
    })
}

macro_rules! read_primitive {
    ($array:expr, $index:expr, $T:ty, $V:ident, $as:ty) => {
        Scalar::$V($array.as_primitive::<$T>().value($index) as $as)
    };
}

/// Box the value at `index` of a physical chunk, mapping nulls to the NA
/// sentinel. `index` must be in bounds for the chunk.
pub(crate) fn scalar_from_array(array: &dyn Array, index: usize, dtype: &LogicalType) -> Scalar {
    if array.is_null(index) {
        return Scalar::Null;
    }
    match dtype {
        LogicalType::Bool => Scalar::Bool(array.as_boolean().value(index)),
        LogicalType::Utf8 => Scalar::Utf8(array.as_string::<i32>().value(index).to_string()),
        LogicalType::Int8 => read_primitive!(array, index, Int8Type, Int, i64),
        LogicalType::Int16 => read_primitive!(array, index, Int16Type, Int, i64),
        LogicalType::Int32 => read_primitive!(array, index, Int32Type, Int, i64),
        LogicalType::Int64 => read_primitive!(array, index, Int64Type, Int, i64),
        LogicalType::UInt8 => read_primitive!(array, index, UInt8Type, UInt, u64),
        LogicalType::UInt16 => read_primitive!(array, index, UInt16Type, UInt, u64),
        LogicalType::UInt32 => read_primitive!(array, index, UInt32Type, UInt, u64),
        LogicalType::UInt64 => read_primitive!(array, index, UInt64Type, UInt, u64),
        LogicalType::Float32 => read_primitive!(array, index, Float32Type, Float, f64),
        LogicalType::Float64 => read_primitive!(array, index, Float64Type, Float, f64),
        LogicalType::Date32 => read_primitive!(array, index, Date32Type, Date, i64),
        LogicalType::Date64 => read_primitive!(array, index, Date64Type, Date, i64),
        LogicalType::Time32(TimeUnit::Second) => {
            read_primitive!(array, index, Time32SecondType, Time, i64)
        }
        LogicalType::Time32(_) => read_primitive!(array, index, Time32MillisecondType, Time, i64),
        LogicalType::Time64(TimeUnit::Microsecond) => {
            read_primitive!(array, index, Time64MicrosecondType, Time, i64)
        }
        LogicalType::Time64(_) => read_primitive!(array, index, Time64NanosecondType, Time, i64),
        LogicalType::Timestamp(TimeUnit::Second, _) => {
            read_primitive!(array, index, TimestampSecondType, Timestamp, i64)
        }
        LogicalType::Timestamp(TimeUnit::Millisecond, _) => {
            read_primitive!(array, index, TimestampMillisecondType, Timestamp, i64)
        }
        LogicalType::Timestamp(TimeUnit::Microsecond, _) => {
            read_primitive!(array, index, TimestampMicrosecondType, Timestamp, i64)
        }
        LogicalType::Timestamp(TimeUnit::Nanosecond, _) => {
            read_primitive!(array, index, TimestampNanosecondType, Timestamp, i64)
        }
        LogicalType::Duration(TimeUnit::Second) => {
            read_primitive!(array, index, DurationSecondType, Duration, i64)
        }
        LogicalType::Duration(TimeUnit::Millisecond) => {
            read_primitive!(array, index, DurationMillisecondType, Duration, i64)
        }
        LogicalType::Duration(TimeUnit::Microsecond) => {
            read_primitive!(array, index, DurationMicrosecondType, Duration, i64)
        }
        LogicalType::Duration(TimeUnit::Nanosecond) => {
            read_primitive!(array, index, DurationNanosecondType, Duration, i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars_through_storage() {
        let dtype = LogicalType::Int32;
        let scalars = vec![Scalar::Int(1), Scalar::Null, Scalar::Int(-3)];
        let array = array_from_scalars(&dtype, &scalars).unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(scalar_from_array(array.as_ref(), 0, &dtype), Scalar::Int(1));
        assert_eq!(scalar_from_array(array.as_ref(), 1, &dtype), Scalar::Null);
        assert_eq!(
            scalar_from_array(array.as_ref(), 2, &dtype),
            Scalar::Int(-3)
        );
    }

    #[test]
    fn coerces_ints_into_float_storage() {
        let dtype = LogicalType::Float64;
        let array = array_from_scalars(&dtype, &[Scalar::Int(2), Scalar::Float(0.5)]).unwrap();
        assert_eq!(
            scalar_from_array(array.as_ref(), 0, &dtype),
            Scalar::Float(2.0)
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = array_from_scalars(&LogicalType::UInt8, &[Scalar::Int(300)]).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn rejects_mismatched_variants() {
        let err = array_from_scalars(&LogicalType::Bool, &[Scalar::Int(1)]).unwrap_err();
        assert!(err.to_string().contains("mismatched types"));
    }

    #[test]
    fn na_covers_null_and_nan() {
        assert!(Scalar::Null.is_na());
        assert!(Scalar::Float(f64::NAN).is_na());
        assert!(!Scalar::Float(0.0).is_na());
        assert!(!Scalar::Int(0).is_na());
    }
}
