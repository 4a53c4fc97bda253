use std::fmt::{Display, Formatter};
use std::sync::Arc;

use arrow_schema::{DataType, TimeUnit};
use tessera_error::{TesseraResult, tessera_bail};

/// The logical element type of a [`crate::ChunkedColumnArray`].
///
/// Derived once from the chunk [`DataType`] at construction and immutable for
/// the life of the instance. This is a closed set: the representative kinds
/// the adapter generalizes over, not the full breadth of Arrow's type system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    /// Days since the epoch.
    Date32,
    /// Milliseconds since the epoch.
    Date64,
    Time32(TimeUnit),
    Time64(TimeUnit),
    Timestamp(TimeUnit, Option<Arc<str>>),
    Duration(TimeUnit),
}

impl LogicalType {
    /// Resolve the logical type for a physical chunk type, rejecting
    /// anything outside the supported kind set.
    pub fn try_from_arrow(dtype: &DataType) -> TesseraResult<Self> {
        Ok(match dtype {
            DataType::Boolean => Self::Bool,
            DataType::Int8 => Self::Int8,
            DataType::Int16 => Self::Int16,
            DataType::Int32 => Self::Int32,
            DataType::Int64 => Self::Int64,
            DataType::UInt8 => Self::UInt8,
            DataType::UInt16 => Self::UInt16,
            DataType::UInt32 => Self::UInt32,
            DataType::UInt64 => Self::UInt64,
            DataType::Float32 => Self::Float32,
            DataType::Float64 => Self::Float64,
            DataType::Utf8 => Self::Utf8,
            DataType::Date32 => Self::Date32,
            DataType::Date64 => Self::Date64,
            DataType::Time32(unit @ (TimeUnit::Second | TimeUnit::Millisecond)) => {
                Self::Time32(*unit)
            }
            DataType::Time64(unit @ (TimeUnit::Microsecond | TimeUnit::Nanosecond)) => {
                Self::Time64(*unit)
            }
            DataType::Timestamp(unit, tz) => Self::Timestamp(*unit, tz.clone()),
            DataType::Duration(unit) => Self::Duration(*unit),
            other => {
                tessera_bail!(Construction: "unsupported storage type '{other}' for ChunkedColumnArray")
            }
        })
    }

    /// The physical storage type backing this logical type.
    pub fn to_arrow(&self) -> DataType {
        match self {
            Self::Bool => DataType::Boolean,
            Self::Int8 => DataType::Int8,
            Self::Int16 => DataType::Int16,
            Self::Int32 => DataType::Int32,
            Self::Int64 => DataType::Int64,
            Self::UInt8 => DataType::UInt8,
            Self::UInt16 => DataType::UInt16,
            Self::UInt32 => DataType::UInt32,
            Self::UInt64 => DataType::UInt64,
            Self::Float32 => DataType::Float32,
            Self::Float64 => DataType::Float64,
            Self::Utf8 => DataType::Utf8,
            Self::Date32 => DataType::Date32,
            Self::Date64 => DataType::Date64,
            Self::Time32(unit) => DataType::Time32(*unit),
            Self::Time64(unit) => DataType::Time64(*unit),
            Self::Timestamp(unit, tz) => DataType::Timestamp(*unit, tz.clone()),
            Self::Duration(unit) => DataType::Duration(*unit),
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_unsigned_int(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub fn is_int(&self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date32
                | Self::Date64
                | Self::Time32(_)
                | Self::Time64(_)
                | Self::Timestamp(..)
                | Self::Duration(_)
        )
    }
}

fn unit_str(unit: &TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Second => "s",
        TimeUnit::Millisecond => "ms",
        TimeUnit::Microsecond => "us",
        TimeUnit::Nanosecond => "ns",
    }
}

impl Display for LogicalType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int8 => write!(f, "int8"),
            Self::Int16 => write!(f, "int16"),
            Self::Int32 => write!(f, "int32"),
            Self::Int64 => write!(f, "int64"),
            Self::UInt8 => write!(f, "uint8"),
            Self::UInt16 => write!(f, "uint16"),
            Self::UInt32 => write!(f, "uint32"),
            Self::UInt64 => write!(f, "uint64"),
            Self::Float32 => write!(f, "float32"),
            Self::Float64 => write!(f, "float64"),
            Self::Utf8 => write!(f, "utf8"),
            Self::Date32 => write!(f, "date32"),
            Self::Date64 => write!(f, "date64"),
            Self::Time32(unit) => write!(f, "time32[{}]", unit_str(unit)),
            Self::Time64(unit) => write!(f, "time64[{}]", unit_str(unit)),
            Self::Timestamp(unit, None) => write!(f, "timestamp[{}]", unit_str(unit)),
            Self::Timestamp(unit, Some(tz)) => write!(f, "timestamp[{}, {}]", unit_str(unit), tz),
            Self::Duration(unit) => write!(f, "duration[{}]", unit_str(unit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_storage_type() {
        let types = [
            DataType::Boolean,
            DataType::Int64,
            DataType::UInt8,
            DataType::Float64,
            DataType::Utf8,
            DataType::Date32,
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
            DataType::Duration(TimeUnit::Millisecond),
            DataType::Time64(TimeUnit::Nanosecond),
        ];
        for dt in types {
            let logical = LogicalType::try_from_arrow(&dt).unwrap();
            assert_eq!(logical.to_arrow(), dt);
        }
    }

    #[test]
    fn rejects_types_outside_the_kind_set() {
        let err = LogicalType::try_from_arrow(&DataType::Binary).unwrap_err();
        assert!(err.to_string().contains("unsupported storage type"));
    }

    #[test]
    fn displays_units() {
        assert_eq!(
            LogicalType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())).to_string(),
            "timestamp[ns, UTC]"
        );
        assert_eq!(
            LogicalType::Duration(TimeUnit::Second).to_string(),
            "duration[s]"
        );
    }
}
