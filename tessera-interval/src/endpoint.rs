use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use arrow_array::Array;
use arrow_array::cast::AsArray;
use arrow_array::types::{
    ArrowPrimitiveType, DurationMicrosecondType, DurationMillisecondType, DurationNanosecondType,
    DurationSecondType, Float64Type, Int64Type, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType,
};
use arrow_schema::{DataType, TimeUnit};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tessera_error::{TesseraExpect, TesseraResult, tessera_bail};

/// The endpoint subtype of an interval index: numeric, or temporal with a
/// signed 64-bit tick representation (nanoseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointType {
    Int64,
    Float64,
    Timestamp { zoned: bool },
    Duration,
}

impl EndpointType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Timestamp { .. } | Self::Duration)
    }
}

impl Display for EndpointType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int64 => write!(f, "int64"),
            Self::Float64 => write!(f, "float64"),
            Self::Timestamp { zoned: false } => write!(f, "timestamp[ns]"),
            Self::Timestamp { zoned: true } => write!(f, "timestamp[ns, tz]"),
            Self::Duration => write!(f, "duration[ns]"),
        }
    }
}

/// One endpoint value. Temporal variants carry nanosecond ticks; zone
/// awareness is an index-level attribute, not a scalar one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EndpointScalar {
    Na,
    Int(i64),
    Float(f64),
    Timestamp(i64),
    Duration(i64),
}

impl EndpointScalar {
    pub fn is_na(&self) -> bool {
        match self {
            Self::Na => true,
            Self::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    fn type_class(&self) -> Option<&'static str> {
        match self {
            Self::Na => None,
            Self::Int(_) | Self::Float(_) => Some("numeric"),
            Self::Timestamp(_) => Some("timestamp"),
            Self::Duration(_) => Some("duration"),
        }
    }
}

/// Compare two endpoint values, promoting across the numeric kinds. `None`
/// when either side is NA or the kinds are not comparable.
pub(crate) fn compare_scalars(a: &EndpointScalar, b: &EndpointScalar) -> Option<Ordering> {
    if a.is_na() || b.is_na() {
        return None;
    }
    match (a, b) {
        (EndpointScalar::Int(lhs), EndpointScalar::Int(rhs)) => Some(lhs.cmp(rhs)),
        (EndpointScalar::Timestamp(lhs), EndpointScalar::Timestamp(rhs)) => Some(lhs.cmp(rhs)),
        (EndpointScalar::Duration(lhs), EndpointScalar::Duration(rhs)) => Some(lhs.cmp(rhs)),
        (EndpointScalar::Float(lhs), EndpointScalar::Float(rhs)) => lhs.partial_cmp(rhs),
        (EndpointScalar::Int(lhs), EndpointScalar::Float(rhs)) => (*lhs as f64).partial_cmp(rhs),
        (EndpointScalar::Float(lhs), EndpointScalar::Int(rhs)) => lhs.partial_cmp(&(*rhs as f64)),
        _ => None,
    }
}

/// A hashable stand-in for an endpoint value where NA compares equal to NA,
/// matching the host's hashtable-based indexers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Atom {
    Na,
    I(i64),
    Bits(u64),
}

/// The comparable codomain the engine works in.
#[derive(Debug, Clone)]
pub(crate) enum Codomain {
    I64(Vec<i64>),
    F64(Vec<f64>),
}

/// An equal-kind sequence of endpoint values. Integer endpoints carry no NA
/// representation (NA promotes the whole array to Float64); temporal arrays
/// track NaT through a validity mask; floats use NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointArray {
    dtype: EndpointType,
    values: EndpointValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum EndpointValues {
    I64 {
        values: Vec<i64>,
        validity: Option<Vec<bool>>,
    },
    F64(Vec<f64>),
}

impl EndpointArray {
    pub fn from_i64(values: Vec<i64>) -> Self {
        Self {
            dtype: EndpointType::Int64,
            values: EndpointValues::I64 {
                values,
                validity: None,
            },
        }
    }

    pub fn from_f64(values: Vec<f64>) -> Self {
        Self {
            dtype: EndpointType::Float64,
            values: EndpointValues::F64(values),
        }
    }

    pub fn from_ticks(dtype: EndpointType, values: Vec<i64>, validity: Option<Vec<bool>>) -> Self {
        debug_assert!(dtype.is_temporal());
        Self {
            dtype,
            values: EndpointValues::I64 { values, validity },
        }
    }

    /// Build from scalars, inferring the kind from the first non-NA value.
    /// Mixed Int/Float promotes to Float64; an all-NA sequence is Float64
    /// NaNs; NA among integers promotes to Float64.
    pub fn from_scalars(scalars: &[EndpointScalar]) -> TesseraResult<Self> {
        let mut class: Option<&'static str> = None;
        let mut needs_float = false;
        let mut has_na = false;
        for scalar in scalars {
            if scalar.is_na() {
                has_na = true;
                continue;
            }
            let this = scalar.type_class().unwrap_or("numeric");
            match class {
                None => class = Some(this),
                Some(seen) if seen == this => {}
                Some(seen) => {
                    tessera_bail!(MismatchedTypes: seen, this)
                }
            }
            if matches!(scalar, EndpointScalar::Float(_)) {
                needs_float = true;
            }
        }
        let dtype = match class {
            None => EndpointType::Float64,
            Some("numeric") if needs_float || has_na => EndpointType::Float64,
            Some("numeric") => EndpointType::Int64,
            Some("timestamp") => EndpointType::Timestamp { zoned: false },
            Some("duration") => EndpointType::Duration,
            Some(other) => tessera_bail!(InvalidArgument: "unsupported endpoint class {other}"),
        };
        Self::from_scalars_with(dtype, scalars)
    }

    /// Build from scalars into a known kind.
    pub fn from_scalars_with(dtype: EndpointType, scalars: &[EndpointScalar]) -> TesseraResult<Self> {
        match dtype {
            EndpointType::Int64 => {
                let mut values = Vec::with_capacity(scalars.len());
                for scalar in scalars {
                    match scalar {
                        EndpointScalar::Int(value) => values.push(*value),
                        other => {
                            tessera_bail!(MismatchedTypes: dtype, format!("{other:?}"))
                        }
                    }
                }
                Ok(Self::from_i64(values))
            }
            EndpointType::Float64 => {
                let mut values = Vec::with_capacity(scalars.len());
                for scalar in scalars {
                    match scalar {
                        EndpointScalar::Na => values.push(f64::NAN),
                        EndpointScalar::Float(value) => values.push(*value),
                        EndpointScalar::Int(value) => values.push(*value as f64),
                        other => {
                            tessera_bail!(MismatchedTypes: dtype, format!("{other:?}"))
                        }
                    }
                }
                Ok(Self::from_f64(values))
            }
            EndpointType::Timestamp { .. } | EndpointType::Duration => {
                let mut values = Vec::with_capacity(scalars.len());
                let mut validity = Vec::with_capacity(scalars.len());
                for scalar in scalars {
                    match (dtype, scalar) {
                        (_, EndpointScalar::Na) => {
                            values.push(0);
                            validity.push(false);
                        }
                        (EndpointType::Timestamp { .. }, EndpointScalar::Timestamp(value))
                        | (EndpointType::Duration, EndpointScalar::Duration(value)) => {
                            values.push(*value);
                            validity.push(true);
                        }
                        (_, other) => {
                            tessera_bail!(MismatchedTypes: dtype, format!("{other:?}"))
                        }
                    }
                }
                let validity = validity.iter().any(|valid| !valid).then_some(validity);
                Ok(Self::from_ticks(dtype, values, validity))
            }
        }
    }

    /// Adopt endpoint values from the columnar storage engine. Timestamps
    /// and durations normalize to nanosecond ticks; nulls become NA.
    pub fn try_from_arrow(array: &dyn Array) -> TesseraResult<Self> {
        let scale = |unit: &TimeUnit| -> i64 {
            match unit {
                TimeUnit::Second => 1_000_000_000,
                TimeUnit::Millisecond => 1_000_000,
                TimeUnit::Microsecond => 1_000,
                TimeUnit::Nanosecond => 1,
            }
        };
        match array.data_type() {
            DataType::Int64 => {
                let typed = array.as_primitive::<Int64Type>();
                if typed.null_count() > 0 {
                    let values = typed
                        .iter()
                        .map(|value| value.map_or(f64::NAN, |v| v as f64))
                        .collect();
                    return Ok(Self::from_f64(values));
                }
                Ok(Self::from_i64(typed.values().to_vec()))
            }
            DataType::Float64 => {
                let typed = array.as_primitive::<Float64Type>();
                Ok(Self::from_f64(
                    typed.iter().map(|value| value.unwrap_or(f64::NAN)).collect(),
                ))
            }
            DataType::Timestamp(unit, tz) => {
                let dtype = EndpointType::Timestamp {
                    zoned: tz.is_some(),
                };
                let values = match unit {
                    TimeUnit::Second => i64_values::<TimestampSecondType>(array),
                    TimeUnit::Millisecond => i64_values::<TimestampMillisecondType>(array),
                    TimeUnit::Microsecond => i64_values::<TimestampMicrosecondType>(array),
                    TimeUnit::Nanosecond => i64_values::<TimestampNanosecondType>(array),
                };
                ticks_from_values(dtype, values, scale(unit))
            }
            DataType::Duration(unit) => {
                let values = match unit {
                    TimeUnit::Second => i64_values::<DurationSecondType>(array),
                    TimeUnit::Millisecond => i64_values::<DurationMillisecondType>(array),
                    TimeUnit::Microsecond => i64_values::<DurationMicrosecondType>(array),
                    TimeUnit::Nanosecond => i64_values::<DurationNanosecondType>(array),
                };
                ticks_from_values(EndpointType::Duration, values, scale(unit))
            }
            other => {
                tessera_bail!(InvalidArgument: "unsupported endpoint storage type '{other}'")
            }
        }
    }

    pub fn dtype(&self) -> EndpointType {
        self.dtype
    }

    pub fn len(&self) -> usize {
        match &self.values {
            EndpointValues::I64 { values, .. } => values.len(),
            EndpointValues::F64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> EndpointScalar {
        match &self.values {
            EndpointValues::I64 { values, validity } => {
                if validity.as_ref().is_some_and(|validity| !validity[index]) {
                    return EndpointScalar::Na;
                }
                match self.dtype {
                    EndpointType::Int64 => EndpointScalar::Int(values[index]),
                    EndpointType::Timestamp { .. } => EndpointScalar::Timestamp(values[index]),
                    EndpointType::Duration => EndpointScalar::Duration(values[index]),
                    EndpointType::Float64 => unreachable!("float endpoints use f64 storage"),
                }
            }
            EndpointValues::F64(values) => {
                if values[index].is_nan() {
                    EndpointScalar::Na
                } else {
                    EndpointScalar::Float(values[index])
                }
            }
        }
    }

    pub fn is_na_at(&self, index: usize) -> bool {
        match &self.values {
            EndpointValues::I64 { validity, .. } => {
                validity.as_ref().is_some_and(|validity| !validity[index])
            }
            EndpointValues::F64(values) => values[index].is_nan(),
        }
    }

    pub fn na_count(&self) -> usize {
        (0..self.len()).filter(|&index| self.is_na_at(index)).count()
    }

    pub fn has_na(&self) -> bool {
        self.na_count() > 0
    }

    pub fn nbytes(&self) -> usize {
        match &self.values {
            EndpointValues::I64 { values, validity } => {
                values.len() * std::mem::size_of::<i64>()
                    + validity.as_ref().map_or(0, |validity| validity.len())
            }
            EndpointValues::F64(values) => values.len() * std::mem::size_of::<f64>(),
        }
    }

    pub fn to_scalars(&self) -> Vec<EndpointScalar> {
        (0..self.len()).map(|index| self.get(index)).collect()
    }

    pub(crate) fn atom(&self, index: usize) -> Atom {
        if self.is_na_at(index) {
            return Atom::Na;
        }
        match &self.values {
            EndpointValues::I64 { values, .. } => Atom::I(values[index]),
            EndpointValues::F64(values) => {
                let value = values[index];
                // normalize the zero sign so -0.0 and 0.0 collide
                Atom::Bits((if value == 0.0 { 0.0 } else { value }).to_bits())
            }
        }
    }

    /// True iff no two positions hold the same value (NA counts as a value,
    /// so two NAs break uniqueness).
    pub fn is_unique(&self) -> bool {
        let mut seen = FxHashSet::default();
        (0..self.len()).all(|index| seen.insert(self.atom(index)))
    }

    pub fn is_monotonic_increasing(&self) -> bool {
        self.monotonic(Ordering::Less)
    }

    pub fn is_monotonic_decreasing(&self) -> bool {
        self.monotonic(Ordering::Greater)
    }

    fn monotonic(&self, direction: Ordering) -> bool {
        if self.has_na() {
            return false;
        }
        (1..self.len()).all(|index| {
            compare_scalars(&self.get(index - 1), &self.get(index))
                .is_some_and(|ordering| ordering == direction || ordering == Ordering::Equal)
        })
    }

    /// First-position indexer: for each target value, the first position in
    /// `self` holding it, else -1. NA matches NA. Kinds must already agree.
    pub(crate) fn get_indexer(&self, target: &EndpointArray) -> Vec<i64> {
        let mut first = FxHashMap::default();
        for index in (0..self.len()).rev() {
            first.insert(self.atom(index), index as i64);
        }
        (0..target.len())
            .map(|index| first.get(&target.atom(index)).copied().unwrap_or(-1))
            .collect()
    }

    /// Positional take; positions must be in bounds.
    pub(crate) fn take_positions(&self, positions: &[usize]) -> Self {
        let scalars: Vec<EndpointScalar> =
            positions.iter().map(|&position| self.get(position)).collect();
        Self::from_scalars_with(self.dtype, &scalars)
            .tessera_expect("taken scalars share the source kind")
    }

    /// Reduce to the engine codomain: temporal ticks stay i64 unless NaT
    /// forces a NaN-capable float view; floats stay f64; ints stay i64.
    pub(crate) fn codomain(&self) -> Codomain {
        match &self.values {
            EndpointValues::F64(values) => Codomain::F64(values.clone()),
            EndpointValues::I64 { values, validity } => match validity {
                None => Codomain::I64(values.clone()),
                Some(validity) => Codomain::F64(
                    values
                        .iter()
                        .zip(validity)
                        .map(|(&value, &valid)| if valid { value as f64 } else { f64::NAN })
                        .collect(),
                ),
            },
        }
    }

    /// Cast to another endpoint kind. Only Int64 -> Float64 widens; every
    /// other crossing is rejected.
    pub(crate) fn astype(&self, dtype: EndpointType) -> TesseraResult<Self> {
        if self.dtype == dtype {
            return Ok(self.clone());
        }
        match (self.dtype, dtype) {
            (EndpointType::Int64, EndpointType::Float64) => match &self.values {
                EndpointValues::I64 { values, .. } => Ok(Self::from_f64(
                    values.iter().map(|&value| value as f64).collect(),
                )),
                EndpointValues::F64(_) => unreachable!("int endpoints use i64 storage"),
            },
            _ => tessera_bail!(MismatchedTypes: dtype, self.dtype),
        }
    }

    /// Locate the insertion point for `label` on a monotonic array.
    pub(crate) fn searchsorted_monotonic(
        &self,
        label: &EndpointScalar,
        side: SearchSide,
    ) -> TesseraResult<usize> {
        let before = |index: usize| -> bool {
            let ordering = compare_scalars(&self.get(index), label);
            match side {
                SearchSide::Left => ordering == Some(Ordering::Less),
                SearchSide::Right => {
                    matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                }
            }
        };
        if self.is_monotonic_increasing() {
            Ok(bisect(self.len(), before))
        } else if self.is_monotonic_decreasing() {
            let after = |index: usize| -> bool {
                let ordering = compare_scalars(&self.get(index), label);
                match side {
                    SearchSide::Left => ordering == Some(Ordering::Greater),
                    SearchSide::Right => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                }
            };
            Ok(bisect(self.len(), after))
        } else {
            tessera_bail!(InvalidArgument: "searchsorted requires a monotonic array")
        }
    }
}

/// First index for which `before` is false; `before` must be monotone.
fn bisect<F: Fn(usize) -> bool>(len: usize, before: F) -> usize {
    let (mut lo, mut hi) = (0usize, len);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if before(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

fn i64_values<T: ArrowPrimitiveType<Native = i64>>(array: &dyn Array) -> Vec<Option<i64>> {
    array.as_primitive::<T>().iter().collect()
}

fn ticks_from_values(
    dtype: EndpointType,
    raw: Vec<Option<i64>>,
    factor: i64,
) -> TesseraResult<EndpointArray> {
    let mut values = Vec::with_capacity(raw.len());
    let mut validity = Vec::with_capacity(raw.len());
    for value in raw {
        match value {
            Some(value) => {
                let ticks = value.checked_mul(factor).ok_or_else(
                    || tessera_error::tessera_err!(InvalidArgument: "tick value {value} overflows the nanosecond codomain"),
                )?;
                values.push(ticks);
                validity.push(true);
            }
            None => {
                values.push(0);
                validity.push(false);
            }
        }
    }
    let validity = validity.iter().any(|valid| !valid).then_some(validity);
    Ok(EndpointArray::from_ticks(dtype, values, validity))
}

/// Which side of an equal run an insertion point lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSide {
    Left,
    Right,
}
