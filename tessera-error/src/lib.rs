//! Error handling for the tessera crates.
//!
//! Errors are kind-tagged so callers can distinguish the one recoverable
//! condition (a lookup miss, [`TesseraError::KeyNotFound`]) from the fatal
//! ones. Construct errors with [`tessera_err`] and early-return them with
//! [`tessera_bail`].

use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

use arrow_schema::ArrowError;

mod ext;

pub use ext::*;

/// A string that can be owned or borrowed from a `'static` literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The top-level error type for all tessera crates.
#[derive(thiserror::Error, Debug)]
pub enum TesseraError {
    /// A positional index fell outside the addressable range.
    #[error("index {0} out of bounds from {1} to {2}")]
    OutOfBounds(i64, usize, usize),
    /// A lookup key has no match. The only recoverable kind.
    #[error("key not found: {0}")]
    KeyNotFound(ErrString),
    /// An argument was structurally valid but semantically wrong.
    #[error("invalid argument: {0}")]
    InvalidArgument(ErrString),
    /// Two logical types that were required to match did not.
    #[error("mismatched types: expected {0}, got {1}")]
    MismatchedTypes(ErrString, ErrString),
    /// A structural capability gap, e.g. reshaping a 1-D store.
    #[error("not implemented: {0} for {1}")]
    NotImplemented(ErrString, ErrString),
    /// Construction rejected its inputs; nothing was partially built.
    #[error("construction error: {0}")]
    Construction(ErrString),
    /// A computation failed in the backing storage engine or in a kernel.
    #[error("compute error: {0}")]
    ComputeError(ErrString),
    /// Passthrough for errors raised by the Arrow storage engine.
    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl TesseraError {
    /// True iff this is a lookup miss, the kind `contains`-style callers
    /// routinely catch.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound(_))
    }

    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, Self::OutOfBounds(..))
    }
}

pub type TesseraResult<T> = Result<T, TesseraError>;

#[macro_export]
macro_rules! tessera_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {
        $crate::TesseraError::OutOfBounds($idx as i64, $start, $stop)
    };
    (KeyNotFound: $($fmt:tt)*) => {
        $crate::TesseraError::KeyNotFound($crate::ErrString::from(format!($($fmt)*)))
    };
    (InvalidArgument: $($fmt:tt)*) => {
        $crate::TesseraError::InvalidArgument($crate::ErrString::from(format!($($fmt)*)))
    };
    (MismatchedTypes: $expected:expr, $actual:expr) => {
        $crate::TesseraError::MismatchedTypes(
            $crate::ErrString::from(format!("{}", $expected)),
            $crate::ErrString::from(format!("{}", $actual)),
        )
    };
    (NotImplemented: $feature:expr, $on:expr) => {
        $crate::TesseraError::NotImplemented(
            $crate::ErrString::from(format!("{}", $feature)),
            $crate::ErrString::from(format!("{}", $on)),
        )
    };
    (Construction: $($fmt:tt)*) => {
        $crate::TesseraError::Construction($crate::ErrString::from(format!($($fmt)*)))
    };
    ($($fmt:tt)*) => {
        $crate::TesseraError::ComputeError($crate::ErrString::from(format!($($fmt)*)))
    };
}

#[macro_export]
macro_rules! tessera_bail {
    ($($tt:tt)+) => {
        return Err($crate::tessera_err!($($tt)+))
    };
}

/// Unwrap a value whose absence would violate an internal invariant.
///
/// Panics with the given message; reserved for conditions that construction
/// already ruled out, never for caller input.
pub trait TesseraExpect {
    type Output;

    fn tessera_expect(self, msg: &str) -> Self::Output;
}

impl<T> TesseraExpect for Option<T> {
    type Output = T;

    fn tessera_expect(self, msg: &str) -> T {
        match self {
            Some(value) => value,
            None => panic!("expected Some: {msg}"),
        }
    }
}

impl<T> TesseraExpect for TesseraResult<T> {
    type Output = T;

    fn tessera_expect(self, msg: &str) -> T {
        match self {
            Ok(value) => value,
            Err(e) => panic!("expected Ok: {msg}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(hit: bool) -> TesseraResult<usize> {
        if !hit {
            tessera_bail!(KeyNotFound: "no interval contains {}", 42);
        }
        Ok(7)
    }

    #[test]
    fn key_not_found_is_recoverable() {
        let err = lookup(false).unwrap_err();
        assert!(err.is_key_not_found());
        assert!(!err.is_out_of_bounds());
        assert_eq!(lookup(true).unwrap(), 7);
    }

    #[test]
    fn out_of_bounds_formats_range() {
        let err = tessera_err!(OutOfBounds: 12, 0, 10);
        assert_eq!(err.to_string(), "index 12 out of bounds from 0 to 10");
    }

    #[test]
    fn mismatched_types_formats_both_sides() {
        let err = tessera_err!(MismatchedTypes: "i64", "f64");
        assert_eq!(err.to_string(), "mismatched types: expected i64, got f64");
    }
}
