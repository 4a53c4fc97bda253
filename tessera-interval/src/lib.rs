//! Interval-valued ordered indexes.
//!
//! [`IntervalOrderedIndex`] wraps a pair of endpoint arrays plus a
//! closedness flag and answers point/interval containment lookups, positional
//! alignment against other indexes, and set algebra over possibly-duplicate
//! interval collections. Queries run against a lazily-built interval tree
//! over a comparable codomain (temporal endpoints reduce to signed 64-bit
//! ticks; missing endpoints reduce to NaN so they never match a boundary).
//!
//! Instances are immutable: every "mutation" (`insert`, `putmask`, `astype`,
//! set operations) constructs a new index, so the memoized engine and flags
//! are computed at most once and never invalidated.

mod endpoint;
mod index;
mod interval;
mod range;
mod setops;
mod tree;

pub use endpoint::*;
pub use index::*;
pub use interval::*;
pub use range::*;
