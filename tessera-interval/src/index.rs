use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::sync::OnceLock;

use arrow_array::Array;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tessera_error::{TesseraExpect, TesseraResult, tessera_bail};

use crate::endpoint::{Atom, Codomain, compare_scalars};
use crate::tree::{CodomainKey, Engine, IntervalTree, pairs_overlap};
use crate::{
    ClosedSide, EndpointArray, EndpointScalar, EndpointType, Interval, SearchSide, next_label,
    prev_label,
};

/// An immutable ordered index of intervals closed on the same side.
///
/// State is the (left, right, closed) triple plus an optional name. The
/// interval-tree engine, the (left, right) pair view, and the derived flags
/// are memoized on first access and never invalidated; anything that would
/// change them builds a new index instead.
pub struct IntervalOrderedIndex {
    left: EndpointArray,
    right: EndpointArray,
    closed: ClosedSide,
    name: Option<String>,
    engine: OnceLock<Engine>,
    pairs: OnceLock<Vec<(Atom, Atom)>>,
    unique: OnceLock<bool>,
    overlapping: OnceLock<bool>,
    non_overlapping_monotonic: OnceLock<bool>,
}

/// A lookup key: a whole interval (exact match) or a point (containment).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntervalOrPoint {
    Interval(Interval),
    Point(EndpointScalar),
}

impl From<Interval> for IntervalOrPoint {
    fn from(interval: Interval) -> Self {
        Self::Interval(interval)
    }
}

impl From<EndpointScalar> for IntervalOrPoint {
    fn from(point: EndpointScalar) -> Self {
        Self::Point(point)
    }
}

/// Where a label landed: one position, a contiguous run, or a boolean mask
/// when the matches are scattered.
#[derive(Debug, Clone, PartialEq)]
pub enum LocResult {
    At(usize),
    Slice { start: usize, stop: usize },
    Mask(Vec<bool>),
}

/// The other side of a positional alignment.
#[derive(Clone, Copy)]
pub enum Target<'a> {
    /// Another interval index; only exact interval matches align.
    Intervals(&'a IntervalOrderedIndex),
    /// A homogeneous array of point labels.
    Points(&'a EndpointArray),
    /// A dictionary-encoded point array: categories resolved once, then
    /// broadcast through the codes (negative code = missing).
    Categorical {
        categories: &'a EndpointArray,
        codes: &'a [i64],
    },
    /// Heterogeneous labels, resolved one `get_loc` at a time.
    Mixed(&'a [IntervalOrPoint]),
}

/// The persisted representation: the two endpoint arrays plus the attribute
/// set. Reconstruction goes back through the verifying constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalIndexParts {
    pub left: EndpointArray,
    pub right: EndpointArray,
    pub closed: ClosedSide,
    pub name: Option<String>,
}

fn promote_pair(
    left: EndpointArray,
    right: EndpointArray,
) -> TesseraResult<(EndpointArray, EndpointArray)> {
    if left.dtype() == right.dtype() {
        return Ok((left, right));
    }
    match (left.dtype(), right.dtype()) {
        (EndpointType::Int64, EndpointType::Float64) => Ok((left.astype(EndpointType::Float64)?, right)),
        (EndpointType::Float64, EndpointType::Int64) => Ok((left, right.astype(EndpointType::Float64)?)),
        (lhs, rhs) => tessera_bail!(MismatchedTypes: lhs, rhs),
    }
}

fn verify_integrity(left: &EndpointArray, right: &EndpointArray) -> TesseraResult<()> {
    if left.len() != right.len() {
        tessera_bail!(Construction: "left and right must have the same length: {} vs {}", left.len(), right.len());
    }
    for index in 0..left.len() {
        let (l, r) = (left.get(index), right.get(index));
        if l.is_na() != r.is_na() {
            tessera_bail!(Construction: "interval endpoints cannot be NA on only one side (position {index})");
        }
        if l.is_na() {
            continue;
        }
        match compare_scalars(&l, &r) {
            Some(Ordering::Less | Ordering::Equal) => {}
            _ => {
                tessera_bail!(Construction: "left side of interval must be <= right side (position {index})")
            }
        }
    }
    Ok(())
}

impl IntervalOrderedIndex {
    pub(crate) fn new_unchecked(
        left: EndpointArray,
        right: EndpointArray,
        closed: ClosedSide,
        name: Option<String>,
    ) -> Self {
        Self {
            left,
            right,
            closed,
            name,
            engine: OnceLock::new(),
            pairs: OnceLock::new(),
            unique: OnceLock::new(),
            overlapping: OnceLock::new(),
            non_overlapping_monotonic: OnceLock::new(),
        }
    }

    /// Build from matching left/right endpoint arrays, verifying integrity:
    /// equal lengths, paired NAs, and `left <= right` elementwise. Int/Float
    /// sides promote to Float64.
    pub fn from_arrays(
        left: EndpointArray,
        right: EndpointArray,
        closed: ClosedSide,
    ) -> TesseraResult<Self> {
        let (left, right) = promote_pair(left, right)?;
        verify_integrity(&left, &right)?;
        Ok(Self::new_unchecked(left, right, closed, None))
    }

    /// Build from splits: `n` breaks make `n - 1` intervals.
    pub fn from_breaks(breaks: EndpointArray, closed: ClosedSide) -> TesseraResult<Self> {
        if breaks.len() < 2 {
            let empty = EndpointArray::from_scalars_with(breaks.dtype(), &[])?;
            return Ok(Self::new_unchecked(empty.clone(), empty, closed, None));
        }
        let head: Vec<usize> = (0..breaks.len() - 1).collect();
        let tail: Vec<usize> = (1..breaks.len()).collect();
        Self::from_arrays(
            breaks.take_positions(&head),
            breaks.take_positions(&tail),
            closed,
        )
    }

    /// Build from (left, right) tuples; `None` is the NA interval.
    pub fn from_tuples(
        tuples: &[Option<(EndpointScalar, EndpointScalar)>],
        closed: ClosedSide,
    ) -> TesseraResult<Self> {
        let mut lefts = Vec::with_capacity(tuples.len());
        let mut rights = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            match tuple {
                Some((left, right)) => {
                    lefts.push(*left);
                    rights.push(*right);
                }
                None => {
                    lefts.push(EndpointScalar::Na);
                    rights.push(EndpointScalar::Na);
                }
            }
        }
        Self::from_arrays(
            EndpointArray::from_scalars(&lefts)?,
            EndpointArray::from_scalars(&rights)?,
            closed,
        )
    }

    /// Adopt endpoint arrays straight from the columnar storage engine.
    pub fn from_arrow_arrays(
        left: &dyn Array,
        right: &dyn Array,
        closed: ClosedSide,
    ) -> TesseraResult<Self> {
        Self::from_arrays(
            EndpointArray::try_from_arrow(left)?,
            EndpointArray::try_from_arrow(right)?,
            closed,
        )
    }

    pub fn empty(subtype: EndpointType, closed: ClosedSide) -> Self {
        let empty = EndpointArray::from_scalars_with(subtype, &[])
            .tessera_expect("an empty sequence fits any kind");
        Self::new_unchecked(empty.clone(), empty, closed, None)
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn left(&self) -> &EndpointArray {
        &self.left
    }

    pub fn right(&self) -> &EndpointArray {
        &self.right
    }

    pub fn closed(&self) -> ClosedSide {
        self.closed
    }

    pub fn subtype(&self) -> EndpointType {
        self.left.dtype()
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn interval_at(&self, index: usize) -> TesseraResult<Option<Interval>> {
        if index >= self.len() {
            tessera_bail!(OutOfBounds: index, 0, self.len());
        }
        if self.left.is_na_at(index) {
            return Ok(None);
        }
        Ok(Some(Interval {
            left: self.left.get(index),
            right: self.right.get(index),
            closed: self.closed,
        }))
    }

    pub fn isna(&self) -> Vec<bool> {
        (0..self.len()).map(|index| self.left.is_na_at(index)).collect()
    }

    pub fn na_count(&self) -> usize {
        self.left.na_count()
    }

    /// Bytes held by the two endpoint arrays; the engine is not counted.
    pub fn memory_usage(&self) -> usize {
        self.left.nbytes() + self.right.nbytes()
    }

    /// Interval midpoints. Numeric subtypes yield Float64; temporal
    /// subtypes stay in their tick kind.
    pub fn mid(&self) -> EndpointArray {
        let scalars: Vec<EndpointScalar> = (0..self.len())
            .map(|index| {
                let (l, r) = (self.left.get(index), self.right.get(index));
                match (l, r) {
                    (EndpointScalar::Int(a), EndpointScalar::Int(b)) => {
                        EndpointScalar::Float(a as f64 + (b - a) as f64 / 2.0)
                    }
                    (EndpointScalar::Float(a), EndpointScalar::Float(b)) => {
                        EndpointScalar::Float(a + (b - a) / 2.0)
                    }
                    (EndpointScalar::Timestamp(a), EndpointScalar::Timestamp(b)) => {
                        EndpointScalar::Timestamp(a + (b - a) / 2)
                    }
                    (EndpointScalar::Duration(a), EndpointScalar::Duration(b)) => {
                        EndpointScalar::Duration(a + (b - a) / 2)
                    }
                    _ => EndpointScalar::Na,
                }
            })
            .collect();
        EndpointArray::from_scalars(&scalars).tessera_expect("midpoints share the endpoint kind")
    }

    /// Interval widths: `right - left`. Timestamp differences are durations.
    pub fn lengths(&self) -> EndpointArray {
        let scalars: Vec<EndpointScalar> = (0..self.len())
            .map(|index| {
                let (l, r) = (self.left.get(index), self.right.get(index));
                match (l, r) {
                    (EndpointScalar::Int(a), EndpointScalar::Int(b)) => EndpointScalar::Int(b - a),
                    (EndpointScalar::Float(a), EndpointScalar::Float(b)) => {
                        EndpointScalar::Float(b - a)
                    }
                    (EndpointScalar::Timestamp(a), EndpointScalar::Timestamp(b))
                    | (EndpointScalar::Duration(a), EndpointScalar::Duration(b)) => {
                        EndpointScalar::Duration(b - a)
                    }
                    _ => EndpointScalar::Na,
                }
            })
            .collect();
        EndpointArray::from_scalars(&scalars).tessera_expect("widths share a single kind")
    }

    // -----------------------------------------------------------------
    // Memoized derived state

    pub(crate) fn engine(&self) -> &Engine {
        self.engine.get_or_init(|| {
            match (self.left.codomain(), self.right.codomain()) {
                (Codomain::I64(left), Codomain::I64(right)) => {
                    Engine::I64(IntervalTree::new(&left, &right, self.closed))
                }
                (left, right) => {
                    let left = to_f64(left);
                    let right = to_f64(right);
                    Engine::F64(IntervalTree::new(&left, &right, self.closed))
                }
            }
        })
    }

    pub(crate) fn pair_keys(&self) -> &[(Atom, Atom)] {
        self.pairs.get_or_init(|| {
            (0..self.len())
                .map(|index| (self.left.atom(index), self.right.atom(index)))
                .collect()
        })
    }

    /// True when no interval occurs twice. At most one NA interval can
    /// exist in a unique index.
    pub fn is_unique(&self) -> bool {
        *self.unique.get_or_init(|| {
            if self.na_count() > 1 {
                return false;
            }
            if self.left.is_unique() || self.right.is_unique() {
                return true;
            }
            let mut seen = rustc_hash::FxHashSet::default();
            self.pair_keys().iter().all(|pair| seen.insert(*pair))
        })
    }

    /// True when some two intervals share a point, closed endpoints
    /// included.
    pub fn is_overlapping(&self) -> bool {
        *self.overlapping.get_or_init(|| {
            match (self.left.codomain(), self.right.codomain()) {
                (Codomain::I64(left), Codomain::I64(right)) => {
                    let pairs: Vec<(i64, i64)> = left.into_iter().zip(right).collect();
                    pairs_overlap(&pairs, self.closed)
                }
                (left, right) => {
                    let pairs: Vec<(f64, f64)> =
                        to_f64(left).into_iter().zip(to_f64(right)).collect();
                    pairs_overlap(&pairs, self.closed)
                }
            }
        })
    }

    /// True when the intervals are disjoint and ordered in one direction;
    /// adjacent intervals may share an endpoint unless both sides are
    /// closed.
    pub fn is_non_overlapping_monotonic(&self) -> bool {
        *self.non_overlapping_monotonic.get_or_init(|| {
            let allow_touch = !(self.closed.closed_left() && self.closed.closed_right());
            let ordered = |a: &EndpointScalar, b: &EndpointScalar| -> bool {
                match compare_scalars(a, b) {
                    Some(Ordering::Less) => true,
                    Some(Ordering::Equal) => allow_touch,
                    _ => false,
                }
            };
            let increasing = (1..self.len())
                .all(|index| ordered(&self.right.get(index - 1), &self.left.get(index)));
            let decreasing = (1..self.len())
                .all(|index| ordered(&self.right.get(index), &self.left.get(index - 1)));
            increasing || decreasing
        })
    }

    /// Lexicographic (left, right) monotonicity.
    pub fn is_monotonic_increasing(&self) -> bool {
        self.lexicographic_monotonic(Ordering::Less)
    }

    pub fn is_monotonic_decreasing(&self) -> bool {
        self.lexicographic_monotonic(Ordering::Greater)
    }

    fn lexicographic_monotonic(&self, direction: Ordering) -> bool {
        if self.left.has_na() {
            return false;
        }
        (1..self.len()).all(|index| {
            let by_left = compare_scalars(&self.left.get(index - 1), &self.left.get(index));
            match by_left {
                Some(Ordering::Equal) => {
                    let by_right =
                        compare_scalars(&self.right.get(index - 1), &self.right.get(index));
                    matches!(by_right, Some(Ordering::Equal))
                        || by_right == Some(direction)
                }
                Some(ordering) => ordering == direction,
                None => false,
            }
        })
    }

    /// Value equality: same closedness, same intervals in the same order,
    /// with NA equal to NA. Numeric subtypes compare across Int64/Float64.
    pub fn equals(&self, other: &Self) -> bool {
        if self.closed != other.closed || self.len() != other.len() {
            return false;
        }
        if self.subtype() != other.subtype() {
            let both_numeric = self.subtype().is_numeric() && other.subtype().is_numeric();
            if !both_numeric {
                return false;
            }
            let lhs = match self.astype(EndpointType::Float64) {
                Ok(index) => index,
                Err(_) => return false,
            };
            let rhs = match other.astype(EndpointType::Float64) {
                Ok(index) => index,
                Err(_) => return false,
            };
            return lhs.pair_keys() == rhs.pair_keys();
        }
        self.pair_keys() == other.pair_keys()
    }

    // -----------------------------------------------------------------
    // Lookup

    /// Reduce a point label to the engine codomain, enforcing subtype
    /// consistency for temporal kinds.
    pub(crate) fn codomain_key(&self, label: &EndpointScalar) -> TesseraResult<CodomainKey> {
        if label.is_na() {
            return Ok(CodomainKey::Missing);
        }
        match (self.subtype(), label) {
            (EndpointType::Int64 | EndpointType::Float64, EndpointScalar::Int(value)) => {
                Ok(CodomainKey::I(*value))
            }
            (EndpointType::Int64 | EndpointType::Float64, EndpointScalar::Float(value)) => {
                Ok(CodomainKey::F(*value))
            }
            (EndpointType::Timestamp { .. }, EndpointScalar::Timestamp(ticks)) => {
                Ok(CodomainKey::I(*ticks))
            }
            (EndpointType::Duration, EndpointScalar::Duration(ticks)) => {
                Ok(CodomainKey::I(*ticks))
            }
            (subtype, label) => {
                tessera_bail!(MismatchedTypes: subtype, format!("{label:?}"))
            }
        }
    }

    /// Position(s) of a label: exact interval matches for interval keys,
    /// containment for point keys. One match returns the position, several
    /// return a mask (compacted to a slice when contiguous), none is a
    /// `KeyNotFound`.
    pub fn get_loc(&self, key: &IntervalOrPoint) -> TesseraResult<LocResult> {
        let mask: Vec<bool> = match key {
            IntervalOrPoint::Interval(interval) => {
                if interval.closed != self.closed {
                    tessera_bail!(KeyNotFound: "{interval:?}");
                }
                (0..self.len())
                    .map(|index| {
                        compare_scalars(&self.left.get(index), &interval.left)
                            == Some(Ordering::Equal)
                            && compare_scalars(&self.right.get(index), &interval.right)
                                == Some(Ordering::Equal)
                    })
                    .collect()
            }
            IntervalOrPoint::Point(point) => (0..self.len())
                .map(|index| {
                    Interval {
                        left: self.left.get(index),
                        right: self.right.get(index),
                        closed: self.closed,
                    }
                    .contains_point(point)
                })
                .collect(),
        };

        let matches = mask.iter().filter(|&&hit| hit).count();
        match matches {
            0 => tessera_bail!(KeyNotFound: "{key:?}"),
            1 => {
                let position = mask.iter().position(|&hit| hit).unwrap_or_default();
                Ok(LocResult::At(position))
            }
            _ => Ok(compact_mask(mask)),
        }
    }

    /// Whether an interval is present, via the `get_loc` miss.
    pub fn contains(&self, interval: &Interval) -> bool {
        match self.get_loc(&IntervalOrPoint::Interval(*interval)) {
            Ok(_) => true,
            Err(error) => {
                debug_assert!(error.is_key_not_found());
                false
            }
        }
    }

    /// Positional alignment of a target against this index; -1 marks a
    /// miss. Requires a non-overlapping index.
    pub fn get_indexer(&self, target: &Target<'_>) -> TesseraResult<Vec<i64>> {
        if self.is_overlapping() {
            tessera_bail!(InvalidArgument: "cannot handle overlapping indices; use get_indexer_non_unique");
        }
        match target {
            Target::Intervals(other) => {
                if self.equals(other) {
                    return Ok((0..self.len() as i64).collect());
                }
                if !self.comparable_with(other) {
                    return Ok(vec![-1; other.len()]);
                }
                let (lhs, rhs) = self.promoted_with(other)?;
                let left_indexer = lhs.left.get_indexer(&rhs.left);
                let right_indexer = lhs.right.get_indexer(&rhs.right);
                Ok(left_indexer
                    .into_iter()
                    .zip(right_indexer)
                    .map(|(l, r)| if l == r { l } else { -1 })
                    .collect())
            }
            Target::Points(values) => {
                let keys: Vec<CodomainKey> = values
                    .to_scalars()
                    .iter()
                    .map(|scalar| self.codomain_key(scalar))
                    .try_collect()?;
                Ok(keys
                    .iter()
                    .map(|key| {
                        let matches = self.engine().query(key);
                        matches.first().map_or(-1, |&position| position as i64)
                    })
                    .collect())
            }
            Target::Categorical { categories, codes } => {
                let categories_indexer = self.get_indexer(&Target::Points(categories))?;
                Ok(codes
                    .iter()
                    .map(|&code| {
                        if code < 0 {
                            -1
                        } else {
                            categories_indexer[code as usize]
                        }
                    })
                    .collect())
            }
            Target::Mixed(keys) => {
                log::debug!("resolving a heterogeneous target element-wise");
                Ok(self.pointwise_indexer(keys)?.0)
            }
        }
    }

    /// Alignment that tolerates repeated matches: returns every matching
    /// position per target element, plus the target positions that missed.
    pub fn get_indexer_non_unique(
        &self,
        target: &Target<'_>,
    ) -> TesseraResult<(Vec<i64>, Vec<i64>)> {
        match target {
            Target::Intervals(other) => {
                if !self.comparable_with(other) {
                    return Ok((vec![-1; other.len()], (0..other.len() as i64).collect()));
                }
                let keys: Vec<IntervalOrPoint> = (0..other.len())
                    .map(|index| match other.interval_at(index) {
                        Ok(Some(interval)) => IntervalOrPoint::Interval(interval),
                        _ => IntervalOrPoint::Point(EndpointScalar::Na),
                    })
                    .collect();
                self.pointwise_indexer(&keys)
            }
            Target::Mixed(keys) => self.pointwise_indexer(keys),
            Target::Points(values) => {
                let mut indexer = Vec::new();
                let mut missing = Vec::new();
                for (position, scalar) in values.to_scalars().iter().enumerate() {
                    let matches = self.engine().query(&self.codomain_key(scalar)?);
                    if matches.is_empty() {
                        indexer.push(-1);
                        missing.push(position as i64);
                    } else {
                        indexer.extend(matches.into_iter().map(|hit| hit as i64));
                    }
                }
                Ok((indexer, missing))
            }
            Target::Categorical { categories, codes } => {
                let mut indexer = Vec::new();
                let mut missing = Vec::new();
                for (position, &code) in codes.iter().enumerate() {
                    let matches = if code < 0 {
                        Vec::new()
                    } else {
                        let scalar = categories.get(code as usize);
                        self.engine().query(&self.codomain_key(&scalar)?)
                    };
                    if matches.is_empty() {
                        indexer.push(-1);
                        missing.push(position as i64);
                    } else {
                        indexer.extend(matches.into_iter().map(|hit| hit as i64));
                    }
                }
                Ok((indexer, missing))
            }
        }
    }

    fn pointwise_indexer(&self, keys: &[IntervalOrPoint]) -> TesseraResult<(Vec<i64>, Vec<i64>)> {
        let mut indexer = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();
        for (position, key) in keys.iter().enumerate() {
            match self.get_loc(key) {
                Ok(LocResult::At(hit)) => indexer.push(hit as i64),
                Ok(LocResult::Slice { start, stop }) => {
                    indexer.extend((start..stop).map(|hit| hit as i64));
                }
                Ok(LocResult::Mask(mask)) => {
                    indexer.extend(
                        mask.iter()
                            .enumerate()
                            .filter(|&(_, &hit)| hit)
                            .map(|(hit, _)| hit as i64),
                    );
                }
                Err(error) if error.is_key_not_found() => {
                    indexer.push(-1);
                    missing.push(position as i64);
                }
                Err(error) => return Err(error),
            }
        }
        Ok((indexer, missing))
    }

    pub(crate) fn comparable_with(&self, other: &Self) -> bool {
        if self.closed != other.closed {
            return false;
        }
        self.subtype() == other.subtype()
            || (self.subtype().is_numeric() && other.subtype().is_numeric())
    }

    pub(crate) fn promoted_with(&self, other: &Self) -> TesseraResult<(Self, Self)> {
        if self.subtype() == other.subtype() {
            return Ok((self.clone(), other.clone()));
        }
        Ok((
            self.astype(EndpointType::Float64)?,
            other.astype(EndpointType::Float64)?,
        ))
    }

    /// Locate a slice bound on a non-overlapping monotonic index, shifting
    /// the label past an open bound before searching the covering endpoint
    /// array.
    pub fn searchsorted_monotonic(
        &self,
        label: &EndpointScalar,
        side: SearchSide,
    ) -> TesseraResult<usize> {
        if !self.is_non_overlapping_monotonic() {
            tessera_bail!(KeyNotFound: "can only get slices from an interval index if bounds are non-overlapping and all monotonic increasing or decreasing");
        }
        let increasing = self.left.is_monotonic_increasing();
        if (side == SearchSide::Left && increasing) || (side == SearchSide::Right && !increasing) {
            let label = if self.closed.open_right() {
                next_label(label)?
            } else {
                *label
            };
            self.right.searchsorted_monotonic(&label, side)
        } else {
            let label = if self.closed.open_left() {
                prev_label(label)?
            } else {
                *label
            };
            self.left.searchsorted_monotonic(&label, side)
        }
    }

    // -----------------------------------------------------------------
    // Construction of derived indexes

    /// Positional take; positions must be in bounds.
    pub fn take(&self, positions: &[usize]) -> Self {
        Self::new_unchecked(
            self.left.take_positions(positions),
            self.right.take_positions(positions),
            self.closed,
            self.name.clone(),
        )
    }

    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Order positions by (left, right), NA intervals last.
    pub(crate) fn argsort(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.compare_positions(a, b));
        order
    }

    fn compare_positions(&self, a: usize, b: usize) -> Ordering {
        let na_a = self.left.is_na_at(a);
        let na_b = self.left.is_na_at(b);
        match (na_a, na_b) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_scalars(&self.left.get(a), &self.left.get(b))
                .unwrap_or(Ordering::Equal)
                .then(
                    compare_scalars(&self.right.get(a), &self.right.get(b))
                        .unwrap_or(Ordering::Equal),
                ),
        }
    }

    pub fn sort_values(&self) -> Self {
        self.take(&self.argsort())
    }

    /// New index with `item` (an interval with matching closedness, or NA)
    /// inserted at `loc`; negative locations count from the end.
    pub fn insert(&self, loc: i64, item: Option<Interval>) -> TesseraResult<Self> {
        let len = self.len();
        let resolved = if loc < 0 { loc + len as i64 } else { loc };
        if resolved < 0 || resolved as usize > len {
            tessera_bail!(OutOfBounds: loc, 0, len);
        }
        let (left_item, right_item) = self.validate_fill_item(&item)?;

        let mut lefts = self.left.to_scalars();
        let mut rights = self.right.to_scalars();
        lefts.insert(resolved as usize, left_item);
        rights.insert(resolved as usize, right_item);
        self.rebuild_with(&lefts, &rights, item.is_none())
    }

    /// Masked replacement producing a new index. A no-op mask returns a
    /// plain copy.
    pub fn putmask(&self, mask: &[bool], value: Option<Interval>) -> TesseraResult<Self> {
        if mask.len() != self.len() {
            tessera_bail!(InvalidArgument: "putmask mask length {} does not match index length {}", mask.len(), self.len());
        }
        if !mask.iter().any(|&hit| hit) {
            return Ok(self.copy());
        }
        let (left_item, right_item) = self.validate_fill_item(&value)?;

        let mut lefts = self.left.to_scalars();
        let mut rights = self.right.to_scalars();
        for (position, &hit) in mask.iter().enumerate() {
            if hit {
                lefts[position] = left_item;
                rights[position] = right_item;
            }
        }
        self.rebuild_with(&lefts, &rights, value.is_none())
    }

    fn validate_fill_item(
        &self,
        item: &Option<Interval>,
    ) -> TesseraResult<(EndpointScalar, EndpointScalar)> {
        match item {
            None => Ok((EndpointScalar::Na, EndpointScalar::Na)),
            Some(interval) => {
                if interval.closed != self.closed {
                    tessera_bail!(InvalidArgument: "inserted interval must be closed on '{}', got '{}'", self.closed, interval.closed);
                }
                if !interval.is_na() {
                    self.codomain_key(&interval.left)?;
                }
                Ok((interval.left, interval.right))
            }
        }
    }

    fn rebuild_with(
        &self,
        lefts: &[EndpointScalar],
        rights: &[EndpointScalar],
        introduces_na: bool,
    ) -> TesseraResult<Self> {
        let widens = introduces_na
            || lefts
                .iter()
                .chain(rights)
                .any(|scalar| matches!(scalar, EndpointScalar::Float(_)));
        let subtype = if widens && self.subtype() == EndpointType::Int64 {
            // integers have no NA representation and do not hold floats
            EndpointType::Float64
        } else {
            self.subtype()
        };
        let promote = |scalars: &[EndpointScalar]| -> TesseraResult<EndpointArray> {
            EndpointArray::from_scalars_with(subtype, scalars)
        };
        Ok(Self::new_unchecked(
            promote(lefts)?,
            promote(rights)?,
            self.closed,
            self.name.clone(),
        ))
    }

    /// Cast the endpoint subtype; only numeric widening is supported.
    pub fn astype(&self, subtype: EndpointType) -> TesseraResult<Self> {
        Ok(Self::new_unchecked(
            self.left.astype(subtype)?,
            self.right.astype(subtype)?,
            self.closed,
            self.name.clone(),
        ))
    }

    // -----------------------------------------------------------------
    // Persistence hooks

    pub fn into_parts(self) -> IntervalIndexParts {
        IntervalIndexParts {
            left: self.left,
            right: self.right,
            closed: self.closed,
            name: self.name,
        }
    }

    pub fn from_parts(parts: IntervalIndexParts) -> TesseraResult<Self> {
        Ok(Self::from_arrays(parts.left, parts.right, parts.closed)?.with_name(parts.name))
    }
}

impl Clone for IntervalOrderedIndex {
    fn clone(&self) -> Self {
        Self::new_unchecked(
            self.left.clone(),
            self.right.clone(),
            self.closed,
            self.name.clone(),
        )
    }
}

impl Debug for IntervalOrderedIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalOrderedIndex")
            .field("left", &self.left)
            .field("right", &self.right)
            .field("closed", &self.closed)
            .field("name", &self.name)
            .finish()
    }
}

fn to_f64(codomain: Codomain) -> Vec<f64> {
    match codomain {
        Codomain::I64(values) => values.into_iter().map(|value| value as f64).collect(),
        Codomain::F64(values) => values,
    }
}

/// Compact a multi-match mask to a slice when the hits are contiguous.
fn compact_mask(mask: Vec<bool>) -> LocResult {
    let first = mask.iter().position(|&hit| hit);
    let last = mask.iter().rposition(|&hit| hit);
    if let (Some(start), Some(stop)) = (first, last) {
        if mask[start..=stop].iter().all(|&hit| hit) {
            return LocResult::Slice {
                start,
                stop: stop + 1,
            };
        }
    }
    LocResult::Mask(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn right_closed(tuples: &[(i64, i64)]) -> IntervalOrderedIndex {
        let tuples: Vec<_> = tuples
            .iter()
            .map(|&(l, r)| Some((EndpointScalar::Int(l), EndpointScalar::Int(r))))
            .collect();
        IntervalOrderedIndex::from_tuples(&tuples, ClosedSide::Right).unwrap()
    }

    fn interval(l: i64, r: i64, closed: ClosedSide) -> Interval {
        Interval::try_new(EndpointScalar::Int(l), EndpointScalar::Int(r), closed).unwrap()
    }

    #[test]
    fn construction_verifies_integrity() {
        let err = IntervalOrderedIndex::from_arrays(
            EndpointArray::from_i64(vec![2]),
            EndpointArray::from_i64(vec![1]),
            ClosedSide::Right,
        )
        .unwrap_err();
        assert!(err.to_string().contains("left side"));

        let err = IntervalOrderedIndex::from_arrays(
            EndpointArray::from_f64(vec![1.0, f64::NAN]),
            EndpointArray::from_f64(vec![2.0, 3.0]),
            ClosedSide::Right,
        )
        .unwrap_err();
        assert!(err.to_string().contains("only one side"));
    }

    #[test]
    fn breaks_make_adjacent_intervals() {
        let index = IntervalOrderedIndex::from_breaks(
            EndpointArray::from_i64(vec![0, 1, 2, 3]),
            ClosedSide::Right,
        )
        .unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.interval_at(1).unwrap().unwrap(),
            interval(1, 2, ClosedSide::Right)
        );
    }

    #[test]
    fn get_loc_point_and_interval() {
        // [(0,1], (1,2], (2,3]]
        let index = right_closed(&[(0, 1), (1, 2), (2, 3)]);
        assert_eq!(
            index
                .get_loc(&IntervalOrPoint::Point(EndpointScalar::Int(1)))
                .unwrap(),
            LocResult::At(0)
        );
        assert_eq!(
            index
                .get_loc(&IntervalOrPoint::Point(EndpointScalar::Float(1.5)))
                .unwrap(),
            LocResult::At(1)
        );
        assert_eq!(
            index
                .get_loc(&IntervalOrPoint::Interval(interval(0, 1, ClosedSide::Right)))
                .unwrap(),
            LocResult::At(0)
        );
        assert!(
            index
                .get_loc(&IntervalOrPoint::Point(EndpointScalar::Int(5)))
                .unwrap_err()
                .is_key_not_found()
        );
        // closedness must match for interval keys
        assert!(
            index
                .get_loc(&IntervalOrPoint::Interval(interval(0, 1, ClosedSide::Left)))
                .unwrap_err()
                .is_key_not_found()
        );
    }

    #[test]
    fn get_loc_multiple_matches_compact_to_slices() {
        // (0,2] and (1,3] both contain 2; positions 0 and 1 are contiguous
        let index = right_closed(&[(0, 2), (1, 3), (4, 5)]);
        assert_eq!(
            index
                .get_loc(&IntervalOrPoint::Point(EndpointScalar::Int(2)))
                .unwrap(),
            LocResult::Slice { start: 0, stop: 2 }
        );

        // scattered matches stay a mask
        let scattered = right_closed(&[(0, 2), (5, 6), (1, 3)]);
        assert_eq!(
            scattered
                .get_loc(&IntervalOrPoint::Point(EndpointScalar::Int(2)))
                .unwrap(),
            LocResult::Mask(vec![true, false, true])
        );
    }

    #[test]
    fn contains_catches_the_miss() {
        let index = right_closed(&[(0, 1), (1, 2)]);
        assert!(index.contains(&interval(0, 1, ClosedSide::Right)));
        assert!(!index.contains(&interval(7, 9, ClosedSide::Right)));
    }

    #[test]
    fn overlap_and_uniqueness_flags() {
        let overlapping = right_closed(&[(0, 2), (1, 3), (4, 5)]);
        assert!(overlapping.is_overlapping());
        assert!(overlapping.is_unique());
        assert!(!overlapping.is_non_overlapping_monotonic());

        let disjoint = right_closed(&[(0, 1), (1, 2), (2, 3)]);
        assert!(!disjoint.is_overlapping());
        assert!(disjoint.is_non_overlapping_monotonic());
        assert!(disjoint.is_monotonic_increasing());

        let duplicated = right_closed(&[(0, 1), (0, 1)]);
        assert!(!duplicated.is_unique());
    }

    #[test]
    fn indexer_on_equal_indexes_is_identity() {
        let index = right_closed(&[(0, 1), (1, 2), (2, 3)]);
        let same = right_closed(&[(0, 1), (1, 2), (2, 3)]);
        assert_eq!(
            index.get_indexer(&Target::Intervals(&same)).unwrap(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn indexer_with_mismatched_closedness_is_all_missing() {
        let index = right_closed(&[(0, 1), (1, 2)]);
        let tuples: Vec<_> = [(0, 1), (1, 2)]
            .iter()
            .map(|&(l, r)| Some((EndpointScalar::Int(l), EndpointScalar::Int(r))))
            .collect();
        let other = IntervalOrderedIndex::from_tuples(&tuples, ClosedSide::Left).unwrap();
        assert_eq!(
            index.get_indexer(&Target::Intervals(&other)).unwrap(),
            vec![-1, -1]
        );
    }

    #[test]
    fn indexer_requires_exact_interval_matches() {
        let index = right_closed(&[(0, 1), (1, 2), (3, 4)]);
        let target = right_closed(&[(1, 2), (0, 2)]);
        assert_eq!(
            index.get_indexer(&Target::Intervals(&target)).unwrap(),
            vec![1, -1]
        );
    }

    #[test]
    fn indexer_resolves_points_through_the_engine() {
        let index = right_closed(&[(0, 1), (1, 2), (2, 3)]);
        let points = EndpointArray::from_f64(vec![0.5, 1.5, 9.0]);
        assert_eq!(
            index.get_indexer(&Target::Points(&points)).unwrap(),
            vec![0, 1, -1]
        );
    }

    #[test]
    fn indexer_rejects_overlapping_indexes() {
        let index = right_closed(&[(0, 2), (1, 3)]);
        let points = EndpointArray::from_i64(vec![1]);
        let err = index.get_indexer(&Target::Points(&points)).unwrap_err();
        assert!(err.to_string().contains("get_indexer_non_unique"));

        let (indexer, missing) = index
            .get_indexer_non_unique(&Target::Points(&points))
            .unwrap();
        assert_eq!(indexer, vec![0]);
        assert!(missing.is_empty());

        let both = EndpointArray::from_i64(vec![2, 9]);
        let (indexer, missing) = index
            .get_indexer_non_unique(&Target::Points(&both))
            .unwrap();
        assert_eq!(indexer, vec![0, 1, -1]);
        assert_eq!(missing, vec![1]);
    }

    #[test]
    fn indexer_broadcasts_through_categories() {
        let index = right_closed(&[(0, 1), (1, 2)]);
        let categories = EndpointArray::from_f64(vec![0.5, 1.5]);
        let codes = vec![1, 0, -1, 1];
        assert_eq!(
            index
                .get_indexer(&Target::Categorical {
                    categories: &categories,
                    codes: &codes
                })
                .unwrap(),
            vec![1, 0, -1, 1]
        );
    }

    #[test]
    fn temporal_subtype_mismatch_is_fatal() {
        let index = IntervalOrderedIndex::from_tuples(
            &[Some((EndpointScalar::Timestamp(0), EndpointScalar::Timestamp(10)))],
            ClosedSide::Right,
        )
        .unwrap();
        let points = EndpointArray::from_i64(vec![5]);
        let err = index.get_indexer(&Target::Points(&points)).unwrap_err();
        assert!(err.to_string().contains("mismatched types"));
    }

    #[test]
    fn searchsorted_shifts_open_bounds() {
        // (0,1], (1,2], (2,3] — label 1 belongs to the first interval
        let index = right_closed(&[(0, 1), (1, 2), (2, 3)]);
        assert_eq!(
            index
                .searchsorted_monotonic(&EndpointScalar::Int(1), SearchSide::Left)
                .unwrap(),
            0
        );
        assert_eq!(
            index
                .searchsorted_monotonic(&EndpointScalar::Int(1), SearchSide::Right)
                .unwrap(),
            1
        );
        let overlapping = right_closed(&[(0, 2), (1, 3)]);
        assert!(
            overlapping
                .searchsorted_monotonic(&EndpointScalar::Int(1), SearchSide::Left)
                .is_err()
        );
    }

    #[test]
    fn insert_and_putmask_build_new_indexes() {
        let index = right_closed(&[(0, 1), (2, 3)]);
        let inserted = index
            .insert(1, Some(interval(1, 2, ClosedSide::Right)))
            .unwrap();
        assert_eq!(inserted.len(), 3);
        assert_eq!(
            inserted.interval_at(1).unwrap().unwrap(),
            interval(1, 2, ClosedSide::Right)
        );
        // the source is untouched
        assert_eq!(index.len(), 2);

        let err = index
            .insert(0, Some(interval(0, 1, ClosedSide::Both)))
            .unwrap_err();
        assert!(err.to_string().contains("closed"));

        let masked = index.putmask(&[false, true], None).unwrap();
        assert_eq!(masked.subtype(), EndpointType::Float64);
        assert!(masked.interval_at(1).unwrap().is_none());

        let noop = index.putmask(&[false, false], None).unwrap();
        assert!(noop.equals(&index));
    }

    #[test]
    fn na_insertion_promotes_integer_endpoints() {
        let index = right_closed(&[(0, 1)]);
        assert_eq!(index.subtype(), EndpointType::Int64);
        let with_na = index.insert(-1, None).unwrap();
        assert_eq!(with_na.subtype(), EndpointType::Float64);
        assert_eq!(with_na.na_count(), 1);
        assert!(with_na.interval_at(1).unwrap().is_none());
    }

    #[test]
    fn parts_round_trip_value_and_attributes() {
        let index = right_closed(&[(0, 1), (1, 2)]).with_name(Some("bins".to_string()));
        let parts = index.clone().into_parts();
        let json = serde_json::to_string(&parts).unwrap();
        let restored: IntervalIndexParts = serde_json::from_str(&json).unwrap();
        let rebuilt = IntervalOrderedIndex::from_parts(restored).unwrap();
        assert!(rebuilt.equals(&index));
        assert_eq!(rebuilt.name(), Some("bins"));
    }

    #[test]
    fn equals_crosses_numeric_subtypes() {
        let ints = right_closed(&[(0, 1), (1, 2)]);
        let floats = IntervalOrderedIndex::from_arrays(
            EndpointArray::from_f64(vec![0.0, 1.0]),
            EndpointArray::from_f64(vec![1.0, 2.0]),
            ClosedSide::Right,
        )
        .unwrap();
        assert!(ints.equals(&floats));
    }
}
