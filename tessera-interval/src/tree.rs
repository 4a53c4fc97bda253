use std::cmp::Ordering;

use crate::ClosedSide;

/// Values the tree can be built over: the signed 64-bit tick codomain, or
/// floats when NaN has to stand in for missing endpoints.
pub(crate) trait TreeValue: Copy + PartialOrd + std::fmt::Debug {
    fn is_na(self) -> bool;
    fn order(self, other: Self) -> Ordering;
    fn midpoint(self, other: Self) -> Self;
}

impl TreeValue for i64 {
    fn is_na(self) -> bool {
        false
    }

    fn order(self, other: Self) -> Ordering {
        self.cmp(&other)
    }

    fn midpoint(self, other: Self) -> Self {
        ((self as i128 + other as i128) / 2) as i64
    }
}

impl TreeValue for f64 {
    fn is_na(self) -> bool {
        self.is_nan()
    }

    fn order(self, other: Self) -> Ordering {
        self.total_cmp(&other)
    }

    fn midpoint(self, other: Self) -> Self {
        self * 0.5 + other * 0.5
    }
}

/// What a query is probing for: an exact codomain value, or a point known to
/// lie strictly between two consecutive codomain values (a fractional lookup
/// against an integer tree). A between-probe can never sit on an endpoint,
/// so closedness does not affect it.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Probe<T> {
    Exact(T),
    Between(T, T),
}

impl<T: TreeValue> Probe<T> {
    fn lt(&self, pivot: T) -> bool {
        match self {
            Self::Exact(value) => value.order(pivot) == Ordering::Less,
            Self::Between(_, hi) => hi.order(pivot) != Ordering::Greater,
        }
    }

    fn gt(&self, pivot: T) -> bool {
        match self {
            Self::Exact(value) => value.order(pivot) == Ordering::Greater,
            Self::Between(lo, _) => lo.order(pivot) != Ordering::Less,
        }
    }

    fn left_bound(&self) -> T {
        match self {
            Self::Exact(value) => *value,
            Self::Between(lo, _) => *lo,
        }
    }

    fn right_bound(&self) -> T {
        match self {
            Self::Exact(value) => *value,
            Self::Between(_, hi) => *hi,
        }
    }

    fn contained_in(&self, left: T, right: T, closed: ClosedSide) -> bool {
        match self {
            Self::Exact(value) => {
                let left_ok = match left.order(*value) {
                    Ordering::Less => true,
                    Ordering::Equal => closed.closed_left(),
                    Ordering::Greater => false,
                };
                let right_ok = match value.order(right) {
                    Ordering::Less => true,
                    Ordering::Equal => closed.closed_right(),
                    Ordering::Greater => false,
                };
                left_ok && right_ok
            }
            Self::Between(lo, hi) => {
                left.order(*lo) != Ordering::Greater && hi.order(right) != Ordering::Greater
            }
        }
    }
}

struct Node<T> {
    pivot: T,
    /// Intervals crossing the pivot, sorted by left ascending.
    by_left: Vec<(T, T, usize)>,
    /// The same intervals, sorted by right descending.
    by_right: Vec<(T, T, usize)>,
    left: Option<Box<Node<T>>>,
    right: Option<Box<Node<T>>>,
}

/// A centered interval tree over one index's (left, right) pairs.
/// Intervals with an NA endpoint are excluded at build time; they can never
/// satisfy a containment query.
pub(crate) struct IntervalTree<T> {
    closed: ClosedSide,
    root: Option<Box<Node<T>>>,
}

impl<T: TreeValue> IntervalTree<T> {
    pub fn new(left: &[T], right: &[T], closed: ClosedSide) -> Self {
        let items: Vec<(T, T, usize)> = left
            .iter()
            .zip(right)
            .enumerate()
            .filter(|(_, (l, r))| !l.is_na() && !r.is_na())
            .map(|(position, (&l, &r))| (l, r, position))
            .collect();
        Self {
            closed,
            root: build(items),
        }
    }

    /// Positions of all intervals containing the probe, ascending.
    pub fn query(&self, probe: &Probe<T>) -> Vec<usize> {
        let mut matches = Vec::new();
        if let Some(root) = &self.root {
            visit(root, probe, self.closed, &mut matches);
        }
        matches.sort_unstable();
        matches
    }
}

fn build<T: TreeValue>(mut items: Vec<(T, T, usize)>) -> Option<Box<Node<T>>> {
    if items.is_empty() {
        return None;
    }
    items.sort_by(|a, b| a.0.order(b.0));
    let median = items[items.len() / 2];
    // The pivot lies inside the median interval, so the center set is never
    // empty and both halves strictly shrink.
    let pivot = median.0.midpoint(median.1);

    let mut lefts = Vec::new();
    let mut rights = Vec::new();
    let mut center = Vec::new();
    for item in items {
        if item.1.order(pivot) == Ordering::Less {
            lefts.push(item);
        } else if item.0.order(pivot) == Ordering::Greater {
            rights.push(item);
        } else {
            center.push(item);
        }
    }

    let mut by_left = center.clone();
    by_left.sort_by(|a, b| a.0.order(b.0));
    let mut by_right = center;
    by_right.sort_by(|a, b| b.1.order(a.1));

    Some(Box::new(Node {
        pivot,
        by_left,
        by_right,
        left: build(lefts),
        right: build(rights),
    }))
}

fn visit<T: TreeValue>(node: &Node<T>, probe: &Probe<T>, closed: ClosedSide, out: &mut Vec<usize>) {
    if probe.lt(node.pivot) {
        for &(left, right, position) in &node.by_left {
            if left.order(probe.left_bound()) == Ordering::Greater {
                break;
            }
            if probe.contained_in(left, right, closed) {
                out.push(position);
            }
        }
        if let Some(child) = &node.left {
            visit(child, probe, closed, out);
        }
    } else if probe.gt(node.pivot) {
        for &(left, right, position) in &node.by_right {
            if right.order(probe.right_bound()) == Ordering::Less {
                break;
            }
            if probe.contained_in(left, right, closed) {
                out.push(position);
            }
        }
        if let Some(child) = &node.right {
            visit(child, probe, closed, out);
        }
    } else {
        // The probe sits exactly on the pivot; children lie strictly on one
        // side of it and cannot match.
        for &(left, right, position) in &node.by_left {
            if left.order(probe.left_bound()) == Ordering::Greater {
                break;
            }
            if probe.contained_in(left, right, closed) {
                out.push(position);
            }
        }
    }
}

/// Whether any two intervals share a point, honoring closedness: touching
/// endpoints overlap only when both touching sides are closed.
pub(crate) fn pairs_overlap<T: TreeValue>(pairs: &[(T, T)], closed: ClosedSide) -> bool {
    let mut sorted: Vec<(T, T)> = pairs
        .iter()
        .filter(|(l, r)| !l.is_na() && !r.is_na())
        .copied()
        .collect();
    sorted.sort_by(|a, b| a.0.order(b.0).then(a.1.order(b.1)));
    let mut max_right: Option<T> = None;
    for (left, right) in sorted {
        if let Some(seen) = max_right {
            match left.order(seen) {
                Ordering::Less => return true,
                Ordering::Equal if closed.closed_left() && closed.closed_right() => return true,
                _ => {}
            }
        }
        max_right = Some(match max_right {
            Some(seen) if seen.order(right) == Ordering::Greater => seen,
            _ => right,
        });
    }
    false
}

/// The tree over whichever codomain the index reduced to.
pub(crate) enum Engine {
    I64(IntervalTree<i64>),
    F64(IntervalTree<f64>),
}

/// One query key in the engine codomain. `Missing` never matches.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CodomainKey {
    Missing,
    I(i64),
    F(f64),
}

impl Engine {
    pub fn query(&self, key: &CodomainKey) -> Vec<usize> {
        match (self, key) {
            (_, CodomainKey::Missing) => Vec::new(),
            (Self::I64(tree), CodomainKey::I(value)) => tree.query(&Probe::Exact(*value)),
            (Self::I64(tree), CodomainKey::F(value)) => {
                if value.is_nan() {
                    return Vec::new();
                }
                if value.fract() == 0.0
                    && *value >= i64::MIN as f64
                    && *value <= i64::MAX as f64
                {
                    return tree.query(&Probe::Exact(*value as i64));
                }
                let floor = value.floor();
                if floor < i64::MIN as f64 || floor >= i64::MAX as f64 {
                    return Vec::new();
                }
                tree.query(&Probe::Between(floor as i64, floor as i64 + 1))
            }
            (Self::F64(tree), CodomainKey::I(value)) => tree.query(&Probe::Exact(*value as f64)),
            (Self::F64(tree), CodomainKey::F(value)) => {
                if value.is_nan() {
                    Vec::new()
                } else {
                    tree.query(&Probe::Exact(*value))
                }
            }
        }
    }
}
