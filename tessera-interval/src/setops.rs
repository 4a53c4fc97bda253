use rustc_hash::FxHashSet;
use tessera_error::{TesseraResult, tessera_bail};

use crate::endpoint::Atom;
use crate::{EndpointArray, EndpointScalar, IntervalOrderedIndex};

fn is_na_pair(pair: &(Atom, Atom)) -> bool {
    matches!(pair, (Atom::Na, _) | (_, Atom::Na))
}

impl IntervalOrderedIndex {
    /// Validate operands and promote numeric subtypes to a common kind.
    /// Set operations require matching closedness.
    fn setop_operands(&self, other: &Self) -> TesseraResult<(Self, Self, Option<String>)> {
        if self.closed() != other.closed() {
            tessera_bail!(InvalidArgument: "can only do set operations between interval indexes closed on the same side");
        }
        if !self.comparable_with(other) {
            tessera_bail!(MismatchedTypes: self.subtype(), other.subtype());
        }
        let name = if self.name() == other.name() {
            self.name().map(String::from)
        } else {
            None
        };
        let (lhs, rhs) = self.promoted_with(other)?;
        Ok((lhs, rhs, name))
    }

    /// Intervals present in both indexes. With `sort`, the result is in
    /// (left, right) order, NA last.
    ///
    /// Dispatch: a unique-endpoint side uses the positional endpoint-indexer
    /// fast path (swapping operands when only the other side qualifies and
    /// self holds at most one NA); otherwise a pairwise membership scan over
    /// (left, right) pairs.
    pub fn intersection(&self, other: &Self, sort: bool) -> TesseraResult<Self> {
        let (lhs, rhs, name) = self.setop_operands(other)?;
        let taken = if lhs.left().is_unique() && lhs.right().is_unique() {
            lhs.intersection_unique(&rhs)
        } else if rhs.left().is_unique() && rhs.right().is_unique() && lhs.na_count() <= 1 {
            rhs.intersection_unique(&lhs)
        } else {
            lhs.intersection_non_unique(&rhs)
        };
        let taken = if sort { taken.sort_values() } else { taken };
        Ok(taken.with_name(name))
    }

    /// Fast path: both endpoint arrays of `self` are individually unique, so
    /// a positional indexer per side identifies exact pair matches.
    fn intersection_unique(&self, other: &Self) -> Self {
        let left_indexer = self.left().get_indexer(other.left());
        let right_indexer = self.right().get_indexer(other.right());

        let mut seen = FxHashSet::default();
        let mut positions = Vec::new();
        for (l, r) in left_indexer.into_iter().zip(right_indexer) {
            if l == r && l != -1 && seen.insert(l) {
                positions.push(l as usize);
            }
        }
        self.take(&positions)
    }

    /// Duplicate-tolerant path: membership of self's (left, right) pairs in
    /// other's pair set. NA pairs never match through the set; when both
    /// sides carry NAs, exactly the first self-NA position matches instead,
    /// which keeps NA-pair matching from multiplying.
    fn intersection_non_unique(&self, other: &Self) -> Self {
        let mut mask = vec![false; self.len()];
        if self.na_count() > 0 && other.na_count() > 0 {
            if let Some(first_na) = (0..self.len()).find(|&index| self.left().is_na_at(index)) {
                mask[first_na] = true;
            }
        }

        let other_pairs: FxHashSet<(Atom, Atom)> = other
            .pair_keys()
            .iter()
            .filter(|pair| !is_na_pair(pair))
            .copied()
            .collect();
        for (index, pair) in self.pair_keys().iter().enumerate() {
            if !is_na_pair(pair) && other_pairs.contains(pair) {
                mask[index] = true;
            }
        }

        let positions: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|&(_, &hit)| hit)
            .map(|(position, _)| position)
            .collect();
        self.take(&positions)
    }

    /// Distinct intervals of either index: self's in order, then other's
    /// that self does not hold. NA intervals collapse to one entry.
    pub fn union(&self, other: &Self, sort: bool) -> TesseraResult<Self> {
        let (lhs, rhs, name) = self.setop_operands(other)?;
        let mut seen: FxHashSet<(Atom, Atom)> = FxHashSet::default();
        let mut lefts: Vec<EndpointScalar> = Vec::new();
        let mut rights: Vec<EndpointScalar> = Vec::new();
        for (source, pairs) in [(&lhs, lhs.pair_keys()), (&rhs, rhs.pair_keys())] {
            for (index, pair) in pairs.iter().enumerate() {
                if seen.insert(*pair) {
                    lefts.push(source.left().get(index));
                    rights.push(source.right().get(index));
                }
            }
        }
        let result = Self::from_arrays(
            EndpointArray::from_scalars_with(lhs.subtype(), &lefts)?,
            EndpointArray::from_scalars_with(lhs.subtype(), &rights)?,
            lhs.closed(),
        )?;
        let result = if sort { result.sort_values() } else { result };
        Ok(result.with_name(name))
    }

    /// Distinct intervals of self that other does not hold. An NA interval
    /// in other removes self's NA entries.
    pub fn difference(&self, other: &Self, sort: bool) -> TesseraResult<Self> {
        let (lhs, rhs, name) = self.setop_operands(other)?;
        let rhs_pairs: FxHashSet<(Atom, Atom)> = rhs.pair_keys().iter().copied().collect();
        let mut seen = FxHashSet::default();
        let mut positions = Vec::new();
        for (index, pair) in lhs.pair_keys().iter().enumerate() {
            if !rhs_pairs.contains(pair) && seen.insert(*pair) {
                positions.push(index);
            }
        }
        let result = lhs.take(&positions);
        let result = if sort { result.sort_values() } else { result };
        Ok(result.with_name(name))
    }
}
