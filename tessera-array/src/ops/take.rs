use arrow_array::{Array, Int64Array, UInt64Array};
use arrow_select::take::take as arrow_take;
use itertools::Itertools;
use tessera_error::{TesseraResult, tessera_bail};

use crate::{ChunkedColumnArray, Key, Scalar, SetValue};

impl ChunkedColumnArray {
    /// Indexed copy with fill semantics.
    ///
    /// With `allow_fill=false`, negative indices count from the end. With
    /// `allow_fill=true`, `-1` marks output positions to be filled with
    /// `fill_value` (the type's NA when `None`) and no other negative value
    /// is accepted. Out-of-range indices fail; nothing is clipped.
    pub fn take(
        &self,
        indices: &[i64],
        allow_fill: bool,
        fill_value: Option<Scalar>,
    ) -> TesseraResult<Self> {
        let len = self.len();
        if len == 0 {
            if let Some(&bad) = indices.iter().find(|&&index| index >= 0) {
                // cannot do a non-empty take
                tessera_bail!(OutOfBounds: bad, 0, 0);
            }
        }
        if let Some(&max) = indices.iter().max() {
            if max >= len as i64 {
                tessera_bail!(OutOfBounds: max, 0, len);
            }
        }

        if allow_fill {
            if let Some(&bad) = indices.iter().find(|&&index| index < -1) {
                tessera_bail!(InvalidArgument: "take with allow_fill requires indices >= -1, got {bad}");
            }
            if indices.iter().all(|&index| index >= 0) {
                let positions: Vec<usize> = indices.iter().map(|&index| index as usize).collect();
                return self.take_positions(&positions);
            }
            return self.take_with_fill(indices, fill_value);
        }

        let positions: Vec<usize> = indices
            .iter()
            .map(|&index| {
                let wrapped = if index < 0 { index + len as i64 } else { index };
                if wrapped < 0 {
                    tessera_bail!(OutOfBounds: index, 0, len);
                }
                Ok(wrapped as usize)
            })
            .try_collect()?;
        self.take_positions(&positions)
    }

    /// Chunk-grouped take: while the owning chunk stays the same, accumulate
    /// chunk-local indices, then take from that chunk. Positions must be in
    /// bounds.
    pub(crate) fn take_positions(&self, positions: &[usize]) -> TesseraResult<Self> {
        if positions.is_empty() {
            return Ok(Self::empty(self.dtype().clone()));
        }
        let mut chunks = Vec::new();
        let mut indices_in_chunk: Vec<u64> = Vec::new();
        let mut prev_chunk_idx = self.find_chunk_idx(positions[0]).0;
        for &position in positions {
            let (chunk_idx, offset) = self.find_chunk_idx(position);
            if chunk_idx != prev_chunk_idx {
                let chunk_indices = UInt64Array::from(std::mem::take(&mut indices_in_chunk));
                chunks.push(arrow_take(
                    self.chunks()[prev_chunk_idx].as_ref(),
                    &chunk_indices,
                    None,
                )?);
            }
            indices_in_chunk.push(offset as u64);
            prev_chunk_idx = chunk_idx;
        }
        if !indices_in_chunk.is_empty() {
            let chunk_indices = UInt64Array::from(indices_in_chunk);
            chunks.push(arrow_take(
                self.chunks()[prev_chunk_idx].as_ref(),
                &chunk_indices,
                None,
            )?);
        }
        Ok(Self::new_unchecked(chunks, self.dtype().clone()))
    }

    /// The masked engine take: `-1` positions become null indices, which the
    /// engine turns into null outputs; a non-NA fill value is then written
    /// over those positions.
    fn take_with_fill(&self, indices: &[i64], fill_value: Option<Scalar>) -> TesseraResult<Self> {
        let fill = fill_value.unwrap_or(Scalar::Null);

        if indices.iter().all(|&index| index < 0) {
            // Nothing to index, including from an empty array.
            let scalars = vec![fill; indices.len()];
            return Self::from_sequence(&scalars, Some(self.dtype().clone()));
        }

        let canonical = self.canonical()?;
        let masked: Int64Array = indices
            .iter()
            .map(|&index| (index >= 0).then_some(index))
            .collect();
        let taken = arrow_take(canonical.as_ref(), &masked, None)?;
        let mut result = Self::new_unchecked(vec![taken], self.dtype().clone());
        if !fill.is_na() {
            let fill_positions: Vec<i64> = indices
                .iter()
                .enumerate()
                .filter(|&(_, &index)| index < 0)
                .map(|(position, _)| position as i64)
                .collect();
            result.set(&Key::Indices(fill_positions), SetValue::Scalar(fill))?;
        }
        Ok(result)
    }
}
