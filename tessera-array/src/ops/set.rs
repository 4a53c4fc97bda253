use arrow_array::{Array, ArrayRef, BooleanArray, Scalar as ArrowScalar, new_null_array};
use arrow_buffer::BooleanBuffer;
use arrow_select::concat::concat;
use arrow_select::interleave::interleave;
use arrow_select::zip::zip;
use tessera_error::{TesseraResult, tessera_bail};

use crate::{
    ChunkedColumnArray, Key, LogicalType, Scalar, array_from_scalars, fallback_warning,
    kernel_capabilities, key_to_indices, scalar_from_array,
};

/// The right-hand side of an indexed write: one scalar broadcast over every
/// addressed position, or one value per position.
#[derive(Debug, Clone)]
pub enum SetValue {
    Scalar(Scalar),
    Sequence(Vec<Scalar>),
}

impl ChunkedColumnArray {
    /// Set one or more values by position.
    ///
    /// The key resolves to positions, the positions are sorted (reordering a
    /// sequence value with the same permutation), and the chunks are
    /// rewritten in one pass that preserves the chunk-length layout exactly.
    /// The old chunk list stays in place until the full replacement exists,
    /// so a failed write is not observable.
    pub fn set(&mut self, key: &Key, value: SetValue) -> TesseraResult<()> {
        let positions = key_to_indices(key, self.len())?;

        let mut order: Vec<usize> = (0..positions.len()).collect();
        order.sort_by_key(|&slot| positions[slot]);

        let values: Vec<Scalar> = match value {
            SetValue::Scalar(scalar) => vec![scalar; positions.len()],
            SetValue::Sequence(values) => {
                if values.len() != positions.len() {
                    tessera_bail!(InvalidArgument: "length of indexer and values mismatch: {} vs {}", positions.len(), values.len());
                }
                order.iter().map(|&slot| values[slot].clone()).collect()
            }
        };
        let sorted: Vec<usize> = order.iter().map(|&slot| positions[slot]).collect();
        let (sorted, values) = dedup_last_write(sorted, values);

        let new_chunks = self.rewrite_chunks(&sorted, &values)?;
        self.replace_chunks(new_chunks);
        Ok(())
    }

    /// Walk the chunks with a cursor, consuming the sorted positions that
    /// fall inside each chunk and rebuilding only the touched chunks.
    fn rewrite_chunks(
        &self,
        positions: &[usize],
        values: &[Scalar],
    ) -> TesseraResult<Vec<ArrayRef>> {
        let mut remaining_positions = positions;
        let mut remaining_values = values;
        let mut new_chunks = Vec::with_capacity(self.nchunks());
        let mut stop = 0usize;
        for chunk in self.chunks() {
            let (start, end) = (stop, stop + chunk.len());
            stop = end;
            if remaining_positions.is_empty() || end <= remaining_positions[0] {
                new_chunks.push(chunk.clone());
                continue;
            }
            let in_chunk = remaining_positions.partition_point(|&position| position < end);
            let local: Vec<usize> = remaining_positions[..in_chunk]
                .iter()
                .map(|&position| position - start)
                .collect();
            remaining_positions = &remaining_positions[in_chunk..];
            let (chunk_values, rest) = remaining_values.split_at(in_chunk);
            remaining_values = rest;
            new_chunks.push(replace_with_indices(
                chunk,
                &local,
                chunk_values,
                self.dtype(),
            )?);
        }
        Ok(new_chunks)
    }
}

/// Keep only the last write to each position. Positions must be sorted; the
/// stable sort upstream guarantees the last duplicate is the latest write.
fn dedup_last_write(positions: Vec<usize>, values: Vec<Scalar>) -> (Vec<usize>, Vec<Scalar>) {
    let mut out_positions: Vec<usize> = Vec::with_capacity(positions.len());
    let mut out_values: Vec<Scalar> = Vec::with_capacity(values.len());
    for (position, value) in positions.into_iter().zip(values) {
        if out_positions.last() == Some(&position) {
            let last = out_values.len() - 1;
            out_values[last] = value;
        } else {
            out_positions.push(position);
            out_values.push(value);
        }
    }
    (out_positions, out_values)
}

/// Replace the chunk values selected by sorted chunk-local indices.
///
/// Analogous to the engine's replace-with-mask, except positions arrive as
/// indices. A perfectly contiguous run slices and concatenates without
/// materializing a mask; an all-NA replacement nulls the positions directly.
fn replace_with_indices(
    chunk: &ArrayRef,
    indices: &[usize],
    values: &[Scalar],
    dtype: &LogicalType,
) -> TesseraResult<ArrayRef> {
    let n = indices.len();
    if n == 0 {
        return Ok(chunk.clone());
    }

    let (start, stop) = (indices[0], indices[n - 1]);
    if stop - start == n - 1 {
        // fast path for a contiguous run of indices
        let replacement = array_from_scalars(dtype, values)?;
        let mut parts: Vec<ArrayRef> = Vec::with_capacity(3);
        if start > 0 {
            parts.push(chunk.slice(0, start));
        }
        parts.push(replacement);
        if stop + 1 < chunk.len() {
            parts.push(chunk.slice(stop + 1, chunk.len() - stop - 1));
        }
        if parts.len() == 1 {
            return Ok(parts.swap_remove(0));
        }
        let refs: Vec<&dyn Array> = parts.iter().map(|part| part.as_ref()).collect();
        return Ok(concat(&refs)?);
    }

    if !kernel_capabilities().masked_replace {
        fallback_warning("set");
        let mut scalars: Vec<Scalar> = (0..chunk.len())
            .map(|offset| scalar_from_array(chunk.as_ref(), offset, dtype))
            .collect();
        for (slot, &index) in indices.iter().enumerate() {
            scalars[index] = values[slot].clone();
        }
        return array_from_scalars(dtype, &scalars);
    }

    if values.iter().all(Scalar::is_na) {
        let mask_bits = BooleanBuffer::collect_bool(chunk.len(), |offset| {
            indices.binary_search(&offset).is_ok()
        });
        let mask = BooleanArray::new(mask_bits, None);
        let nulls = ArrowScalar::new(new_null_array(chunk.data_type(), 1));
        return Ok(zip(&mask, &nulls, chunk)?);
    }

    let replacement = array_from_scalars(dtype, values)?;
    let mut pairs = Vec::with_capacity(chunk.len());
    let mut next = 0usize;
    for offset in 0..chunk.len() {
        if next < n && indices[next] == offset {
            pairs.push((1, next));
            next += 1;
        } else {
            pairs.push((0, offset));
        }
    }
    Ok(interleave(&[chunk.as_ref(), replacement.as_ref()], &pairs)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::Int64Array;

    use super::*;

    fn chunked(values: &[&[i64]]) -> ChunkedColumnArray {
        let chunks: Vec<ArrayRef> = values
            .iter()
            .map(|chunk| Arc::new(Int64Array::from(chunk.to_vec())) as ArrayRef)
            .collect();
        ChunkedColumnArray::from_chunked(chunks).unwrap()
    }

    fn chunk_lengths(array: &ChunkedColumnArray) -> Vec<usize> {
        array.chunks().iter().map(|chunk| chunk.len()).collect()
    }

    #[test]
    fn set_preserves_the_chunk_layout() {
        let mut array = chunked(&[&[1, 2], &[3, 4, 5], &[6]]);
        let before = chunk_lengths(&array);
        array
            .set(&Key::Indices(vec![1, 3, 5]), SetValue::Scalar(Scalar::Int(0)))
            .unwrap();
        assert_eq!(chunk_lengths(&array), before);
        assert_eq!(
            array.to_scalars(),
            vec![
                Scalar::Int(1),
                Scalar::Int(0),
                Scalar::Int(3),
                Scalar::Int(0),
                Scalar::Int(5),
                Scalar::Int(0)
            ]
        );
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut array = chunked(&[&[1, 2, 3]]);
        array.set(&Key::At(1), SetValue::Scalar(Scalar::Int(9))).unwrap();
        assert_eq!(array.scalar_at(1).unwrap(), Scalar::Int(9));
    }

    #[test]
    fn sequence_values_follow_the_sort_permutation() {
        let mut array = chunked(&[&[0, 0, 0, 0]]);
        array
            .set(
                &Key::Indices(vec![2, 0]),
                SetValue::Sequence(vec![Scalar::Int(20), Scalar::Int(10)]),
            )
            .unwrap();
        assert_eq!(
            array.to_scalars(),
            vec![
                Scalar::Int(10),
                Scalar::Int(0),
                Scalar::Int(20),
                Scalar::Int(0)
            ]
        );
    }

    #[test]
    fn sequence_length_must_match() {
        let mut array = chunked(&[&[1, 2, 3]]);
        let err = array
            .set(
                &Key::Indices(vec![0, 1]),
                SetValue::Sequence(vec![Scalar::Int(1)]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("mismatch"));
        // failed writes leave the array untouched
        assert_eq!(
            array.to_scalars(),
            vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]
        );
    }

    #[test]
    fn contiguous_runs_use_slice_and_concat() {
        let mut array = chunked(&[&[1, 2, 3, 4, 5]]);
        array
            .set(
                &Key::Slice {
                    start: Some(1),
                    stop: Some(4),
                    step: 1,
                },
                SetValue::Scalar(Scalar::Int(7)),
            )
            .unwrap();
        assert_eq!(
            array.to_scalars(),
            vec![
                Scalar::Int(1),
                Scalar::Int(7),
                Scalar::Int(7),
                Scalar::Int(7),
                Scalar::Int(5)
            ]
        );
        assert_eq!(array.nchunks(), 1);
    }

    #[test]
    fn all_na_values_null_the_selected_positions() {
        let mut array = chunked(&[&[1, 2, 3, 4]]);
        array
            .set(&Key::Indices(vec![0, 2]), SetValue::Scalar(Scalar::Null))
            .unwrap();
        assert_eq!(
            array.to_scalars(),
            vec![Scalar::Null, Scalar::Int(2), Scalar::Null, Scalar::Int(4)]
        );
    }

    #[test]
    fn mask_keys_write_the_selected_positions() {
        let mut array = chunked(&[&[1, 2], &[3, 4]]);
        let mask = BooleanArray::from(vec![false, true, true, false]);
        array
            .set(&Key::Mask(mask), SetValue::Scalar(Scalar::Int(0)))
            .unwrap();
        assert_eq!(
            array.to_scalars(),
            vec![Scalar::Int(1), Scalar::Int(0), Scalar::Int(0), Scalar::Int(4)]
        );
    }

    #[test]
    fn duplicate_positions_take_the_last_write() {
        let mut array = chunked(&[&[0, 0]]);
        array
            .set(
                &Key::Indices(vec![1, 1]),
                SetValue::Sequence(vec![Scalar::Int(5), Scalar::Int(6)]),
            )
            .unwrap();
        assert_eq!(array.to_scalars(), vec![Scalar::Int(0), Scalar::Int(6)]);
    }
}
