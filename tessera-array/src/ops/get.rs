use arrow_array::{Array, ArrayRef, BooleanArray};
use arrow_select::filter::filter;
use tessera_error::{TesseraResult, tessera_bail};

use crate::{ChunkedColumnArray, Key, Scalar, resolve_position, resolve_slice_bounds};

/// What an indexed read produced: a boxed scalar for scalar keys, a new
/// instance for everything else.
#[derive(Debug)]
pub enum GetResult {
    Scalar(Scalar),
    Array(ChunkedColumnArray),
}

impl GetResult {
    pub fn into_scalar(self) -> Option<Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            Self::Array(_) => None,
        }
    }

    pub fn into_array(self) -> Option<ChunkedColumnArray> {
        match self {
            Self::Array(array) => Some(array),
            Self::Scalar(_) => None,
        }
    }
}

impl ChunkedColumnArray {
    /// Select a subset of the array.
    ///
    /// Scalar keys box the value (nulls become the NA sentinel); every other
    /// key form yields a new instance of the same logical type. An empty
    /// index list short-circuits to an empty instance.
    pub fn get(&self, key: &Key) -> TesseraResult<GetResult> {
        match key {
            Key::Indices(indices) if indices.is_empty() => {
                Ok(GetResult::Array(Self::empty(self.dtype().clone())))
            }
            Key::Indices(indices) => Ok(GetResult::Array(self.take(indices, false, None)?)),
            Key::Mask(mask) => self.filter_mask(mask).map(GetResult::Array),
            Key::At(index) => {
                let position = resolve_position(*index, self.len())?;
                self.scalar_at(position).map(GetResult::Scalar)
            }
            Key::Ellipsis => self.get(&Key::full()),
            Key::Slice { start, stop, step } => {
                if *step < 1 {
                    tessera_bail!(InvalidArgument: "slice step must be positive, got {step}");
                }
                let (start, stop) = resolve_slice_bounds(*start, *stop, self.len());
                if *step == 1 {
                    return Ok(GetResult::Array(self.slice_chunks(start, stop)));
                }
                let indices: Vec<i64> = (start..stop)
                    .step_by(*step as usize)
                    .map(|position| position as i64)
                    .collect();
                Ok(GetResult::Array(self.take(&indices, false, None)?))
            }
        }
    }

    /// Filter chunk by chunk against a mask covering the logical order.
    fn filter_mask(&self, mask: &BooleanArray) -> TesseraResult<Self> {
        if mask.len() != self.len() {
            tessera_bail!(InvalidArgument: "boolean mask length {} does not match array length {}", mask.len(), self.len());
        }
        let mut chunks = Vec::with_capacity(self.nchunks());
        let mut offset = 0usize;
        for chunk in self.chunks() {
            let chunk_mask = mask.slice(offset, chunk.len());
            offset += chunk.len();
            chunks.push(filter(chunk.as_ref(), &chunk_mask)?);
        }
        Ok(Self::new_unchecked(chunks, self.dtype().clone()))
    }

    /// Positional sub-range, keeping the overlapped parts of each chunk.
    fn slice_chunks(&self, start: usize, stop: usize) -> Self {
        let mut chunks: Vec<ArrayRef> = Vec::new();
        let offsets = self.chunk_offsets();
        for (chunk_idx, chunk) in self.chunks().iter().enumerate() {
            let chunk_start = offsets[chunk_idx];
            let chunk_stop = offsets[chunk_idx + 1];
            let lo = start.max(chunk_start);
            let hi = stop.min(chunk_stop);
            if lo < hi {
                chunks.push(chunk.slice(lo - chunk_start, hi - lo));
            }
        }
        Self::new_unchecked(chunks, self.dtype().clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::Int64Array;

    use super::*;
    use crate::LogicalType;

    fn chunked(values: &[&[i64]]) -> ChunkedColumnArray {
        let chunks: Vec<ArrayRef> = values
            .iter()
            .map(|chunk| Arc::new(Int64Array::from(chunk.to_vec())) as ArrayRef)
            .collect();
        ChunkedColumnArray::from_chunked(chunks).unwrap()
    }

    #[test]
    fn full_slice_round_trips_identity() {
        let array = chunked(&[&[1, 2], &[3, 4, 5]]);
        let full = array.get(&Key::full()).unwrap().into_array().unwrap();
        assert!(full.equals(&array));
        let ellipsis = array.get(&Key::Ellipsis).unwrap().into_array().unwrap();
        assert!(ellipsis.equals(&array));
    }

    #[test]
    fn empty_index_list_yields_empty_instance_of_same_type() {
        let array = chunked(&[&[1, 2]]);
        let empty = array
            .get(&Key::Indices(Vec::new()))
            .unwrap()
            .into_array()
            .unwrap();
        assert_eq!(empty.len(), 0);
        assert_eq!(empty.dtype(), &LogicalType::Int64);
    }

    #[test]
    fn scalar_keys_box_values_and_wrap() {
        let array = ChunkedColumnArray::from_sequence(
            &[Scalar::Int(1), Scalar::Null, Scalar::Int(3)],
            None,
        )
        .unwrap();
        assert_eq!(
            array.get(&Key::At(0)).unwrap().into_scalar().unwrap(),
            Scalar::Int(1)
        );
        assert_eq!(
            array.get(&Key::At(1)).unwrap().into_scalar().unwrap(),
            Scalar::Null
        );
        assert_eq!(
            array.get(&Key::At(-1)).unwrap().into_scalar().unwrap(),
            Scalar::Int(3)
        );
        assert!(array.get(&Key::At(3)).unwrap_err().is_out_of_bounds());
    }

    #[test]
    fn mask_filters_chunkwise() {
        let array = chunked(&[&[1, 2], &[3, 4]]);
        let mask = BooleanArray::from(vec![true, false, false, true]);
        let filtered = array.get(&Key::Mask(mask)).unwrap().into_array().unwrap();
        assert_eq!(
            filtered.to_scalars(),
            vec![Scalar::Int(1), Scalar::Int(4)]
        );

        let short = BooleanArray::from(vec![true]);
        assert!(array.get(&Key::Mask(short)).is_err());
    }

    #[test]
    fn slices_cross_chunk_boundaries() {
        let array = chunked(&[&[1, 2], &[3, 4, 5]]);
        let sliced = array
            .get(&Key::Slice {
                start: Some(1),
                stop: Some(4),
                step: 1,
            })
            .unwrap()
            .into_array()
            .unwrap();
        assert_eq!(
            sliced.to_scalars(),
            vec![Scalar::Int(2), Scalar::Int(3), Scalar::Int(4)]
        );
    }

    #[test]
    fn stepped_slices_materialize_via_take() {
        let array = chunked(&[&[1, 2, 3], &[4, 5]]);
        let sliced = array
            .get(&Key::Slice {
                start: None,
                stop: None,
                step: 2,
            })
            .unwrap()
            .into_array()
            .unwrap();
        assert_eq!(
            sliced.to_scalars(),
            vec![Scalar::Int(1), Scalar::Int(3), Scalar::Int(5)]
        );
        assert!(
            array
                .get(&Key::Slice {
                    start: None,
                    stop: None,
                    step: 0
                })
                .is_err()
        );
    }
}
