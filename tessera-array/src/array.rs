use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef, BooleanArray, StringArray, new_empty_array};
use arrow_cast::display::FormatOptions;
use arrow_cast::{CastOptions, cast_with_options};
use arrow_schema::TimeUnit;
use arrow_select::concat::concat;
use itertools::Itertools;
use tessera_error::{TesseraResult, tessera_bail};

use crate::{LogicalType, Scalar, array_from_scalars, scalar_from_array};

/// An extension array backed by an immutable sequence of Arrow chunks.
///
/// The chunk list is the only state; the logical type is derived from it
/// once at construction. Chunk boundaries are a layout detail: logical
/// equality ignores them, and the mutating operations rewrite chunks while
/// preserving the original chunk-length layout exactly. Chunks themselves
/// are never mutated; copies are shallow.
#[derive(Debug, Clone)]
pub struct ChunkedColumnArray {
    chunks: Vec<ArrayRef>,
    dtype: LogicalType,
    offsets: Vec<usize>,
}

fn chunk_offsets(chunks: &[ArrayRef]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(chunks.len() + 1);
    let mut total = 0usize;
    offsets.push(0);
    for chunk in chunks {
        total += chunk.len();
        offsets.push(total);
    }
    offsets
}

impl ChunkedColumnArray {
    /// Wrap existing chunks whose type is already known to match `dtype`.
    pub(crate) fn new_unchecked(chunks: Vec<ArrayRef>, dtype: LogicalType) -> Self {
        let offsets = chunk_offsets(&chunks);
        Self {
            chunks,
            dtype,
            offsets,
        }
    }

    /// Wrap a single array as a one-chunk instance.
    pub fn from_arrow(array: ArrayRef) -> TesseraResult<Self> {
        let dtype = LogicalType::try_from_arrow(array.data_type())?;
        Ok(Self::new_unchecked(vec![array], dtype))
    }

    /// Wrap an existing chunk sequence. All chunks must share one storage
    /// type; an empty sequence cannot resolve a type and is rejected.
    pub fn from_chunked(chunks: Vec<ArrayRef>) -> TesseraResult<Self> {
        let Some(first) = chunks.first() else {
            tessera_bail!(Construction: "cannot infer a logical type from zero chunks");
        };
        let dtype = LogicalType::try_from_arrow(first.data_type())?;
        for chunk in &chunks[1..] {
            if chunk.data_type() != first.data_type() {
                tessera_bail!(MismatchedTypes: first.data_type(), chunk.data_type());
            }
        }
        Ok(Self::new_unchecked(chunks, dtype))
    }

    /// A length-0 instance of the given logical type.
    pub fn empty(dtype: LogicalType) -> Self {
        Self::new_unchecked(Vec::new(), dtype)
    }

    /// Build from logical scalars with null-aware conversion. The type is
    /// inferred from the first non-NA scalar when not supplied.
    pub fn from_sequence(scalars: &[Scalar], dtype: Option<LogicalType>) -> TesseraResult<Self> {
        let dtype = match dtype {
            Some(dtype) => dtype,
            None => infer_dtype(scalars)?,
        };
        let chunk = array_from_scalars(&dtype, scalars)?;
        Ok(Self::new_unchecked(vec![chunk], dtype))
    }

    /// Build by parsing strings into the target type through the storage
    /// engine's cast (plain strings when no target is given). Unparseable
    /// input fails the whole construction.
    pub fn from_sequence_of_strings(
        strings: &[Option<&str>],
        dtype: Option<&LogicalType>,
    ) -> TesseraResult<Self> {
        let dtype = dtype.cloned().unwrap_or(LogicalType::Utf8);
        let parsed = StringArray::from_iter(strings.iter().copied());
        let options = CastOptions {
            safe: false,
            format_options: FormatOptions::default(),
        };
        let chunk = cast_with_options(&parsed, &dtype.to_arrow(), &options)?;
        Ok(Self::new_unchecked(vec![chunk], dtype))
    }

    pub fn dtype(&self) -> &LogicalType {
        &self.dtype
    }

    pub fn chunks(&self) -> &[ArrayRef] {
        &self.chunks
    }

    pub fn nchunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map a logical position to (chunk index, offset within the chunk),
    /// skipping over empty chunks.
    pub(crate) fn find_chunk_idx(&self, index: usize) -> (usize, usize) {
        debug_assert!(index < self.len());
        let chunk_idx = self.offsets.partition_point(|&offset| offset <= index) - 1;
        (chunk_idx, index - self.offsets[chunk_idx])
    }

    /// Box the value at a logical position, mapping physical nulls to the
    /// NA sentinel.
    pub fn scalar_at(&self, index: usize) -> TesseraResult<Scalar> {
        if index >= self.len() {
            tessera_bail!(OutOfBounds: index, 0, self.len());
        }
        let (chunk_idx, offset) = self.find_chunk_idx(index);
        Ok(scalar_from_array(
            self.chunks[chunk_idx].as_ref(),
            offset,
            &self.dtype,
        ))
    }

    /// Concatenate the chunks into a single array. The canonical form is
    /// where chunk-layout-agnostic operations (equality, dictionary
    /// encoding) happen.
    pub fn canonical(&self) -> TesseraResult<ArrayRef> {
        match self.chunks.len() {
            0 => Ok(new_empty_array(&self.dtype.to_arrow())),
            1 => Ok(self.chunks[0].clone()),
            _ => {
                let refs: Vec<&dyn Array> = self.chunks.iter().map(|c| c.as_ref()).collect();
                Ok(concat(&refs)?)
            }
        }
    }

    pub fn null_count(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.null_count()).sum()
    }

    /// Bytes needed to hold the backing chunks in memory.
    pub fn nbytes(&self) -> usize {
        self.chunks
            .iter()
            .map(|chunk| chunk.get_array_memory_size())
            .sum()
    }

    /// Boolean mask over the logical order, true where the value is missing.
    pub fn is_null(&self) -> TesseraResult<BooleanArray> {
        if self.chunks.is_empty() {
            return Ok(BooleanArray::from(Vec::<bool>::new()));
        }
        let masks: Vec<BooleanArray> = self
            .chunks
            .iter()
            .map(|chunk| arrow_arith::boolean::is_null(chunk.as_ref()))
            .try_collect()?;
        let refs: Vec<&dyn Array> = masks.iter().map(|m| m as &dyn Array).collect();
        Ok(concat(&refs)?.as_boolean().clone())
    }

    /// Shallow copy; the immutable chunks are shared.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Value equality: same logical type and same values in order. Chunk
    /// layout and physical null encoding are invisible.
    pub fn equals(&self, other: &Self) -> bool {
        if self.dtype != other.dtype || self.len() != other.len() {
            return false;
        }
        match (self.canonical(), other.canonical()) {
            (Ok(lhs), Ok(rhs)) => lhs.to_data() == rhs.to_data(),
            _ => false,
        }
    }

    /// Read the whole array out as logical scalars.
    pub fn to_scalars(&self) -> Vec<Scalar> {
        let mut scalars = Vec::with_capacity(self.len());
        for chunk in &self.chunks {
            for offset in 0..chunk.len() {
                scalars.push(scalar_from_array(chunk.as_ref(), offset, &self.dtype));
            }
        }
        scalars
    }

    /// Swap in a rewritten chunk list. Only called once a full replacement
    /// has been materialized, keeping mutation all-or-nothing.
    pub(crate) fn replace_chunks(&mut self, chunks: Vec<ArrayRef>) {
        self.offsets = chunk_offsets(&chunks);
        self.chunks = chunks;
    }
}

fn infer_dtype(scalars: &[Scalar]) -> TesseraResult<LogicalType> {
    for scalar in scalars {
        let inferred = match scalar {
            Scalar::Null => continue,
            Scalar::Bool(_) => LogicalType::Bool,
            Scalar::Int(_) => LogicalType::Int64,
            Scalar::UInt(_) => LogicalType::UInt64,
            Scalar::Float(_) => LogicalType::Float64,
            Scalar::Utf8(_) => LogicalType::Utf8,
            Scalar::Date(_) => LogicalType::Date32,
            Scalar::Time(_) => LogicalType::Time64(TimeUnit::Nanosecond),
            Scalar::Timestamp(_) => LogicalType::Timestamp(TimeUnit::Nanosecond, None),
            Scalar::Duration(_) => LogicalType::Duration(TimeUnit::Nanosecond),
        };
        return Ok(inferred);
    }
    tessera_bail!(Construction: "cannot infer a logical type from all-NA scalars")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::{Int32Array, Int64Array};

    use super::*;

    fn chunked(values: &[&[i64]]) -> ChunkedColumnArray {
        let chunks: Vec<ArrayRef> = values
            .iter()
            .map(|chunk| Arc::new(Int64Array::from(chunk.to_vec())) as ArrayRef)
            .collect();
        ChunkedColumnArray::from_chunked(chunks).unwrap()
    }

    #[test]
    fn derives_type_and_length_from_chunks() {
        let array = chunked(&[&[1, 2], &[3]]);
        assert_eq!(array.dtype(), &LogicalType::Int64);
        assert_eq!(array.len(), 3);
        assert_eq!(array.nchunks(), 2);
        assert!(array.nbytes() > 0);
    }

    #[test]
    fn rejects_mixed_chunk_types() {
        let chunks: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![1])),
            Arc::new(Int32Array::from(vec![2])),
        ];
        assert!(ChunkedColumnArray::from_chunked(chunks).is_err());
    }

    #[test]
    fn scalar_at_skips_empty_chunks() {
        let chunks: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(Vec::<i64>::new())),
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(Int64Array::from(Vec::<i64>::new())),
            Arc::new(Int64Array::from(vec![3, 4])),
        ];
        let array = ChunkedColumnArray::from_chunked(chunks).unwrap();
        assert_eq!(array.scalar_at(0).unwrap(), Scalar::Int(1));
        assert_eq!(array.scalar_at(1).unwrap(), Scalar::Int(2));
        assert_eq!(array.scalar_at(2).unwrap(), Scalar::Int(3));
        assert_eq!(array.scalar_at(3).unwrap(), Scalar::Int(4));
        assert!(array.scalar_at(4).unwrap_err().is_out_of_bounds());
    }

    #[test]
    fn equality_ignores_chunk_layout() {
        let lhs = chunked(&[&[1, 2], &[3]]);
        let rhs = chunked(&[&[1], &[2, 3]]);
        assert!(lhs.equals(&rhs));
        assert!(!lhs.equals(&chunked(&[&[1, 2], &[4]])));
    }

    #[test]
    fn from_sequence_round_trips() {
        let scalars = vec![Scalar::Int(1), Scalar::Null, Scalar::Int(3)];
        let array = ChunkedColumnArray::from_sequence(&scalars, None).unwrap();
        assert_eq!(array.dtype(), &LogicalType::Int64);
        assert_eq!(array.to_scalars(), scalars);
        assert_eq!(array.null_count(), 1);
    }

    #[test]
    fn from_sequence_requires_a_resolvable_type() {
        assert!(ChunkedColumnArray::from_sequence(&[Scalar::Null], None).is_err());
        let typed =
            ChunkedColumnArray::from_sequence(&[Scalar::Null], Some(LogicalType::Float64)).unwrap();
        assert_eq!(typed.to_scalars(), vec![Scalar::Null]);
    }

    #[test]
    fn parses_strings_through_the_engine_cast() {
        let array = ChunkedColumnArray::from_sequence_of_strings(
            &[Some("1"), None, Some("3")],
            Some(&LogicalType::Int64),
        )
        .unwrap();
        assert_eq!(
            array.to_scalars(),
            vec![Scalar::Int(1), Scalar::Null, Scalar::Int(3)]
        );
        let plain = ChunkedColumnArray::from_sequence_of_strings(&[Some("a")], None).unwrap();
        assert_eq!(plain.dtype(), &LogicalType::Utf8);
        assert!(
            ChunkedColumnArray::from_sequence_of_strings(
                &[Some("nope")],
                Some(&LogicalType::Int64)
            )
            .is_err()
        );
    }

    #[test]
    fn scalar_round_trip_preserves_value_equality() {
        let array = chunked(&[&[1, 2], &[3]]);
        let rebuilt =
            ChunkedColumnArray::from_sequence(&array.to_scalars(), Some(array.dtype().clone()))
                .unwrap();
        assert!(rebuilt.equals(&array));
    }

    #[test]
    fn is_null_concatenates_chunk_masks() {
        let array = ChunkedColumnArray::from_sequence(
            &[Scalar::Int(1), Scalar::Null, Scalar::Int(3)],
            None,
        )
        .unwrap();
        let mask = array.is_null().unwrap();
        assert_eq!(
            mask.iter().collect::<Vec<_>>(),
            vec![Some(false), Some(true), Some(false)]
        );
    }
}
