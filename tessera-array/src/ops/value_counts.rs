use arrow_array::cast::AsArray;
use arrow_array::new_null_array;
use arrow_array::types::Int32Type;
use arrow_cast::cast;
use rustc_hash::FxHashMap;
use tessera_error::TesseraResult;

use crate::ops::unique::dictionary_type;
use crate::{ChunkedColumnArray, Scalar, fallback_warning, kernel_capabilities};

/// Distinct values paired with their occurrence counts. Counts are plain
/// non-nullable 64-bit integers regardless of the value type.
#[derive(Debug)]
pub struct ValueCounts {
    pub values: ChunkedColumnArray,
    pub counts: Vec<i64>,
}

impl ChunkedColumnArray {
    /// Count occurrences of each distinct value. With `dropna`, the null
    /// entry and its count are omitted from the pairs.
    pub fn value_counts(&self, dropna: bool) -> TesseraResult<ValueCounts> {
        if !kernel_capabilities().dictionary_encode {
            fallback_warning("value_counts");
            return self.value_counts_generic(dropna);
        }

        if self.is_empty() {
            return Ok(ValueCounts {
                values: Self::empty(self.dtype().clone()),
                counts: Vec::new(),
            });
        }
        let canonical = self.canonical()?;
        let encoded = cast(canonical.as_ref(), &dictionary_type(&self.dtype().to_arrow()))?;
        let dictionary = encoded.as_dictionary::<Int32Type>();
        let mut counts = vec![0i64; dictionary.values().len()];
        let mut null_count = 0i64;
        for key in dictionary.keys() {
            match key {
                Some(key) => counts[key as usize] += 1,
                None => null_count += 1,
            }
        }
        let mut chunks = vec![dictionary.values().clone()];
        if !dropna && null_count > 0 {
            chunks.push(new_null_array(&self.dtype().to_arrow(), 1));
            counts.push(null_count);
        }
        Ok(ValueCounts {
            values: Self::new_unchecked(chunks, self.dtype().clone()),
            counts,
        })
    }

    fn value_counts_generic(&self, dropna: bool) -> TesseraResult<ValueCounts> {
        let mut slot_of = FxHashMap::default();
        let mut distinct: Vec<Scalar> = Vec::new();
        let mut counts: Vec<i64> = Vec::new();
        let mut null_count = 0i64;
        for scalar in self.to_scalars() {
            if scalar.is_null() {
                null_count += 1;
                continue;
            }
            let next = distinct.len();
            let slot = *slot_of.entry(scalar.key()).or_insert_with(|| {
                distinct.push(scalar.clone());
                counts.push(0);
                next
            });
            counts[slot] += 1;
        }
        if !dropna && null_count > 0 {
            distinct.push(Scalar::Null);
            counts.push(null_count);
        }
        Ok(ValueCounts {
            values: Self::from_sequence(&distinct, Some(self.dtype().clone()))?,
            counts,
        })
    }
}
