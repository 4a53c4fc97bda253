use arrow_array::cast::AsArray;
use arrow_array::types::Int32Type;
use arrow_cast::cast;
use rustc_hash::FxHashMap;
use tessera_error::TesseraResult;

use crate::ops::unique::dictionary_type;
use crate::{ChunkedColumnArray, fallback_warning, kernel_capabilities};

impl ChunkedColumnArray {
    /// Dictionary-encode into 64-bit integer codes plus a uniques instance.
    ///
    /// Null positions code as `na_sentinel` and do not appear in the
    /// uniques. `uniques.take(codes)` reproduces the array over the non-null
    /// positions.
    pub fn factorize(&self, na_sentinel: i64) -> TesseraResult<(Vec<i64>, Self)> {
        if !kernel_capabilities().dictionary_encode {
            fallback_warning("factorize");
            let mut code_of = FxHashMap::default();
            let mut distinct = Vec::new();
            let mut codes = Vec::with_capacity(self.len());
            for scalar in self.to_scalars() {
                if scalar.is_null() {
                    codes.push(na_sentinel);
                    continue;
                }
                let next = distinct.len() as i64;
                let code = *code_of.entry(scalar.key()).or_insert_with(|| {
                    distinct.push(scalar.clone());
                    next
                });
                codes.push(code);
            }
            let uniques = Self::from_sequence(&distinct, Some(self.dtype().clone()))?;
            return Ok((codes, uniques));
        }

        if self.is_empty() {
            return Ok((Vec::new(), Self::empty(self.dtype().clone())));
        }
        let canonical = self.canonical()?;
        let encoded = cast(canonical.as_ref(), &dictionary_type(&self.dtype().to_arrow()))?;
        let dictionary = encoded.as_dictionary::<Int32Type>();
        let codes = dictionary
            .keys()
            .iter()
            .map(|key| key.map_or(na_sentinel, i64::from))
            .collect();
        let uniques = Self::new_unchecked(vec![dictionary.values().clone()], self.dtype().clone());
        Ok((codes, uniques))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scalar;

    #[test]
    fn codes_point_into_the_uniques() {
        let array = ChunkedColumnArray::from_sequence(
            &[
                Scalar::Utf8("b".into()),
                Scalar::Utf8("a".into()),
                Scalar::Utf8("b".into()),
            ],
            None,
        )
        .unwrap();
        let (codes, uniques) = array.factorize(-1).unwrap();
        assert_eq!(codes, vec![0, 1, 0]);
        assert_eq!(
            uniques.to_scalars(),
            vec![Scalar::Utf8("b".into()), Scalar::Utf8("a".into())]
        );
        let rebuilt = uniques.take(&codes, false, None).unwrap();
        assert!(rebuilt.equals(&array));
    }

    #[test]
    fn nulls_code_as_the_sentinel() {
        let array = ChunkedColumnArray::from_sequence(
            &[Scalar::Int(5), Scalar::Null, Scalar::Int(5)],
            None,
        )
        .unwrap();
        let (codes, uniques) = array.factorize(-1).unwrap();
        assert_eq!(codes, vec![0, -1, 0]);
        assert_eq!(uniques.to_scalars(), vec![Scalar::Int(5)]);
    }

    #[test]
    fn empty_input_factorizes_to_nothing() {
        let array = ChunkedColumnArray::empty(crate::LogicalType::Int64);
        let (codes, uniques) = array.factorize(-1).unwrap();
        assert!(codes.is_empty());
        assert_eq!(uniques.len(), 0);
        assert_eq!(uniques.dtype(), array.dtype());
    }
}
