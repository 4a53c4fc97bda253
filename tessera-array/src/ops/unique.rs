use arrow_array::cast::AsArray;
use arrow_array::new_null_array;
use arrow_array::types::Int32Type;
use arrow_cast::cast;
use arrow_schema::DataType;
use rustc_hash::FxHashSet;
use tessera_error::TesseraResult;

use crate::{ChunkedColumnArray, fallback_warning, kernel_capabilities};

/// The dictionary type used for distinct-value and coding operations.
pub(crate) fn dictionary_type(values: &DataType) -> DataType {
    DataType::Dictionary(Box::new(DataType::Int32), Box::new(values.clone()))
}

impl ChunkedColumnArray {
    /// One entry per distinct logical value, in the engine's order (the
    /// dictionary's first-occurrence order, with a trailing null when the
    /// array holds any). Not guaranteed sorted.
    pub fn unique(&self) -> TesseraResult<Self> {
        if !kernel_capabilities().dictionary_encode {
            fallback_warning("unique");
            let mut seen = FxHashSet::default();
            let distinct: Vec<_> = self
                .to_scalars()
                .into_iter()
                .filter(|scalar| seen.insert(scalar.key()))
                .collect();
            return Self::from_sequence(&distinct, Some(self.dtype().clone()));
        }

        if self.is_empty() {
            return Ok(Self::empty(self.dtype().clone()));
        }
        let canonical = self.canonical()?;
        let encoded = cast(canonical.as_ref(), &dictionary_type(&self.dtype().to_arrow()))?;
        let dictionary = encoded.as_dictionary::<Int32Type>();
        let mut chunks = vec![dictionary.values().clone()];
        if self.null_count() > 0 {
            chunks.push(new_null_array(&self.dtype().to_arrow(), 1));
        }
        Ok(Self::new_unchecked(chunks, self.dtype().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scalar;

    #[test]
    fn keeps_one_entry_per_distinct_value() {
        let array = ChunkedColumnArray::from_sequence(
            &[
                Scalar::Int(2),
                Scalar::Int(1),
                Scalar::Int(2),
                Scalar::Int(1),
                Scalar::Int(3),
            ],
            None,
        )
        .unwrap();
        let distinct = array.unique().unwrap();
        assert_eq!(
            distinct.to_scalars(),
            vec![Scalar::Int(2), Scalar::Int(1), Scalar::Int(3)]
        );
    }

    #[test]
    fn nulls_survive_as_a_single_entry() {
        let array = ChunkedColumnArray::from_sequence(
            &[Scalar::Null, Scalar::Int(1), Scalar::Null],
            None,
        )
        .unwrap();
        let distinct = array.unique().unwrap();
        let scalars = distinct.to_scalars();
        assert_eq!(scalars.len(), 2);
        assert_eq!(
            scalars.iter().filter(|scalar| scalar.is_null()).count(),
            1
        );
    }

    #[test]
    fn empty_input_stays_empty() {
        let array = ChunkedColumnArray::from_sequence(&[Scalar::Int(1)], None)
            .unwrap()
            .take(&[], false, None)
            .unwrap();
        let distinct = array.unique().unwrap();
        assert_eq!(distinct.len(), 0);
    }
}
