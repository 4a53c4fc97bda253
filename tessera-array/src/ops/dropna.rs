use arrow_arith::boolean::is_not_null;
use arrow_select::filter::filter;
use tessera_error::TesseraResult;

use crate::{ChunkedColumnArray, fallback_warning, kernel_capabilities};

impl ChunkedColumnArray {
    /// Remove null entries, in logical order. Chunk structure is whatever
    /// the engine's filter leaves behind; untouched chunks are shared.
    pub fn dropna(&self) -> TesseraResult<Self> {
        if !kernel_capabilities().drop_nulls {
            fallback_warning("dropna");
            let kept: Vec<_> = self
                .to_scalars()
                .into_iter()
                .filter(|scalar| !scalar.is_null())
                .collect();
            return Self::from_sequence(&kept, Some(self.dtype().clone()));
        }

        let mut chunks = Vec::with_capacity(self.nchunks());
        for chunk in self.chunks() {
            if chunk.null_count() == 0 {
                chunks.push(chunk.clone());
                continue;
            }
            let valid = is_not_null(chunk.as_ref())?;
            chunks.push(filter(chunk.as_ref(), &valid)?);
        }
        Ok(Self::new_unchecked(chunks, self.dtype().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scalar;

    #[test]
    fn drops_nulls_in_logical_order() {
        let array = ChunkedColumnArray::from_sequence(
            &[Scalar::Int(1), Scalar::Null, Scalar::Int(3), Scalar::Null],
            None,
        )
        .unwrap();
        let dropped = array.dropna().unwrap();
        assert_eq!(dropped.to_scalars(), vec![Scalar::Int(1), Scalar::Int(3)]);
        assert_eq!(dropped.null_count(), 0);
    }

    #[test]
    fn no_nulls_shares_the_chunks() {
        let array =
            ChunkedColumnArray::from_sequence(&[Scalar::Int(1), Scalar::Int(2)], None).unwrap();
        let dropped = array.dropna().unwrap();
        assert!(dropped.equals(&array));
        assert_eq!(dropped.nchunks(), array.nchunks());
    }
}
