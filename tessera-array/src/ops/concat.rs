use tessera_error::{TesseraResult, tessera_bail};

use crate::ChunkedColumnArray;

/// Concatenate arrays of one logical type by flattening their chunk lists in
/// argument order. No re-chunking or compaction happens; the inputs' chunks
/// are shared, not copied.
pub fn concat_same_type(inputs: &[&ChunkedColumnArray]) -> TesseraResult<ChunkedColumnArray> {
    let Some(first) = inputs.first() else {
        tessera_bail!(Construction: "cannot concatenate zero arrays");
    };
    for input in &inputs[1..] {
        if input.dtype() != first.dtype() {
            tessera_bail!(MismatchedTypes: first.dtype(), input.dtype());
        }
    }
    let chunks = inputs
        .iter()
        .flat_map(|input| input.chunks().iter().cloned())
        .collect();
    Ok(ChunkedColumnArray::new_unchecked(
        chunks,
        first.dtype().clone(),
    ))
}
