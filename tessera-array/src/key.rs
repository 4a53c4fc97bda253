use arrow_array::BooleanArray;
use tessera_error::{TesseraResult, tessera_bail};

/// A positional indexing key, resolved once at the API boundary.
///
/// Callers construct the variant they mean instead of the adapter sniffing
/// shapes at runtime; a non-integer scalar key is simply unrepresentable.
#[derive(Debug, Clone)]
pub enum Key {
    /// A single position; negative values count from the end.
    At(i64),
    /// A half-open positional range with a positive step. `None` bounds
    /// default to the ends; negative bounds count from the end.
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    },
    /// Fancy indexing: arbitrary positions, negatives counting from the end.
    Indices(Vec<i64>),
    /// A boolean mask the same length as the array.
    Mask(BooleanArray),
    /// Normalizes to the full slice.
    Ellipsis,
}

impl Key {
    /// The full slice.
    pub fn full() -> Self {
        Self::Slice {
            start: None,
            stop: None,
            step: 1,
        }
    }
}

/// Resolve one position with from-the-end wraparound.
pub(crate) fn resolve_position(index: i64, len: usize) -> TesseraResult<usize> {
    let resolved = if index < 0 {
        index + len as i64
    } else {
        index
    };
    if resolved < 0 || resolved as usize >= len {
        tessera_bail!(OutOfBounds: index, 0, len);
    }
    Ok(resolved as usize)
}

/// Clamp slice bounds to `[0, len]`, python-style.
pub(crate) fn resolve_slice_bounds(
    start: Option<i64>,
    stop: Option<i64>,
    len: usize,
) -> (usize, usize) {
    let clamp = |bound: i64| -> usize {
        let wrapped = if bound < 0 { bound + len as i64 } else { bound };
        wrapped.clamp(0, len as i64) as usize
    };
    let start = start.map_or(0, clamp);
    let stop = stop.map_or(len, clamp);
    (start, stop.max(start))
}

/// Convert a key into positional indices in resolution order.
///
/// This is the write-side normalization: every key form reduces to the list
/// of positions it addresses. Masks must match the array length.
pub(crate) fn key_to_indices(key: &Key, len: usize) -> TesseraResult<Vec<usize>> {
    match key {
        Key::At(index) => Ok(vec![resolve_position(*index, len)?]),
        Key::Ellipsis => Ok((0..len).collect()),
        Key::Slice { start, stop, step } => {
            if *step < 1 {
                tessera_bail!(InvalidArgument: "slice step must be positive, got {step}");
            }
            let (start, stop) = resolve_slice_bounds(*start, *stop, len);
            Ok((start..stop).step_by(*step as usize).collect())
        }
        Key::Indices(indices) => indices
            .iter()
            .map(|&index| resolve_position(index, len))
            .collect(),
        Key::Mask(mask) => {
            if mask.len() != len {
                tessera_bail!(InvalidArgument: "length of indexer and values mismatch: {} vs {}", mask.len(), len);
            }
            Ok(mask
                .iter()
                .enumerate()
                .filter(|(_, selected)| selected.unwrap_or(false))
                .map(|(position, _)| position)
                .collect())
        }
    }
}
