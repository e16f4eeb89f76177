//! Positional encoding of an [`OutputRequest`]
//!
//! Layout: `[h, i, o, headers[0..h], inputs[0..i], outputs[0..o], tail...]`
//! where the three counts are decimal strings. Only the compatibility
//! endpoint speaks this format; everything else uses the struct directly.

use super::OutputRequest;

const COUNT_FIELDS: usize = 3;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FlatDecodeError {
    #[error("expected 3 leading counts, got {0} values")]
    MissingCounts(usize),

    #[error("count at position {position} is not a non-negative integer: {value:?}")]
    BadCount { position: usize, value: String },

    #[error("sequence declares {expected} values after the counts but has {actual}")]
    Truncated { expected: usize, actual: usize },
}

pub fn encode_flat(request: &OutputRequest) -> Vec<String> {
    let mut flat = Vec::with_capacity(
        COUNT_FIELDS
            + request.headers.len()
            + request.inputs.len()
            + request.outputs.len()
            + request.tail.len(),
    );
    flat.push(request.headers.len().to_string());
    flat.push(request.inputs.len().to_string());
    flat.push(request.outputs.len().to_string());
    flat.extend(request.headers.iter().cloned());
    flat.extend(request.inputs.iter().cloned());
    flat.extend(request.outputs.iter().cloned());
    flat.extend(request.tail.iter().cloned());
    flat
}

/// Slice a flat sequence back into its four parts by cumulative offsets.
///
/// The three counts need not be equal.
pub fn decode_flat<S: AsRef<str>>(values: &[S]) -> Result<OutputRequest, FlatDecodeError> {
    if values.len() < COUNT_FIELDS {
        return Err(FlatDecodeError::MissingCounts(values.len()));
    }

    let mut counts = [0usize; COUNT_FIELDS];
    for (position, count) in counts.iter_mut().enumerate() {
        let raw = values[position].as_ref();
        *count = raw.trim().parse().map_err(|_| FlatDecodeError::BadCount {
            position,
            value: raw.to_string(),
        })?;
    }

    let body = &values[COUNT_FIELDS..];
    let expected = counts
        .iter()
        .try_fold(0usize, |acc, n| acc.checked_add(*n))
        .unwrap_or(usize::MAX);
    if body.len() < expected {
        return Err(FlatDecodeError::Truncated {
            expected,
            actual: body.len(),
        });
    }

    let owned = |slice: &[S]| slice.iter().map(|s| s.as_ref().to_string()).collect::<Vec<_>>();
    let [h, i, o] = counts;
    Ok(OutputRequest {
        headers: owned(&body[..h]),
        inputs: owned(&body[h..h + i]),
        outputs: owned(&body[h + i..h + i + o]),
        tail: owned(&body[h + i + o..]),
    })
}
