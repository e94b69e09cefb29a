use incident_common::{IncidentError, Result};

/// Cosine similarity between two embeddings, in `[-1, 1]`.
///
/// Accumulates in f64. Empty vectors, mismatched lengths, zero vectors and
/// non-finite components are a `Computation` error, never a silent `0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.is_empty() || b.is_empty() {
        return Err(IncidentError::computation("empty embedding"));
    }
    if a.len() != b.len() {
        return Err(IncidentError::computation(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if !denom.is_finite() || !dot.is_finite() {
        return Err(IncidentError::computation("non-finite embedding component"));
    }
    if denom == 0.0 {
        return Err(IncidentError::computation("zero-norm embedding"));
    }

    Ok((dot / denom).clamp(-1.0, 1.0))
}
