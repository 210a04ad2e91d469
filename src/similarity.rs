//! Cosine similarity kernel and batched deduplication.
//!
//! Pure numeric helpers with no I/O and no shared state; safe to call from
//! parallel workers. The batched path parallelises across candidates with
//! rayon when the accepted pool is large enough to pay for the fan-out.

use rayon::prelude::*;

/// Default similarity threshold above which two queries are duplicates.
pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.86;

/// Accepted pool size below which the batched path stays sequential.
const PAR_CUTOFF: usize = 32;

/// Cosine similarity between two equal-length vectors.
///
/// Returns 0.0 if either vector has zero norm. Vectors of mismatched
/// length are compared over the shorter prefix; callers are expected to
/// pass embeddings of a single declared dimension.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for i in 0..len {
        let (x, y) = (a[i] as f64, b[i] as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Whether `candidate` is a near-duplicate of any accepted embedding.
///
/// The threshold is inclusive: similarity exactly at the threshold counts
/// as a duplicate.
pub fn dedup_against(candidate: &[f32], accepted: &[Vec<f32>], threshold: f32) -> bool {
    if accepted.len() >= PAR_CUTOFF {
        accepted
            .par_iter()
            .any(|emb| cosine(candidate, emb) >= threshold)
    } else {
        accepted.iter().any(|emb| cosine(candidate, emb) >= threshold)
    }
}

/// Maximum similarity between `candidate` and any accepted embedding.
pub fn max_similarity(candidate: &[f32], accepted: &[Vec<f32>]) -> f32 {
    if accepted.len() >= PAR_CUTOFF {
        accepted
            .par_iter()
            .map(|emb| cosine(candidate, emb))
            .reduce(|| 0.0, f32::max)
    } else {
        accepted
            .iter()
            .map(|emb| cosine(candidate, emb))
            .fold(0.0, f32::max)
    }
}
