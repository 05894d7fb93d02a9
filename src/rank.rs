//! Cosine-similarity ranking.
//!
//! Vectors are `f32` throughout the crate: chunk embeddings and query
//! embeddings share one precision so build-time and query-time scores are
//! directly comparable.

use std::cmp::Ordering;

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` when either vector has zero norm, when the vectors are
/// empty, or when their lengths differ.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}

/// Return the indices of the `k` candidates most similar to `query`.
///
/// Indices are ordered by descending similarity. Equal scores keep their
/// original order, so the lower index wins a tie. Returns
/// `min(k, candidates.len())` indices.
pub fn top_k(query: &[f32], candidates: &[Vec<f32>], k: usize) -> Vec<usize> {
    score_top_k(query, candidates, k)
        .into_iter()
        .map(|(i, _)| i)
        .collect()
}

/// Like [`top_k`], but keeps each candidate's score alongside its index.
pub fn score_top_k(query: &[f32], candidates: &[Vec<f32>], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, cosine_similarity(query, c)))
        .collect();

    // `sort_by` is stable: ties stay in ascending index order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}
