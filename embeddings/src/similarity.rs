//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;

/// Compute the cosine similarity between two embeddings of equal length.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// A zero vector has similarity 0.0 with everything, so rankings stay total.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (magnitude_a * magnitude_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Rank `rows` by cosine similarity to `query` and keep the best `k`.
///
/// Returns `(row index, score)` pairs by descending score. Equal scores keep
/// their original row order, so identical inputs always rank identically.
pub fn rank_top_k<'a>(
    query: &[f32],
    rows: impl IntoIterator<Item = &'a [f32]>,
    k: usize,
) -> Vec<(usize, f32)> {
    let mut scores: Vec<(usize, f32)> = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| (index, cosine_similarity(query, row)))
        .collect();

    scores.sort_by_key(|&(index, score)| (Reverse(OrderedFloat(score)), index));
    scores.truncate(k);
    scores
}
