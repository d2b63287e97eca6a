//! Cosine similarity and in-process top-k ranking.
//!
//! Both store modes rank by cosine similarity; the native mode delegates it to
//! pgvector's `<=>` operator, the fallback mode computes it here.

use crate::models::{MemoryRecord, ScoredMemory};

/// dot(a, b) / (|a| * |b|). Zero when either norm is zero or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f64, 0.0f64, 0.0f64), |(dot, na, nb), (&x, &y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Score every record against `query`, most similar first, truncated to `top_k`.
/// Equal scores keep insertion order (ascending id).
pub fn rank_top_k<I>(records: I, query: &[f32], top_k: usize) -> Vec<ScoredMemory>
where
    I: IntoIterator<Item = MemoryRecord>,
{
    if top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<ScoredMemory> = records
        .into_iter()
        .map(|r| ScoredMemory {
            score: cosine_similarity(&r.embedding, query),
            id: r.id,
            content: r.content,
            metadata: r.metadata,
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
    scored.truncate(top_k);
    scored
}
