use ndarray::Array1;

use crate::index::IndexEntry;

/// An index entry paired with its similarity to the current query.
/// Transient, valid only for the index snapshot it was ranked against.
#[derive(Debug)]
pub struct ScoredChunk<'a> {
    pub entry: &'a IndexEntry,
    pub score: f32,
}

/// Cosine similarity over the shared-length prefix of the two vectors.
///
/// Mismatched lengths are a defensive fallback only; a single embedding
/// model produces fixed-length vectors. Zero-norm vectors score exactly 0.
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let (dot, norm_a_sq, norm_b_sq) = if a.len() == b.len() {
        (a.dot(b), a.dot(a), b.dot(b))
    } else {
        let mut dot = 0.0;
        let mut norm_a_sq = 0.0;
        let mut norm_b_sq = 0.0;
        for (x, y) in a.iter().zip(b.iter()) {
            dot += x * y;
            norm_a_sq += x * x;
            norm_b_sq += y * y;
        }
        (dot, norm_a_sq, norm_b_sq)
    };

    let norm_a = norm_a_sq.sqrt();
    let norm_b = norm_b_sq.sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Scores every entry against the query vector and returns the top `k` in
/// descending score order. Ties keep original index order (stable sort).
/// Returns the whole index when it holds fewer than `k` entries.
pub fn rank<'a>(query: &Array1<f32>, index: &'a [IndexEntry], k: usize) -> Vec<ScoredChunk<'a>> {
    let mut scored: Vec<ScoredChunk<'a>> = index
        .iter()
        .map(|entry| ScoredChunk {
            score: cosine_similarity(query, &entry.embedding),
            entry,
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{Chunk, SourceKind};

    fn entry(id: usize, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                source: SourceKind::Csv,
                id,
                text: format!("chunk {id}"),
            },
            embedding: Array1::from(vector),
        }
    }

    #[test]
    fn cosine_is_symmetric_and_bounded() {
        let a = Array1::from(vec![1.0, 2.0, 3.0]);
        let b = Array1::from(vec![-2.0, 0.5, 4.0]);
        let ab = cosine_similarity(&a, &b);
        let ba = cosine_similarity(&b, &a);
        assert_eq!(ab, ba);
        assert!((-1.0..=1.0).contains(&ab));

        let neg = cosine_similarity(&a, &Array1::from(vec![-1.0, -2.0, -3.0]));
        assert!((neg + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero() {
        let a = Array1::from(vec![1.0, 2.0]);
        let zero = Array1::from(vec![0.0, 0.0]);
        assert_eq!(cosine_similarity(&a, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &a), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn mismatched_lengths_compare_common_prefix() {
        let short = Array1::from(vec![1.0, 0.0]);
        let long = Array1::from(vec![1.0, 0.0, 7.0, 7.0]);
        assert!((cosine_similarity(&short, &long) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rank_returns_min_k_and_index_size_in_descending_order() {
        let index = vec![
            entry(0, vec![1.0, 0.0]),
            entry(1, vec![0.5, 0.5]),
            entry(2, vec![0.0, 1.0]),
        ];
        let query = Array1::from(vec![1.0, 0.0]);

        let top = rank(&query, &index, 2);
        assert_eq!(top.len(), 2);
        assert!(top[0].score >= top[1].score);

        let all = rank(&query, &index, 10);
        assert_eq!(all.len(), 3);
        for pair in all.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn closest_vectors_win() {
        let index = vec![
            entry(0, vec![1.0, 0.0]),
            entry(1, vec![0.0, 1.0]),
            entry(2, vec![0.9, 0.1]),
        ];
        let query = Array1::from(vec![1.0, 0.0]);

        let top = rank(&query, &index, 2);
        assert_eq!(top[0].entry.chunk.id, 0);
        assert_eq!(top[1].entry.chunk.id, 2);
    }

    #[test]
    fn ties_keep_original_index_order() {
        let index = vec![
            entry(0, vec![2.0, 0.0]),
            entry(1, vec![3.0, 0.0]),
            entry(2, vec![1.0, 0.0]),
        ];
        let query = Array1::from(vec![1.0, 0.0]);

        let top = rank(&query, &index, 3);
        let ids: Vec<usize> = top.iter().map(|s| s.entry.chunk.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn empty_index_ranks_empty() {
        let query = Array1::from(vec![1.0]);
        assert!(rank(&query, &[], 5).is_empty());
    }
}
