//! Reciprocal Rank Fusion
//!
//! Shared by both storage backends (hybrid search) and by the multi-mode
//! query orchestrator. Fused score of a chunk is `Σ weight_i / (K + rank_i)`
//! with K=60 and 1-indexed ranks; chunks present in only one ranking still
//! contribute. Output order is strictly descending with ascending chunk id
//! on ties, which keeps repeated runs byte-identical.

use std::collections::HashMap;

use ab_domain::constants::search::RRF_K;

/// One input ranking: chunk ids best-first, plus this ranking's weight.
pub struct WeightedRanking<'a> {
    /// Chunk ids, best first
    pub chunk_ids: &'a [String],
    /// Fusion weight of this ranking
    pub weight: f32,
}

/// Fuse rankings into a single ordered `(chunk_id, fused_score)` list.
#[must_use]
pub fn fuse(rankings: &[WeightedRanking<'_>]) -> Vec<(String, f32)> {
    let mut fused: HashMap<&str, f32> = HashMap::new();
    for ranking in rankings {
        if ranking.weight <= 0.0 {
            continue;
        }
        for (position, chunk_id) in ranking.chunk_ids.iter().enumerate() {
            let rank = (position + 1) as f32;
            *fused.entry(chunk_id.as_str()).or_insert(0.0) += ranking.weight / (RRF_K + rank);
        }
    }

    let mut out: Vec<(String, f32)> = fused
        .into_iter()
        .map(|(id, score)| (id.to_owned(), score))
        .collect();
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}

/// Normalize a fused score into `[0, 1]`.
///
/// With fusion weights summing to 1, the maximum achievable fused score is
/// `1 / (K + 1)` (rank 1 in every ranking), so scaling by `K + 1` maps a
/// chunk that tops every ranking to exactly 1.0.
#[must_use]
pub fn normalize(score: f32) -> f32 {
    (score * (RRF_K + 1.0)).clamp(0.0, 1.0)
}

/// Two-way fusion for hybrid search: `alpha` weights the vector ranking,
/// `1 - alpha` the keyword ranking. Scores are normalized into `[0, 1]`.
#[must_use]
pub fn fuse_hybrid(
    vector_ids: &[String],
    keyword_ids: &[String],
    alpha: f32,
) -> Vec<(String, f32)> {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut fused = fuse(&[
        WeightedRanking {
            chunk_ids: vector_ids,
            weight: alpha,
        },
        WeightedRanking {
            chunk_ids: keyword_ids,
            weight: 1.0 - alpha,
        },
    ]);
    for (_, score) in &mut fused {
        *score = normalize(*score);
    }
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn alpha_zero_is_pure_keyword() {
        let fused = fuse_hybrid(&ids(&["v1", "v2"]), &ids(&["k1", "k2"]), 0.0);
        let order: Vec<&str> = fused.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["k1", "k2"]);
    }

    #[test]
    fn alpha_one_is_pure_vector() {
        let fused = fuse_hybrid(&ids(&["v1", "v2"]), &ids(&["k1", "k2"]), 1.0);
        let order: Vec<&str> = fused.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["v1", "v2"]);
    }

    #[test]
    fn chunk_in_both_rankings_beats_single_ranking_chunks() {
        let fused = fuse_hybrid(&ids(&["both", "only_v"]), &ids(&["both", "only_k"]), 0.5);
        assert_eq!(fused[0].0, "both");
        // Rank 1 in both rankings is the normalized ceiling.
        assert!((fused[0].1 - 1.0).abs() < 1e-6);
        assert!(fused.iter().all(|(_, s)| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn ties_break_by_ascending_chunk_id() {
        let fused = fuse_hybrid(&ids(&["zzz"]), &ids(&["aaa"]), 0.5);
        assert_eq!(fused[0].0, "aaa");
        assert_eq!(fused[1].0, "zzz");
    }

    #[test]
    fn fused_scores_are_monotone_in_rank() {
        let fused = fuse_hybrid(
            &ids(&["a", "b", "c"]),
            &ids(&["a", "b", "c"]),
            0.5,
        );
        assert!(fused[0].1 > fused[1].1);
        assert!(fused[1].1 > fused[2].1);
    }
}
