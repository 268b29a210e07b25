//! Embedding value object

use serde::{Deserialize, Serialize};

/// Value Object: a dense embedding vector produced by a provider.
///
/// Embeddings are owned by their document and co-located with it in the
/// storage backend. All embeddings in one backend share the same dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// The dense vector
    pub vector: Vec<f32>,
    /// Model identifier that produced this vector
    pub model: String,
    /// Vector dimension (always `vector.len()`)
    pub dimensions: usize,
}

impl Embedding {
    /// Create an embedding from a raw vector
    #[must_use]
    pub fn new(vector: Vec<f32>, model: impl Into<String>) -> Self {
        let dimensions = vector.len();
        Self {
            vector,
            model: model.into(),
            dimensions,
        }
    }

    /// L2 norm of the vector
    #[must_use]
    pub fn norm(&self) -> f32 {
        self.vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Return a unit-normalized copy. Zero vectors are returned unchanged.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let norm = self.norm();
        if norm <= f32::EPSILON {
            return self.clone();
        }
        Self {
            vector: self.vector.iter().map(|x| x / norm).collect(),
            model: self.model.clone(),
            dimensions: self.dimensions,
        }
    }
}

/// Cosine similarity between two vectors of equal length, in `[-1, 1]`.
///
/// Returns 0.0 when either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Map a cosine similarity from `[-1, 1]` to a score in `[0, 1]`.
#[must_use]
pub fn cosine_to_unit_score(cos: f32) -> f32 {
    ((1.0 + cos) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_has_unit_norm() {
        let e = Embedding::new(vec![3.0, 4.0], "test");
        let n = e.normalized();
        assert!((n.norm() - 1.0).abs() < 1e-6);
        assert_eq!(n.dimensions, 2);
    }

    #[test]
    fn zero_vector_survives_normalization() {
        let e = Embedding::new(vec![0.0, 0.0], "test");
        assert_eq!(e.normalized().vector, vec![0.0, 0.0]);
    }

    #[test]
    fn cosine_score_bounds() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_to_unit_score(cosine_similarity(&a, &a)) - 1.0).abs() < 1e-6);
        assert!(cosine_to_unit_score(cosine_similarity(&a, &b)).abs() < 1e-6);
    }
}
