//! Embedding capability trait and vector utilities.
//!
//! Defines the [`Embedder`] trait every embedding backend implements and
//! the [`ModelIdentity`] used to detect when previously stored vectors
//! were produced by a different model.
//!
//! Concrete provider clients (Hugging Face, Ollama, OpenAI) live in the
//! `kb-index` app crate.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// The (provider, model) pair whose change invalidates stored vectors.
///
/// Rendered as `provider:model`, which is the exact text persisted in
/// `model_name.txt` beside the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelIdentity {
    pub provider: String,
    pub model: String,
}

impl ModelIdentity {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// Turns text into fixed-length vectors.
///
/// Implementations must not perform network I/O until the first embedding
/// request.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the identity of the configured provider and model.
    fn identity(&self) -> ModelIdentity;

    /// Embed a batch of document texts, one vector per input, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Squared Euclidean distance between two vectors.
///
/// Returns `f32::INFINITY` for vectors of different lengths so they sort
/// last.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display() {
        let id = ModelIdentity::new("ollama", "nomic-embed-text:latest");
        assert_eq!(id.to_string(), "ollama:nomic-embed-text:latest");
    }

    #[test]
    fn test_squared_l2_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(squared_l2(&v, &v), 0.0);
    }

    #[test]
    fn test_squared_l2_known_value() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((squared_l2(&a, &b) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_squared_l2_different_lengths() {
        assert!(squared_l2(&[1.0, 2.0], &[1.0]).is_infinite());
    }
}
