//! # Contextual embeddings
//!
//! The BCN reads fixed word representations. They come either from ELMo
//! activations precomputed into safetensors files ([`ElmoCache`]) or from a
//! deterministic hashed table ([`HashedEmbedder`]) when no cache is available.

pub mod cache;
pub mod hashed;

use candle_core::Tensor;

use crate::data::Split;
use crate::error::Result;

pub use cache::ElmoCache;
pub use hashed::HashedEmbedder;

/// Layer count and width of the vectors an embedder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingShape {
    pub layers: usize,
    pub dim: usize,
}

/// Source of fixed contextual word vectors.
pub trait ContextualEmbedder {
    fn shape(&self) -> EmbeddingShape;

    /// Returns a `[layers, tokens.len(), dim]` f32 tensor for the sentence at
    /// `index` of `split`.
    fn embed(&self, split: Split, index: usize, tokens: &[String]) -> Result<Tensor>;
}
