//! Deterministic hashed word vectors.

use candle_core::{Device, Tensor};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{ContextualEmbedder, EmbeddingShape};
use crate::data::Split;
use crate::error::Result;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a. Unlike `DefaultHasher` its output is fixed across
/// toolchains, so saved weights keep meaning the same vectors.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Maps every token to a fixed pseudo-random vector derived from the token
/// text and a seed. Same token, same seed, same vector.
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dim: usize,
    seed: u64,
    device: Device,
}

impl HashedEmbedder {
    pub fn new(dim: usize, seed: u64, device: Device) -> Self {
        Self { dim, seed, device }
    }

    fn token_vector(&self, token: &str, out: &mut Vec<f32>) {
        let mut rng = ChaCha8Rng::seed_from_u64(fnv1a(token.as_bytes()) ^ self.seed);

        let scale = 1.0 / (self.dim as f32).sqrt();
        out.extend((0..self.dim).map(|_| rng.gen_range(-scale..=scale)));
    }
}

impl ContextualEmbedder for HashedEmbedder {
    fn shape(&self) -> EmbeddingShape {
        EmbeddingShape {
            layers: 1,
            dim: self.dim,
        }
    }

    fn embed(&self, _split: Split, _index: usize, tokens: &[String]) -> Result<Tensor> {
        let mut values = Vec::with_capacity(tokens.len() * self.dim);
        for token in tokens {
            self.token_vector(token, &mut values);
        }
        Ok(Tensor::from_vec(
            values,
            (1, tokens.len(), self.dim),
            &self.device,
        )?)
    }
}
