//! Padded mini-batches of embedded sentences.

use bcn_core::{BcnInput, ContextualEmbedder, Example, Result, Split};
use candle_core::{DType, Device, Tensor};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Inputs and targets for one optimization or evaluation step.
pub struct Batch {
    pub input: BcnInput,
    /// `[batch]` class indices, u32.
    pub labels: Tensor,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.input.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.lengths.is_empty()
    }
}

/// Splits `0..n` into consecutive chunks of `batch_size`.
pub fn sequential_batches(n: usize, batch_size: usize) -> Vec<Vec<usize>> {
    let indices: Vec<usize> = (0..n).collect();
    indices
        .chunks(batch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}

/// Shuffles `0..n` and splits it into chunks of `batch_size`.
pub fn shuffled_batches(n: usize, batch_size: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices
        .chunks(batch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}

/// Embeds `examples[indices]` from `split` and pads them to a common length.
///
/// Sentences are cut at `max_sent_len` tokens. An empty sentence becomes a
/// single zero vector so every row has at least one unmasked step.
pub fn build_batch(
    embedder: &dyn ContextualEmbedder,
    examples: &[Example],
    split: Split,
    indices: &[usize],
    max_sent_len: usize,
    device: &Device,
) -> Result<Batch> {
    let shape = embedder.shape();
    let mut rows = Vec::with_capacity(indices.len());
    let mut lengths = Vec::with_capacity(indices.len());
    let mut labels = Vec::with_capacity(indices.len());

    for &index in indices {
        let example = &examples[index];
        let row = if example.tokens.is_empty() {
            Tensor::zeros((shape.layers, 1, shape.dim), DType::F32, device)?
        } else {
            let full = embedder.embed(split, index, &example.tokens)?;
            let keep = example.tokens.len().min(max_sent_len.max(1));
            full.narrow(1, 0, keep)?
        };
        lengths.push(row.dim(1)?);
        labels.push(example.label as u32);
        rows.push(row);
    }

    let steps = lengths.iter().copied().max().unwrap_or(1);
    let mut padded = Vec::with_capacity(rows.len());
    let mut mask = Vec::with_capacity(rows.len() * steps);
    for (row, &len) in rows.into_iter().zip(lengths.iter()) {
        let row = if len < steps {
            let pad = Tensor::zeros((shape.layers, steps - len, shape.dim), DType::F32, device)?;
            Tensor::cat(&[row, pad], 1)?
        } else {
            row
        };
        padded.push(row);
        mask.extend((0..steps).map(|t| if t < len { 1f32 } else { 0f32 }));
    }

    let batch = padded.len();
    Ok(Batch {
        input: BcnInput {
            embeddings: Tensor::stack(&padded, 0)?,
            mask: Tensor::from_vec(mask, (batch, steps), device)?,
            lengths,
        },
        labels: Tensor::from_vec(labels, batch, device)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bcn_core::HashedEmbedder;
    use rand::SeedableRng;

    fn example(words: &[&str], label: usize) -> Example {
        Example::new(words.iter().map(|w| w.to_string()).collect(), label)
    }

    #[test]
    fn pads_truncates_and_masks() {
        let embedder = HashedEmbedder::new(4, 0, Device::Cpu);
        let examples = vec![
            example(&["a", "b", "c", "d", "e"], 1),
            example(&["a", "b"], 0),
            example(&[], 2),
        ];

        let batch =
            build_batch(&embedder, &examples, Split::Train, &[0, 1, 2], 3, &Device::Cpu).unwrap();
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
        assert_eq!(batch.input.lengths, vec![3, 2, 1]);
        assert_eq!(batch.input.embeddings.dims(), &[3, 1, 3, 4]);

        let mask: Vec<Vec<f32>> = batch.input.mask.to_vec2().unwrap();
        assert_eq!(mask[0], vec![1., 1., 1.]);
        assert_eq!(mask[1], vec![1., 1., 0.]);
        assert_eq!(mask[2], vec![1., 0., 0.]);

        let labels: Vec<u32> = batch.labels.to_vec1().unwrap();
        assert_eq!(labels, vec![1, 0, 2]);
    }

    #[test]
    fn shuffled_batches_cover_every_index_once() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let batches = shuffled_batches(10, 4, &mut rng);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);

        let mut all: Vec<usize> = batches.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn sequential_batches_keep_order() {
        assert_eq!(
            sequential_batches(5, 2),
            vec![vec![0, 1], vec![2, 3], vec![4]]
        );
        assert!(sequential_batches(0, 2).is_empty());
    }
}
