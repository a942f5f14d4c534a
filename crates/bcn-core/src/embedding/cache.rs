//! Precomputed ELMo activations stored as safetensors.
//!
//! The cache directory holds `train.safetensors`, `dev.safetensors` and
//! `test.safetensors`. Each file maps the decimal index of a sentence in its
//! split to an f32 tensor of shape `[layers, len, dim]`.

use std::collections::HashMap;
use std::path::Path;

use candle_core::safetensors::MmapedSafetensors;
use candle_core::{Device, Tensor};
use safetensors::Dtype;
use tracing::info;

use super::{ContextualEmbedder, EmbeddingShape};
use crate::data::Split;
use crate::error::{BcnError, Result};

pub struct ElmoCache {
    files: HashMap<Split, MmapedSafetensors>,
    shape: EmbeddingShape,
    device: Device,
}

impl ElmoCache {
    /// Memory-maps the three split files in `dir` and checks that every
    /// stored tensor is f32 with the same layer count and width.
    pub fn open(dir: &Path, device: Device) -> Result<Self> {
        let mut files = HashMap::new();
        let mut shape: Option<EmbeddingShape> = None;

        for split in Split::ALL {
            let path = dir.join(format!("{}.safetensors", split.name()));
            if !path.exists() {
                return Err(BcnError::Embedding(format!(
                    "ELMo cache file not found at {}",
                    path.display()
                )));
            }
            // SAFETY: the cache files are treated as read-only for the whole run.
            let tensors = unsafe { MmapedSafetensors::new(&path)? };

            let mut count = 0usize;
            for (name, view) in tensors.tensors() {
                if view.dtype() != Dtype::F32 {
                    return Err(BcnError::Embedding(format!(
                        "{}: tensor {name} has dtype {:?}, expected F32",
                        path.display(),
                        view.dtype()
                    )));
                }
                let found = match view.shape() {
                    &[layers, _len, dim] => EmbeddingShape { layers, dim },
                    other => {
                        return Err(BcnError::Embedding(format!(
                            "{}: tensor {name} has shape {other:?}, expected [layers, len, dim]",
                            path.display()
                        )));
                    }
                };
                match shape {
                    None => shape = Some(found),
                    Some(expected) if expected != found => {
                        return Err(BcnError::Embedding(format!(
                            "{}: tensor {name} is {found:?}, other tensors are {expected:?}",
                            path.display()
                        )));
                    }
                    Some(_) => {}
                }
                count += 1;
            }

            info!(split = %split, sentences = count, path = %path.display(), "mapped ELMo cache");
            files.insert(split, tensors);
        }

        let shape =
            shape.ok_or_else(|| BcnError::Embedding(format!("{} is empty", dir.display())))?;

        Ok(Self {
            files,
            shape,
            device,
        })
    }
}

impl ContextualEmbedder for ElmoCache {
    fn shape(&self) -> EmbeddingShape {
        self.shape
    }

    fn embed(&self, split: Split, index: usize, tokens: &[String]) -> Result<Tensor> {
        let file = self
            .files
            .get(&split)
            .ok_or_else(|| BcnError::Embedding(format!("no cache for split {split}")))?;

        let key = index.to_string();
        let tensor = file.load(&key, &self.device).map_err(|_| {
            BcnError::Embedding(format!("no cached activations for {split} sentence {index}"))
        })?;

        let len = tensor.dim(1)?;
        if len != tokens.len() {
            return Err(BcnError::Embedding(format!(
                "{split} sentence {index}: cache has {len} positions, sentence has {} tokens",
                tokens.len()
            )));
        }
        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    fn write_split(dir: &Path, split: Split, lens: &[usize], layers: usize, dim: usize) {
        let tensors: HashMap<String, Tensor> = lens
            .iter()
            .enumerate()
            .map(|(i, &len)| {
                let t = Tensor::ones((layers, len, dim), DType::F32, &Device::Cpu).unwrap();
                (i.to_string(), t)
            })
            .collect();
        candle_core::safetensors::save(&tensors, dir.join(format!("{}.safetensors", split.name())))
            .unwrap();
    }

    fn words(n: usize) -> Vec<String> {
        vec!["w".to_string(); n]
    }

    #[test]
    fn loads_sentences_by_index() {
        let dir = tempfile::tempdir().unwrap();
        write_split(dir.path(), Split::Train, &[2, 5], 3, 4);
        write_split(dir.path(), Split::Dev, &[1], 3, 4);
        write_split(dir.path(), Split::Test, &[3], 3, 4);

        let cache = ElmoCache::open(dir.path(), Device::Cpu).unwrap();
        assert_eq!(cache.shape(), EmbeddingShape { layers: 3, dim: 4 });

        let t = cache.embed(Split::Train, 1, &words(5)).unwrap();
        assert_eq!(t.dims(), &[3, 5, 4]);

        assert!(cache.embed(Split::Train, 1, &words(4)).is_err());
        assert!(cache.embed(Split::Dev, 9, &words(1)).is_err());
    }

    #[test]
    fn rejects_inconsistent_width() {
        let dir = tempfile::tempdir().unwrap();
        write_split(dir.path(), Split::Train, &[2], 3, 4);
        write_split(dir.path(), Split::Dev, &[1], 3, 8);
        write_split(dir.path(), Split::Test, &[3], 3, 4);

        let err = ElmoCache::open(dir.path(), Device::Cpu).err().unwrap();
        assert!(matches!(err, BcnError::Embedding(_)), "{err}");
    }

    #[test]
    fn missing_split_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_split(dir.path(), Split::Train, &[2], 1, 4);
        assert!(ElmoCache::open(dir.path(), Device::Cpu).is_err());
    }
}
