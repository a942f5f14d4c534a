//! # ELMo-BCN classifier session
//!
//! Owns the network, its variables and optimizer, and runs the dry run,
//! training with early stopping, and test evaluation.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use bcn_core::{Bcn, ContextualEmbedder, Dataset, Hyperparameters, Split};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{loss, VarBuilder, VarMap};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::batch::{build_batch, sequential_batches, shuffled_batches};
use crate::optim::BcnOptimizer;

/// Epochs without dev improvement before training stops.
pub const EARLY_STOPPING_PATIENCE: usize = 5;

/// Best weights, written inside the output directory.
pub const WEIGHTS_FILE: &str = "bcn.safetensors";

/// Hyperparameters as JSON, written next to the weights.
pub const HYPERPARAMETERS_FILE: &str = "hyperparameters.json";

/// Batch size of the model dry run.
const DRY_RUN_BATCH: usize = 2;

pub struct ElmoBcn {
    hp: Hyperparameters,
    n_classes: usize,
    max_sent_len: usize,
    output_dir: PathBuf,
    embedder: Box<dyn ContextualEmbedder>,
    device: Device,
    varmap: VarMap,
    model: Bcn,
    optimizer: BcnOptimizer,
    seed: u64,
}

impl ElmoBcn {
    /// Builds the network for a task with `n_classes` labels and sentences
    /// of at most `max_sent_len` tokens.
    pub fn new(
        hp: Hyperparameters,
        n_classes: usize,
        max_sent_len: usize,
        output_dir: impl Into<PathBuf>,
        embedder: Box<dyn ContextualEmbedder>,
    ) -> Result<Self> {
        hp.validate()?;
        if n_classes == 0 {
            anyhow::bail!("a classifier needs at least one class");
        }

        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = Bcn::new(&hp, n_classes, embedder.shape(), vb)
            .context("failed to build the BCN")?;
        let optimizer = BcnOptimizer::new(&hp, varmap.all_vars())?;

        Ok(Self {
            hp,
            n_classes,
            max_sent_len: max_sent_len.max(1),
            output_dir: output_dir.into(),
            embedder,
            device,
            varmap,
            model,
            optimizer,
            seed: 0,
        })
    }

    /// Seed for mini-batch shuffling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn parameter_count(&self) -> usize {
        self.varmap
            .all_vars()
            .iter()
            .map(|v| v.as_tensor().elem_count())
            .sum()
    }

    /// Pushes a zero batch of full-length sentences through the network in
    /// both modes. Touches no files.
    pub fn dry_run(&self) -> Result<()> {
        let shape = self.embedder.shape();
        let steps = self.max_sent_len;
        let input = bcn_core::BcnInput {
            embeddings: Tensor::zeros(
                (DRY_RUN_BATCH, shape.layers, steps, shape.dim),
                DType::F32,
                &self.device,
            )?,
            mask: Tensor::ones((DRY_RUN_BATCH, steps), DType::F32, &self.device)?,
            lengths: vec![steps; DRY_RUN_BATCH],
        };

        let train_out = self.model.forward_t(&input, true)?;
        let eval_out = self.model.forward_t(&input, false)?;
        anyhow::ensure!(
            train_out.dims() == [DRY_RUN_BATCH, self.n_classes]
                && eval_out.dims() == [DRY_RUN_BATCH, self.n_classes],
            "unexpected output shape {:?}",
            eval_out.dims()
        );

        info!(
            parameters = self.parameter_count(),
            n_classes = self.n_classes,
            max_sent_len = self.max_sent_len,
            embedding_layers = shape.layers,
            embedding_dim = shape.dim,
            output_shape = ?eval_out.dims(),
            "BCN dry run succeeded"
        );
        Ok(())
    }

    /// Trains until `n_epochs` or early stopping and returns the best dev
    /// accuracy. The weights of the best epoch are saved and reloaded.
    pub fn train(&mut self, dataset: &Dataset) -> Result<f64> {
        let train = dataset.split(Split::Train);
        anyhow::ensure!(!train.is_empty(), "training split is empty");

        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("failed to create {}", self.output_dir.display())
        })?;
        let hp_path = self.output_dir.join(HYPERPARAMETERS_FILE);
        std::fs::write(&hp_path, serde_json::to_string_pretty(&self.hp)?)
            .with_context(|| format!("failed to write {}", hp_path.display()))?;
        let weights_path = self.output_dir.join(WEIGHTS_FILE);

        info!(
            parameters = self.parameter_count(),
            train = train.len(),
            dev = dataset.split(Split::Dev).len(),
            epochs = self.hp.n_epochs,
            batch_size = self.hp.batch_size,
            optimizer = %self.hp.optimizer,
            lr = self.optimizer.learning_rate(),
            "starting training"
        );

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best_accuracy = f64::NEG_INFINITY;
        let mut best_epoch = 0;
        let mut stale_epochs = 0;

        for epoch in 1..=self.hp.n_epochs {
            let started = Instant::now();
            let mut loss_sum = 0.0;
            let batches = shuffled_batches(train.len(), self.hp.batch_size, &mut rng);

            for (step, indices) in batches.iter().enumerate() {
                let batch = build_batch(
                    &*self.embedder,
                    train,
                    Split::Train,
                    indices,
                    self.max_sent_len,
                    &self.device,
                )?;
                let logits = self.model.forward_t(&batch.input, true)?;
                let loss = loss::cross_entropy(&logits, &batch.labels)?;
                self.optimizer.backward_step(&loss)?;

                let loss = f64::from(loss.to_scalar::<f32>()?);
                loss_sum += loss;
                debug!(epoch, step, size = batch.len(), loss, "train step");
            }

            let train_loss = loss_sum / batches.len().max(1) as f64;
            let dev_accuracy = self.evaluate(dataset, Split::Dev)?;
            let improved = dev_accuracy > best_accuracy;
            if improved {
                best_accuracy = dev_accuracy;
                best_epoch = epoch;
                stale_epochs = 0;
                self.varmap
                    .save(&weights_path)
                    .with_context(|| format!("failed to save {}", weights_path.display()))?;
            } else {
                stale_epochs += 1;
            }

            info!(
                epoch,
                train_loss,
                dev_accuracy,
                improved,
                secs = started.elapsed().as_secs_f64(),
                "epoch complete"
            );

            if stale_epochs >= EARLY_STOPPING_PATIENCE {
                info!(
                    epoch,
                    patience = EARLY_STOPPING_PATIENCE,
                    "dev accuracy stopped improving, stopping early"
                );
                break;
            }
        }

        self.varmap
            .load(&weights_path)
            .with_context(|| format!("failed to reload {}", weights_path.display()))?;
        info!(best_epoch, best_dev_accuracy = best_accuracy, "restored best weights");

        Ok(best_accuracy)
    }

    /// Accuracy on the test split with the current weights.
    pub fn test(&self, dataset: &Dataset) -> Result<f64> {
        let accuracy = self.evaluate(dataset, Split::Test)?;
        info!(test_accuracy = accuracy, "test evaluation");
        Ok(accuracy)
    }

    /// Fraction of correctly classified examples in `split`; 0.0 when empty.
    pub fn evaluate(&self, dataset: &Dataset, split: Split) -> Result<f64> {
        let examples = dataset.split(split);
        if examples.is_empty() {
            return Ok(0.0);
        }

        let mut correct = 0usize;
        for indices in sequential_batches(examples.len(), self.hp.batch_size) {
            let batch = build_batch(
                &*self.embedder,
                examples,
                split,
                &indices,
                self.max_sent_len,
                &self.device,
            )?;
            let predictions = self.model.forward_t(&batch.input, false)?.argmax(D::Minus1)?;
            let hits = predictions
                .eq(&batch.labels)?
                .to_dtype(DType::U32)?
                .sum_all()?
                .to_scalar::<u32>()?;
            correct += hits as usize;
        }

        Ok(correct as f64 / examples.len() as f64)
    }
}
