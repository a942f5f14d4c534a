//! The `eval` pipeline: dry run, or dataset load, train, test and result files.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use bcn_core::{
    python_dict, ContextualEmbedder, Dataset, ElmoCache, HashedEmbedder, Hyperparameters, PyValue,
    TransferTask,
};
use candle_core::Device;
use tracing::info;

use crate::classifier::ElmoBcn;
use crate::cli::{EvalArgs, RunMode};

pub const INFO_FILE: &str = "info.txt";
pub const ACCURACY_FILE: &str = "accuracy.txt";

/// Task shape used by the model dry run.
pub const DRY_RUN_CLASSES: usize = 3;
pub const DRY_RUN_MAX_SENT_LEN: usize = 128;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    DryRun,
    Completed {
        dev_accuracy: f64,
        test_accuracy: f64,
    },
}

/// Picks the embedding source: the ELMo cache when given, hashed vectors
/// otherwise.
pub fn build_embedder(args: &EvalArgs, device: &Device) -> Result<Box<dyn ContextualEmbedder>> {
    match &args.elmo_cache {
        Some(dir) => {
            let cache = ElmoCache::open(dir, device.clone())
                .with_context(|| format!("failed to open ELMo cache at {}", dir.display()))?;
            Ok(Box::new(cache))
        }
        None => {
            info!(
                dim = args.embedding_dim,
                "no ELMo cache given, using hashed word vectors"
            );
            Ok(Box::new(HashedEmbedder::new(
                args.embedding_dim,
                args.seed,
                device.clone(),
            )))
        }
    }
}

/// Writes `info.txt` unless it already exists.
pub fn write_info(output_dir: &Path, transfer_task: &str, hp: &Hyperparameters) -> Result<()> {
    let path = output_dir.join(INFO_FILE);
    if path.exists() {
        info!(path = %path.display(), "keeping existing run info");
        return Ok(());
    }
    std::fs::write(&path, format!("{transfer_task}\n{}", hp.to_python_dict()))
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Overwrites `accuracy.txt` with the dev and test accuracies.
pub fn write_accuracy(output_dir: &Path, dev: f64, test: f64) -> Result<()> {
    let path = output_dir.join(ACCURACY_FILE);
    let body = python_dict(&[("dev", PyValue::Float(dev)), ("test", PyValue::Float(test))]);
    std::fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))
}

/// Runs the pipeline selected by `args.mode`. `started` is the process start
/// time used for the final timing line.
///
/// Hyperparameters are validated before anything touches the output
/// directory.
pub fn run(args: &EvalArgs, started: Instant) -> Result<Outcome> {
    let hp = args.hyperparameters()?;
    let device = Device::Cpu;
    let mode = args.run_mode();

    if mode == RunMode::ModelDryRun {
        let embedder = build_embedder(args, &device)?;
        let bcn = ElmoBcn::new(
            hp,
            DRY_RUN_CLASSES,
            DRY_RUN_MAX_SENT_LEN,
            &args.outputdir,
            embedder,
        )?;
        bcn.dry_run()?;
        return Ok(Outcome::DryRun);
    }

    std::fs::create_dir_all(&args.outputdir)
        .with_context(|| format!("failed to create {}", args.outputdir.display()))?;
    write_info(&args.outputdir, &args.transfer_task, &hp)?;

    let task: TransferTask = args.transfer_task.parse()?;
    let dataset = Dataset::load(task, &args.datadir, mode == RunMode::PipelineDryRun)
        .with_context(|| format!("failed to load {task} from {}", args.datadir.display()))?;

    let embedder = build_embedder(args, &device)?;
    let mut bcn = ElmoBcn::new(
        hp,
        dataset.n_classes(),
        dataset.max_sent_len(),
        &args.outputdir,
        embedder,
    )?
    .with_seed(args.seed);

    let dev_accuracy = bcn.train(&dataset)?;
    let test_accuracy = bcn.test(&dataset)?;
    write_accuracy(bcn.output_dir(), dev_accuracy, test_accuracy)?;

    info!(dev_accuracy, test_accuracy, task = %dataset.task(), "run complete");
    println!(
        "\nReal time taken to train + test: {} seconds",
        started.elapsed().as_secs_f64()
    );

    Ok(Outcome::Completed {
        dev_accuracy,
        test_accuracy,
    })
}
