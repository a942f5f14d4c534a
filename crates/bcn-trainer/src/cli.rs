//! Command-line arguments of the `eval` binary.

use std::path::PathBuf;

use bcn_core::{str2bool, Hyperparameters, OptimizerKind};
use clap::{CommandFactory, Parser};

/// What a run does after parsing its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Train on the full dataset, then test.
    Normal,
    /// Build the model, push one batch through it, and exit.
    ModelDryRun,
    /// Train and test on a reduced dataset.
    PipelineDryRun,
}

impl RunMode {
    /// Any value other than 1 or 2 is a normal run.
    pub fn from_flag(mode: i64) -> Self {
        match mode {
            1 => Self::ModelDryRun,
            2 => Self::PipelineDryRun,
            _ => Self::Normal,
        }
    }
}

/// Replication of the CoVe BCN using ELMo as input embedding
#[derive(Parser, Debug, Clone)]
#[command(name = "eval")]
#[command(version)]
pub struct EvalArgs {
    /// Path to the directory that contains the datasets
    #[arg(long = "datadir", default_value = "../datasets")]
    pub datadir: PathBuf,

    /// Path to the directory where the BCN model will be saved
    #[arg(long = "outputdir", default_value = "/cache/result")]
    pub outputdir: PathBuf,

    /// 0: Normal (train + test); 1: BCN model dry-run (just try creating the
    /// model and do nothing else); 2: Train + test dry-run (load a smaller
    /// dataset and train + test on it)
    #[arg(long = "mode", default_value_t = 0, allow_negative_numbers = true)]
    pub mode: i64,

    /// Transfer task used for training BCN and evaluating predictions (e.g.
    /// SSTBinary, SSTFine, SSTBinary_lower, SSTFine_lower, TREC6, TREC50,
    /// TREC6_lower, TREC50_lower)
    #[arg(long = "transfer_task", default_value = "SSTFine")]
    pub transfer_task: String,

    /// Number of epochs. After 5 epochs of worse dev accuracy, training is
    /// stopped early and the best epoch is kept (based on dev accuracy)
    #[arg(long = "n_epochs", default_value_t = 20)]
    pub n_epochs: usize,

    /// Batch size
    #[arg(long = "batch_size", default_value_t = 8)]
    pub batch_size: usize,

    /// Whether to use the same BiLSTM (True) or separate BiLSTMs (False) for
    /// the encoder
    #[arg(long = "same_bilstm_for_encoder", default_value = "False")]
    pub same_bilstm_for_encoder: String,

    /// Number of hidden states in the encoder's BiLSTM(s)
    #[arg(long = "bilstm_encoder_n_hidden", default_value_t = 300)]
    pub bilstm_encoder_n_hidden: usize,

    /// Forget bias for the encoder's BiLSTM(s)
    #[arg(long = "bilstm_encoder_forget_bias", default_value_t = 1.0)]
    pub bilstm_encoder_forget_bias: f64,

    /// Number of hidden states in the integrate BiLSTMs
    #[arg(long = "bilstm_integrate_n_hidden", default_value_t = 300)]
    pub bilstm_integrate_n_hidden: usize,

    /// Forget bias for the integrate BiLSTMs
    #[arg(long = "bilstm_integrate_forget_bias", default_value_t = 1.0)]
    pub bilstm_integrate_forget_bias: f64,

    /// Ratio for dropout applied before the feedforward network and before
    /// each batch norm
    #[arg(long = "dropout_ratio", default_value_t = 0.1)]
    pub dropout_ratio: f64,

    /// On the first and second maxout layers, the dimensionality is divided
    /// by this number
    #[arg(long = "output_reduction", default_value_t = 2)]
    pub output_reduction: usize,

    /// Optimizer (adam or gradientdescent)
    #[arg(long = "optimizer", default_value = "adam")]
    pub optimizer: String,

    /// Learning rate
    #[arg(long = "learning_rate", default_value_t = 0.0001)]
    pub learning_rate: f64,

    /// Beta1 for the adam optimizer
    #[arg(long = "adam_beta1", default_value_t = 0.9)]
    pub adam_beta1: f64,

    /// Beta2 for the adam optimizer
    #[arg(long = "adam_beta2", default_value_t = 0.999)]
    pub adam_beta2: f64,

    /// Epsilon for the adam optimizer
    #[arg(long = "adam_epsilon", default_value_t = 1e-8)]
    pub adam_epsilon: f64,

    /// Directory with precomputed ELMo activations ({train,dev,test}.safetensors).
    /// Without it, hashed word vectors are used
    #[arg(long = "elmo_cache")]
    pub elmo_cache: Option<PathBuf>,

    /// Width of the hashed word vectors used when no ELMo cache is given
    #[arg(long = "embedding_dim", default_value_t = 1024)]
    pub embedding_dim: usize,

    /// Seed for batch shuffling and hashed word vectors
    #[arg(long = "seed", default_value_t = 1234)]
    pub seed: u64,
}

impl EvalArgs {
    /// Parses the process arguments, skipping flags this binary does not
    /// know. Job runners append their own (`--data_url`, `--train_url`).
    /// Exits with clap's usage message on a malformed known flag.
    pub fn parse_known() -> (Self, Vec<String>) {
        let argv = std::env::args_os().map(|arg| arg.to_string_lossy().into_owned());
        match Self::try_parse_known_from(argv) {
            Ok(parsed) => parsed,
            Err(e) => e.exit(),
        }
    }

    /// Like [`Parser::try_parse_from`], but unknown `--flag [value]` pairs and
    /// stray positionals are returned instead of rejected.
    pub fn try_parse_known_from<I, T>(argv: I) -> Result<(Self, Vec<String>), clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let command = Self::command();
        let takes_value = |name: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_long() == Some(name))
                .map(|arg| arg.get_action().takes_values())
        };

        let mut argv = argv.into_iter().map(Into::into).peekable();
        let mut known: Vec<String> = argv.next().into_iter().collect();
        let mut ignored = Vec::new();

        while let Some(arg) = argv.next() {
            if matches!(arg.as_str(), "-h" | "--help" | "-V" | "--version") {
                known.push(arg);
                continue;
            }
            let Some(flag) = arg.strip_prefix("--") else {
                ignored.push(arg);
                continue;
            };
            let (name, inline_value) = match flag.split_once('=') {
                Some((name, _)) => (name, true),
                None => (flag, false),
            };

            match takes_value(name) {
                Some(needs_value) => {
                    let pull_value = needs_value && !inline_value;
                    known.push(arg);
                    if pull_value {
                        known.extend(argv.next());
                    }
                }
                None => {
                    let pull_value = !inline_value
                        && argv.peek().is_some_and(|next| !next.starts_with("--"));
                    ignored.push(arg);
                    if pull_value {
                        ignored.extend(argv.next());
                    }
                }
            }
        }

        Ok((Self::try_parse_from(known)?, ignored))
    }

    pub fn run_mode(&self) -> RunMode {
        RunMode::from_flag(self.mode)
    }

    /// Collects and validates the hyperparameter record handed to the
    /// classifier.
    pub fn hyperparameters(&self) -> bcn_core::Result<Hyperparameters> {
        let hp = Hyperparameters {
            n_epochs: self.n_epochs,
            batch_size: self.batch_size,
            same_bilstm_for_encoder: str2bool(&self.same_bilstm_for_encoder),
            bilstm_encoder_n_hidden: self.bilstm_encoder_n_hidden,
            bilstm_encoder_forget_bias: self.bilstm_encoder_forget_bias,
            bilstm_integrate_n_hidden: self.bilstm_integrate_n_hidden,
            bilstm_integrate_forget_bias: self.bilstm_integrate_forget_bias,
            dropout_ratio: self.dropout_ratio,
            output_reduction: self.output_reduction,
            optimizer: self.optimizer.parse::<OptimizerKind>()?,
            learning_rate: self.learning_rate,
            adam_beta1: self.adam_beta1,
            adam_beta2: self.adam_beta2,
            adam_epsilon: self.adam_epsilon,
        };
        hp.validate()?;
        Ok(hp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_hyperparameters() {
        let args = EvalArgs::try_parse_from(["eval"]).unwrap();
        assert_eq!(args.datadir, PathBuf::from("../datasets"));
        assert_eq!(args.outputdir, PathBuf::from("/cache/result"));
        assert_eq!(args.transfer_task, "SSTFine");
        assert_eq!(args.run_mode(), RunMode::Normal);
        assert_eq!(args.hyperparameters().unwrap(), Hyperparameters::default());
    }

    #[test]
    fn parses_underscore_flags() {
        let args = EvalArgs::try_parse_from([
            "eval",
            "--mode",
            "2",
            "--transfer_task",
            "TREC6_lower",
            "--same_bilstm_for_encoder",
            "True",
            "--optimizer",
            "gradientdescent",
            "--learning_rate",
            "0.001",
            "--elmo_cache",
            "/data/elmo",
        ])
        .unwrap();

        assert_eq!(args.run_mode(), RunMode::PipelineDryRun);
        let hp = args.hyperparameters().unwrap();
        assert!(hp.same_bilstm_for_encoder);
        assert_eq!(hp.optimizer, OptimizerKind::GradientDescent);
        assert_eq!(hp.learning_rate, 0.001);
        assert_eq!(args.elmo_cache, Some(PathBuf::from("/data/elmo")));
    }

    #[test]
    fn other_modes_run_normally() {
        for mode in ["0", "3", "-1"] {
            let args = EvalArgs::try_parse_from(["eval", "--mode", mode]).unwrap();
            assert_eq!(args.run_mode(), RunMode::Normal, "mode {mode}");
        }
    }

    #[test]
    fn rejects_unknown_optimizer_and_invalid_values() {
        let args = EvalArgs::try_parse_from(["eval", "--optimizer", "rmsprop"]).unwrap();
        assert!(args.hyperparameters().is_err());

        let args = EvalArgs::try_parse_from(["eval", "--dropout_ratio", "1.5"]).unwrap();
        assert!(args.hyperparameters().is_err());
    }

    #[test]
    fn runner_flags_are_ignored() {
        let (args, ignored) = EvalArgs::try_parse_known_from([
            "eval",
            "--data_url",
            "s3://x",
            "--mode",
            "1",
            "--train_url=s3://y",
            "--init_method",
            "--transfer_task=TREC6",
            "stray",
        ])
        .unwrap();

        assert_eq!(args.run_mode(), RunMode::ModelDryRun);
        assert_eq!(args.transfer_task, "TREC6");
        assert_eq!(
            ignored,
            ["--data_url", "s3://x", "--train_url=s3://y", "--init_method", "stray"]
        );
    }

    #[test]
    fn known_flags_still_report_bad_values() {
        let parsed = EvalArgs::try_parse_known_from(["eval", "--data_url", "x", "--n_epochs", "many"]);
        assert!(parsed.is_err());

        let (args, ignored) = EvalArgs::try_parse_known_from(["eval"]).unwrap();
        assert!(ignored.is_empty());
        assert_eq!(args.run_mode(), RunMode::Normal);
    }
}
