//! # BCN Trainer
//!
//! Trains and evaluates the ELMo-BCN classifier on a transfer task. The
//! `eval` binary parses hyperparameters, builds the dataset and classifier,
//! and records accuracies in the output directory.

pub mod batch;
pub mod classifier;
pub mod cli;
pub mod optim;
pub mod run;

pub use classifier::ElmoBcn;
pub use cli::{EvalArgs, RunMode};
pub use run::{run, Outcome};
