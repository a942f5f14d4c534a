//! # BCN Core
//!
//! Building blocks for training a Biattentive Classification Network on top
//! of fixed ELMo embeddings: transfer-task datasets, embedding sources, the
//! network itself and its hyperparameters.
//!
//! ## Quick Start
//!
//! ```rust
//! use bcn_core::{Hyperparameters, TransferTask};
//!
//! let task: TransferTask = "SSTFine_lower".parse().unwrap();
//! assert!(task.lowercase());
//!
//! let hp = Hyperparameters::default();
//! assert!(hp.validate().is_ok());
//! assert!(hp.to_python_dict().starts_with("{'n_epochs': 20"));
//! ```
pub mod data;
pub mod embedding;
pub mod error;
pub mod hyperparams;
pub mod model;

// Re-export primary API
pub use data::{Dataset, Example, Split, TransferTask};
pub use embedding::{ContextualEmbedder, ElmoCache, EmbeddingShape, HashedEmbedder};
pub use error::{BcnError, Result};
pub use hyperparams::{python_dict, python_float, str2bool, Hyperparameters, OptimizerKind, PyValue};
pub use model::{Bcn, BcnInput};
