//! # Transfer-task datasets
//!
//! Loaders for the sentence-classification tasks the BCN is evaluated on.
//! Every task yields train/dev/test splits of tokenized, labelled sentences.

pub mod sst;
pub mod trec;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::error::{BcnError, Result};

/// Number of examples kept per split when loading a dry-run dataset.
pub const DRY_RUN_SPLIT_SIZE: usize = 64;

/// One of the three dataset splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Dev,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Dev, Split::Test];

    /// Lowercase name used in file names.
    pub fn name(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Dev => "dev",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tokenized sentence with its class index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub tokens: Vec<String>,
    pub label: usize,
}

impl Example {
    pub fn new(tokens: Vec<String>, label: usize) -> Self {
        Self { tokens, label }
    }
}

/// Supported transfer tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferTask {
    SstBinary { lower: bool },
    SstFine { lower: bool },
    Trec6 { lower: bool },
    Trec50 { lower: bool },
}

impl TransferTask {
    /// Whether tokens are lowercased on load.
    pub fn lowercase(self) -> bool {
        match self {
            Self::SstBinary { lower }
            | Self::SstFine { lower }
            | Self::Trec6 { lower }
            | Self::Trec50 { lower } => lower,
        }
    }
}

impl FromStr for TransferTask {
    type Err = BcnError;

    fn from_str(s: &str) -> Result<Self> {
        let (base, lower) = match s.strip_suffix("_lower") {
            Some(base) => (base, true),
            None => (s, false),
        };
        match base {
            "SSTBinary" => Ok(Self::SstBinary { lower }),
            "SSTFine" => Ok(Self::SstFine { lower }),
            "TREC6" => Ok(Self::Trec6 { lower }),
            "TREC50" => Ok(Self::Trec50 { lower }),
            _ => Err(BcnError::UnknownTask(s.to_string())),
        }
    }
}

impl fmt::Display for TransferTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self {
            Self::SstBinary { .. } => "SSTBinary",
            Self::SstFine { .. } => "SSTFine",
            Self::Trec6 { .. } => "TREC6",
            Self::Trec50 { .. } => "TREC50",
        };
        if self.lowercase() {
            write!(f, "{base}_lower")
        } else {
            f.write_str(base)
        }
    }
}

/// A loaded transfer-task dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    task: TransferTask,
    n_classes: usize,
    train: Vec<Example>,
    dev: Vec<Example>,
    test: Vec<Example>,
}

impl Dataset {
    /// Builds a dataset from already-parsed splits.
    pub fn from_splits(
        task: TransferTask,
        n_classes: usize,
        train: Vec<Example>,
        dev: Vec<Example>,
        test: Vec<Example>,
    ) -> Self {
        Self {
            task,
            n_classes,
            train,
            dev,
            test,
        }
    }

    /// Loads `task` from `datadir`. With `dry_run`, every split is cut down
    /// to its first [`DRY_RUN_SPLIT_SIZE`] examples.
    pub fn load(task: TransferTask, datadir: &Path, dry_run: bool) -> Result<Self> {
        let mut dataset = match task {
            TransferTask::SstBinary { .. } => sst::load_binary(task, datadir)?,
            TransferTask::SstFine { .. } => sst::load_fine(task, datadir)?,
            TransferTask::Trec6 { .. } => trec::load(task, datadir, trec::Granularity::Coarse)?,
            TransferTask::Trec50 { .. } => trec::load(task, datadir, trec::Granularity::Fine)?,
        };

        if task.lowercase() {
            for split in [&mut dataset.train, &mut dataset.dev, &mut dataset.test] {
                for example in split.iter_mut() {
                    for token in example.tokens.iter_mut() {
                        *token = token.to_lowercase();
                    }
                }
            }
        }

        if dry_run {
            dataset.train.truncate(DRY_RUN_SPLIT_SIZE);
            dataset.dev.truncate(DRY_RUN_SPLIT_SIZE);
            dataset.test.truncate(DRY_RUN_SPLIT_SIZE);
        }

        info!(
            task = %task,
            train = dataset.train.len(),
            dev = dataset.dev.len(),
            test = dataset.test.len(),
            n_classes = dataset.n_classes,
            dry_run,
            "loaded dataset"
        );

        Ok(dataset)
    }

    pub fn task(&self) -> TransferTask {
        self.task
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Longest sentence across all splits, in tokens (never less than 1).
    pub fn max_sent_len(&self) -> usize {
        Split::ALL
            .iter()
            .flat_map(|&split| self.split(split))
            .map(|example| example.tokens.len())
            .max()
            .unwrap_or(0)
            .max(1)
    }

    pub fn split(&self, split: Split) -> &[Example] {
        match split {
            Split::Train => &self.train,
            Split::Dev => &self.dev,
            Split::Test => &self.test,
        }
    }
}

/// Reads a dataset file, decoding invalid UTF-8 lossily.
pub(crate) fn read_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).map_err(|source| BcnError::DatasetIo {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_names_round_trip() {
        for name in [
            "SSTBinary",
            "SSTFine",
            "SSTBinary_lower",
            "SSTFine_lower",
            "TREC6",
            "TREC50",
            "TREC6_lower",
            "TREC50_lower",
        ] {
            let task: TransferTask = name.parse().unwrap();
            assert_eq!(task.to_string(), name);
        }
    }

    #[test]
    fn unknown_task_is_rejected() {
        assert!(matches!(
            "MR".parse::<TransferTask>(),
            Err(BcnError::UnknownTask(name)) if name == "MR"
        ));
        assert!("sstfine".parse::<TransferTask>().is_err());
    }

    #[test]
    fn dry_run_keeps_the_head_of_each_split() {
        let datadir = tempfile::tempdir().unwrap();
        let fine = datadir.path().join("SST").join("fine");
        std::fs::create_dir_all(&fine).unwrap();
        let lines: String = (0..100).map(|i| format!("{} W{i}\n", i % 5)).collect();
        for split in Split::ALL {
            std::fs::write(fine.join(format!("sentiment-{}", split.name())), &lines).unwrap();
        }

        let task = TransferTask::SstFine { lower: true };
        let reduced = Dataset::load(task, datadir.path(), true).unwrap();
        for split in Split::ALL {
            assert_eq!(reduced.split(split).len(), DRY_RUN_SPLIT_SIZE);
        }
        assert_eq!(reduced.task(), task);
        assert_eq!(reduced.split(Split::Train)[0].tokens, vec!["w0"]);
        assert_eq!(reduced.split(Split::Test)[63].tokens, vec!["w63"]);

        let full = Dataset::load(task, datadir.path(), false).unwrap();
        assert_eq!(full.split(Split::Dev).len(), 100);
    }

    #[test]
    fn max_sent_len_spans_all_splits() {
        let ex = |n: usize| Example::new(vec!["w".to_string(); n], 0);
        let dataset = Dataset::from_splits(
            TransferTask::SstFine { lower: false },
            5,
            vec![ex(3)],
            vec![ex(2)],
            vec![ex(9)],
        );
        assert_eq!(dataset.max_sent_len(), 9);

        let empty = Dataset::from_splits(
            TransferTask::SstFine { lower: false },
            5,
            vec![],
            vec![],
            vec![],
        );
        assert_eq!(empty.max_sent_len(), 1);
    }
}
