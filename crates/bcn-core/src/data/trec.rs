//! TREC question classification loader.
//!
//! Lines look like `NUM:date When was Ozzy Osbourne born ?`. There is no dev
//! file, so every tenth training question is held out as dev.

use std::collections::BTreeSet;
use std::path::Path;

use super::{read_lines, tokenize, Dataset, Example, TransferTask};
use crate::error::{BcnError, Result};

pub const TRAIN_FILE: &str = "train_5500.label";
pub const TEST_FILE: &str = "TREC_10.label";

/// Coarse question types, in class-index order.
pub const COARSE_LABELS: [&str; 6] = ["ABBR", "DESC", "ENTY", "HUM", "LOC", "NUM"];

/// Held-out stride for the dev split.
const DEV_STRIDE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Six coarse classes (TREC6).
    Coarse,
    /// Full `COARSE:fine` labels (TREC50).
    Fine,
}

struct RawQuestion {
    label: String,
    tokens: Vec<String>,
}

pub fn load(task: TransferTask, datadir: &Path, granularity: Granularity) -> Result<Dataset> {
    let dir = datadir.join("TREC");
    let train_raw = parse_file(&dir.join(TRAIN_FILE), granularity)?;
    let test_raw = parse_file(&dir.join(TEST_FILE), granularity)?;

    let labels: Vec<String> = match granularity {
        Granularity::Coarse => COARSE_LABELS.iter().map(|l| l.to_string()).collect(),
        Granularity::Fine => train_raw
            .iter()
            .chain(test_raw.iter())
            .map(|q| q.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };
    let index_of = |label: &str| labels.iter().position(|l| l == label);

    let mut train = Vec::new();
    let mut dev = Vec::new();
    for (idx, question) in train_raw.into_iter().enumerate() {
        let label = index_of(&question.label).ok_or_else(|| unknown_label(&question.label))?;
        let example = Example::new(question.tokens, label);
        if idx % DEV_STRIDE == DEV_STRIDE - 1 {
            dev.push(example);
        } else {
            train.push(example);
        }
    }

    let test = test_raw
        .into_iter()
        .map(|q| {
            let label = index_of(&q.label).ok_or_else(|| unknown_label(&q.label))?;
            Ok(Example::new(q.tokens, label))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Dataset::from_splits(task, labels.len(), train, dev, test))
}

fn unknown_label(label: &str) -> BcnError {
    BcnError::UnknownLabel(label.to_string())
}

fn parse_file(path: &Path, granularity: Granularity) -> Result<Vec<RawQuestion>> {
    let mut questions = Vec::new();
    for (idx, line) in read_lines(path)?.iter().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = |reason: String| BcnError::MalformedLine {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        };

        let (label, text) = line.split_once(' ').unwrap_or((line, ""));
        let (coarse, _fine) = label
            .split_once(':')
            .ok_or_else(|| malformed(format!("label {label:?} is not COARSE:fine")))?;
        if !COARSE_LABELS.contains(&coarse) {
            return Err(malformed(format!("unknown coarse label {coarse:?}")));
        }

        let label = match granularity {
            Granularity::Coarse => coarse.to_string(),
            Granularity::Fine => label.to_string(),
        };
        questions.push(RawQuestion {
            label,
            tokens: tokenize(text),
        });
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Split;
    use std::fs;

    fn write_trec(root: &Path, train: &str, test: &str) {
        let dir = root.join("TREC");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(TRAIN_FILE), train).unwrap();
        fs::write(dir.join(TEST_FILE), test).unwrap();
    }

    fn numbered_train(n: usize) -> String {
        (0..n)
            .map(|i| {
                let label = if i % 2 == 0 { "NUM:date" } else { "HUM:ind" };
                format!("{label} question number {i} ?\n")
            })
            .collect()
    }

    #[test]
    fn coarse_labels_use_fixed_order_and_hold_out_dev() {
        let dir = tempfile::tempdir().unwrap();
        write_trec(dir.path(), &numbered_train(20), "LOC:city Where is Paris ?\n");

        let dataset = load(TransferTask::Trec6 { lower: false }, dir.path(), Granularity::Coarse)
            .unwrap();
        assert_eq!(dataset.n_classes(), 6);
        assert_eq!(dataset.split(Split::Train).len(), 18);
        assert_eq!(dataset.split(Split::Dev).len(), 2);
        assert_eq!(dataset.split(Split::Test)[0].label, 4);
        assert_eq!(dataset.split(Split::Train)[0].label, 5);
    }

    #[test]
    fn fine_labels_are_sorted_over_all_splits() {
        let dir = tempfile::tempdir().unwrap();
        write_trec(
            dir.path(),
            "NUM:date When ?\nHUM:ind Who ?\n",
            "ABBR:exp What does NASA stand for ?\n",
        );

        let dataset = load(TransferTask::Trec50 { lower: false }, dir.path(), Granularity::Fine)
            .unwrap();
        assert_eq!(dataset.n_classes(), 3);
        assert_eq!(dataset.split(Split::Test)[0].label, 0);
        assert_eq!(dataset.split(Split::Train)[0].label, 2);
    }

    #[test]
    fn latin1_bytes_are_decoded_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let trec = dir.path().join("TREC");
        fs::create_dir_all(&trec).unwrap();
        fs::write(trec.join(TRAIN_FILE), b"HUM:ind Who is Andr\xe9 ?\n").unwrap();
        fs::write(trec.join(TEST_FILE), b"HUM:ind Who ?\n").unwrap();

        let dataset = load(TransferTask::Trec6 { lower: false }, dir.path(), Granularity::Coarse)
            .unwrap();
        assert_eq!(dataset.split(Split::Train)[0].tokens.len(), 4);
    }

    #[test]
    fn malformed_label_is_reported_with_line() {
        let dir = tempfile::tempdir().unwrap();
        write_trec(dir.path(), "NUM:date When ?\nnolabel here\n", "HUM:ind Who ?\n");

        let err = load(TransferTask::Trec6 { lower: false }, dir.path(), Granularity::Coarse)
            .unwrap_err();
        assert!(matches!(err, BcnError::MalformedLine { line: 2, .. }), "{err}");
    }
}
