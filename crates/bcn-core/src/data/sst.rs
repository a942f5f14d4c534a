//! Stanford Sentiment Treebank loaders.
//!
//! Fine-grained files hold `<label> <tokens>` per line; binary files hold
//! `<tokens>\t<label>`.

use std::path::{Path, PathBuf};

use super::{read_lines, tokenize, Dataset, Example, Split, TransferTask};
use crate::error::{BcnError, Result};

pub const FINE_CLASSES: usize = 5;
pub const BINARY_CLASSES: usize = 2;

fn split_path(datadir: &Path, variant: &str, split: Split) -> PathBuf {
    datadir
        .join("SST")
        .join(variant)
        .join(format!("sentiment-{}", split.name()))
}

pub fn load_fine(task: TransferTask, datadir: &Path) -> Result<Dataset> {
    let [train, dev, test] = Split::ALL.map(|split| {
        let path = split_path(datadir, "fine", split);
        parse_file(&path, parse_fine_line)
    });
    Ok(Dataset::from_splits(task, FINE_CLASSES, train?, dev?, test?))
}

pub fn load_binary(task: TransferTask, datadir: &Path) -> Result<Dataset> {
    let [train, dev, test] = Split::ALL.map(|split| {
        let path = split_path(datadir, "binary", split);
        parse_file(&path, parse_binary_line)
    });
    Ok(Dataset::from_splits(task, BINARY_CLASSES, train?, dev?, test?))
}

fn parse_file(
    path: &Path,
    parse_line: fn(&str) -> std::result::Result<Example, String>,
) -> Result<Vec<Example>> {
    let mut examples = Vec::new();
    for (idx, line) in read_lines(path)?.iter().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let example = parse_line(line).map_err(|reason| BcnError::MalformedLine {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        })?;
        examples.push(example);
    }
    Ok(examples)
}

fn parse_label(raw: &str, n_classes: usize) -> std::result::Result<usize, String> {
    let label: usize = raw
        .trim()
        .parse()
        .map_err(|_| format!("label {raw:?} is not an integer"))?;
    if label >= n_classes {
        return Err(format!("label {label} out of range 0..{n_classes}"));
    }
    Ok(label)
}

fn parse_fine_line(line: &str) -> std::result::Result<Example, String> {
    let (label, text) = line.split_once(' ').unwrap_or((line, ""));
    let label = parse_label(label, FINE_CLASSES)?;
    Ok(Example::new(tokenize(text), label))
}

fn parse_binary_line(line: &str) -> std::result::Result<Example, String> {
    let (text, label) = line
        .rsplit_once('\t')
        .ok_or_else(|| "missing tab-separated label".to_string())?;
    let label = parse_label(label, BINARY_CLASSES)?;
    Ok(Example::new(tokenize(text), label))
}
