//! # Hyperparameters
//!
//! The flat hyperparameter record handed to the classifier, plus its
//! rendering as a Python dict literal for `info.txt`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BcnError, Result};

/// Optimizer used to train the BCN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Adam with configurable betas and epsilon.
    Adam,
    /// Plain stochastic gradient descent.
    GradientDescent,
}

impl FromStr for OptimizerKind {
    type Err = BcnError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "adam" => Ok(Self::Adam),
            "gradientdescent" => Ok(Self::GradientDescent),
            other => Err(BcnError::InvalidHyperparameter(format!(
                "optimizer must be \"adam\" or \"gradientdescent\", got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adam => write!(f, "adam"),
            Self::GradientDescent => write!(f, "gradientdescent"),
        }
    }
}

/// Hyperparameters of a BCN training run.
///
/// Field order matches the order keys are written to `info.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub n_epochs: usize,
    pub batch_size: usize,

    /// Share one BiLSTM between both encoder inputs instead of two.
    pub same_bilstm_for_encoder: bool,
    pub bilstm_encoder_n_hidden: usize,
    pub bilstm_encoder_forget_bias: f64,

    pub bilstm_integrate_n_hidden: usize,
    pub bilstm_integrate_forget_bias: f64,

    /// Applied before the feedforward network and before each batch norm.
    pub dropout_ratio: f64,
    /// Divisor applied to the width of the first and second maxout layers.
    pub output_reduction: usize,

    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    /// Only used with [`OptimizerKind::Adam`].
    pub adam_beta1: f64,
    pub adam_beta2: f64,
    pub adam_epsilon: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            n_epochs: 20,
            batch_size: 8,
            same_bilstm_for_encoder: false,
            bilstm_encoder_n_hidden: 300,
            bilstm_encoder_forget_bias: 1.0,
            bilstm_integrate_n_hidden: 300,
            bilstm_integrate_forget_bias: 1.0,
            dropout_ratio: 0.1,
            output_reduction: 2,
            optimizer: OptimizerKind::Adam,
            learning_rate: 0.0001,
            adam_beta1: 0.9,
            adam_beta2: 0.999,
            adam_epsilon: 1e-8,
        }
    }
}

impl Hyperparameters {
    /// Checks that every value is in a range the model can be built with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("n_epochs", self.n_epochs),
            ("batch_size", self.batch_size),
            ("bilstm_encoder_n_hidden", self.bilstm_encoder_n_hidden),
            ("bilstm_integrate_n_hidden", self.bilstm_integrate_n_hidden),
            ("output_reduction", self.output_reduction),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(BcnError::InvalidHyperparameter(format!(
                    "{name} must be at least 1"
                )));
            }
        }

        if !(0.0..1.0).contains(&self.dropout_ratio) {
            return Err(BcnError::InvalidHyperparameter(format!(
                "dropout_ratio must be in [0, 1), got {}",
                self.dropout_ratio
            )));
        }
        if !(self.learning_rate > 0.0) {
            return Err(BcnError::InvalidHyperparameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }

        Ok(())
    }

    /// Renders the hyperparameters the way Python prints a dict literal.
    pub fn to_python_dict(&self) -> String {
        let entries = [
            ("n_epochs", PyValue::Int(self.n_epochs)),
            ("batch_size", PyValue::Int(self.batch_size)),
            (
                "same_bilstm_for_encoder",
                PyValue::Bool(self.same_bilstm_for_encoder),
            ),
            (
                "bilstm_encoder_n_hidden",
                PyValue::Int(self.bilstm_encoder_n_hidden),
            ),
            (
                "bilstm_encoder_forget_bias",
                PyValue::Float(self.bilstm_encoder_forget_bias),
            ),
            (
                "bilstm_integrate_n_hidden",
                PyValue::Int(self.bilstm_integrate_n_hidden),
            ),
            (
                "bilstm_integrate_forget_bias",
                PyValue::Float(self.bilstm_integrate_forget_bias),
            ),
            ("dropout_ratio", PyValue::Float(self.dropout_ratio)),
            ("output_reduction", PyValue::Int(self.output_reduction)),
            ("optimizer", PyValue::Str(self.optimizer.to_string())),
            ("learning_rate", PyValue::Float(self.learning_rate)),
            ("adam_beta1", PyValue::Float(self.adam_beta1)),
            ("adam_beta2", PyValue::Float(self.adam_beta2)),
            ("adam_epsilon", PyValue::Float(self.adam_epsilon)),
        ];
        python_dict(&entries)
    }
}

/// A scalar value rendered with Python `repr` rules.
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    Int(usize),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for PyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => f.write_str(&python_float(*v)),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        }
    }
}

/// Renders `{'key': value, ...}` preserving entry order.
pub fn python_dict(entries: &[(&str, PyValue)]) -> String {
    let body = entries
        .iter()
        .map(|(key, value)| format!("'{key}': {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}

/// Formats a float like Python's `repr`: shortest round-trip digits,
/// scientific notation with a signed two-digit exponent outside `[1e-4, 1e16)`.
pub fn python_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{v:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..16).contains(&exponent) {
        let plain = v.to_string();
        if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}

/// Interprets a command-line string as a boolean flag.
pub fn str2bool(v: &str) -> bool {
    matches!(v.to_lowercase().as_str(), "yes" | "true" | "t" | "1")
}
