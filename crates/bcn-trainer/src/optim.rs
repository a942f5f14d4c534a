//! Optimizer selection from hyperparameters.

use bcn_core::{Hyperparameters, OptimizerKind};
use candle_core::{Result, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, SGD};

pub enum BcnOptimizer {
    /// AdamW with zero weight decay, i.e. plain Adam.
    Adam(AdamW),
    GradientDescent(SGD),
}

impl BcnOptimizer {
    pub fn new(hp: &Hyperparameters, vars: Vec<Var>) -> Result<Self> {
        match hp.optimizer {
            OptimizerKind::Adam => {
                let params = ParamsAdamW {
                    lr: hp.learning_rate,
                    beta1: hp.adam_beta1,
                    beta2: hp.adam_beta2,
                    eps: hp.adam_epsilon,
                    weight_decay: 0.0,
                };
                Ok(Self::Adam(AdamW::new(vars, params)?))
            }
            OptimizerKind::GradientDescent => {
                Ok(Self::GradientDescent(SGD::new(vars, hp.learning_rate)?))
            }
        }
    }

    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::Adam(opt) => opt.backward_step(loss),
            Self::GradientDescent(opt) => opt.backward_step(loss),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::Adam(opt) => opt.learning_rate(),
            Self::GradientDescent(opt) => opt.learning_rate(),
        }
    }
}
