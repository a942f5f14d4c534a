use candle_core::{Result, Tensor, D};
use candle_nn::{BatchNorm, BatchNormConfig, Dropout, Linear, Module, ModuleT, VarBuilder};

/// Number of linear pieces each maxout unit takes the max over.
pub const MAXOUT_PIECES: usize = 4;

/// Maxout unit: `pieces` affine maps per output, reduced with max.
pub struct Maxout {
    linear: Linear,
    out_dim: usize,
    pieces: usize,
}

impl Maxout {
    pub fn new(in_dim: usize, out_dim: usize, pieces: usize, vb: VarBuilder) -> Result<Self> {
        let linear = candle_nn::linear(in_dim, out_dim * pieces, vb)?;
        Ok(Self {
            linear,
            out_dim,
            pieces,
        })
    }
}

impl Module for Maxout {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let batch = xs.dim(0)?;
        self.linear
            .forward(xs)?
            .reshape((batch, self.out_dim, self.pieces))?
            .max(D::Minus1)
    }
}

/// Dropout, batch norm, then maxout.
pub struct MaxoutBlock {
    dropout: Dropout,
    norm: BatchNorm,
    maxout: Maxout,
}

impl MaxoutBlock {
    pub fn new(in_dim: usize, out_dim: usize, dropout: f32, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            dropout: Dropout::new(dropout),
            norm: candle_nn::batch_norm(in_dim, BatchNormConfig::default(), vb.pp("norm"))?,
            maxout: Maxout::new(in_dim, out_dim, MAXOUT_PIECES, vb.pp("maxout"))?,
        })
    }
}

impl ModuleT for MaxoutBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = self.dropout.forward_t(xs, train)?;
        let xs = self.norm.forward_t(&xs, train)?;
        self.maxout.forward(&xs)
    }
}
