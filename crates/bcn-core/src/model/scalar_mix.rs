use candle_core::{Result, Tensor};
use candle_nn::{ops, Init, VarBuilder};

/// Learned softmax-normalized mix of embedding layers, scaled by `gamma`.
pub struct ScalarMix {
    weights: Tensor,
    gamma: Tensor,
    layers: usize,
}

impl ScalarMix {
    pub fn new(layers: usize, vb: VarBuilder) -> Result<Self> {
        let weights = vb.get_with_hints(layers, "weights", Init::Const(0.0))?;
        let gamma = vb.get_with_hints(1, "gamma", Init::Const(1.0))?;
        Ok(Self {
            weights,
            gamma,
            layers,
        })
    }

    /// `[batch, layers, steps, dim]` to `[batch, steps, dim]`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mix = ops::softmax(&self.weights, 0)?.reshape((1, self.layers, 1, 1))?;
        xs.broadcast_mul(&mix)?.sum(1)?.broadcast_mul(&self.gamma)
    }
}
