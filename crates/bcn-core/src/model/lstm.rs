//! LSTM layers with an additive forget-gate bias.

use candle_core::{bail, IndexOp, Result, Tensor};
use candle_nn::{ops, Linear, Module, VarBuilder};

/// Unidirectional LSTM over `[batch, steps, in_dim]` inputs.
///
/// Gate order in the fused projection is input, candidate, forget, output.
/// `forget_bias` is added to the forget-gate pre-activation on every step
/// rather than folded into the learned bias.
pub struct Lstm {
    input: Linear,
    recurrent: Linear,
    hidden: usize,
    forget_bias: f64,
}

impl Lstm {
    pub fn new(in_dim: usize, hidden: usize, forget_bias: f64, vb: VarBuilder) -> Result<Self> {
        let input = candle_nn::linear(in_dim, 4 * hidden, vb.pp("input"))?;
        let recurrent = candle_nn::linear_no_bias(hidden, 4 * hidden, vb.pp("recurrent"))?;
        Ok(Self {
            input,
            recurrent,
            hidden,
            forget_bias,
        })
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }

    /// Returns the hidden state at every step, `[batch, steps, hidden]`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (batch, steps, _) = xs.dims3()?;
        if steps == 0 {
            bail!("LSTM input has no time steps");
        }

        let projected = self.input.forward(xs)?;
        let mut h = Tensor::zeros((batch, self.hidden), xs.dtype(), xs.device())?;
        let mut c = h.clone();
        let mut outputs = Vec::with_capacity(steps);

        for t in 0..steps {
            let gates = (projected.i((.., t, ..))? + self.recurrent.forward(&h)?)?;
            let gates = gates.chunk(4, 1)?;

            let input_gate = ops::sigmoid(&gates[0])?;
            let candidate = gates[1].tanh()?;
            let forget_gate = ops::sigmoid(&gates[2].affine(1.0, self.forget_bias)?)?;
            let output_gate = ops::sigmoid(&gates[3])?;

            c = ((forget_gate * &c)? + (input_gate * candidate)?)?;
            h = (output_gate * c.tanh()?)?;
            outputs.push(h.clone());
        }

        Tensor::stack(&outputs, 1)
    }
}

/// Bidirectional LSTM that respects per-row sequence lengths.
///
/// The backward direction reads each row reversed within its own length, so
/// padding never leaks into the valid positions of either direction.
pub struct BiLstm {
    fwd: Lstm,
    bwd: Lstm,
}

impl BiLstm {
    pub fn new(in_dim: usize, hidden: usize, forget_bias: f64, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            fwd: Lstm::new(in_dim, hidden, forget_bias, vb.pp("fwd"))?,
            bwd: Lstm::new(in_dim, hidden, forget_bias, vb.pp("bwd"))?,
        })
    }

    /// Width of the concatenated output.
    pub fn output_dim(&self) -> usize {
        self.fwd.hidden() + self.bwd.hidden()
    }

    /// `[batch, steps, in_dim]` to `[batch, steps, 2 * hidden]`.
    pub fn forward(&self, xs: &Tensor, lengths: &[usize]) -> Result<Tensor> {
        let forward = self.fwd.forward(xs)?;
        let reversed = reverse_padded(xs, lengths)?;
        let backward = reverse_padded(&self.bwd.forward(&reversed)?, lengths)?;
        Tensor::cat(&[forward, backward], 2)
    }
}

/// Reverses the first `lengths[b]` steps of every row, leaving padding in
/// place. Applying it twice is the identity.
pub fn reverse_padded(xs: &Tensor, lengths: &[usize]) -> Result<Tensor> {
    let (batch, steps, dim) = xs.dims3()?;
    if lengths.len() != batch {
        bail!("got {} lengths for a batch of {batch}", lengths.len());
    }

    let mut index = Vec::with_capacity(batch * steps);
    for &len in lengths {
        let len = len.min(steps);
        index.extend((0..steps).map(|t| if t < len { (len - 1 - t) as u32 } else { t as u32 }));
    }
    let index = Tensor::from_vec(index, (batch, steps, 1), xs.device())?
        .broadcast_as((batch, steps, dim))?
        .contiguous()?;
    xs.contiguous()?.gather(&index, 1)
}
