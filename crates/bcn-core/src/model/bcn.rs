//! # Biattentive Classification Network
//!
//! The classifier of McCann et al. (2017), reading fixed contextual
//! embeddings. For single-sentence tasks the sentence is fed as both `x`
//! and `y`.

use candle_core::{Result, Tensor};
use candle_nn::{ops, Dropout, Linear, Module, ModuleT, VarBuilder};

use super::lstm::BiLstm;
use super::maxout::MaxoutBlock;
use super::scalar_mix::ScalarMix;
use crate::embedding::EmbeddingShape;
use crate::hyperparams::Hyperparameters;

/// Added to masked attention and pooling logits.
const MASK_VALUE: f64 = 1e9;

/// A padded batch of embedded sentences.
#[derive(Debug, Clone)]
pub struct BcnInput {
    /// `[batch, layers, steps, dim]`
    pub embeddings: Tensor,
    /// `[batch, steps]`, 1.0 on real tokens and 0.0 on padding.
    pub mask: Tensor,
    /// Real length of each row.
    pub lengths: Vec<usize>,
}

pub struct Bcn {
    mix: ScalarMix,
    dropout: Dropout,
    feedforward: Linear,
    encoder_x: BiLstm,
    /// `None` when one encoder is shared by both inputs.
    encoder_y: Option<BiLstm>,
    integrate_x: BiLstm,
    integrate_y: BiLstm,
    attention_x: Linear,
    attention_y: Linear,
    output: Vec<MaxoutBlock>,
    n_classes: usize,
}

impl Bcn {
    pub fn new(
        hp: &Hyperparameters,
        n_classes: usize,
        embedding: EmbeddingShape,
        vb: VarBuilder,
    ) -> Result<Self> {
        let dim = embedding.dim;
        let mix = ScalarMix::new(embedding.layers, vb.pp("mix"))?;
        let feedforward = candle_nn::linear(dim, dim, vb.pp("feedforward"))?;

        let enc_hidden = hp.bilstm_encoder_n_hidden;
        let enc_bias = hp.bilstm_encoder_forget_bias;
        let encoder_x = BiLstm::new(dim, enc_hidden, enc_bias, vb.pp("encoder_x"))?;
        let encoder_y = if hp.same_bilstm_for_encoder {
            None
        } else {
            Some(BiLstm::new(dim, enc_hidden, enc_bias, vb.pp("encoder_y"))?)
        };

        let encoded = encoder_x.output_dim();
        let int_hidden = hp.bilstm_integrate_n_hidden;
        let int_bias = hp.bilstm_integrate_forget_bias;
        let integrate_x = BiLstm::new(3 * encoded, int_hidden, int_bias, vb.pp("integrate_x"))?;
        let integrate_y = BiLstm::new(3 * encoded, int_hidden, int_bias, vb.pp("integrate_y"))?;

        let integrated = integrate_x.output_dim();
        let attention_x = candle_nn::linear(integrated, 1, vb.pp("attention_x"))?;
        let attention_y = candle_nn::linear(integrated, 1, vb.pp("attention_y"))?;

        // max, mean, min and self-attentive pooling for each of x and y.
        let pooled = 2 * 4 * integrated;
        let reduction = hp.output_reduction;
        let hidden1 = (pooled / reduction).max(1);
        let hidden2 = (hidden1 / reduction).max(1);
        let dropout = hp.dropout_ratio as f32;
        let output = vec![
            MaxoutBlock::new(pooled, hidden1, dropout, vb.pp("output.0"))?,
            MaxoutBlock::new(hidden1, hidden2, dropout, vb.pp("output.1"))?,
            MaxoutBlock::new(hidden2, n_classes, dropout, vb.pp("output.2"))?,
        ];

        Ok(Self {
            mix,
            dropout: Dropout::new(dropout),
            feedforward,
            encoder_x,
            encoder_y,
            integrate_x,
            integrate_y,
            attention_x,
            attention_y,
            output,
            n_classes,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Returns unnormalized class scores, `[batch, n_classes]`.
    pub fn forward_t(&self, input: &BcnInput, train: bool) -> Result<Tensor> {
        let lengths = &input.lengths;
        // 0 on real tokens, -MASK_VALUE on padding; [batch, steps, 1]
        let additive = input.mask.affine(MASK_VALUE, -MASK_VALUE)?.unsqueeze(2)?;

        let w = self.mix.forward(&input.embeddings)?;
        let w = self.dropout.forward_t(&w, train)?;
        let f = self.feedforward.forward(&w)?.relu()?;

        let x = self.encoder_x.forward(&f, lengths)?;
        let y = match &self.encoder_y {
            Some(encoder) => encoder.forward(&f, lengths)?,
            None => x.clone(),
        };

        // Affinity A[i, j] = x_i . y_j, [batch, steps_x, steps_y].
        let affinity = x.matmul(&y.t()?.contiguous()?)?;
        let attn_x = ops::softmax(&affinity.broadcast_add(&additive)?, 1)?;
        let attn_y = ops::softmax(&affinity.t()?.broadcast_add(&additive)?, 1)?;
        let context_x = attn_x.t()?.contiguous()?.matmul(&x)?;
        let context_y = attn_y.t()?.contiguous()?.matmul(&y)?;

        let x_y = self
            .integrate_x
            .forward(&integrate_input(&x, &context_y)?, lengths)?;
        let y_x = self
            .integrate_y
            .forward(&integrate_input(&y, &context_x)?, lengths)?;

        let pooled = Tensor::cat(
            &[
                pool(&x_y, &self.attention_x, &input.mask, &additive)?,
                pool(&y_x, &self.attention_y, &input.mask, &additive)?,
            ],
            1,
        )?;

        let mut logits = pooled;
        for block in &self.output {
            logits = block.forward_t(&logits, train)?;
        }
        Ok(logits)
    }
}

/// `[h; h - c; h * c]` along the feature axis.
fn integrate_input(h: &Tensor, context: &Tensor) -> Result<Tensor> {
    Tensor::cat(&[h.clone(), (h - context)?, (h * context)?], 2)
}

/// Masked max, mean, min and self-attentive pooling over steps.
fn pool(xs: &Tensor, attention: &Linear, mask: &Tensor, additive: &Tensor) -> Result<Tensor> {
    let max = xs.broadcast_add(additive)?.max(1)?;
    let min = xs.broadcast_sub(additive)?.min(1)?;

    let counts = mask.sum_keepdim(1)?;
    let mean = xs
        .broadcast_mul(&mask.unsqueeze(2)?)?
        .sum(1)?
        .broadcast_div(&counts)?;

    let beta = ops::softmax(&attention.forward(xs)?.broadcast_add(additive)?, 1)?;
    let self_attended = xs.broadcast_mul(&beta)?.sum(1)?;

    Tensor::cat(&[max, mean, min, self_attended], 1)
}
