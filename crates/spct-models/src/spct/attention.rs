use super::layers::{pointwise_conv, BN_EPS};
use candle_core::{bail, Module, ModuleT, Result, Tensor};
use candle_nn::{batch_norm, conv1d, ops::softmax_last_dim, BatchNorm, Conv1d, VarBuilder};
use std::sync::Arc;

/// Added to the column sums of the attention map before dividing.
pub const ATTENTION_EPS: f64 = 1e-9;

/// Offset-Attention layer.
///
/// Global self-attention over all points of a cloud. The attention-refined
/// features are not returned directly: the difference between the input and
/// the attended values (the "offset") goes through a conv + BN + ReLU stage
/// and is added back to the input.
///
/// Query and key projections are tied. Both fields point at the same
/// [`Conv1d`], so there is only one parameter block, stored under `k_conv`.
///
/// - [PCT paper, section 3.3](https://arxiv.org/abs/2012.09688)
#[derive(Clone, Debug)]
pub struct SALayer {
    q_conv: Arc<Conv1d>,
    k_conv: Arc<Conv1d>,
    v_conv: Conv1d,
    trans_conv: Conv1d,
    after_norm: BatchNorm,
    channels: usize,
}

impl SALayer {
    pub fn load(vb: VarBuilder, channels: usize) -> Result<Self> {
        if channels % 4 != 0 {
            bail!("offset-attention channels must be divisible by 4, got {channels}")
        }
        let qk_conv = Arc::new(pointwise_conv(channels, channels / 4, vb.pp("k_conv"))?);
        let v_conv = conv1d(channels, channels, 1, Default::default(), vb.pp("v_conv"))?;
        let trans_conv = conv1d(channels, channels, 1, Default::default(), vb.pp("trans_conv"))?;
        let after_norm = batch_norm(channels, BN_EPS, vb.pp("after_norm"))?;
        Ok(Self {
            q_conv: Arc::clone(&qk_conv),
            k_conv: qk_conv,
            v_conv,
            trans_conv,
            after_norm,
            channels,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn q_conv(&self) -> &Arc<Conv1d> {
        &self.q_conv
    }

    pub fn k_conv(&self) -> &Arc<Conv1d> {
        &self.k_conv
    }

    pub fn v_conv(&self) -> &Conv1d {
        &self.v_conv
    }

    pub fn trans_conv(&self) -> &Conv1d {
        &self.trans_conv
    }

    pub fn after_norm(&self) -> &BatchNorm {
        &self.after_norm
    }

    /// Attention map `[batch, n, n]` for features `[batch, channels, n]`.
    pub fn attention(&self, x: &Tensor) -> Result<Tensor> {
        // b, n, c/4
        let x_q = self.q_conv.forward(x)?.permute((0, 2, 1))?.contiguous()?;
        // b, c/4, n
        let x_k = self.k_conv.forward(x)?;
        // b, n, n
        let energy = x_q.matmul(&x_k)?;
        let attention = softmax_last_dim(&energy)?;
        // Second normalization on top of the row softmax: every key column is
        // rescaled to sum to one over the queries. This is the offset-attention
        // formulation and is not equivalent to plain softmax attention.
        let col_sum = (attention.sum_keepdim(1)? + ATTENTION_EPS)?;
        attention.broadcast_div(&col_sum)
    }

    /// Runs the layer and also returns the attention map it used.
    pub fn forward_with_attention(&self, x: &Tensor, train: bool) -> Result<(Tensor, Tensor)> {
        let attention = self.attention(x)?;
        // b, c, n
        let x_v = self.v_conv.forward(x)?;
        let x_r = x_v.matmul(&attention)?;
        let offset = self.trans_conv.forward(&(x - x_r)?)?;
        let offset = self.after_norm.forward_t(&offset, train)?.relu()?;
        Ok(((x + offset)?, attention))
    }
}

impl ModuleT for SALayer {
    fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let (x, _) = self.forward_with_attention(x, train)?;
        Ok(x)
    }
}
