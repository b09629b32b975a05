use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{batch_norm, conv1d_no_bias, BatchNorm, Conv1d, Conv1dConfig, VarBuilder};

pub const BN_EPS: f64 = 1e-5;

/// Pointwise (kernel size 1) convolution without bias.
pub fn pointwise_conv(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Conv1d> {
    conv1d_no_bias(in_channels, out_channels, 1, Conv1dConfig::default(), vb)
}

/// A bias-free pointwise convolution followed by batch normalization.
///
/// The convolution and the norm are loaded from separate prefixes so the
/// layout matches checkpoints where they are sibling modules (`conv1`/`bn1`)
/// as well as `nn.Sequential` layouts (`conv_fuse.0`/`conv_fuse.1`).
#[derive(Clone, Debug)]
pub struct ConvBn {
    conv: Conv1d,
    bn: BatchNorm,
}

impl ConvBn {
    pub fn load(
        in_channels: usize,
        out_channels: usize,
        conv_vb: VarBuilder,
        bn_vb: VarBuilder,
    ) -> Result<Self> {
        let conv = pointwise_conv(in_channels, out_channels, conv_vb)?;
        let bn = batch_norm(out_channels, BN_EPS, bn_vb)?;
        Ok(Self { conv, bn })
    }
}

impl ModuleT for ConvBn {
    fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let x = self.conv.forward(x)?;
        self.bn.forward_t(&x, train)
    }
}
