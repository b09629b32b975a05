use super::layers::ConvBn;
use candle_core::{ModuleT, Result, Tensor, D};
use candle_nn::VarBuilder;

/// Local neighborhood aggregation.
///
/// Takes grouped features `[batch, npoint, nsample, d]` (see
/// [`sample_and_group`](super::sampling::sample_and_group)), runs two
/// pointwise conv + BN + ReLU stages over each group and max-pools the
/// samples. Returns `[batch, out_channels, npoint]`.
///
/// The classification network does not use this layer.
#[derive(Clone, Debug)]
pub struct LocalOp {
    stage1: ConvBn,
    stage2: ConvBn,
    out_channels: usize,
}

impl LocalOp {
    pub fn load(vb: VarBuilder, in_channels: usize, out_channels: usize) -> Result<Self> {
        let stage1 = ConvBn::load(in_channels, out_channels, vb.pp("conv1"), vb.pp("bn1"))?;
        let stage2 = ConvBn::load(out_channels, out_channels, vb.pp("conv2"), vb.pp("bn2"))?;
        Ok(Self {
            stage1,
            stage2,
            out_channels,
        })
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
}

impl ModuleT for LocalOp {
    fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let (b, n, s, d) = x.dims4()?;
        // [b, n, s, d] -> [b*n, d, s]
        let x = x.permute((0, 1, 3, 2))?.reshape((b * n, d, s))?;
        let x = self.stage1.forward_t(&x, train)?.relu()?;
        let x = self.stage2.forward_t(&x, train)?.relu()?;
        // max over the samples of each group
        let x = x.max(D::Minus1)?;
        x.reshape((b, n, self.out_channels))?
            .permute((0, 2, 1))?
            .contiguous()
    }
}
