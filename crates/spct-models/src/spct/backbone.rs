use super::attention::SALayer;
use super::layers::ConvBn;
use candle_core::{ModuleT, Result, Tensor};
use candle_nn::VarBuilder;

pub const NUM_SA_LAYERS: usize = 4;

/// Point Transformer backbone: two conv + BN + ReLU stages followed by four
/// stacked offset-attention layers. The outputs of every attention layer are
/// concatenated along the channel axis, so a `[b, channels, n]` input yields
/// `[b, 4 * channels, n]`.
#[derive(Clone, Debug)]
pub struct PointTransformerLast {
    stage1: ConvBn,
    stage2: ConvBn,
    sa_layers: Vec<SALayer>,
    channels: usize,
}

impl PointTransformerLast {
    pub fn load(vb: VarBuilder, channels: usize) -> Result<Self> {
        let stage1 = ConvBn::load(channels, channels, vb.pp("conv1"), vb.pp("bn1"))?;
        let stage2 = ConvBn::load(channels, channels, vb.pp("conv2"), vb.pp("bn2"))?;
        let mut sa_layers = Vec::with_capacity(NUM_SA_LAYERS);
        for i in 1..=NUM_SA_LAYERS {
            sa_layers.push(SALayer::load(vb.pp(format!("sa{i}")), channels)?);
        }
        Ok(Self {
            stage1,
            stage2,
            sa_layers,
            channels,
        })
    }

    pub fn sa_layers(&self) -> &[SALayer] {
        &self.sa_layers
    }

    pub fn out_channels(&self) -> usize {
        self.channels * NUM_SA_LAYERS
    }

    /// Forward pass, optionally collecting the attention map of each layer.
    pub fn forward_with_attentions(
        &self,
        x: &Tensor,
        train: bool,
        output_attentions: bool,
    ) -> Result<(Tensor, Option<Vec<Tensor>>)> {
        let x = self.stage1.forward_t(x, train)?.relu()?;
        let mut x = self.stage2.forward_t(&x, train)?.relu()?;
        let mut outputs = Vec::with_capacity(self.sa_layers.len());
        let mut attentions = vec![];
        for layer in self.sa_layers.iter() {
            let (new_x, attention) = layer.forward_with_attention(&x, train)?;
            if output_attentions {
                attentions.push(attention);
            }
            outputs.push(new_x.clone());
            x = new_x;
        }
        let x = Tensor::cat(&outputs, 1)?;
        tracing::debug!("point transformer features: {:?}", x.shape());
        let attentions = if output_attentions {
            Some(attentions)
        } else {
            None
        };
        Ok((x, attentions))
    }
}

impl ModuleT for PointTransformerLast {
    fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let (x, _) = self.forward_with_attentions(x, train, false)?;
        Ok(x)
    }
}
