//! SPCT classification network.
//!
//! Point embedding (3 -> 64 -> 256), offset-attention backbone (1024),
//! feature fusion, global max pooling and a three layer classification head.
//!
use super::backbone::PointTransformerLast;
use super::config::SPctConfig;
use super::layers::{ConvBn, BN_EPS};
use candle_core::{bail, Device, Module, ModuleT, Result, Tensor, D};
use candle_nn::ops::leaky_relu;
use candle_nn::{batch_norm, linear, linear_no_bias, BatchNorm, Dropout, Linear, VarBuilder};

const EMBED_CHANNELS: usize = 64;
const BACKBONE_CHANNELS: usize = 256;
const FUSED_CHANNELS: usize = 1024;
const NEGATIVE_SLOPE: f64 = 0.2;

/// The SPCT model
///
/// - [GH PythonModel](https://github.com/MenghaoGuo/PCT/blob/main/networks/cls/pct.py)
/// - [paper](https://arxiv.org/abs/2012.09688)
///
#[derive(Clone, Debug)]
pub struct SPct {
    embed1: ConvBn,
    embed2: ConvBn,
    pt_last: PointTransformerLast,
    conv_fuse: ConvBn,
    linear1: Linear,
    bn6: BatchNorm,
    dp1: Dropout,
    linear2: Linear,
    bn7: BatchNorm,
    dp2: Dropout,
    linear3: Linear,
    device: Device,
    config: SPctConfig,
}

/// SPCT Model Output
///
/// logits, fused per-point features and attentions.
///
///  logits -> class scores `[batch, output_channels]`
///  point_features -> fused features before pooling `[batch, 1024, n]`
///  attentions -> one `[batch, n, n]` map per offset-attention layer
#[derive(Debug)]
pub struct ModelOutput {
    pub logits: Tensor,
    pub point_features: Tensor,
    pub attentions: Option<Vec<Tensor>>,
}

impl SPct {
    pub fn load(vb: VarBuilder, config: &SPctConfig) -> Result<Self> {
        config.validate()?;
        let embed1 = ConvBn::load(3, EMBED_CHANNELS, vb.pp("conv1"), vb.pp("bn1"))?;
        let embed2 = ConvBn::load(
            EMBED_CHANNELS,
            BACKBONE_CHANNELS,
            vb.pp("conv2"),
            vb.pp("bn2"),
        )?;
        let pt_last = PointTransformerLast::load(vb.pp("pt_last"), BACKBONE_CHANNELS)?;
        let conv_fuse = ConvBn::load(
            pt_last.out_channels(),
            FUSED_CHANNELS,
            vb.pp("conv_fuse.0"),
            vb.pp("conv_fuse.1"),
        )?;
        let linear1 = linear_no_bias(FUSED_CHANNELS, 512, vb.pp("linear1"))?;
        let bn6 = batch_norm(512, BN_EPS, vb.pp("bn6"))?;
        let linear2 = linear(512, 256, vb.pp("linear2"))?;
        let bn7 = batch_norm(256, BN_EPS, vb.pp("bn7"))?;
        let linear3 = linear(256, config.output_channels, vb.pp("linear3"))?;

        Ok(Self {
            embed1,
            embed2,
            pt_last,
            conv_fuse,
            linear1,
            bn6,
            dp1: Dropout::new(config.dropout as f32),
            linear2,
            bn7,
            dp2: Dropout::new(config.dropout as f32),
            linear3,
            device: vb.device().clone(),
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &SPctConfig {
        &self.config
    }

    pub fn get_device(&self) -> &Device {
        &self.device
    }

    pub fn backbone(&self) -> &PointTransformerLast {
        &self.pt_last
    }

    /// Fused per-point features `[batch, 1024, n]` for a point cloud
    /// `[batch, n, 3]`, plus the attention maps when requested.
    fn point_features(
        &self,
        points: &Tensor,
        train: bool,
        output_attentions: bool,
    ) -> Result<(Tensor, Option<Vec<Tensor>>)> {
        let (_, _, coords) = points.dims3()?;
        if coords != 3 {
            bail!("expected point cloud of shape [batch, n, 3], got {:?}", points.shape())
        }
        // [b, n, 3] -> [b, 3, n]
        let x = points.permute((0, 2, 1))?.contiguous()?;
        let x = self.embed1.forward_t(&x, train)?.relu()?;
        let x = self.embed2.forward_t(&x, train)?.relu()?;
        let (x, attentions) = self.pt_last.forward_with_attentions(&x, train, output_attentions)?;
        let x = leaky_relu(&self.conv_fuse.forward_t(&x, train)?, NEGATIVE_SLOPE)?;
        Ok((x, attentions))
    }

    fn classify(&self, point_features: &Tensor, train: bool) -> Result<Tensor> {
        // global max pool over points
        let x = point_features.max(D::Minus1)?;
        let x = self.linear1.forward(&x)?;
        let x = leaky_relu(&self.bn6.forward_t(&x, train)?, NEGATIVE_SLOPE)?;
        let x = self.dp1.forward(&x, train)?;
        let x = self.linear2.forward(&x)?;
        let x = leaky_relu(&self.bn7.forward_t(&x, train)?, NEGATIVE_SLOPE)?;
        let x = self.dp2.forward(&x, train)?;
        self.linear3.forward(&x)
    }

    pub fn forward(
        &self,
        points: &Tensor,
        train: bool,
        output_attentions: bool,
    ) -> Result<ModelOutput> {
        let (point_features, attentions) =
            self.point_features(points, train, output_attentions)?;
        let logits = self.classify(&point_features, train)?;
        tracing::debug!("spct logits: {:?}", logits.shape());
        Ok(ModelOutput {
            logits,
            point_features,
            attentions,
        })
    }
}

impl ModuleT for SPct {
    fn forward_t(&self, points: &Tensor, train: bool) -> Result<Tensor> {
        let (point_features, _) = self.point_features(points, train, false)?;
        self.classify(&point_features, train)
    }
}
