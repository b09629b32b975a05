//! SPCT
//!
//! Simple Point Cloud Transformer: point embedding followed by a stack of
//! offset-attention layers.
//!
//! - [GH PCT Code](https://github.com/MenghaoGuo/PCT)
//! - [Paper](https://arxiv.org/abs/2012.09688)
//!
pub mod attention;
pub mod backbone;
pub mod config;
pub mod layers;
pub mod local_op;
pub mod model;
pub mod sampling;
