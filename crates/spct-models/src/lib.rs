//! spct-models
//!
//! Point cloud classification with offset-attention transformers.
//!
//! - [PCT paper](https://arxiv.org/abs/2012.09688)
//!
//! To try an example of this model:
//!
//! ```shell
//! cargo run -p spct-examples --example classify
//! cargo run -p spct-examples --example classify --features metal
//! ```
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{Device, Result};

pub use spct::attention::SALayer;
pub use spct::backbone::PointTransformerLast;
pub use spct::config::SPctConfig;
pub use spct::local_op::LocalOp;
pub use spct::model::{ModelOutput, SPct};
pub use spct::sampling::{farthest_point_sample, index_points, knn_point, sample_and_group};

pub mod spct;

pub fn device(cpu: bool) -> Result<Device> {
    if cpu {
        Ok(Device::Cpu)
    } else if cuda_is_available() {
        Ok(Device::new_cuda(0)?)
    } else if metal_is_available() {
        Ok(Device::new_metal(0)?)
    } else {
        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        {
            tracing::info!(
                "Running on CPU, to run on GPU(metal), build this example with `--features metal`"
            );
        }
        #[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
        {
            tracing::info!(
                "Running on CPU, to run on GPU, build this example with `--features cuda`"
            );
        }
        Ok(Device::Cpu)
    }
}
