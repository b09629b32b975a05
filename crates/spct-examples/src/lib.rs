//! spct-examples
//!
//! Synthetic point clouds for the runnable examples.
//!
//! ```shell
//! cargo run -p spct-examples --example classify -- --shape sphere --num-points 1024
//! ```
use candle_core::{Device, Result, Tensor, D};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shape {
    /// Points on the surface of the unit sphere
    Sphere,
    /// Points inside the unit cube centred at the origin
    Cube,
    /// All points at the origin
    Origin,
}

/// Sample a `[batch, num_points, 3]` cloud of the requested shape.
pub fn synthetic_cloud(
    shape: Shape,
    batch: usize,
    num_points: usize,
    device: &Device,
) -> Result<Tensor> {
    match shape {
        Shape::Sphere => {
            let x = Tensor::randn(0f32, 1f32, (batch, num_points, 3), device)?;
            let norm = x.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?;
            x.broadcast_div(&(norm + 1e-6)?)
        }
        Shape::Cube => Tensor::rand(-0.5f32, 0.5f32, (batch, num_points, 3), device),
        Shape::Origin => Tensor::zeros((batch, num_points, 3), candle_core::DType::F32, device),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_points_have_unit_norm() -> Result<()> {
        let dev = Device::Cpu;
        let cloud = synthetic_cloud(Shape::Sphere, 2, 64, &dev)?;
        assert_eq!(cloud.dims3()?, (2, 64, 3));
        let norms: Vec<f32> = cloud.sqr()?.sum(D::Minus1)?.sqrt()?.flatten_all()?.to_vec1()?;
        assert!(norms.iter().all(|n| (n - 1.0).abs() < 1e-4));
        Ok(())
    }

    #[test]
    fn test_cube_points_are_bounded() -> Result<()> {
        let dev = Device::Cpu;
        let cloud = synthetic_cloud(Shape::Cube, 1, 128, &dev)?;
        let max = cloud.abs()?.max_all()?.to_scalar::<f32>()?;
        assert!(max <= 0.5);
        Ok(())
    }
}
