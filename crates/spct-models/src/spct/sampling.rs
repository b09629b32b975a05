//! Sampling and grouping of point neighborhoods.
//!
//! Farthest point sampling picks well spread centroids, k-nearest neighbors
//! collects a fixed size group around each of them. The grouped features are
//! the input of [`LocalOp`](super::local_op::LocalOp).
use candle_core::{bail, DType, Result, Tensor, D};

/// Squared euclidean distance between every pair of points.
///
/// `src`: `[b, n, c]`, `dst`: `[b, m, c]` -> `[b, n, m]`
pub fn square_distance(src: &Tensor, dst: &Tensor) -> Result<Tensor> {
    let cross = src.matmul(&dst.transpose(1, 2)?.contiguous()?)?;
    let src_sq = src.sqr()?.sum_keepdim(D::Minus1)?;
    let dst_sq = dst.sqr()?.sum_keepdim(D::Minus1)?.transpose(1, 2)?;
    (cross * -2.0)?.broadcast_add(&src_sq)?.broadcast_add(&dst_sq)
}

/// Gather points by index.
///
/// `points`: `[b, n, c]`, `idx`: `[b, s]` or `[b, s, k]` (u32)
/// -> `[b, s, c]` or `[b, s, k, c]`
pub fn index_points(points: &Tensor, idx: &Tensor) -> Result<Tensor> {
    let (b, _, c) = points.dims3()?;
    let idx_dims = idx.dims().to_vec();
    if idx_dims.first() != Some(&b) {
        bail!(
            "index batch {:?} does not match points batch {b}",
            idx_dims.first()
        )
    }
    let mut gathered = Vec::with_capacity(b);
    for i in 0..b {
        let flat_idx = idx.get(i)?.flatten_all()?;
        gathered.push(points.get(i)?.index_select(&flat_idx, 0)?);
    }
    let mut out_shape = idx_dims;
    out_shape.push(c);
    Tensor::stack(&gathered, 0)?.reshape(out_shape)
}

/// Farthest point sampling.
///
/// `xyz`: `[b, n, 3]` -> `[b, npoint]` (u32) indices. Sampling starts from
/// the first point of every cloud so the result is deterministic.
pub fn farthest_point_sample(xyz: &Tensor, npoint: usize) -> Result<Tensor> {
    let (b, n, _) = xyz.dims3()?;
    if npoint > n {
        bail!("cannot sample {npoint} points from a cloud of {n}")
    }
    let device = xyz.device();
    let mut distance = Tensor::full(f32::INFINITY, (b, n), device)?.to_dtype(xyz.dtype())?;
    let mut farthest = Tensor::zeros((b, 1), DType::U32, device)?;
    let mut centroids = Vec::with_capacity(npoint);
    for _ in 0..npoint {
        centroids.push(farthest.clone());
        // [b, 1, 3]
        let centroid = index_points(xyz, &farthest)?;
        let dist = xyz.broadcast_sub(&centroid)?.sqr()?.sum(D::Minus1)?;
        distance = distance.minimum(&dist)?;
        farthest = distance.argmax_keepdim(D::Minus1)?;
    }
    Tensor::cat(&centroids, 1)
}

/// Indices of the `k` nearest points in `xyz` for every query point.
///
/// `xyz`: `[b, n, c]`, `new_xyz`: `[b, s, c]` -> `[b, s, k]` (u32), closest
/// first.
pub fn knn_point(k: usize, xyz: &Tensor, new_xyz: &Tensor) -> Result<Tensor> {
    let n = xyz.dim(1)?;
    if k > n {
        bail!("cannot group {k} neighbors from a cloud of {n}")
    }
    let sqrdists = square_distance(new_xyz, xyz)?.contiguous()?;
    let sorted = sqrdists.arg_sort_last_dim(true)?;
    sorted.narrow(D::Minus1, 0, k)?.contiguous()
}

/// Sample `npoint` centroids and group `nsample` neighbors around each.
///
/// `xyz`: `[b, n, 3]`, `points`: `[b, n, d]`. Returns the centroids
/// `[b, npoint, 3]` and the grouped features `[b, npoint, nsample, 2d]`: each
/// neighbor's features relative to its centroid, concatenated with the
/// centroid's own features.
pub fn sample_and_group(
    npoint: usize,
    nsample: usize,
    xyz: &Tensor,
    points: &Tensor,
) -> Result<(Tensor, Tensor)> {
    let (b, n, _) = xyz.dims3()?;
    let (pb, pn, d) = points.dims3()?;
    if (pb, pn) != (b, n) {
        bail!(
            "points {:?} do not match coordinates {:?}",
            points.shape(),
            xyz.shape()
        )
    }
    let fps_idx = farthest_point_sample(xyz, npoint)?;
    let new_xyz = index_points(xyz, &fps_idx)?;
    let new_points = index_points(points, &fps_idx)?;

    let idx = knn_point(nsample, xyz, &new_xyz)?;
    // [b, npoint, nsample, d]
    let grouped_points = index_points(points, &idx)?;
    let centers = new_points.reshape((b, npoint, 1, d))?;
    let grouped_points_norm = grouped_points.broadcast_sub(&centers)?;
    let centers = centers.repeat((1, 1, nsample, 1))?;
    let new_points = Tensor::cat(&[&grouped_points_norm, &centers], D::Minus1)?;
    tracing::debug!(
        "sample_and_group: {:?} -> {:?}",
        points.shape(),
        new_points.shape()
    );
    Ok((new_xyz, new_points))
}
