use anyhow::Result;
use candle_core::{DType, Device, ModuleT, Tensor};
use candle_nn::{VarBuilder, VarMap};
use spct_models::{sample_and_group, LocalOp, SPct, SPctConfig};

fn build_model(config: &SPctConfig, dev: &Device) -> Result<(VarMap, SPct)> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, dev);
    let model = SPct::load(vb, config)?;
    Ok((varmap, model))
}

fn assert_finite(t: &Tensor) -> Result<()> {
    let values: Vec<f32> = t.flatten_all()?.to_vec1()?;
    assert!(values.iter().all(|v| v.is_finite()), "non finite values");
    Ok(())
}

fn relative_diff(a: &Tensor, b: &Tensor) -> Result<f32> {
    let diff = (a - b)?.abs()?.max_all()?.to_scalar::<f32>()?;
    let scale = a.abs()?.max_all()?.to_scalar::<f32>()?;
    Ok(diff / (scale + 1.0))
}

#[test]
fn test_logits_shape_is_independent_of_num_points() -> Result<()> {
    let dev = Device::Cpu;
    let (_varmap, model) = build_model(&SPctConfig::default(), &dev)?;
    for n in [16, 33] {
        let points = Tensor::randn(0f32, 1f32, (2, n, 3), &dev)?;
        let logits = model.forward_t(&points, false)?;
        assert_eq!(logits.dims2()?, (2, 40));
    }
    Ok(())
}

#[test]
fn test_output_channels_follow_config() -> Result<()> {
    let dev = Device::Cpu;
    let config = SPctConfig::default().with_output_channels(10);
    let (_varmap, model) = build_model(&config, &dev)?;
    let points = Tensor::randn(0f32, 1f32, (3, 8, 3), &dev)?;
    assert_eq!(model.forward_t(&points, true)?.dims2()?, (3, 10));
    Ok(())
}

#[test]
fn test_zero_cloud_gives_finite_logits() -> Result<()> {
    let dev = Device::Cpu;
    let (_varmap, model) = build_model(&SPctConfig::default(), &dev)?;
    let points = Tensor::zeros((2, 16, 3), DType::F32, &dev)?;
    for train in [false, true] {
        let logits = model.forward_t(&points, train)?;
        assert_eq!(logits.dims2()?, (2, 40));
        assert_finite(&logits)?;
    }
    Ok(())
}

#[test]
fn test_single_point_cloud() -> Result<()> {
    let dev = Device::Cpu;
    let (_varmap, model) = build_model(&SPctConfig::default(), &dev)?;
    let points = Tensor::randn(0f32, 1f32, (2, 1, 3), &dev)?;
    let output = model.forward(&points, false, true)?;
    assert_eq!(output.logits.dims2()?, (2, 40));
    assert_finite(&output.logits)?;
    for attention in output.attentions.unwrap_or_default() {
        let values: Vec<f32> = attention.flatten_all()?.to_vec1()?;
        assert!(values.iter().all(|v| (v - 1.0).abs() < 1e-6));
    }
    Ok(())
}

#[test]
fn test_model_output_contents() -> Result<()> {
    let dev = Device::Cpu;
    let (_varmap, model) = build_model(&SPctConfig::default(), &dev)?;
    let points = Tensor::randn(0f32, 1f32, (1, 12, 3), &dev)?;

    let output = model.forward(&points, false, true)?;
    assert_eq!(output.point_features.dims3()?, (1, 1024, 12));
    let attentions = output.attentions.expect("attentions requested");
    assert_eq!(attentions.len(), 4);
    for attention in attentions.iter() {
        assert_eq!(attention.dims3()?, (1, 12, 12));
    }

    let output = model.forward(&points, false, false)?;
    assert!(output.attentions.is_none());
    assert_eq!(model.backbone().out_channels(), 1024);
    Ok(())
}

#[test]
fn test_permutation_equivariance_and_invariance() -> Result<()> {
    let dev = Device::Cpu;
    let (_varmap, model) = build_model(&SPctConfig::default(), &dev)?;
    let n = 20u32;
    let points = Tensor::randn(0f32, 1f32, (2, n as usize, 3), &dev)?;
    // a fixed shuffle of the point order
    let perm: Vec<u32> = (0..n).map(|i| (i * 7 + 3) % n).collect();
    let perm = Tensor::new(perm.as_slice(), &dev)?;
    let permuted = points.index_select(&perm, 1)?;

    let original = model.forward(&points, false, false)?;
    let shuffled = model.forward(&permuted, false, false)?;

    // per-point features move with their points
    let expected = original.point_features.index_select(&perm, 2)?;
    assert!(relative_diff(&expected, &shuffled.point_features)? < 1e-4);
    // the global max pool removes the ordering
    assert!(relative_diff(&original.logits, &shuffled.logits)? < 1e-4);
    Ok(())
}

#[test]
fn test_rejects_non_xyz_input() -> Result<()> {
    let dev = Device::Cpu;
    let (_varmap, model) = build_model(&SPctConfig::default(), &dev)?;
    let points = Tensor::randn(0f32, 1f32, (2, 16, 4), &dev)?;
    assert!(model.forward_t(&points, false).is_err());
    let points = Tensor::randn(0f32, 1f32, (16, 3), &dev)?;
    assert!(model.forward_t(&points, false).is_err());
    Ok(())
}

#[test]
fn test_invalid_dropout_fails_construction() {
    let dev = Device::Cpu;
    let config = SPctConfig::default().with_dropout(1.5);
    assert!(build_model(&config, &dev).is_err());
}

#[test]
fn test_parameter_names_follow_checkpoint_layout() -> Result<()> {
    let dev = Device::Cpu;
    let (varmap, _model) = build_model(&SPctConfig::default(), &dev)?;
    let data = varmap.data().lock().unwrap();
    for name in [
        "conv1.weight",
        "bn1.running_mean",
        "pt_last.conv2.weight",
        "pt_last.sa4.k_conv.weight",
        "pt_last.sa4.v_conv.bias",
        "pt_last.sa1.after_norm.running_var",
        "conv_fuse.0.weight",
        "conv_fuse.1.weight",
        "linear1.weight",
        "bn7.bias",
        "linear3.bias",
    ] {
        assert!(data.contains_key(name), "missing {name}");
    }
    assert!(!data.contains_key("conv1.bias"));
    assert!(!data.contains_key("linear1.bias"));
    Ok(())
}

#[test]
fn test_config_from_json_file() -> Result<()> {
    let file = tempfile::NamedTempFile::new()?;
    std::fs::write(file.path(), r#"{"dropout": 0.25, "output_channels": 15}"#)?;
    let config = SPctConfig::from_json_file(file.path())?;
    assert_eq!(config, SPctConfig::default().with_dropout(0.25).with_output_channels(15));

    std::fs::write(file.path(), r#"{"dropout": 2.0}"#)?;
    assert!(SPctConfig::from_json_file(file.path()).is_err());
    Ok(())
}

#[test]
fn test_local_op_on_grouped_embeddings() -> Result<()> {
    let dev = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
    let local = LocalOp::load(vb.pp("gather_local_0"), 2 * 64, 128)?;

    let xyz = Tensor::randn(0f32, 1f32, (2, 64, 3), &dev)?;
    let features = Tensor::randn(0f32, 1f32, (2, 64, 64), &dev)?;
    let (new_xyz, grouped) = sample_and_group(16, 8, &xyz, &features)?;
    assert_eq!(new_xyz.dims3()?, (2, 16, 3));
    let descriptors = local.forward_t(&grouped, true)?;
    assert_eq!(descriptors.dims3()?, (2, 128, 16));
    assert_finite(&descriptors)?;
    Ok(())
}
