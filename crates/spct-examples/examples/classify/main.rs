use anyhow::Result;
use candle_core::{DType, D};
use candle_nn::ops::softmax_last_dim;
use candle_nn::{VarBuilder, VarMap};
use clap::Parser;
use spct_examples::{synthetic_cloud, Shape};
use spct_models::{device, SPct, SPctConfig};

/// Classify a synthetic point cloud with a freshly initialised SPCT model.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run on CPU rather than on GPU.
    #[arg(long)]
    cpu: bool,

    #[arg(long, value_enum, default_value = "sphere")]
    shape: Shape,

    #[arg(long, default_value_t = 2)]
    batch_size: usize,

    #[arg(long, default_value_t = 1024)]
    num_points: usize,

    /// Optional JSON model configuration.
    #[arg(long)]
    config: Option<String>,

    /// Print the shapes of the attention maps.
    #[arg(long)]
    output_attentions: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let dev = device(args.cpu)?;
    let config = match &args.config {
        Some(path) => SPctConfig::from_json_file(path)?,
        None => SPctConfig::modelnet40(),
    };
    tracing::info!("Building SPCT with {:?}", config);

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
    let model = SPct::load(vb, &config)?;

    let points = synthetic_cloud(args.shape, args.batch_size, args.num_points, &dev)?;
    tracing::info!("Point cloud: {:?}", points.shape());

    let output = model.forward(&points, false, args.output_attentions)?;
    if let Some(attentions) = &output.attentions {
        for (idx, attention) in attentions.iter().enumerate() {
            tracing::info!("attention_{idx}: {:?}", attention.shape());
        }
    }

    let probs = softmax_last_dim(&output.logits)?;
    let predictions: Vec<u32> = probs.argmax(D::Minus1)?.to_vec1()?;
    let confidence: Vec<f32> = probs.max(D::Minus1)?.to_vec1()?;
    for (i, (class, p)) in predictions.iter().zip(confidence.iter()).enumerate() {
        println!("cloud {i}: class {class} (p = {p:.3})");
    }
    Ok(())
}
