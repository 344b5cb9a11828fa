//! Tessera layer benchmark driver
//!
//! Pushes synthetic activations through a compression layer and reports the
//! mean compressed size, compression ratio, stage timings and reconstruction
//! quality.
//!
//! ## Usage
//!
//! ```bash
//! # Lossless baseline
//! tessera-bench --encoder noop_encoder --shape 1,3,32,32
//!
//! # 4-bit quantizer, 256 calls
//! tessera-bench --encoder quantize_encoder --param bits=4 --iterations 256
//!
//! # Layer described in a file, staged through a simulated accelerator
//! tessera-bench --config layer.json --device
//!
//! # List registered codecs
//! tessera-bench --list
//! ```

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tessera::{
    CallTimings, CodecRegistry, CompressionLayer, LayerConfig, Residency, SimulatedAccelerator,
    TelemetryConfig, Tensor, TransferManager,
};
use tessera_core::{CodecConfig, DType, ParamValue, Shape, TensorLayout};

#[derive(Parser, Debug)]
#[command(name = "tessera-bench")]
#[command(version)]
#[command(about = "Measure a Tessera compression layer on synthetic activations", long_about = None)]
struct Args {
    /// Encoder name
    #[arg(short, long, default_value = "noop_encoder")]
    encoder: String,

    /// Encoder parameter as name=value (repeatable)
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, ParamValue)>,

    /// Decoder name [default: the encoder's counterpart]
    #[arg(short, long)]
    decoder: Option<String>,

    /// Decoder parameter as name=value (repeatable)
    #[arg(long = "decoder-param", value_parser = parse_param)]
    decoder_params: Vec<(String, ParamValue)>,

    /// Activation shape, comma separated
    #[arg(short, long, default_value = "1,3,32,32", value_parser = parse_shape)]
    shape: Shape,

    /// Number of forward calls
    #[arg(short = 'n', long, default_value = "64")]
    iterations: usize,

    /// Fraction of activations that are exactly zero
    #[arg(long, default_value = "0.5")]
    sparsity: f64,

    /// RNG seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Stage inputs and outputs through a simulated accelerator
    #[arg(long)]
    device: bool,

    /// Layer configuration file (JSON); overrides the codec flags
    #[arg(short, long)]
    config: Option<String>,

    /// List registered codecs and exit
    #[arg(long)]
    list: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Parse `name=value`, guessing the value's kind.
fn parse_param(s: &str) -> Result<(String, ParamValue), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    if name.is_empty() {
        return Err(format!("missing parameter name in '{}'", s));
    }
    let value = if let Ok(v) = value.parse::<i64>() {
        ParamValue::Int(v)
    } else if let Ok(v) = value.parse::<f64>() {
        ParamValue::Float(v)
    } else if let Ok(v) = value.parse::<bool>() {
        ParamValue::Bool(v)
    } else {
        ParamValue::Str(value.to_string())
    };
    Ok((name.to_string(), value))
}

fn parse_shape(s: &str) -> Result<Shape, String> {
    let dims = s
        .split(',')
        .map(|d| d.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid shape '{}': {}", s, e))?;
    if dims.is_empty() || dims.contains(&0) {
        return Err(format!("shape '{}' has an empty dimension", s));
    }
    Ok(Shape::from(dims))
}

/// `foo_encoder` → `foo_decoder`.
fn counterpart(encoder: &str) -> String {
    match encoder.strip_suffix("_encoder") {
        Some(stem) => format!("{}_decoder", stem),
        None => encoder.to_string(),
    }
}

/// Post-ReLU style activations.
fn activations(rng: &mut StdRng, shape: &Shape, sparsity: f64) -> tessera::Result<Tensor> {
    let values: Vec<f32> = (0..shape.numel())
        .map(|_| {
            if rng.gen_bool(sparsity) {
                0.0
            } else {
                rng.gen_range(0.0..6.0)
            }
        })
        .collect();
    Tensor::from_f32(shape.clone(), &values)
}

#[derive(Debug, Serialize)]
struct Summary {
    encoder: String,
    decoder: String,
    shape: Vec<usize>,
    iterations: usize,
    input_bytes: usize,
    mean_compressed_bytes: f64,
    ratio: f64,
    mean_total_us: f64,
    mean_encode_us: f64,
    mean_decode_us: f64,
    mean_transfer_us: f64,
    wall_ms: f64,
    mse: f64,
    psnr_db: f64,
    cosine: f64,
    transfers: u64,
}

fn micros(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1e6
}

fn list_codecs(registry: &CodecRegistry) {
    println!("Encoders:");
    for name in registry.encoder_names() {
        let params = registry.encoder_params(name).unwrap_or(&[]);
        let params: Vec<String> = params
            .iter()
            .map(|p| {
                let required = if p.required { "" } else { "?" };
                format!("{}{}", p.name, required)
            })
            .collect();
        println!("  {:<20} {}", name, params.join(" "));
    }
    println!("Decoders:");
    for name in registry.decoder_names() {
        println!("  {}", name);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if !(0.0..=1.0).contains(&args.sparsity) {
        return Err(format!("--sparsity must be in [0, 1], got {}", args.sparsity).into());
    }

    let registry = CodecRegistry::global();
    if args.list {
        list_codecs(registry);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => {
            info!("Loading layer config from {}", path);
            LayerConfig::from_json_file(path)?
        }
        None => {
            let decoder = args.decoder.clone().unwrap_or_else(|| counterpart(&args.encoder));
            let encoder_params: CodecConfig = args.params.iter().cloned().collect();
            let decoder_params: CodecConfig = args.decoder_params.iter().cloned().collect();
            let layout = TensorLayout::new(args.shape.clone(), DType::F32);
            LayerConfig::new(&args.encoder, decoder)
                .with_encoder_params(encoder_params)
                .with_decoder_params(decoder_params)
                .sized_for(&layout)?
        }
    };
    let config = config
        .with_telemetry(TelemetryConfig::timings())
        .with_output_residency(if args.device {
            Residency::Accelerator
        } else {
            Residency::Host
        });

    let accelerator = SimulatedAccelerator::new();
    let mut staging = TransferManager::with_accelerator(Arc::new(accelerator.clone()));
    let transfer = if args.device {
        TransferManager::with_accelerator(Arc::new(accelerator))
    } else {
        TransferManager::host_only()
    };

    let mut layer = CompressionLayer::with_parts(config, registry, transfer)?;

    info!(
        "Running {} x {} through {} / {}",
        args.iterations,
        args.shape,
        layer.config().encoder_name,
        layer.config().decoder_name
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut last = None;
    let started = Instant::now();
    for i in 0..args.iterations {
        let host = activations(&mut rng, &args.shape, args.sparsity)?;
        let output = if args.device {
            layer.forward(&staging.convert(&host, Residency::Accelerator)?)?
        } else {
            layer.forward(&host)?
        };
        debug!(iteration = i, payload = ?layer.size_log().last(), "forward done");
        last = Some((host, output));
    }
    let wall = started.elapsed();

    let quality = match last {
        Some((host, output)) => {
            let output = staging.convert(&output, Residency::Host)?;
            tessera::compare(&host, &output)?
        }
        None => tessera::QualityReport::default(),
    };

    let input_bytes = args.shape.numel() * 4;
    let sizes = layer.size_log();
    let timings = CallTimings::mean(layer.call_timings());
    let summary = Summary {
        encoder: layer.config().encoder_name.clone(),
        decoder: layer.config().decoder_name.clone(),
        shape: args.shape.dims().to_vec(),
        iterations: sizes.len(),
        input_bytes,
        mean_compressed_bytes: sizes.mean(),
        ratio: if sizes.mean() > 0.0 {
            input_bytes as f64 / sizes.mean()
        } else {
            0.0
        },
        mean_total_us: micros(timings.total),
        mean_encode_us: micros(timings.encode),
        mean_decode_us: micros(timings.decode),
        mean_transfer_us: micros(timings.transfer_in + timings.transfer_out),
        wall_ms: wall.as_secs_f64() * 1e3,
        mse: quality.mse,
        psnr_db: quality.psnr,
        cosine: quality.cosine_similarity,
        transfers: layer.transfer_stats().total_transfers(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{} / {} on {}", summary.encoder, summary.decoder, args.shape);
        println!("  calls:            {}", summary.iterations);
        println!(
            "  compressed size:  {:.1} B mean of {} B ({:.2}x)",
            summary.mean_compressed_bytes, summary.input_bytes, summary.ratio
        );
        println!(
            "  stage time:       encode {:.1} us, decode {:.1} us, transfer {:.1} us",
            summary.mean_encode_us, summary.mean_decode_us, summary.mean_transfer_us
        );
        println!(
            "  per call:         {:.1} us ({:.1} ms wall)",
            summary.mean_total_us, summary.wall_ms
        );
        println!("  quality:          {}", quality);
    }

    Ok(())
}
