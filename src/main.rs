use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use ntsc_compositor::{
    config::Config,
    effects::EffectConfiguration,
    frame::Frame,
    gpu::CpuDevice,
    pipeline::FramePipeline,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Pattern {
    Gray,
    Bars,
    Ramp,
}

impl Pattern {
    fn render(self, width: u32, height: u32) -> Frame {
        match self {
            Pattern::Gray => Frame::new_filled(width, height, [0.5, 0.5, 0.5, 1.0]),
            Pattern::Bars => Frame::color_bars(width, height),
            Pattern::Ramp => Frame::ramp(width, height),
        }
    }
}

#[derive(Parser)]
#[command(
    name = "ntsc-compositor",
    version,
    about = "Run test patterns through an NTSC/VHS emulation pipeline",
    long_about = "ntsc-compositor renders synthetic frames through the analog degradation chain and reports how far each output strays from its input and how long it took."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frame width in pixels
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Number of frames to render
    #[arg(short, long, default_value_t = 10)]
    frames: u32,

    /// Test pattern to feed the pipeline
    #[arg(short, long, value_enum, default_value = "bars")]
    pattern: Pattern,

    /// Switch every effect off
    #[arg(long)]
    passthrough: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };
    if cli.passthrough {
        config.effect = EffectConfiguration::passthrough();
    }
    config.validate()?;

    if cli.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("📺 Starting ntsc-compositor v{}", env!("CARGO_PKG_VERSION"));
    info!("   Frames: {} x {}x{} ({:?})", cli.frames, cli.width, cli.height, cli.pattern);

    let device = Arc::new(CpuDevice::with_config(&config.device)?);
    let mut pipeline = FramePipeline::new(device, &config.pipeline)?;
    let input = cli.pattern.render(cli.width, cli.height);

    let mut deviation_sum = 0.0;
    let mut produced = 0u32;
    for index in 0..cli.frames {
        let Some(output) = pipeline.output_image(&input, &config.effect) else {
            warn!(frame = index, "No output for frame");
            continue;
        };
        let deviation = output.mean_abs_difference(&input).unwrap_or(f32::NAN);
        deviation_sum += deviation as f64;
        produced += 1;
        info!(
            frame = index,
            deviation,
            ms = pipeline.stats().last_frame_time.as_secs_f64() * 1000.0,
            "Frame rendered"
        );
    }

    let stats = pipeline.stats();
    info!("✅ Rendered {} of {} frames", produced, cli.frames);
    if produced > 0 {
        info!("   Mean deviation: {:.4}", deviation_sum / produced as f64);
    }
    if stats.stages_bypassed > 0 {
        warn!("   Stages bypassed: {}", stats.stages_bypassed);
    }
    Ok(())
}
