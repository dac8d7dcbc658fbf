use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bgswap::{
    background::Background,
    config::Config,
    replacement::ReplacementEngine,
    segmentation::OracleRegistry,
};

/// Exit status after Ctrl-C, as shells report for SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser)]
#[command(
    name = "bgswap",
    version,
    about = "Replace the background of a video",
    long_about = "bgswap segments every frame of a video, replaces the background with a color, an image or black, and keeps the original audio track."
)]
struct Cli {
    /// Input video file
    #[arg(short, long)]
    input: PathBuf,

    /// Output video file (.mp4, .avi, .mov, .mkv, .wmv)
    #[arg(short, long)]
    output: PathBuf,

    /// Background color as "r,g,b" or "#rrggbb"
    #[arg(long, conflicts_with_all = ["image", "transparent"])]
    color: Option<String>,

    /// Background image, resized to the video's frame size
    #[arg(long, conflicts_with = "transparent")]
    image: Option<PathBuf>,

    /// Clear the background to black
    #[arg(long)]
    transparent: bool,

    /// Segmentation oracle (chroma-key, onnx)
    #[arg(long)]
    oracle: Option<String>,

    /// ONNX model file for the onnx oracle
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn background(&self) -> bgswap::Result<Background> {
        if self.transparent {
            Ok(Background::Transparent)
        } else if let Some(image) = &self.image {
            Background::from_image_file(image)
        } else if let Some(color) = &self.color {
            Ok(Background::SolidColor(Background::parse_color(color)?))
        } else {
            Ok(Background::default())
        }
    }

    fn load_config(&self) -> bgswap::Result<Config> {
        let mut config = match &self.config {
            Some(config_path) => {
                info!("Loading configuration from {:?}", config_path);
                Config::from_file(config_path)?
            }
            None => {
                info!("Using default configuration");
                Config::default()
            }
        };

        if let Some(oracle) = &self.oracle {
            config.segmentation.oracle = oracle.clone();
        }
        if let Some(model) = &self.model {
            config.segmentation.onnx.model_path = Some(model.clone());
        }

        config.validate()?;
        Ok(config)
    }

    fn prepare(&self) -> bgswap::Result<(ReplacementEngine, Background)> {
        let config = self.load_config()?;
        let background = self.background()?;

        let registry = OracleRegistry::new();
        let oracle = registry.create(&config.segmentation.oracle, &config.segmentation)?;
        info!("Using {} oracle", oracle.name());

        Ok((ReplacementEngine::with_ffmpeg(config, oracle), background))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting bgswap v{}", env!("CARGO_PKG_VERSION"));

    let (mut engine, background) = match cli.prepare() {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e.user_message());
            std::process::exit(1);
        }
    };

    let (input, output) = (cli.input, cli.output);
    let job = tokio::task::spawn_blocking(move || engine.process(&input, &output, background));

    tokio::select! {
        joined = job => match joined? {
            Ok(report) => {
                info!(
                    "Background replaced: {} frames, {} skipped, audio {:?}, {} cleanup warnings",
                    report.frames_processed,
                    report.frames_skipped,
                    report.audio,
                    report.cleanup_warnings.len()
                );
                Ok(())
            }
            Err(e) => {
                error!("{} failed: {}", e.kind(), e);
                eprintln!("Error: {}", e.user_message());
                std::process::exit(1)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            // Exiting skips the job's cleanup: temp files from this run stay behind.
            warn!("Interrupted; stopping");
            std::process::exit(INTERRUPTED_EXIT_CODE)
        }
    }
}
