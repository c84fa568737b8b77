// SPDX-License-Identifier: GPL-3.0-only

use camera_engine::AspectMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-engine")]
#[command(about = "Manual-control camera engine with a virtual capture device")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Config file (default: ~/.config/camera-engine/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Framing mode argument
#[derive(Clone, Copy, ValueEnum)]
pub enum AspectArg {
    Full,
    #[value(name = "1:1")]
    Square,
    #[value(name = "3:4")]
    Portrait,
    #[value(name = "9:16")]
    Tall,
}

impl From<AspectArg> for AspectMode {
    fn from(arg: AspectArg) -> Self {
        match arg {
            AspectArg::Full => AspectMode::Full,
            AspectArg::Square => AspectMode::Square,
            AspectArg::Portrait => AspectMode::Portrait3x4,
            AspectArg::Tall => AspectMode::Tall9x16,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the capabilities of the virtual cameras
    Caps {
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Resolve an EV move into exposure time and ISO
    ResolveEv {
        /// EV compensation in stops
        #[arg(long, allow_hyphen_values = true)]
        ev: f64,

        /// Baseline exposure time (ns)
        #[arg(long, default_value = "8000000")]
        exposure_ns: i64,

        /// Baseline ISO
        #[arg(long, default_value = "200")]
        iso: i32,

        /// Target frame rate
        #[arg(long, default_value = "30")]
        fps: u32,
    },

    /// Print the sensor crop region for a framing mode and zoom
    Crop {
        /// Sensor active array width
        #[arg(long, default_value = "4000")]
        width: i32,

        /// Sensor active array height
        #[arg(long, default_value = "3000")]
        height: i32,

        #[arg(long, default_value = "1.0")]
        zoom: f32,

        #[arg(long, default_value = "4.0")]
        max_zoom: f32,

        #[arg(long, value_enum, default_value = "3:4")]
        aspect: AspectArg,
    },

    /// Take a photo with the virtual camera
    Photo {
        /// Output directory (default: configured photo directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "3:4")]
        aspect: AspectArg,

        #[arg(long, default_value = "1.0")]
        zoom: f32,

        /// Use the front camera
        #[arg(long)]
        front: bool,

        /// Manual exposure time (ns); enables manual mode
        #[arg(long)]
        exposure_ns: Option<i64>,

        /// Manual ISO; enables manual mode
        #[arg(long)]
        iso: Option<i32>,

        /// EV compensation in stops
        #[arg(long, allow_hyphen_values = true)]
        ev: Option<f64>,
    },

    /// Stream the virtual camera and print the frame rate
    Stream {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Target frame rate (snapped to 60 or 120)
        #[arg(long, default_value = "60")]
        fps: u32,

        /// Simulated sensor throughput in pixels per second
        #[arg(long)]
        pixel_rate: Option<u64>,

        /// Step the preview size to hold the target frame rate
        #[arg(long)]
        adaptive: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_engine=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Caps { json } => cli::print_capabilities(json),
        Commands::ResolveEv {
            ev,
            exposure_ns,
            iso,
            fps,
        } => cli::run_resolve_ev(ev, exposure_ns, iso, fps),
        Commands::Crop {
            width,
            height,
            zoom,
            max_zoom,
            aspect,
        } => cli::print_crop(width, height, zoom, max_zoom, aspect.into()),
        Commands::Photo {
            output,
            aspect,
            zoom,
            front,
            exposure_ns,
            iso,
            ev,
        } => cli::take_photo(
            cli.config.as_deref(),
            output,
            cli::PhotoOptions {
                aspect: aspect.into(),
                zoom,
                front,
                exposure_ns,
                iso,
                ev,
            },
        ),
        Commands::Stream {
            duration,
            fps,
            pixel_rate,
            adaptive,
        } => cli::stream(cli.config.as_deref(), duration, fps, pixel_rate, adaptive),
    }
}
