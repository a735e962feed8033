use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tdoa_core::{BackendKind, BearingProcessor, CorrelationMode, PeakSearch};

mod config;
mod link;
mod synth;

use config::AppConfig;
use link::LinkSession;

#[derive(Parser)]
#[command(name = "tdoa")]
#[command(about = "Two-sensor TDOA bearing estimator", long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Per-field overrides applied on top of the loaded config.
#[derive(Args, Default)]
struct Overrides {
    /// Samples per channel (N)
    #[arg(short = 'n', long, global = true)]
    samples: Option<usize>,
    /// Sample rate in Hz
    #[arg(long, global = true)]
    sample_rate: Option<f64>,
    /// Propagation speed in m/s
    #[arg(long, global = true)]
    speed: Option<f64>,
    /// Sensor spacing in metres
    #[arg(long, global = true)]
    spacing: Option<f64>,
    #[arg(long, value_enum, global = true)]
    mode: Option<ModeArg>,
    #[arg(long, value_enum, global = true)]
    peak: Option<PeakArg>,
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendArg>,
    /// Idle wait between availability checks, in milliseconds
    #[arg(long, global = true)]
    idle_ms: Option<u64>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    Correlation,
    Convolution,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PeakArg {
    Signed,
    Absolute,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum BackendArg {
    Direct,
    Fft,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode frames from a byte stream and write one report per frame
    Run {
        /// Input file or device node; "-" for stdin
        #[arg(short, long, default_value = "-")]
        input: String,
        /// Output file; "-" for stdout
        #[arg(short, long, default_value = "-")]
        output: String,
        /// Only write the diagnostic lines, not the data blocks
        #[arg(long)]
        no_blocks: bool,
    },
    /// Write synthetic frames with a known inter-channel delay
    Synth {
        /// Delay of channel B relative to channel A, in samples
        #[arg(short, long, default_value_t = 0, allow_hyphen_values = true)]
        delay: isize,
        #[arg(short, long, default_value_t = 1)]
        frames: usize,
        #[arg(short, long, default_value_t = 100.0)]
        amplitude: f32,
        /// Output file; "-" for stdout
        #[arg(short, long, default_value = "-")]
        output: String,
    },
    /// Convert a correlation peak index into a bearing
    Angle {
        #[arg(short, long)]
        peak_index: usize,
    },
    /// Print the effective configuration
    Config {
        /// Persist the effective configuration
        #[arg(long)]
        save: bool,
    },
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(n) = self.samples {
            config.samples_per_channel = n;
        }
        if let Some(fs) = self.sample_rate {
            config.sample_rate_hz = fs;
        }
        if let Some(c) = self.speed {
            config.speed_of_sound = c;
        }
        if let Some(d) = self.spacing {
            config.sensor_spacing_m = d;
        }
        if let Some(mode) = self.mode {
            config.mode = match mode {
                ModeArg::Correlation => CorrelationMode::CrossCorrelation,
                ModeArg::Convolution => CorrelationMode::Convolution,
            };
        }
        if let Some(peak) = self.peak {
            config.peak_search = match peak {
                PeakArg::Signed => PeakSearch::Signed,
                PeakArg::Absolute => PeakSearch::Absolute,
            };
        }
        if let Some(backend) = self.backend {
            config.backend = match backend {
                BackendArg::Direct => BackendKind::Direct,
                BackendArg::Fft => BackendKind::Fft,
            };
        }
        if let Some(ms) = self.idle_ms {
            config.idle_interval_ms = ms;
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    cli.overrides.apply(&mut config);

    match cli.command {
        Commands::Run {
            input,
            output,
            no_blocks,
        } => {
            config.validate()?;
            if no_blocks {
                config.emit_blocks = false;
            }
            run_session(&config, &input, &output)?;
        }
        Commands::Synth {
            delay,
            frames,
            amplitude,
            output,
        } => {
            let bytes = synth::frames(config.samples_per_channel, delay, amplitude, frames)?;
            let mut out = open_output(&output)?;
            out.write_all(&bytes).context("Failed to write frames")?;
            out.flush()?;
        }
        Commands::Angle { peak_index } => {
            let estimate = config
                .geometry()?
                .estimate(peak_index, config.samples_per_channel)?;
            println!("Lag: {} samples", estimate.lag_samples);
            println!("Time Delay: {:.2} us", estimate.time_delay_us() + 0.0);
            println!("Argument: {:.4}", estimate.raw_arg);
            println!("Source Angle: {:.1} degrees", estimate.angle_deg + 0.0);
            if estimate.saturated {
                println!("Saturated: delay exceeds the sensor baseline");
            }
        }
        Commands::Config { save } => {
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                let path = config.save(cli.config.as_deref())?;
                println!("Saved to {}", path.display());
            }
        }
    }

    Ok(())
}

fn run_session(config: &AppConfig, input: &str, output: &str) -> Result<()> {
    let processor = BearingProcessor::new(config.pipeline(), config.geometry()?)?;
    info!(
        "Listening on {}: N = {}, {} ({} backend, {} peak), Fs = {} Hz, c = {} m/s, d = {} m",
        input,
        config.samples_per_channel,
        config.mode,
        config.backend,
        config.peak_search,
        config.sample_rate_hz,
        config.speed_of_sound,
        config.sensor_spacing_m
    );

    let reader = open_input(input)?;
    let mut writer = open_output(output)?;

    // Graceful shutdown handling
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::Relaxed);
    })?;

    let session = LinkSession::new(processor, config.idle_interval(), config.emit_blocks);
    session.run(reader, &mut *writer, running)?;
    Ok(())
}

fn open_input(path: &str) -> Result<Box<dyn Read + Send>> {
    if path == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("Failed to open input {}", path))?;
    Ok(Box::new(file))
}

fn open_output(path: &str) -> Result<Box<dyn Write>> {
    if path == "-" {
        return Ok(Box::new(io::stdout().lock()));
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open output {}", path))?;
    Ok(Box::new(file))
}
