use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use voxlink::audio::capture::list_input_devices;
use voxlink::config::PipelineConfig;
use voxlink::pipeline::VoicePipeline;
use voxlink::protocol::encoding::EncodingScheme;

#[derive(Parser, Debug)]
#[command(
    name = "voxlink",
    about = "Stream voice features (pitch, harmonics, formants) to an avatar over OSC"
)]
struct Cli {
    /// Input device name (defaults to the system default microphone)
    #[arg(long)]
    device: Option<String>,
    /// List available input devices and exit
    #[arg(long)]
    list_devices: bool,
    /// JSON configuration file (missing or malformed files fall back to defaults)
    #[arg(long)]
    config: Option<PathBuf>,
    /// OSC receiver host
    #[arg(long)]
    host: Option<String>,
    /// OSC receiver port
    #[arg(long)]
    port: Option<u16>,
    /// Analysis/send rate in Hz
    #[arg(long)]
    rate: Option<f32>,
    /// Number of tracked harmonics
    #[arg(long)]
    harmonics: Option<usize>,
    /// Wire encoding scheme: raw_split16, inverse_split7, or log_inverse_split14
    #[arg(long)]
    scheme: Option<String>,
    /// Reference amplitude for gain normalization
    #[arg(long)]
    sensitivity: Option<f32>,
    /// Print each analysis frame to stderr
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" })),
        )
        .init();

    if cli.list_devices {
        let devices = list_input_devices();
        if devices.is_empty() {
            println!("No input devices found");
        } else {
            for name in devices {
                println!("{}", name);
            }
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load_from_file(path),
        None => PipelineConfig::default(),
    };
    if let Some(host) = cli.host {
        config.osc.host = host;
    }
    if let Some(port) = cli.port {
        config.osc.port = port;
    }
    if let Some(rate) = cli.rate {
        config.target_rate_hz = rate;
    }
    if let Some(harmonics) = cli.harmonics {
        config.harmonic_count = harmonics;
    }
    if let Some(sensitivity) = cli.sensitivity {
        config.amp_ref = sensitivity;
    }
    if let Some(scheme) = &cli.scheme {
        config.encoding.scheme = parse_scheme(scheme)?;
    }

    let mut pipeline = VoicePipeline::new(config)?;
    let mut frames = pipeline.subscribe_frames();
    pipeline.start(cli.device.as_deref())?;
    tracing::info!("streaming; press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            frame = frames.recv() => {
                if cli.verbose {
                    if let Ok(frame) = frame {
                        let f = &frame.features;
                        eprintln!(
                            "cycle {:>8}  f0 {:>7.1} Hz  peak {:.3}  formants {:?}",
                            frame.cycle, f.f0_hz, f.peak_ratio, f.formants_hz
                        );
                    }
                }
            }
        }
    }

    pipeline.stop()?;
    tracing::info!("stopped after {} cycles", pipeline.cycles_completed());
    Ok(())
}

fn parse_scheme(name: &str) -> Result<EncodingScheme> {
    match name {
        "raw_split16" => Ok(EncodingScheme::RawSplit16),
        "inverse_split7" => Ok(EncodingScheme::InverseSplit7),
        "log_inverse_split14" => Ok(EncodingScheme::LogInverseSplit14),
        other => anyhow::bail!("unknown encoding scheme: {}", other),
    }
}
