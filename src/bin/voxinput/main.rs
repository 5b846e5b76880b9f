//! Session binary: resolves configuration, then speaks the newline-delimited
//! JSON protocol on stdin/stdout for one attached surface.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use voxinput::audio::CpalBackend;
use voxinput::config::AppConfig;

#[derive(Debug, Parser)]
#[command(
    name = "voxinput",
    version,
    about = "Voice-to-text capture and message composition for chat input surfaces"
)]
struct Args {
    /// Transcription endpoint URL.
    #[arg(long, env = "VOXINPUT_ENDPOINT")]
    endpoint: Option<String>,

    /// Config file path (defaults to the per-user config location).
    #[arg(long, env = "VOXINPUT_CONFIG")]
    config: Option<PathBuf>,

    /// Preferred audio input device name.
    #[arg(long, env = "VOXINPUT_INPUT_DEVICE")]
    input_device: Option<String>,

    /// Submit the composed message automatically after a transcript merges.
    #[arg(long)]
    auto_submit: bool,

    /// Keep timestamp markers in transcripts instead of stripping them.
    #[arg(long)]
    keep_timestamps: bool,

    /// List available audio input devices and exit.
    #[arg(long)]
    list_input_devices: bool,
}

/// Layer CLI/env overrides over the config file; a flag always wins.
fn effective_config(args: &Args) -> Result<AppConfig> {
    let mut config = match args.config.clone().or_else(AppConfig::default_path) {
        Some(path) => AppConfig::load(&path)?,
        None => AppConfig::default(),
    };
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(device) = &args.input_device {
        config.input_device = Some(device.clone());
    }
    if args.auto_submit {
        config.auto_submit = true;
    }
    if args.keep_timestamps {
        config.strip_timestamps = false;
    }
    Ok(config)
}

/// Test runs inject a fake device list so CI never needs audio hardware.
fn input_device_names() -> Vec<String> {
    if let Ok(devices) = std::env::var("VOXINPUT_TEST_DEVICES") {
        return devices
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
    }
    CpalBackend::input_device_names()
}

fn print_input_devices() {
    let devices = input_device_names();
    if devices.is_empty() {
        println!("No audio input devices detected.");
        return;
    }
    println!("Available audio input devices:");
    for name in devices {
        println!("  {name}");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    voxinput::logging::init();

    if args.list_input_devices {
        print_input_devices();
        return Ok(());
    }

    let config = effective_config(&args)?;
    tracing::debug!("starting session against {}", config.endpoint);
    voxinput::ipc::run_session(config);
    Ok(())
}
