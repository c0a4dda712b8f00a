use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Dump MIDI messages from a file, a raw byte stream or a live input
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Standard MIDI File to read (raw MIDI bytes with --raw, stdin when missing)
    pub file: Option<PathBuf>,

    /// Treat the input as a raw MIDI byte stream instead of a Standard MIDI File
    #[arg(long)]
    pub raw: bool,

    /// List available MIDI input devices
    #[arg(long)]
    pub device_list: bool,

    /// Listen to the MIDI input device whose name contains this text
    #[arg(long)]
    pub device: Option<String>,

    /// List available MIDI output devices
    #[arg(long)]
    pub output_list: bool,

    /// While listening, forward every message to the output device whose name contains this text
    #[arg(long, requires = "device")]
    pub output: Option<String>,

    /// Settings file (defaults to midiroute.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write the log to this file (defaults to ~/.local/share/midiroute/logs/app.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Don't log the dispatched messages
    #[arg(short, long)]
    pub quiet: bool,

    /// More log output (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Log level after applying the verbosity flags to the configured level
    pub fn level_filter(&self, configured: LevelFilter) -> LevelFilter {
        match self.verbose {
            0 => configured,
            1 => configured.max(LevelFilter::Debug),
            _ => LevelFilter::Trace,
        }
    }
}

pub fn validate_device(device_name: &str, devices: &[String]) -> Result<(), String> {
    if !devices.iter().any(|d| d.contains(device_name)) {
        let mut error_msg = format!(
            "Error: Device '{}' not found in available devices:\n",
            device_name
        );
        for device in devices {
            error_msg.push_str(&format!("  - {}\n", device));
        }
        return Err(error_msg);
    }
    Ok(())
}
