use crate::error::{Error, Result};
use simplelog::*;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// `~/.local/share/midiroute/logs/app.log`, None without a home directory
pub fn default_log_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("midiroute")
            .join("logs")
            .join("app.log"),
    )
}

/// Logs to stderr, and additionally to `log_file` when given.
///
/// Fails when a logger has already been installed.
pub fn init_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let config = Config::default();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        // Create the log directory if it doesn't exist
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        loggers.push(WriteLogger::new(LevelFilter::Debug, config, file));
    }

    CombinedLogger::init(loggers)
        .map_err(|e| Error::Config(format!("Logger initialization failed: {}", e)))
}
