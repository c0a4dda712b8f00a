// config.rs

use crate::error::{Error, Result};
use crate::midi::MessageSink;
use crate::reader::ReaderOptions;
use crate::writer::Writer;
use config::{Config, Environment, File};
use log::{debug, LevelFilter};
use serde::Deserialize;
use std::path::Path;

/// Tempo assumed until the first tempo message
pub const DEFAULT_BPM: u32 = 120;
/// Ticks per quarter note for positions synthesized from live input
pub const LIVE_RESOLUTION: u16 = 1920;
/// Ticks per quarter note for written files
pub const DEFAULT_SMF_RESOLUTION: u16 = 960;
/// MIDI timing clocks per quarter note
pub const CLOCKS_PER_QUARTER: u32 = 24;

/// Settings layered from defaults, an optional `midiroute.toml` and
/// `MIDIROUTE_*` environment variables
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub log_level: String,
    /// Log every dispatched message at debug level
    pub log_messages: bool,
    /// Initial note consolidation of writers
    pub consolidate_notes: bool,
    pub live_resolution: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_messages: true,
            consolidate_notes: true,
            live_resolution: LIVE_RESOLUTION,
        }
    }
}

impl Settings {
    /// Loads the settings. Without an explicit `path`, `midiroute.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("log_level", defaults.log_level)?
            .set_default("log_messages", defaults.log_messages)?
            .set_default("consolidate_notes", defaults.consolidate_notes)?
            .set_default("live_resolution", defaults.live_resolution as i64)?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("midiroute").required(false)),
        };

        let settings: Settings = builder
            .add_source(Environment::with_prefix("MIDIROUTE"))
            .build()?
            .try_deserialize()?;

        if settings.live_resolution == 0 {
            return Err(Error::Config("live_resolution must be greater than 0".into()));
        }
        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| Error::Config(format!("unknown log level '{}'", self.log_level)))
    }

    pub fn reader_options(&self) -> ReaderOptions {
        let options = ReaderOptions::default().live_resolution(self.live_resolution);
        if self.log_messages {
            options
        } else {
            options.no_logger()
        }
    }

    pub fn configure_writer<S: MessageSink>(&self, writer: &mut Writer<S>) {
        writer.consolidate_notes(self.consolidate_notes);
    }
}
