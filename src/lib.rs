pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod midi;
pub mod reader;
pub mod timing;
pub mod writer;

pub use cli::{validate_device, Args};
pub use config::Settings;
pub use error::{Error, Result};
pub use midi::Message;
pub use reader::{Position, Reader, ReaderOptions, ReaderState, StopHandle};
pub use timing::TempoMap;
pub use writer::{SmfWriter, Writer};

/// Names of the available MIDI input devices
#[cfg(feature = "midi-io")]
pub fn handle_device_list() -> Result<Vec<String>> {
    midi::midir_engine::input_ports()
}

/// Names of the available MIDI input devices
#[cfg(not(feature = "midi-io"))]
pub fn handle_device_list() -> Result<Vec<String>> {
    Ok(Vec::new())
}

/// Names of the available MIDI output devices
#[cfg(feature = "midi-io")]
pub fn handle_output_list() -> Result<Vec<String>> {
    midi::midir_engine::output_ports()
}

/// Names of the available MIDI output devices
#[cfg(not(feature = "midi-io"))]
pub fn handle_output_list() -> Result<Vec<String>> {
    Ok(Vec::new())
}
