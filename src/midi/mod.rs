//! MIDI data model and transports
//!
//! This module provides the building blocks shared by the reader and writer:
//! - [`Message`] and its kinds, the closed set of decoded MIDI messages
//! - [`wire`] for raw byte encoding and decoding of live streams
//! - [`smf`] for Standard MIDI File containers (via `midly`)
//! - [`ClockTracker`] for deriving BPM from incoming timing clock
//! - [`MidiIn`] / [`MidiOut`] connection traits, with mock and midir implementations
//!
mod clock;
pub mod message;
#[cfg(feature = "midi-io")]
pub mod midir_engine;
pub mod mock_engine;
pub mod smf;
pub mod wire;

pub use clock::ClockTracker;
pub use message::{
    ChannelMessage, Message, MetaMessage, RealtimeMessage, SysExMessage, SystemCommonMessage,
};
#[cfg(feature = "midi-io")]
pub use midir_engine::{MidirIn, MidirOut};
pub use mock_engine::{MockMidiIn, MockMidiOut};
pub use smf::{SmfFormat, SmfHeader, SmfSource, TimeFormat};
pub use wire::StreamDecoder;

use crate::error::Result;

/// A pull-based decoder yielding one message per call.
///
/// Returns [`Error::EndOfStream`](crate::Error::EndOfStream) once exhausted.
pub trait MessageSource {
    fn next_message(&mut self) -> Result<Message>;

    /// Track index and delta ticks of the last message, for container formats.
    fn container_position(&self) -> Option<(i16, u32)> {
        None
    }
}

/// Destination for encoded messages
pub trait MessageSink {
    fn write_message(&mut self, msg: &Message) -> Result<()>;
}

/// Callback receiving raw message bytes and the time since the previous
/// message in microseconds (negative when unknown).
pub type InputListener = Box<dyn FnMut(&[u8], i64) + Send>;

/// A live MIDI input connection
pub trait MidiIn: Send {
    /// Installs the listener and starts delivering messages to it
    fn set_listener(&mut self, listener: InputListener) -> Result<()>;

    /// Stops delivery and drops the listener
    fn stop_listening(&mut self);
}

/// A live MIDI output connection
pub trait MidiOut {
    /// Sends one complete message
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}
