//! Error types for reading and writing MIDI data.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The message source is exhausted. Read loops treat this as a normal end.
    #[error("end of stream")]
    EndOfStream,

    #[error("MIDI decode error: {0}")]
    Decode(String),

    #[error("MIDI write error: {0}")]
    Write(String),

    #[error("can't write note on (channel {channel}, key {key}): note already running")]
    NoteAlreadyRunning { channel: u8, key: u8 },

    #[error("can't write note off (channel {channel}, key {key}): note is not running")]
    NoteNotRunning { channel: u8, key: u8 },

    #[error("invalid MIDI channel {0} (must be 0-15)")]
    InvalidChannel(u8),

    #[error("too many tracks: header declares {declared}")]
    TooManyTracks { declared: u16 },

    #[error("{kind} messages can't be written to {target}")]
    NotAllowed {
        kind: &'static str,
        target: &'static str,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("MIDI connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(String),
}

impl Error {
    /// Returns true for the expected end of a message stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::Connection(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::Connection(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::Connection(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::SendError> for Error {
    fn from(e: midir::SendError) -> Self {
        Error::Write(e.to_string())
    }
}

/// Result type for MIDI operations
pub type Result<T> = std::result::Result<T, Error>;
