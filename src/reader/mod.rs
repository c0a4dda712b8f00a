//! Reader dispatching decoded MIDI messages to typed callbacks
//!
//! A [`Reader`] reads from one of three kinds of input:
//! - Standard MIDI Files ([`Reader::read_smf`]), with positions for every message
//! - live byte streams ([`Reader::read`]), without positions
//! - live connections ([`Reader::listen_to`]), with positions synthesized
//!   from the inter-message timing
//!
//! The tempo changes seen along the way are kept, so [`Reader::time_at`] can
//! convert tick positions into wall-clock durations.

mod callbacks;
mod dispatch;
mod live;

pub use callbacks::*;
pub use live::StopHandle;

use crate::config::LIVE_RESOLUTION;
use crate::error::Result;
use crate::midi::wire::StreamDecoder;
use crate::midi::{ClockTracker, Message, MessageSource, SmfHeader, SmfSource};
use crate::timing::TempoMap;
use log::{debug, log, Level};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

/// Where the current message sits in its container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Track index, 0 for live input
    pub track: i16,
    /// Ticks since the previous message
    pub delta_ticks: u32,
    /// Ticks since the start of the track
    pub absolute_ticks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    ReadingContainer,
    ReadingLive,
}

/// Logs every dispatched message
pub trait MessageLogger {
    fn log_message(&mut self, position: Option<&Position>, msg: &Message);
}

/// Logs messages through the `log` facade
#[derive(Debug, Clone, Copy)]
pub struct LogFacade {
    pub level: Level,
}

impl Default for LogFacade {
    fn default() -> Self {
        Self {
            level: Level::Debug,
        }
    }
}

impl MessageLogger for LogFacade {
    fn log_message(&mut self, position: Option<&Position>, msg: &Message) {
        match position {
            Some(p) => log!(
                self.level,
                "#{} [{} d:{}] {:?}",
                p.track,
                p.absolute_ticks,
                p.delta_ticks,
                msg
            ),
            None => log!(self.level, "{:?}", msg),
        }
    }
}

/// Construction options for a [`Reader`]
pub struct ReaderOptions {
    logger: Option<Box<dyn MessageLogger + Send>>,
    live_resolution: u16,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            logger: Some(Box::new(LogFacade::default())),
            live_resolution: LIVE_RESOLUTION,
        }
    }
}

impl ReaderOptions {
    /// Disables message logging
    pub fn no_logger(mut self) -> Self {
        self.logger = None;
        self
    }

    pub fn logger<L: MessageLogger + Send + 'static>(mut self, logger: L) -> Self {
        self.logger = Some(Box::new(logger));
        self
    }

    /// Resolution used for synthesized positions when nothing else established one
    pub fn live_resolution(mut self, resolution: u16) -> Self {
        self.live_resolution = resolution;
        self
    }
}

pub struct Reader {
    pub callbacks: Callbacks,
    position: Option<Position>,
    tempo: TempoMap,
    header: Option<SmfHeader>,
    logger: Option<Box<dyn MessageLogger + Send>>,
    state: ReaderState,
    live_resolution: u16,
    clock: Arc<ClockTracker>,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    pub fn new() -> Self {
        Self::with_options(ReaderOptions::default())
    }

    pub fn with_options(options: ReaderOptions) -> Self {
        Self {
            callbacks: Callbacks::default(),
            position: None,
            tempo: TempoMap::new(),
            header: None,
            logger: options.logger,
            state: ReaderState::Idle,
            live_resolution: options.live_resolution,
            clock: Arc::new(ClockTracker::new()),
        }
    }

    /// Reads a complete Standard MIDI File.
    ///
    /// The header callback runs first, then every track in file order.
    pub fn read_smf(&mut self, data: &[u8]) -> Result<()> {
        let mut source = SmfSource::parse(data)?;
        let header = *source.header();

        self.header = Some(header);
        self.tempo.set_resolution(header.resolution());
        self.position = Some(Position::default());
        if let Some(callback) = self.callbacks.smf_header.as_mut() {
            callback(&header);
        }

        self.state = ReaderState::ReadingContainer;
        let result = self.read_all(&mut source);
        self.state = ReaderState::Idle;
        result
    }

    /// Reads a Standard MIDI File from `src` until its end. Does not close `src`.
    pub fn read_smf_from<R: Read>(&mut self, mut src: R) -> Result<()> {
        let mut data = Vec::new();
        src.read_to_end(&mut data)?;
        self.read_smf(&data)
    }

    /// Reads live MIDI bytes from `src` until it is exhausted.
    ///
    /// Positions are unknown for this kind of input.
    pub fn read<R: Read>(&mut self, src: R) -> Result<()> {
        self.position = None;
        let mut decoder = StreamDecoder::new(src);

        self.state = ReaderState::ReadingLive;
        let result = self.read_all(&mut decoder);
        self.state = ReaderState::Idle;
        result
    }

    fn read_all<S: MessageSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        loop {
            match self.dispatch_one(source) {
                Ok(()) => {}
                Err(e) if e.is_end_of_stream() => {
                    debug!("End of stream");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Wall-clock time of an absolute tick position, respecting all tempo
    /// changes read so far. None when the resolution is unknown.
    pub fn time_at(&self, absolute_ticks: u64) -> Option<Duration> {
        self.tempo.duration_at(absolute_ticks)
    }

    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }

    /// Ticks per quarter note, None when unknown or SMPTE based
    pub fn resolution(&self) -> Option<u16> {
        self.tempo.resolution()
    }

    /// Header of the last file read
    pub fn header(&self) -> Option<&SmfHeader> {
        self.header.as_ref()
    }

    /// Position of the last dispatched message
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Transport and tempo derived from realtime messages received live
    pub fn clock_tracker(&self) -> Arc<ClockTracker> {
        Arc::clone(&self.clock)
    }
}
