//! Writing to live MIDI outputs

use super::Writer;
use crate::error::{Error, Result};
use crate::midi::{wire, Message, MessageSink, MidiOut, RealtimeMessage, SystemCommonMessage};
use log::trace;
use std::io::Write;

/// Encodes messages to bytes and sends each one to a [`MidiOut`]
pub struct LiveSink<O: MidiOut> {
    out: O,
}

impl<O: MidiOut> LiveSink<O> {
    pub fn out(&self) -> &O {
        &self.out
    }

    pub fn into_out(self) -> O {
        self.out
    }
}

impl<O: MidiOut> MessageSink for LiveSink<O> {
    fn write_message(&mut self, msg: &Message) -> Result<()> {
        let bytes = wire::encode(msg)?;
        trace!("Sending {:02X?}", bytes);
        self.out.send(&bytes)
    }
}

/// Adapts any byte writer (a pipe, a file, a buffer) into a [`MidiOut`]
pub struct StreamOut<W: Write> {
    dest: W,
}

impl<W: Write> StreamOut<W> {
    pub fn new(dest: W) -> Self {
        Self { dest }
    }

    pub fn into_inner(self) -> W {
        self.dest
    }
}

impl<W: Write> MidiOut for StreamOut<W> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.dest
            .write_all(bytes)
            .map_err(|e| Error::Write(e.to_string()))
    }
}

impl<O: MidiOut> Writer<LiveSink<O>> {
    /// Writer speaking to a live output
    pub fn new(out: O) -> Self {
        Self::with_sink(LiveSink { out })
    }

    fn realtime(&mut self, msg: RealtimeMessage) -> Result<()> {
        self.write(&Message::Realtime(msg))
    }

    fn system_common(&mut self, msg: SystemCommonMessage) -> Result<()> {
        self.write(&Message::SystemCommon(msg))
    }

    pub fn timing_clock(&mut self) -> Result<()> {
        self.realtime(RealtimeMessage::TimingClock)
    }

    pub fn tick(&mut self) -> Result<()> {
        self.realtime(RealtimeMessage::Tick)
    }

    pub fn start(&mut self) -> Result<()> {
        self.realtime(RealtimeMessage::Start)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.realtime(RealtimeMessage::Stop)
    }

    pub fn continue_playback(&mut self) -> Result<()> {
        self.realtime(RealtimeMessage::Continue)
    }

    pub fn active_sensing(&mut self) -> Result<()> {
        self.realtime(RealtimeMessage::ActiveSensing)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.realtime(RealtimeMessage::Reset)
    }

    pub fn tune_request(&mut self) -> Result<()> {
        self.system_common(SystemCommonMessage::TuneRequest)
    }

    pub fn song_select(&mut self, song: u8) -> Result<()> {
        self.system_common(SystemCommonMessage::SongSelect(song & 0x7F))
    }

    /// Position in MIDI beats (sixteenth notes) since the start of the song
    pub fn song_position_pointer(&mut self, beats: u16) -> Result<()> {
        self.system_common(SystemCommonMessage::SongPositionPointer(beats & 0x3FFF))
    }

    pub fn midi_timing_code(&mut self, code: u8) -> Result<()> {
        self.system_common(SystemCommonMessage::MidiTimingCode(code & 0x7F))
    }
}
