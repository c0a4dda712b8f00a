//! Writing Standard MIDI Files

use super::Writer;
use crate::config::DEFAULT_SMF_RESOLUTION;
use crate::error::{Error, Result};
use crate::midi::smf::{write_smf, TrackEntry};
use crate::midi::{Message, MessageSink, MetaMessage};
use log::{debug, warn};
use std::io::Write;

/// Collects messages into tracks until the file is finished
pub struct SmfSink {
    num_tracks: u16,
    resolution: u16,
    finished: Vec<Vec<TrackEntry>>,
    current: Vec<TrackEntry>,
    delta: u32,
}

impl SmfSink {
    fn new(num_tracks: u16) -> Self {
        Self {
            num_tracks,
            resolution: DEFAULT_SMF_RESOLUTION,
            finished: Vec::with_capacity(num_tracks as usize),
            current: Vec::new(),
            delta: 0,
        }
    }

    pub fn num_tracks(&self) -> u16 {
        self.num_tracks
    }

    pub fn resolution(&self) -> u16 {
        self.resolution
    }

    pub fn finished_tracks(&self) -> u16 {
        self.finished.len() as u16
    }
}

impl MessageSink for SmfSink {
    fn write_message(&mut self, msg: &Message) -> Result<()> {
        if self.finished.len() >= self.num_tracks as usize {
            return Err(Error::TooManyTracks {
                declared: self.num_tracks,
            });
        }

        let entry = TrackEntry::new(self.delta, msg.clone())?;
        self.delta = 0;
        self.current.push(entry);

        if *msg == Message::Meta(MetaMessage::EndOfTrack) {
            let track = std::mem::take(&mut self.current);
            debug!(
                "Finished track {} with {} events",
                self.finished.len(),
                track.len()
            );
            self.finished.push(track);
        }
        Ok(())
    }
}

/// Writer building a Standard MIDI File in memory
pub type SmfWriter = Writer<SmfSink>;

impl Writer<SmfSink> {
    /// Starts a file with `num_tracks` tracks at the default resolution
    pub fn new_smf(num_tracks: u16) -> Result<Self> {
        if num_tracks == 0 {
            return Err(Error::InvalidArgument(
                "a MIDI file needs at least one track".into(),
            ));
        }
        Ok(Self::with_sink(SmfSink::new(num_tracks)))
    }

    /// Ticks per quarter note
    pub fn with_resolution(mut self, resolution: u16) -> Self {
        self.sink_mut().resolution = resolution.clamp(1, 0x7FFF);
        self
    }

    /// Sets the delta ticks before the next message
    pub fn set_delta(&mut self, delta_ticks: u32) {
        self.sink_mut().delta = delta_ticks;
    }

    /// Closes the current track and resets note tracking.
    ///
    /// Fails with [`Error::TooManyTracks`] once all declared tracks are closed.
    pub fn end_of_track(&mut self) -> Result<()> {
        self.write(&Message::Meta(MetaMessage::EndOfTrack))
    }

    fn meta(&mut self, meta: MetaMessage) -> Result<()> {
        self.write(&Message::Meta(meta))
    }

    pub fn tempo(&mut self, bpm: u32) -> Result<()> {
        self.meta(MetaMessage::Tempo { bpm })
    }

    /// `denominator` is decimal and must be a power of two
    pub fn time_signature(
        &mut self,
        numerator: u8,
        denominator: u8,
        clocks_per_click: u8,
        demisemiquavers_per_quarter: u8,
    ) -> Result<()> {
        self.meta(MetaMessage::TimeSignature {
            numerator,
            denominator,
            clocks_per_click,
            demisemiquavers_per_quarter,
        })
    }

    /// Time signature with one metronome click per beat
    pub fn meter(&mut self, numerator: u8, denominator: u8) -> Result<()> {
        let clocks_per_click = if denominator == 0 { 0 } else { (96 / denominator as u32) as u8 };
        self.time_signature(numerator, denominator, clocks_per_click, 8)
    }

    pub fn key_signature(
        &mut self,
        key: u8,
        is_major: bool,
        num_accidentals: u8,
        is_flat: bool,
    ) -> Result<()> {
        self.meta(MetaMessage::KeySignature {
            key,
            is_major,
            num_accidentals,
            is_flat,
        })
    }

    pub fn copyright(&mut self, text: &str) -> Result<()> {
        self.meta(MetaMessage::Copyright(text.into()))
    }

    pub fn cuepoint(&mut self, text: &str) -> Result<()> {
        self.meta(MetaMessage::Cuepoint(text.into()))
    }

    pub fn device_port(&mut self, port: &str) -> Result<()> {
        self.meta(MetaMessage::DevicePort(port.into()))
    }

    pub fn instrument(&mut self, name: &str) -> Result<()> {
        self.meta(MetaMessage::Instrument(name.into()))
    }

    pub fn lyric(&mut self, text: &str) -> Result<()> {
        self.meta(MetaMessage::Lyric(text.into()))
    }

    pub fn marker(&mut self, text: &str) -> Result<()> {
        self.meta(MetaMessage::Marker(text.into()))
    }

    pub fn midi_channel(&mut self, channel: u8) -> Result<()> {
        self.meta(MetaMessage::MidiChannel(channel & 0x0F))
    }

    pub fn midi_port(&mut self, port: u8) -> Result<()> {
        self.meta(MetaMessage::MidiPort(port & 0x7F))
    }

    pub fn program_name(&mut self, text: &str) -> Result<()> {
        self.meta(MetaMessage::ProgramName(text.into()))
    }

    /// Name of the whole sequence, written into the first track
    pub fn sequence(&mut self, text: &str) -> Result<()> {
        self.meta(MetaMessage::Sequence(text.into()))
    }

    pub fn sequence_number(&mut self, number: u16) -> Result<()> {
        self.meta(MetaMessage::SequenceNumber(number))
    }

    pub fn sequencer_specific(&mut self, data: &[u8]) -> Result<()> {
        self.meta(MetaMessage::SequencerSpecific(data.to_vec()))
    }

    pub fn smpte_offset(
        &mut self,
        hour: u8,
        minute: u8,
        second: u8,
        frame: u8,
        fractional_frame: u8,
    ) -> Result<()> {
        self.meta(MetaMessage::SmpteOffset {
            hour,
            minute,
            second,
            frame,
            fractional_frame,
        })
    }

    pub fn text(&mut self, text: &str) -> Result<()> {
        self.meta(MetaMessage::Text(text.into()))
    }

    /// Track name
    pub fn track(&mut self, name: &str) -> Result<()> {
        self.meta(MetaMessage::Track(name.into()))
    }

    /// Closes the last track if it is still open and returns the file content
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let sink = self.sink();
        if sink.finished_tracks() < sink.num_tracks() {
            self.end_of_track()?;
        }

        let sink = self.into_sink();
        if sink.finished_tracks() < sink.num_tracks() {
            warn!(
                "Only {} of {} declared tracks were written",
                sink.finished_tracks(),
                sink.num_tracks()
            );
        }
        write_smf(&sink.finished, sink.resolution)
    }

    /// Finishes the file and writes it to `dest`
    pub fn write_to<W: Write>(self, mut dest: W) -> Result<()> {
        let bytes = self.finish()?;
        dest.write_all(&bytes)?;
        Ok(())
    }
}
