//! Writer emitting MIDI messages with note consolidation
//!
//! The same [`Writer`] drives live outputs ([`live`]) and Standard MIDI Files
//! ([`smf`]). While consolidation is enabled (the default), the writer tracks
//! which notes are sounding and refuses to start a note twice or end a note
//! that is not running, so no notes hang.

pub mod live;
mod parameter;
pub mod smf;

pub use live::{LiveSink, StreamOut};
pub use smf::{SmfSink, SmfWriter};

use crate::error::{Error, Result};
use crate::midi::{ChannelMessage, Message, MessageSink, MetaMessage, SysExMessage};
use log::{debug, warn};

/// Control change numbers used by the writer
pub mod cc {
    pub const DATA_ENTRY_MSB: u8 = 6;
    pub const DATA_ENTRY_LSB: u8 = 38;
    pub const DATA_INCREMENT: u8 = 96;
    pub const DATA_DECREMENT: u8 = 97;
    pub const NRPN_LSB: u8 = 98;
    pub const NRPN_MSB: u8 = 99;
    pub const RPN_LSB: u8 = 100;
    pub const RPN_MSB: u8 = 101;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const ALL_NOTES_OFF: u8 = 123;
}

fn check_channel(channel: u8) -> Result<()> {
    if channel > 15 {
        return Err(Error::InvalidChannel(channel));
    }
    Ok(())
}

/// On/off state of every key on every channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteLedger {
    notes: [[bool; 128]; 16],
}

impl Default for NoteLedger {
    fn default() -> Self {
        Self {
            notes: [[false; 128]; 16],
        }
    }
}

impl NoteLedger {
    pub fn is_sounding(&self, channel: u8, key: u8) -> bool {
        self.notes[(channel & 0x0F) as usize][(key & 0x7F) as usize]
    }

    fn set(&mut self, channel: u8, key: u8, sounding: bool) {
        self.notes[(channel & 0x0F) as usize][(key & 0x7F) as usize] = sounding;
    }

    /// Keys sounding on `channel`
    pub fn sounding(&self, channel: u8) -> impl Iterator<Item = u8> + '_ {
        self.notes[(channel & 0x0F) as usize]
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(|(key, _)| key as u8)
    }

    pub fn is_silent(&self) -> bool {
        self.notes.iter().flatten().all(|on| !on)
    }

    fn clear_channel(&mut self, channel: u8) {
        self.notes[(channel & 0x0F) as usize] = [false; 128];
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Ledger update applied once the sink accepted a message
enum LedgerChange {
    Set((u8, u8, bool)),
    Clear,
}

pub struct Writer<S: MessageSink> {
    sink: S,
    ledger: NoteLedger,
    consolidate: bool,
}

impl<S: MessageSink> Writer<S> {
    pub fn with_sink(sink: S) -> Self {
        Self {
            sink,
            ledger: NoteLedger::default(),
            consolidate: true,
        }
    }

    /// Enables or disables note consolidation.
    ///
    /// Enabling it starts from a fresh ledger, assuming no note is sounding.
    pub fn consolidate_notes(&mut self, on: bool) {
        if on {
            self.ledger.clear();
        }
        self.consolidate = on;
        debug!("Note consolidation {}", if on { "enabled" } else { "disabled" });
    }

    pub fn is_consolidating(&self) -> bool {
        self.consolidate
    }

    pub fn ledger(&self) -> &NoteLedger {
        &self.ledger
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Writes any message. Note messages go through consolidation.
    pub fn write(&mut self, msg: &Message) -> Result<()> {
        let change = match msg {
            Message::Channel(channel_msg) => {
                check_channel(channel_msg.channel())?;
                self.note_change(channel_msg)?.map(LedgerChange::Set)
            }
            // notes are tracked per track
            Message::Meta(MetaMessage::EndOfTrack) => Some(LedgerChange::Clear),
            _ => None,
        };

        self.sink.write_message(msg)?;

        match change {
            Some(LedgerChange::Set((channel, key, sounding))) => {
                self.ledger.set(channel, key, sounding)
            }
            Some(LedgerChange::Clear) => self.ledger.clear(),
            None => {}
        }
        Ok(())
    }

    /// Checks a note message against the ledger and returns the state to record
    /// once it has been written
    fn note_change(&self, msg: &ChannelMessage) -> Result<Option<(u8, u8, bool)>> {
        if !self.consolidate {
            return Ok(None);
        }
        match *msg {
            ChannelMessage::NoteOn {
                channel,
                key,
                velocity,
            } => {
                let sounding = self.ledger.is_sounding(channel, key);
                if velocity > 0 && sounding {
                    return Err(Error::NoteAlreadyRunning { channel, key });
                }
                if velocity == 0 && !sounding {
                    return Err(Error::NoteNotRunning { channel, key });
                }
                Ok(Some((channel, key, velocity > 0)))
            }
            ChannelMessage::NoteOff { channel, key, .. } => {
                if !self.ledger.is_sounding(channel, key) {
                    return Err(Error::NoteNotRunning { channel, key });
                }
                Ok(Some((channel, key, false)))
            }
            _ => Ok(None),
        }
    }

    pub fn note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<()> {
        self.write(&Message::note_on(channel, key & 0x7F, velocity & 0x7F))
    }

    /// Writes a note off without release velocity
    pub fn note_off(&mut self, channel: u8, key: u8) -> Result<()> {
        self.write(&Message::note_off(channel, key & 0x7F, 0))
    }

    pub fn note_off_velocity(&mut self, channel: u8, key: u8, velocity: u8) -> Result<()> {
        self.write(&Message::note_off(channel, key & 0x7F, velocity & 0x7F))
    }

    pub fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> Result<()> {
        self.write(&Message::control_change(
            channel,
            controller & 0x7F,
            value & 0x7F,
        ))
    }

    /// Control change with value 127
    pub fn control_change_on(&mut self, channel: u8, controller: u8) -> Result<()> {
        self.control_change(channel, controller, 127)
    }

    /// Control change with value 0
    pub fn control_change_off(&mut self, channel: u8, controller: u8) -> Result<()> {
        self.control_change(channel, controller, 0)
    }

    /// Writes a 14 bit value as two control changes, MSB first
    pub fn msb_lsb(&mut self, channel: u8, msb: u8, lsb: u8, value: u16) -> Result<()> {
        self.control_change(channel, msb, ((value >> 7) & 0x7F) as u8)?;
        self.control_change(channel, lsb, (value & 0x7F) as u8)
    }

    pub fn program_change(&mut self, channel: u8, program: u8) -> Result<()> {
        self.write(&Message::Channel(ChannelMessage::ProgramChange {
            channel,
            program: program & 0x7F,
        }))
    }

    /// `value` is centered at 0, from -8192 to 8191
    pub fn pitch_bend(&mut self, channel: u8, value: i16) -> Result<()> {
        self.write(&Message::Channel(ChannelMessage::PitchBend {
            channel,
            value: value.clamp(-8192, 8191),
        }))
    }

    /// Channel pressure
    pub fn aftertouch(&mut self, channel: u8, pressure: u8) -> Result<()> {
        self.write(&Message::Channel(ChannelMessage::Aftertouch {
            channel,
            pressure: pressure & 0x7F,
        }))
    }

    /// Key pressure
    pub fn poly_aftertouch(&mut self, channel: u8, key: u8, pressure: u8) -> Result<()> {
        self.write(&Message::Channel(ChannelMessage::PolyAftertouch {
            channel,
            key: key & 0x7F,
            pressure: pressure & 0x7F,
        }))
    }

    /// Writes a complete system exclusive message; `data` excludes the framing bytes
    pub fn system_exclusive(&mut self, data: &[u8]) -> Result<()> {
        self.write(&Message::SysEx(SysExMessage::Complete(data.to_vec())))
    }

    /// Ends the sounding notes on one channel, or all channels for `None`.
    ///
    /// With `force`, or when consolidation is off, every key gets a note off,
    /// followed by All Notes Off and All Sound Off. Keeps going past write
    /// errors and returns the last one. The ledger is cleared either way.
    pub fn silence(&mut self, channel: Option<u8>, force: bool) -> Result<()> {
        if let Some(channel) = channel {
            check_channel(channel)?;
        }
        let force = force || !self.consolidate;
        let channels = match channel {
            Some(channel) => channel..=channel,
            None => 0..=15,
        };

        let mut result = Ok(());
        for channel in channels {
            let keys: Vec<u8> = if force {
                (0..128).collect()
            } else {
                self.ledger.sounding(channel).collect()
            };

            let mut messages: Vec<Message> = keys
                .into_iter()
                .map(|key| Message::note_off(channel, key, 0))
                .collect();
            if force {
                messages.push(Message::control_change(channel, cc::ALL_NOTES_OFF, 0));
                messages.push(Message::control_change(channel, cc::ALL_SOUND_OFF, 0));
            }

            for msg in &messages {
                if let Err(e) = self.sink.write_message(msg) {
                    warn!("Failed to silence channel {}: {}", channel, e);
                    result = Err(e);
                }
            }
            self.ledger.clear_channel(channel);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        messages: Vec<Message>,
    }

    impl MessageSink for Recorder {
        fn write_message(&mut self, msg: &Message) -> Result<()> {
            self.messages.push(msg.clone());
            Ok(())
        }
    }

    #[test]
    fn test_note_off_requires_running_note() {
        let mut writer = Writer::with_sink(Recorder::default());
        assert!(matches!(
            writer.note_off(1, 60),
            Err(Error::NoteNotRunning { channel: 1, key: 60 })
        ));
        assert!(writer.sink().messages.is_empty());
    }

    #[test]
    fn test_velocity_zero_counts_as_off() {
        let mut writer = Writer::with_sink(Recorder::default());
        writer.note_on(0, 60, 100).unwrap();
        writer.note_on(0, 60, 0).unwrap();
        assert!(writer.ledger().is_silent());
        assert!(writer.note_on(0, 60, 0).is_err());
    }

    #[test]
    fn test_invalid_channel() {
        let mut writer = Writer::with_sink(Recorder::default());
        assert!(matches!(
            writer.note_on(16, 60, 100),
            Err(Error::InvalidChannel(16))
        ));
        assert!(matches!(
            writer.silence(Some(20), false),
            Err(Error::InvalidChannel(20))
        ));
    }

    #[test]
    fn test_silence_only_sounding_notes() {
        let mut writer = Writer::with_sink(Recorder::default());
        writer.note_on(3, 40, 90).unwrap();
        writer.note_on(3, 44, 90).unwrap();
        writer.note_on(5, 40, 90).unwrap();
        writer.silence(Some(3), false).unwrap();

        let messages = &writer.sink().messages[3..];
        assert_eq!(
            messages,
            &[Message::note_off(3, 40, 0), Message::note_off(3, 44, 0)]
        );
        assert!(writer.ledger().is_sounding(5, 40));
        assert!(!writer.ledger().is_sounding(3, 40));
    }

    #[test]
    fn test_msb_lsb_split() {
        let mut writer = Writer::with_sink(Recorder::default());
        writer.msb_lsb(0, 7, 39, 0x3FFF).unwrap();
        writer.msb_lsb(0, 7, 39, 200).unwrap();
        assert_eq!(
            writer.sink().messages,
            vec![
                Message::control_change(0, 7, 127),
                Message::control_change(0, 39, 127),
                Message::control_change(0, 7, 1),
                Message::control_change(0, 39, 72),
            ]
        );
    }

    #[test]
    fn test_no_consolidation_passes_through() {
        let mut writer = Writer::with_sink(Recorder::default());
        writer.consolidate_notes(false);
        writer.note_off(0, 10).unwrap();
        writer.note_on(0, 10, 1).unwrap();
        writer.note_on(0, 10, 1).unwrap();
        assert_eq!(writer.sink().messages.len(), 3);
        assert!(writer.ledger().is_silent());
    }
}
