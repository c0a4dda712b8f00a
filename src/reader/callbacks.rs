//! Typed callback slots, grouped by message category.
//!
//! Every slot is optional; messages whose slot is empty are skipped after the
//! `each` catch-all has seen them. Channel and system exclusive callbacks get
//! `None` as position for live streams read without a listening session.

use super::Position;
use crate::midi::{Message, SmfHeader};

/// `(position, channel, key or controller, value)`
pub type KeyHandler = Box<dyn FnMut(Option<Position>, u8, u8, u8) + Send>;
/// `(position, channel, value)`
pub type ValueHandler = Box<dyn FnMut(Option<Position>, u8, u8) + Send>;
/// `(position, channel, value)` with the value centered at 0
pub type PitchBendHandler = Box<dyn FnMut(Option<Position>, u8, i16) + Send>;

pub type TextHandler = Box<dyn FnMut(Position, &str) + Send>;
pub type MetaHandler<T> = Box<dyn FnMut(Position, T) + Send>;
/// `(position, numerator, denominator, clocks per click, demisemiquavers per quarter)`
pub type TimeSignatureHandler = Box<dyn FnMut(Position, u8, u8, u8, u8) + Send>;
/// `(position, key, is major, number of accidentals, is flat)`
pub type KeySignatureHandler = Box<dyn FnMut(Position, u8, bool, u8, bool) + Send>;
/// `(position, hour, minute, second, frame, fractional frame)`
pub type SmpteOffsetHandler = Box<dyn FnMut(Position, u8, u8, u8, u8, u8) + Send>;

pub type Signal = Box<dyn FnMut() + Send>;
pub type SystemCommonHandler<T> = Box<dyn FnMut(T) + Send>;

pub type DataHandler = Box<dyn FnMut(Option<Position>, &[u8]) + Send>;

/// All callback slots of a [`Reader`](super::Reader)
#[derive(Default)]
pub struct Callbacks {
    /// Called for every message before its typed callback
    pub each: Option<Box<dyn FnMut(Option<Position>, &Message) + Send>>,
    /// Undefined status bytes and unknown meta messages, as raw bytes
    pub unknown: Option<DataHandler>,
    /// Called once per file, before any track message
    pub smf_header: Option<Box<dyn FnMut(&SmfHeader) + Send>>,
    pub channel: ChannelCallbacks,
    /// Only found in files, so the position is always known
    pub meta: MetaCallbacks,
    /// Only found live
    pub realtime: RealtimeCallbacks,
    /// Only found live
    pub system_common: SystemCommonCallbacks,
    pub sysex: SysExCallbacks,
}

#[derive(Default)]
pub struct ChannelCallbacks {
    /// Also receives note on messages with velocity 0
    pub note_on: Option<KeyHandler>,
    /// Velocity is 0 unless the message carried a release velocity
    pub note_off: Option<KeyHandler>,
    pub poly_aftertouch: Option<KeyHandler>,
    pub control_change: Option<KeyHandler>,
    pub program_change: Option<ValueHandler>,
    pub aftertouch: Option<ValueHandler>,
    pub pitch_bend: Option<PitchBendHandler>,
}

#[derive(Default)]
pub struct MetaCallbacks {
    pub copyright: Option<TextHandler>,
    /// Called after the tempo change has been registered
    pub tempo: Option<MetaHandler<u32>>,
    pub time_signature: Option<TimeSignatureHandler>,
    pub key_signature: Option<KeySignatureHandler>,
    pub track: Option<TextHandler>,
    pub instrument: Option<TextHandler>,
    pub sequence: Option<TextHandler>,
    pub sequence_number: Option<MetaHandler<u16>>,
    pub marker: Option<TextHandler>,
    pub cuepoint: Option<TextHandler>,
    pub text: Option<TextHandler>,
    pub lyric: Option<TextHandler>,
    /// Receives the position with delta and absolute ticks already reset
    pub end_of_track: Option<Box<dyn FnMut(Position) + Send>>,
    pub device_port: Option<TextHandler>,
    pub program_name: Option<TextHandler>,
    pub smpte_offset: Option<SmpteOffsetHandler>,
    pub sequencer_specific: Option<Box<dyn FnMut(Position, &[u8]) + Send>>,
    pub midi_channel: Option<MetaHandler<u8>>,
    pub midi_port: Option<MetaHandler<u8>>,
}

#[derive(Default)]
pub struct RealtimeCallbacks {
    pub clock: Option<Signal>,
    pub tick: Option<Signal>,
    pub active_sense: Option<Signal>,
    pub start: Option<Signal>,
    pub stop: Option<Signal>,
    pub continue_playback: Option<Signal>,
    pub reset: Option<Signal>,
}

#[derive(Default)]
pub struct SystemCommonCallbacks {
    pub tune_request: Option<Signal>,
    pub song_select: Option<SystemCommonHandler<u8>>,
    pub song_position_pointer: Option<SystemCommonHandler<u16>>,
    pub midi_timing_code: Option<SystemCommonHandler<u8>>,
}

/// Payloads are passed without the framing 0xF0 / 0xF7 bytes
#[derive(Default)]
pub struct SysExCallbacks {
    pub complete: Option<DataHandler>,
    pub start: Option<DataHandler>,
    pub continue_data: Option<DataHandler>,
    pub end: Option<DataHandler>,
    pub escape: Option<DataHandler>,
}
