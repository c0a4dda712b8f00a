/// A decoded MIDI message.
///
/// The set of kinds is closed: every message coming out of the wire codec or
/// the SMF decoder is one of these variants, so dispatch is a plain `match`.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Channel voice messages, valid live and in files
    Channel(ChannelMessage),
    /// Meta messages, only found in files
    Meta(MetaMessage),
    /// Realtime messages, only found live
    Realtime(RealtimeMessage),
    /// System common messages, only found live
    SystemCommon(SystemCommonMessage),
    /// System exclusive messages, valid live and in files
    SysEx(SysExMessage),
    /// Undefined status bytes and unknown meta types, as raw bytes
    Unknown(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    /// Aka key pressure
    PolyAftertouch { channel: u8, key: u8, pressure: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    /// Aka channel pressure
    Aftertouch { channel: u8, pressure: u8 },
    /// Centered at 0, ranging from -8192 to 8191
    PitchBend { channel: u8, value: i16 },
}

impl ChannelMessage {
    pub fn channel(&self) -> u8 {
        match *self {
            ChannelMessage::NoteOn { channel, .. }
            | ChannelMessage::NoteOff { channel, .. }
            | ChannelMessage::PolyAftertouch { channel, .. }
            | ChannelMessage::ControlChange { channel, .. }
            | ChannelMessage::ProgramChange { channel, .. }
            | ChannelMessage::Aftertouch { channel, .. }
            | ChannelMessage::PitchBend { channel, .. } => channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaMessage {
    SequenceNumber(u16),
    Text(String),
    Copyright(String),
    /// Sequence name: the name in the first track of a multi-track file
    Sequence(String),
    /// Track name
    Track(String),
    Instrument(String),
    Lyric(String),
    Marker(String),
    Cuepoint(String),
    ProgramName(String),
    DevicePort(String),
    /// Deprecated
    MidiChannel(u8),
    /// Deprecated
    MidiPort(u8),
    EndOfTrack,
    Tempo {
        bpm: u32,
    },
    SmpteOffset {
        hour: u8,
        minute: u8,
        second: u8,
        frame: u8,
        fractional_frame: u8,
    },
    /// The denominator is decimal (4 for quarter notes), not a power of two exponent
    TimeSignature {
        numerator: u8,
        denominator: u8,
        clocks_per_click: u8,
        demisemiquavers_per_quarter: u8,
    },
    /// `key` is the tonic as a pitch class (0 = C, 9 = A)
    KeySignature {
        key: u8,
        is_major: bool,
        num_accidentals: u8,
        is_flat: bool,
    },
    SequencerSpecific(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeMessage {
    TimingClock,
    Tick,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommonMessage {
    /// Quarter frame byte of the MIDI time code
    MidiTimingCode(u8),
    SongPositionPointer(u16),
    SongSelect(u8),
    TuneRequest,
}

/// System exclusive payloads, without the framing 0xF0/0xF7 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysExMessage {
    /// A message that starts and ends in one packet
    Complete(Vec<u8>),
    /// The first packet of a message split over several events
    Start(Vec<u8>),
    Continue(Vec<u8>),
    End(Vec<u8>),
    /// Arbitrary bytes escaped inside a file (0xF7 event outside a split message)
    Escape(Vec<u8>),
}

impl Message {
    pub fn note_on(channel: u8, key: u8, velocity: u8) -> Self {
        Message::Channel(ChannelMessage::NoteOn {
            channel,
            key,
            velocity,
        })
    }

    pub fn note_off(channel: u8, key: u8, velocity: u8) -> Self {
        Message::Channel(ChannelMessage::NoteOff {
            channel,
            key,
            velocity,
        })
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Message::Channel(ChannelMessage::ControlChange {
            channel,
            controller,
            value,
        })
    }

    /// Short category name, used in log lines and error messages
    pub fn category(&self) -> &'static str {
        match self {
            Message::Channel(_) => "channel",
            Message::Meta(_) => "meta",
            Message::Realtime(_) => "realtime",
            Message::SystemCommon(_) => "system common",
            Message::SysEx(_) => "system exclusive",
            Message::Unknown(_) => "unknown",
        }
    }
}

/// Tonic pitch class for a key signature given as sharps (positive) or flats (negative).
pub fn key_tonic(accidentals: i8, minor: bool) -> u8 {
    let major = (accidentals as i32 * 7).rem_euclid(12);
    if minor {
        ((major + 9) % 12) as u8
    } else {
        major as u8
    }
}

/// Microseconds per quarter note to beats per minute, rounded.
pub fn bpm_from_micros(micros_per_quarter: u32) -> u32 {
    if micros_per_quarter == 0 {
        return 0;
    }
    (60_000_000 + micros_per_quarter / 2) / micros_per_quarter
}

/// Beats per minute to microseconds per quarter note, rounded.
pub fn micros_from_bpm(bpm: u32) -> u32 {
    let bpm = bpm.max(1);
    (60_000_000 + bpm / 2) / bpm
}
