//! Standard MIDI File container
//!
//! This module bridges SMF data parsed and written by the `midly` crate to the
//! crate's own [`Message`] values. Reading produces a pull-based
//! [`MessageSource`] that also reports the delta ticks and track index of the
//! last pulled message.

use super::message::{
    bpm_from_micros, key_tonic, micros_from_bpm, ChannelMessage, Message, MetaMessage,
    SysExMessage,
};
use super::MessageSource;
use crate::error::{Error, Result};
use log::debug;
use midly::num::{u14, u15, u24, u28, u4, u7};
use midly::{Format, Fps, Header, PitchBend, Smf, SmpteTime, Timing, TrackEvent, TrackEventKind};

/// Layout of the tracks inside a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmfFormat {
    SingleTrack,
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// Ticks per quarter note
    Metric(u16),
    Smpte { fps: u8, subframes: u8 },
}

/// Data from the SMF header chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmfHeader {
    pub format: SmfFormat,
    pub num_tracks: u16,
    pub time_format: TimeFormat,
}

impl SmfHeader {
    /// Ticks per quarter note, None for SMPTE based files
    pub fn resolution(&self) -> Option<u16> {
        match self.time_format {
            TimeFormat::Metric(ticks) => Some(ticks),
            TimeFormat::Smpte { .. } => None,
        }
    }
}

impl From<Format> for SmfFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::SingleTrack => SmfFormat::SingleTrack,
            Format::Parallel => SmfFormat::Parallel,
            Format::Sequential => SmfFormat::Sequential,
        }
    }
}

fn time_format(timing: Timing) -> TimeFormat {
    match timing {
        Timing::Metrical(ticks) => TimeFormat::Metric(ticks.as_int()),
        Timing::Timecode(fps, subframes) => TimeFormat::Smpte {
            fps: match fps {
                Fps::Fps24 => 24,
                Fps::Fps25 => 25,
                Fps::Fps29 => 29,
                Fps::Fps30 => 30,
            },
            subframes,
        },
    }
}

struct SmfEvent {
    track: i16,
    delta: u32,
    message: Message,
}

/// Pull decoder over the content of a Standard MIDI File.
///
/// Tracks are yielded one after the other in file order. Every track ends
/// with an EndOfTrack message, even when the file omits it. A malformed event
/// is reported as a decode error once everything read before it was pulled.
pub struct SmfSource {
    header: SmfHeader,
    events: std::vec::IntoIter<SmfEvent>,
    failure: Option<Error>,
    current: Option<(i16, u32)>,
}

impl SmfSource {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (smf_header, tracks) = midly::parse(data)?;
        let header = SmfHeader {
            format: smf_header.format.into(),
            num_tracks: tracks.size_hint().0.min(u16::MAX as usize) as u16,
            time_format: time_format(smf_header.timing),
        };

        debug!(
            "Parsed SMF: format {:?}, {} tracks, time format {:?}",
            header.format, header.num_tracks, header.time_format
        );

        let mut events = Vec::new();
        let failure = read_tracks(tracks, &header, &mut events).err();
        if let Some(err) = &failure {
            debug!("SMF decoding stopped after {} events: {}", events.len(), err);
        }

        Ok(Self {
            header,
            events: events.into_iter(),
            failure,
            current: None,
        })
    }

    pub fn header(&self) -> &SmfHeader {
        &self.header
    }
}

fn read_tracks(
    tracks: midly::TrackIter,
    header: &SmfHeader,
    events: &mut Vec<SmfEvent>,
) -> Result<()> {
    for (index, track) in tracks.enumerate() {
        let track_no = i16::try_from(index)
            .map_err(|_| Error::Decode(format!("track index {} out of range", index)))?;
        let mut sysex_pending = false;
        let mut ended = false;
        for event in track? {
            let event = event?;
            let message = convert_event(&event.kind, header, track_no, &mut sysex_pending);
            ended = matches!(message, Message::Meta(MetaMessage::EndOfTrack));
            events.push(SmfEvent {
                track: track_no,
                delta: event.delta.as_int(),
                message,
            });
            if ended {
                break;
            }
        }
        if !ended {
            events.push(SmfEvent {
                track: track_no,
                delta: 0,
                message: Message::Meta(MetaMessage::EndOfTrack),
            });
        }
    }
    Ok(())
}

impl MessageSource for SmfSource {
    fn next_message(&mut self) -> Result<Message> {
        let Some(event) = self.events.next() else {
            return Err(self.failure.take().unwrap_or(Error::EndOfStream));
        };
        self.current = Some((event.track, event.delta));
        Ok(event.message)
    }

    fn container_position(&self) -> Option<(i16, u32)> {
        self.current
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn convert_event(
    kind: &TrackEventKind,
    header: &SmfHeader,
    track: i16,
    sysex_pending: &mut bool,
) -> Message {
    match *kind {
        TrackEventKind::Midi { channel, message } => {
            Message::Channel(convert_channel(channel.as_int(), message))
        }
        TrackEventKind::SysEx(data) => match data.split_last() {
            Some((&0xF7, payload)) => {
                *sysex_pending = false;
                Message::SysEx(SysExMessage::Complete(payload.to_vec()))
            }
            _ => {
                *sysex_pending = true;
                Message::SysEx(SysExMessage::Start(data.to_vec()))
            }
        },
        TrackEventKind::Escape(data) => {
            if !*sysex_pending {
                return Message::SysEx(SysExMessage::Escape(data.to_vec()));
            }
            match data.split_last() {
                Some((&0xF7, payload)) => {
                    *sysex_pending = false;
                    Message::SysEx(SysExMessage::End(payload.to_vec()))
                }
                _ => Message::SysEx(SysExMessage::Continue(data.to_vec())),
            }
        }
        TrackEventKind::Meta(meta) => convert_meta(meta, header, track),
    }
}

pub(super) fn convert_channel(channel: u8, message: midly::MidiMessage) -> ChannelMessage {
    match message {
        midly::MidiMessage::NoteOff { key, vel } => ChannelMessage::NoteOff {
            channel,
            key: key.as_int(),
            velocity: vel.as_int(),
        },
        midly::MidiMessage::NoteOn { key, vel } => ChannelMessage::NoteOn {
            channel,
            key: key.as_int(),
            velocity: vel.as_int(),
        },
        midly::MidiMessage::Aftertouch { key, vel } => ChannelMessage::PolyAftertouch {
            channel,
            key: key.as_int(),
            pressure: vel.as_int(),
        },
        midly::MidiMessage::Controller { controller, value } => ChannelMessage::ControlChange {
            channel,
            controller: controller.as_int(),
            value: value.as_int(),
        },
        midly::MidiMessage::ProgramChange { program } => ChannelMessage::ProgramChange {
            channel,
            program: program.as_int(),
        },
        midly::MidiMessage::ChannelAftertouch { vel } => ChannelMessage::Aftertouch {
            channel,
            pressure: vel.as_int(),
        },
        midly::MidiMessage::PitchBend { bend } => ChannelMessage::PitchBend {
            channel,
            value: bend.0.as_int() as i16 - 8192,
        },
    }
}

fn convert_meta(meta: midly::MetaMessage, header: &SmfHeader, track: i16) -> Message {
    let meta = match meta {
        midly::MetaMessage::TrackNumber(number) => {
            MetaMessage::SequenceNumber(number.unwrap_or(track as u16))
        }
        midly::MetaMessage::Text(t) => MetaMessage::Text(text(t)),
        midly::MetaMessage::Copyright(t) => MetaMessage::Copyright(text(t)),
        // in a multi track file, the name in the first track names the whole sequence
        midly::MetaMessage::TrackName(t)
            if track == 0 && header.format == SmfFormat::Parallel =>
        {
            MetaMessage::Sequence(text(t))
        }
        midly::MetaMessage::TrackName(t) => MetaMessage::Track(text(t)),
        midly::MetaMessage::InstrumentName(t) => MetaMessage::Instrument(text(t)),
        midly::MetaMessage::Lyric(t) => MetaMessage::Lyric(text(t)),
        midly::MetaMessage::Marker(t) => MetaMessage::Marker(text(t)),
        midly::MetaMessage::CuePoint(t) => MetaMessage::Cuepoint(text(t)),
        midly::MetaMessage::ProgramName(t) => MetaMessage::ProgramName(text(t)),
        midly::MetaMessage::DeviceName(t) => MetaMessage::DevicePort(text(t)),
        midly::MetaMessage::MidiChannel(channel) => MetaMessage::MidiChannel(channel.as_int()),
        midly::MetaMessage::MidiPort(port) => MetaMessage::MidiPort(port.as_int()),
        midly::MetaMessage::EndOfTrack => MetaMessage::EndOfTrack,
        midly::MetaMessage::Tempo(micros) => MetaMessage::Tempo {
            bpm: bpm_from_micros(micros.as_int()),
        },
        midly::MetaMessage::SmpteOffset(time) => MetaMessage::SmpteOffset {
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
            frame: time.frame(),
            fractional_frame: time.subframe(),
        },
        midly::MetaMessage::TimeSignature(numerator, denominator_pow, clocks, demisemiquavers) => {
            MetaMessage::TimeSignature {
                numerator,
                denominator: 1u8.checked_shl(denominator_pow as u32).unwrap_or(0),
                clocks_per_click: clocks,
                demisemiquavers_per_quarter: demisemiquavers,
            }
        }
        midly::MetaMessage::KeySignature(accidentals, minor) => MetaMessage::KeySignature {
            key: key_tonic(accidentals, minor),
            is_major: !minor,
            num_accidentals: accidentals.unsigned_abs(),
            is_flat: accidentals < 0,
        },
        midly::MetaMessage::SequencerSpecific(data) => MetaMessage::SequencerSpecific(data.to_vec()),
        midly::MetaMessage::Unknown(kind, data) => {
            let mut raw = vec![0xFF, kind];
            raw.extend_from_slice(data);
            return Message::Unknown(raw);
        }
    };
    Message::Meta(meta)
}

/// An owned event waiting to be serialized into a track.
///
/// System exclusive payloads are stored framed the way the file expects them,
/// since `midly` borrows its event data.
#[derive(Debug, Clone)]
pub(crate) struct TrackEntry {
    pub delta: u32,
    pub message: Message,
    framed: Vec<u8>,
}

impl TrackEntry {
    pub fn new(delta: u32, message: Message) -> Result<Self> {
        let framed = match &message {
            Message::SysEx(SysExMessage::Complete(data)) | Message::SysEx(SysExMessage::End(data)) => {
                let mut bytes = data.clone();
                bytes.push(0xF7);
                bytes
            }
            Message::SysEx(
                SysExMessage::Start(data) | SysExMessage::Continue(data) | SysExMessage::Escape(data),
            ) => data.clone(),
            Message::Realtime(_) => {
                return Err(Error::NotAllowed {
                    kind: "realtime",
                    target: "a MIDI file",
                })
            }
            Message::SystemCommon(_) => {
                return Err(Error::NotAllowed {
                    kind: "system common",
                    target: "a MIDI file",
                })
            }
            Message::Unknown(raw) if raw.len() < 2 || raw[0] != 0xFF => {
                return Err(Error::NotAllowed {
                    kind: "unknown non-meta",
                    target: "a MIDI file",
                })
            }
            Message::Meta(meta) => {
                // fail early instead of when the file is serialized
                meta_to_midly(meta)?;
                Vec::new()
            }
            _ => Vec::new(),
        };
        Ok(Self {
            delta,
            message,
            framed,
        })
    }

    fn to_event(&self) -> Result<TrackEvent<'_>> {
        let kind = match &self.message {
            Message::Channel(msg) => TrackEventKind::Midi {
                channel: u4::from_int_lossy(msg.channel()),
                message: channel_to_midly(msg),
            },
            Message::SysEx(SysExMessage::Complete(_) | SysExMessage::Start(_)) => {
                TrackEventKind::SysEx(&self.framed)
            }
            Message::SysEx(_) => TrackEventKind::Escape(&self.framed),
            Message::Meta(meta) => TrackEventKind::Meta(meta_to_midly(meta)?),
            Message::Unknown(raw) => TrackEventKind::Meta(midly::MetaMessage::Unknown(raw[1], &raw[2..])),
            // rejected when the entry was created
            Message::Realtime(_) | Message::SystemCommon(_) => {
                return Err(Error::NotAllowed {
                    kind: self.message.category(),
                    target: "a MIDI file",
                })
            }
        };
        Ok(TrackEvent {
            delta: u28::from_int_lossy(self.delta),
            kind,
        })
    }
}

pub(super) fn channel_to_midly(msg: &ChannelMessage) -> midly::MidiMessage {
    let u7 = u7::from_int_lossy;
    match *msg {
        ChannelMessage::NoteOn { key, velocity, .. } => midly::MidiMessage::NoteOn {
            key: u7(key),
            vel: u7(velocity),
        },
        ChannelMessage::NoteOff { key, velocity, .. } => midly::MidiMessage::NoteOff {
            key: u7(key),
            vel: u7(velocity),
        },
        ChannelMessage::PolyAftertouch { key, pressure, .. } => midly::MidiMessage::Aftertouch {
            key: u7(key),
            vel: u7(pressure),
        },
        ChannelMessage::ControlChange {
            controller, value, ..
        } => midly::MidiMessage::Controller {
            controller: u7(controller),
            value: u7(value),
        },
        ChannelMessage::ProgramChange { program, .. } => midly::MidiMessage::ProgramChange {
            program: u7(program),
        },
        ChannelMessage::Aftertouch { pressure, .. } => midly::MidiMessage::ChannelAftertouch {
            vel: u7(pressure),
        },
        ChannelMessage::PitchBend { value, .. } => midly::MidiMessage::PitchBend {
            bend: PitchBend(u14::from_int_lossy(
                (value.clamp(-8192, 8191) + 8192) as u16,
            )),
        },
    }
}

fn meta_to_midly(meta: &MetaMessage) -> Result<midly::MetaMessage<'_>> {
    let converted = match meta {
        MetaMessage::SequenceNumber(number) => midly::MetaMessage::TrackNumber(Some(*number)),
        MetaMessage::Text(t) => midly::MetaMessage::Text(t.as_bytes()),
        MetaMessage::Copyright(t) => midly::MetaMessage::Copyright(t.as_bytes()),
        MetaMessage::Sequence(t) | MetaMessage::Track(t) => {
            midly::MetaMessage::TrackName(t.as_bytes())
        }
        MetaMessage::Instrument(t) => midly::MetaMessage::InstrumentName(t.as_bytes()),
        MetaMessage::Lyric(t) => midly::MetaMessage::Lyric(t.as_bytes()),
        MetaMessage::Marker(t) => midly::MetaMessage::Marker(t.as_bytes()),
        MetaMessage::Cuepoint(t) => midly::MetaMessage::CuePoint(t.as_bytes()),
        MetaMessage::ProgramName(t) => midly::MetaMessage::ProgramName(t.as_bytes()),
        MetaMessage::DevicePort(t) => midly::MetaMessage::DeviceName(t.as_bytes()),
        MetaMessage::MidiChannel(channel) => {
            midly::MetaMessage::MidiChannel(u4::from_int_lossy(*channel))
        }
        MetaMessage::MidiPort(port) => midly::MetaMessage::MidiPort(u7::from_int_lossy(*port)),
        MetaMessage::EndOfTrack => midly::MetaMessage::EndOfTrack,
        MetaMessage::Tempo { bpm } => {
            let micros = micros_from_bpm(*bpm);
            if *bpm == 0 || micros > 0xFF_FFFF {
                return Err(Error::InvalidArgument(format!("tempo of {} BPM is too slow", bpm)));
            }
            midly::MetaMessage::Tempo(u24::from_int_lossy(micros))
        }
        MetaMessage::SmpteOffset {
            hour,
            minute,
            second,
            frame,
            fractional_frame,
        } => {
            let time = SmpteTime::new(*hour, *minute, *second, *frame, *fractional_frame, Fps::Fps30)
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "SMPTE offset {}:{}:{}:{}.{} out of range",
                        hour, minute, second, frame, fractional_frame
                    ))
                })?;
            midly::MetaMessage::SmpteOffset(time)
        }
        MetaMessage::TimeSignature {
            numerator,
            denominator,
            clocks_per_click,
            demisemiquavers_per_quarter,
        } => {
            if !denominator.is_power_of_two() {
                return Err(Error::InvalidArgument(format!(
                    "time signature denominator {} is not a power of two",
                    denominator
                )));
            }
            midly::MetaMessage::TimeSignature(
                *numerator,
                denominator.trailing_zeros() as u8,
                *clocks_per_click,
                *demisemiquavers_per_quarter,
            )
        }
        MetaMessage::KeySignature {
            is_major,
            num_accidentals,
            is_flat,
            ..
        } => {
            let accidentals = (*num_accidentals).min(7) as i8;
            midly::MetaMessage::KeySignature(
                if *is_flat { -accidentals } else { accidentals },
                !is_major,
            )
        }
        MetaMessage::SequencerSpecific(data) => midly::MetaMessage::SequencerSpecific(data),
    };
    Ok(converted)
}

/// Serializes finished tracks into the bytes of a Standard MIDI File.
pub(crate) fn write_smf(tracks: &[Vec<TrackEntry>], resolution: u16) -> Result<Vec<u8>> {
    let format = if tracks.len() == 1 {
        Format::SingleTrack
    } else {
        Format::Parallel
    };
    let mut smf = Smf::new(Header::new(
        format,
        Timing::Metrical(u15::from_int_lossy(resolution)),
    ));
    for track in tracks {
        let events = track
            .iter()
            .map(TrackEntry::to_event)
            .collect::<Result<Vec<_>>>()?;
        smf.tracks.push(events);
    }

    let mut out = Vec::new();
    smf.write_std(&mut out)?;
    debug!("Serialized SMF: {} tracks, {} bytes", tracks.len(), out.len());
    Ok(out)
}
