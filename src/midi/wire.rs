//! Wire format: raw "over the wire" MIDI bytes to and from [`Message`] values.
//!
//! Complete packets go through `midly::live::LiveEvent`, byte streams through
//! `midly::stream::MidiStream`. Only system exclusive messages split over
//! several packets are framed here, since `midly` has no event for them.

use super::message::{Message, RealtimeMessage, SysExMessage, SystemCommonMessage};
use super::smf::{channel_to_midly, convert_channel};
use super::MessageSource;
use crate::error::{Error, Result};
use log::{debug, trace};
use midly::live::{LiveEvent, MtcQuarterFrameMessage, SystemCommon, SystemRealtime};
use midly::num::{u14, u4, u7};
use midly::stream::MidiStream;
use std::collections::VecDeque;
use std::io::{BufReader, ErrorKind, Read};

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;
const TICK: u8 = 0xF9;

/// Indexed by the message type nibble of a quarter frame byte
const QUARTER_FRAMES: [MtcQuarterFrameMessage; 8] = [
    MtcQuarterFrameMessage::FramesLow,
    MtcQuarterFrameMessage::FramesHigh,
    MtcQuarterFrameMessage::SecondsLow,
    MtcQuarterFrameMessage::SecondsHigh,
    MtcQuarterFrameMessage::MinutesLow,
    MtcQuarterFrameMessage::MinutesHigh,
    MtcQuarterFrameMessage::HoursLow,
    MtcQuarterFrameMessage::HoursHigh,
];

/// Decodes one complete raw MIDI message.
pub fn decode(data: &[u8]) -> Result<Message> {
    match data {
        // continuation and end packets of a split system exclusive message
        [SYSEX_END, body @ ..] if !body.is_empty() => Ok(Message::SysEx(match body.split_last() {
            Some((&SYSEX_END, payload)) => SysExMessage::End(payload.to_vec()),
            _ => SysExMessage::Continue(body.to_vec()),
        })),
        [SYSEX_START, body @ ..] if body.last() != Some(&SYSEX_END) => {
            Ok(Message::SysEx(SysExMessage::Start(body.to_vec())))
        }
        _ => Ok(from_live(LiveEvent::parse(data)?)),
    }
}

fn from_live(event: LiveEvent) -> Message {
    match event {
        LiveEvent::Midi { channel, message } => {
            Message::Channel(convert_channel(channel.as_int(), message))
        }
        LiveEvent::Realtime(realtime) => match realtime {
            SystemRealtime::TimingClock => Message::Realtime(RealtimeMessage::TimingClock),
            SystemRealtime::Start => Message::Realtime(RealtimeMessage::Start),
            SystemRealtime::Continue => Message::Realtime(RealtimeMessage::Continue),
            SystemRealtime::Stop => Message::Realtime(RealtimeMessage::Stop),
            SystemRealtime::ActiveSensing => Message::Realtime(RealtimeMessage::ActiveSensing),
            SystemRealtime::Reset => Message::Realtime(RealtimeMessage::Reset),
            SystemRealtime::Undefined(TICK) => Message::Realtime(RealtimeMessage::Tick),
            SystemRealtime::Undefined(status) => Message::Unknown(vec![status]),
        },
        LiveEvent::Common(common) => match common {
            SystemCommon::SysEx(data) => {
                Message::SysEx(SysExMessage::Complete(u7::slice_as_int(data).to_vec()))
            }
            SystemCommon::MidiTimeCodeQuarterFrame(kind, value) => {
                let kind_code = QUARTER_FRAMES.iter().position(|k| *k == kind).unwrap_or(0) as u8;
                Message::SystemCommon(SystemCommonMessage::MidiTimingCode(
                    kind_code << 4 | value.as_int(),
                ))
            }
            SystemCommon::SongPosition(beats) => {
                Message::SystemCommon(SystemCommonMessage::SongPositionPointer(beats.as_int()))
            }
            SystemCommon::SongSelect(song) => {
                Message::SystemCommon(SystemCommonMessage::SongSelect(song.as_int()))
            }
            SystemCommon::TuneRequest => Message::SystemCommon(SystemCommonMessage::TuneRequest),
            SystemCommon::Undefined(status, data) => {
                let mut raw = vec![status];
                raw.extend_from_slice(u7::slice_as_int(data));
                Message::Unknown(raw)
            }
        },
    }
}

/// Encodes a message into its raw wire bytes. Running status is never used.
pub fn encode(msg: &Message) -> Result<Vec<u8>> {
    let event = match msg {
        Message::Channel(channel_msg) => LiveEvent::Midi {
            channel: u4::from_int_lossy(channel_msg.channel()),
            message: channel_to_midly(channel_msg),
        },
        Message::Realtime(realtime) => LiveEvent::Realtime(match realtime {
            RealtimeMessage::TimingClock => SystemRealtime::TimingClock,
            RealtimeMessage::Tick => SystemRealtime::Undefined(TICK),
            RealtimeMessage::Start => SystemRealtime::Start,
            RealtimeMessage::Continue => SystemRealtime::Continue,
            RealtimeMessage::Stop => SystemRealtime::Stop,
            RealtimeMessage::ActiveSensing => SystemRealtime::ActiveSensing,
            RealtimeMessage::Reset => SystemRealtime::Reset,
        }),
        Message::SystemCommon(common) => LiveEvent::Common(match *common {
            SystemCommonMessage::MidiTimingCode(code) => SystemCommon::MidiTimeCodeQuarterFrame(
                QUARTER_FRAMES[((code >> 4) & 0x07) as usize],
                u4::from_int_lossy(code),
            ),
            SystemCommonMessage::SongPositionPointer(beats) => {
                SystemCommon::SongPosition(u14::from_int_lossy(beats))
            }
            SystemCommonMessage::SongSelect(song) => {
                SystemCommon::SongSelect(u7::from_int_lossy(song))
            }
            SystemCommonMessage::TuneRequest => SystemCommon::TuneRequest,
        }),
        Message::SysEx(SysExMessage::Complete(data)) => {
            let data = u7::slice_try_from_int(data).ok_or_else(|| {
                Error::InvalidArgument("system exclusive data bytes must be below 0x80".into())
            })?;
            LiveEvent::Common(SystemCommon::SysEx(data))
        }
        Message::SysEx(SysExMessage::Start(data)) => {
            return Ok(framed(Some(SYSEX_START), data, None))
        }
        Message::SysEx(SysExMessage::End(data)) => return Ok(framed(None, data, Some(SYSEX_END))),
        Message::SysEx(SysExMessage::Continue(data) | SysExMessage::Escape(data)) => {
            return Ok(data.clone())
        }
        Message::Meta(_) => {
            return Err(Error::NotAllowed {
                kind: "meta",
                target: "the wire",
            })
        }
        Message::Unknown(raw) => return Ok(raw.clone()),
    };

    let mut bytes = Vec::with_capacity(3);
    event.write_std(&mut bytes)?;
    Ok(bytes)
}

fn framed(start: Option<u8>, data: &[u8], end: Option<u8>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() + 2);
    bytes.extend(start);
    bytes.extend_from_slice(data);
    bytes.extend(end);
    bytes
}

/// Pull decoder over a raw MIDI byte stream.
///
/// Handles running status for channel messages and realtime bytes interleaved
/// anywhere in the stream, including in the middle of another message.
/// Messages without a fixed length (system common, system exclusive) are
/// complete once the next status byte or the end of the stream arrives.
pub struct StreamDecoder<R: Read> {
    bytes: std::io::Bytes<BufReader<R>>,
    stream: MidiStream,
    ready: VecDeque<Message>,
    exhausted: bool,
}

impl<R: Read> StreamDecoder<R> {
    pub fn new(src: R) -> Self {
        Self {
            bytes: BufReader::new(src).bytes(),
            stream: MidiStream::new(),
            ready: VecDeque::new(),
            exhausted: false,
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        loop {
            match self.bytes.next() {
                None => return Ok(None),
                Some(Ok(b)) => return Ok(Some(b)),
                Some(Err(e)) if e.kind() == ErrorKind::Interrupted => continue,
                Some(Err(e)) => return Err(Error::Io(e)),
            }
        }
    }
}

/// A system exclusive message only counts as complete when it was closed by 0xF7
fn from_stream(event: LiveEvent, terminated: bool) -> Message {
    match event {
        LiveEvent::Common(SystemCommon::SysEx(data)) if !terminated => {
            debug!("Unterminated system exclusive message ({} bytes)", data.len());
            Message::SysEx(SysExMessage::Start(u7::slice_as_int(data).to_vec()))
        }
        event => from_live(event),
    }
}

impl<R: Read> MessageSource for StreamDecoder<R> {
    fn next_message(&mut self) -> Result<Message> {
        loop {
            if let Some(msg) = self.ready.pop_front() {
                return Ok(msg);
            }
            if self.exhausted {
                return Err(Error::EndOfStream);
            }

            let byte = self.next_byte()?;
            let ready = &mut self.ready;
            match byte {
                Some(b) => {
                    trace!("Stream byte {:#04X}", b);
                    self.stream
                        .feed(&[b], |event| ready.push_back(from_stream(event, b == SYSEX_END)));
                }
                None => {
                    self.exhausted = true;
                    self.stream
                        .flush(|event| ready.push_back(from_stream(event, false)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::message::{ChannelMessage, MetaMessage};
    use std::io::Cursor;

    fn drain(bytes: &[u8]) -> Vec<Message> {
        let mut decoder = StreamDecoder::new(Cursor::new(bytes.to_vec()));
        let mut out = Vec::new();
        loop {
            match decoder.next_message() {
                Ok(msg) => out.push(msg),
                Err(Error::EndOfStream) => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        out
    }

    #[test]
    fn test_channel_message_parsing() {
        assert_eq!(decode(&[0x90, 60, 100]).unwrap(), Message::note_on(0, 60, 100));
        assert_eq!(decode(&[0x8B, 120, 0]).unwrap(), Message::note_off(11, 120, 0));
        assert_eq!(
            decode(&[0xE2, 0x00, 0x40]).unwrap(),
            Message::Channel(ChannelMessage::PitchBend {
                channel: 2,
                value: 0
            })
        );
        assert_eq!(
            decode(&[0xC5, 42]).unwrap(),
            Message::Channel(ChannelMessage::ProgramChange {
                channel: 5,
                program: 42
            })
        );
    }

    #[test]
    fn test_system_message_parsing() {
        assert_eq!(
            decode(&[0xF8]).unwrap(),
            Message::Realtime(RealtimeMessage::TimingClock)
        );
        assert_eq!(
            decode(&[0xF9]).unwrap(),
            Message::Realtime(RealtimeMessage::Tick)
        );
        assert_eq!(
            decode(&[0xF2, 0x10, 0x01]).unwrap(),
            Message::SystemCommon(SystemCommonMessage::SongPositionPointer(0x90))
        );
        assert_eq!(
            decode(&[0xF1, 0x35]).unwrap(),
            Message::SystemCommon(SystemCommonMessage::MidiTimingCode(0x35))
        );
        assert_eq!(decode(&[0xFD]).unwrap(), Message::Unknown(vec![0xFD]));
        assert_eq!(
            decode(&[0xF0, 0x7E, 0x01, 0xF7]).unwrap(),
            Message::SysEx(SysExMessage::Complete(vec![0x7E, 0x01]))
        );
    }

    #[test]
    fn test_split_sysex_packets() {
        assert_eq!(
            decode(&[0xF0, 0x43, 0x12]).unwrap(),
            Message::SysEx(SysExMessage::Start(vec![0x43, 0x12]))
        );
        assert_eq!(
            decode(&[0xF7, 0x01, 0x02]).unwrap(),
            Message::SysEx(SysExMessage::Continue(vec![0x01, 0x02]))
        );
        assert_eq!(
            decode(&[0xF7, 0x03, 0xF7]).unwrap(),
            Message::SysEx(SysExMessage::End(vec![0x03]))
        );
        let start = Message::SysEx(SysExMessage::Start(vec![0x43, 0x12]));
        assert_eq!(encode(&start).unwrap(), vec![0xF0, 0x43, 0x12]);
        let end = Message::SysEx(SysExMessage::End(vec![0x03]));
        assert_eq!(encode(&end).unwrap(), vec![0x03, 0xF7]);
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(decode(&[]), Err(Error::Decode(_))));
        assert!(matches!(decode(&[0x40, 0x10]), Err(Error::Decode(_))));
        assert!(matches!(decode(&[0x90, 60]), Err(Error::Decode(_))));
        assert!(matches!(decode(&[0xF7]), Err(Error::Decode(_))));
    }

    #[test]
    fn test_encode_pitch_bend_extremes() {
        let low = Message::Channel(ChannelMessage::PitchBend {
            channel: 0,
            value: -8192,
        });
        let high = Message::Channel(ChannelMessage::PitchBend {
            channel: 0,
            value: 8191,
        });
        assert_eq!(encode(&low).unwrap(), vec![0xE0, 0x00, 0x00]);
        assert_eq!(encode(&high).unwrap(), vec![0xE0, 0x7F, 0x7F]);
    }

    #[test]
    fn test_encode_system_messages() {
        let tick = Message::Realtime(RealtimeMessage::Tick);
        assert_eq!(encode(&tick).unwrap(), vec![0xF9]);
        let mtc = Message::SystemCommon(SystemCommonMessage::MidiTimingCode(0x7A));
        assert_eq!(encode(&mtc).unwrap(), vec![0xF1, 0x7A]);
        let spp = Message::SystemCommon(SystemCommonMessage::SongPositionPointer(0x90));
        assert_eq!(encode(&spp).unwrap(), vec![0xF2, 0x10, 0x01]);
    }

    #[test]
    fn test_encode_rejects_bad_sysex_data() {
        let sysex = Message::SysEx(SysExMessage::Complete(vec![0x41, 0x90]));
        assert!(matches!(encode(&sysex), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_meta_not_allowed_on_wire() {
        let err = encode(&Message::Meta(MetaMessage::EndOfTrack)).unwrap_err();
        assert!(matches!(err, Error::NotAllowed { kind: "meta", .. }));
    }

    #[test]
    fn test_stream_running_status() {
        // second note on reuses the status byte
        let msgs = drain(&[0x91, 60, 100, 64, 90, 0x81, 60, 0]);
        assert_eq!(
            msgs,
            vec![
                Message::note_on(1, 60, 100),
                Message::note_on(1, 64, 90),
                Message::note_off(1, 60, 0),
            ]
        );
    }

    #[test]
    fn test_stream_interleaved_realtime() {
        let msgs = drain(&[0x90, 60, 0xF8, 100, 0xF0, 0x43, 0xF8, 0x12, 0xF7]);
        assert_eq!(
            msgs,
            vec![
                Message::Realtime(RealtimeMessage::TimingClock),
                Message::note_on(0, 60, 100),
                Message::Realtime(RealtimeMessage::TimingClock),
                Message::SysEx(SysExMessage::Complete(vec![0x43, 0x12])),
            ]
        );
    }

    #[test]
    fn test_stream_unterminated_sysex() {
        let msgs = drain(&[0xF0, 0x43, 0x12, 0x90, 60, 100]);
        assert_eq!(
            msgs,
            vec![
                Message::SysEx(SysExMessage::Start(vec![0x43, 0x12])),
                Message::note_on(0, 60, 100),
            ]
        );
    }

    #[test]
    fn test_stream_system_common_cancels_running_status() {
        let msgs = drain(&[0x90, 60, 100, 0xF6, 62, 100]);
        assert_eq!(
            msgs,
            vec![
                Message::note_on(0, 60, 100),
                Message::SystemCommon(SystemCommonMessage::TuneRequest),
            ]
        );
    }
}
