use super::{Position, Reader};
use crate::error::Result;
use crate::midi::{
    ChannelMessage, Message, MessageSource, MetaMessage, RealtimeMessage, SysExMessage,
    SystemCommonMessage,
};

impl Reader {
    /// Pulls one message from `source` and dispatches it.
    ///
    /// Returns [`Error::EndOfStream`](crate::Error::EndOfStream) when the
    /// source is exhausted and decode errors as they come.
    pub fn dispatch_one<S: MessageSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        let msg = source.next_message()?;

        if let Some((track, delta)) = source.container_position() {
            let pos = self.position.get_or_insert_with(Position::default);
            pos.track = track;
            pos.delta_ticks = delta;
            pos.absolute_ticks += delta as u64;
        }

        self.dispatch(&msg);
        Ok(())
    }

    pub(super) fn dispatch(&mut self, msg: &Message) {
        if let Some(logger) = self.logger.as_mut() {
            logger.log_message(self.position.as_ref(), msg);
        }

        let pos = self.position;
        if let Some(each) = self.callbacks.each.as_mut() {
            each(pos, msg);
        }

        match msg {
            Message::Channel(channel) => self.dispatch_channel(pos, *channel),
            Message::Meta(meta) => self.dispatch_meta(meta),
            Message::Realtime(realtime) => self.dispatch_realtime(*realtime),
            Message::SystemCommon(common) => self.dispatch_system_common(*common),
            Message::SysEx(sysex) => {
                let callbacks = &mut self.callbacks.sysex;
                let (callback, data) = match sysex {
                    SysExMessage::Complete(data) => (callbacks.complete.as_mut(), data),
                    SysExMessage::Start(data) => (callbacks.start.as_mut(), data),
                    SysExMessage::Continue(data) => (callbacks.continue_data.as_mut(), data),
                    SysExMessage::End(data) => (callbacks.end.as_mut(), data),
                    SysExMessage::Escape(data) => (callbacks.escape.as_mut(), data),
                };
                if let Some(callback) = callback {
                    callback(pos, data.as_slice());
                }
            }
            Message::Unknown(raw) => {
                if let Some(callback) = self.callbacks.unknown.as_mut() {
                    callback(pos, raw.as_slice());
                }
            }
        }
    }

    fn dispatch_channel(&mut self, pos: Option<Position>, msg: ChannelMessage) {
        let callbacks = &mut self.callbacks.channel;
        match msg {
            // velocity 0 is not turned into a note off
            ChannelMessage::NoteOn {
                channel,
                key,
                velocity,
            } => {
                if let Some(callback) = callbacks.note_on.as_mut() {
                    callback(pos, channel, key, velocity);
                }
            }
            ChannelMessage::NoteOff {
                channel,
                key,
                velocity,
            } => {
                if let Some(callback) = callbacks.note_off.as_mut() {
                    callback(pos, channel, key, velocity);
                }
            }
            ChannelMessage::PolyAftertouch {
                channel,
                key,
                pressure,
            } => {
                if let Some(callback) = callbacks.poly_aftertouch.as_mut() {
                    callback(pos, channel, key, pressure);
                }
            }
            ChannelMessage::ControlChange {
                channel,
                controller,
                value,
            } => {
                if let Some(callback) = callbacks.control_change.as_mut() {
                    callback(pos, channel, controller, value);
                }
            }
            ChannelMessage::ProgramChange { channel, program } => {
                if let Some(callback) = callbacks.program_change.as_mut() {
                    callback(pos, channel, program);
                }
            }
            ChannelMessage::Aftertouch { channel, pressure } => {
                if let Some(callback) = callbacks.aftertouch.as_mut() {
                    callback(pos, channel, pressure);
                }
            }
            ChannelMessage::PitchBend { channel, value } => {
                if let Some(callback) = callbacks.pitch_bend.as_mut() {
                    callback(pos, channel, value);
                }
            }
        }
    }

    fn dispatch_meta(&mut self, msg: &MetaMessage) {
        match msg {
            MetaMessage::Tempo { bpm } => {
                let pos = self.position.unwrap_or_default();
                self.tempo.register_tempo_change(pos.absolute_ticks, *bpm);
                if let Some(callback) = self.callbacks.meta.tempo.as_mut() {
                    callback(pos, *bpm);
                }
                return;
            }
            MetaMessage::EndOfTrack => {
                // positions count from the start of each track
                let pos = self.position.get_or_insert_with(Position::default);
                pos.delta_ticks = 0;
                pos.absolute_ticks = 0;
                let pos = *pos;
                if let Some(callback) = self.callbacks.meta.end_of_track.as_mut() {
                    callback(pos);
                }
                return;
            }
            _ => {}
        }

        let pos = self.position.unwrap_or_default();
        let text = match msg {
            MetaMessage::Text(t)
            | MetaMessage::Copyright(t)
            | MetaMessage::Sequence(t)
            | MetaMessage::Track(t)
            | MetaMessage::Instrument(t)
            | MetaMessage::Lyric(t)
            | MetaMessage::Marker(t)
            | MetaMessage::Cuepoint(t)
            | MetaMessage::ProgramName(t)
            | MetaMessage::DevicePort(t) => t,
            _ => {
                self.dispatch_meta_value(pos, msg);
                return;
            }
        };

        let callbacks = &mut self.callbacks.meta;
        let callback = match msg {
            MetaMessage::Text(_) => callbacks.text.as_mut(),
            MetaMessage::Copyright(_) => callbacks.copyright.as_mut(),
            MetaMessage::Sequence(_) => callbacks.sequence.as_mut(),
            MetaMessage::Track(_) => callbacks.track.as_mut(),
            MetaMessage::Instrument(_) => callbacks.instrument.as_mut(),
            MetaMessage::Lyric(_) => callbacks.lyric.as_mut(),
            MetaMessage::Marker(_) => callbacks.marker.as_mut(),
            MetaMessage::Cuepoint(_) => callbacks.cuepoint.as_mut(),
            MetaMessage::ProgramName(_) => callbacks.program_name.as_mut(),
            MetaMessage::DevicePort(_) => callbacks.device_port.as_mut(),
            _ => None,
        };
        if let Some(callback) = callback {
            callback(pos, text.as_str());
        }
    }

    fn dispatch_meta_value(&mut self, pos: Position, msg: &MetaMessage) {
        let callbacks = &mut self.callbacks.meta;
        match msg {
            MetaMessage::SequenceNumber(number) => {
                if let Some(callback) = callbacks.sequence_number.as_mut() {
                    callback(pos, *number);
                }
            }
            MetaMessage::MidiChannel(channel) => {
                if let Some(callback) = callbacks.midi_channel.as_mut() {
                    callback(pos, *channel);
                }
            }
            MetaMessage::MidiPort(port) => {
                if let Some(callback) = callbacks.midi_port.as_mut() {
                    callback(pos, *port);
                }
            }
            MetaMessage::SmpteOffset {
                hour,
                minute,
                second,
                frame,
                fractional_frame,
            } => {
                if let Some(callback) = callbacks.smpte_offset.as_mut() {
                    callback(pos, *hour, *minute, *second, *frame, *fractional_frame);
                }
            }
            MetaMessage::TimeSignature {
                numerator,
                denominator,
                clocks_per_click,
                demisemiquavers_per_quarter,
            } => {
                if let Some(callback) = callbacks.time_signature.as_mut() {
                    callback(
                        pos,
                        *numerator,
                        *denominator,
                        *clocks_per_click,
                        *demisemiquavers_per_quarter,
                    );
                }
            }
            MetaMessage::KeySignature {
                key,
                is_major,
                num_accidentals,
                is_flat,
            } => {
                if let Some(callback) = callbacks.key_signature.as_mut() {
                    callback(pos, *key, *is_major, *num_accidentals, *is_flat);
                }
            }
            MetaMessage::SequencerSpecific(data) => {
                if let Some(callback) = callbacks.sequencer_specific.as_mut() {
                    callback(pos, data.as_slice());
                }
            }
            _ => {}
        }
    }

    fn dispatch_realtime(&mut self, msg: RealtimeMessage) {
        let callbacks = &mut self.callbacks.realtime;
        let callback = match msg {
            RealtimeMessage::TimingClock => callbacks.clock.as_mut(),
            RealtimeMessage::Tick => callbacks.tick.as_mut(),
            RealtimeMessage::ActiveSensing => callbacks.active_sense.as_mut(),
            RealtimeMessage::Start => {
                self.clock.start();
                callbacks.start.as_mut()
            }
            RealtimeMessage::Stop => {
                self.clock.stop();
                callbacks.stop.as_mut()
            }
            RealtimeMessage::Continue => {
                self.clock.resume();
                callbacks.continue_playback.as_mut()
            }
            RealtimeMessage::Reset => {
                self.clock.reset();
                callbacks.reset.as_mut()
            }
        };
        if let Some(callback) = callback {
            callback();
        }
    }

    fn dispatch_system_common(&mut self, msg: SystemCommonMessage) {
        let callbacks = &mut self.callbacks.system_common;
        match msg {
            SystemCommonMessage::TuneRequest => {
                if let Some(callback) = callbacks.tune_request.as_mut() {
                    callback();
                }
            }
            SystemCommonMessage::SongSelect(song) => {
                if let Some(callback) = callbacks.song_select.as_mut() {
                    callback(song);
                }
            }
            SystemCommonMessage::SongPositionPointer(beats) => {
                if let Some(callback) = callbacks.song_position_pointer.as_mut() {
                    callback(beats);
                }
            }
            SystemCommonMessage::MidiTimingCode(frame) => {
                if let Some(callback) = callbacks.midi_timing_code.as_mut() {
                    callback(frame);
                }
            }
        }
    }
}
