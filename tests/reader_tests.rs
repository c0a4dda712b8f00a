use midiroute::midi::{Message, MetaMessage, SmfFormat, TimeFormat};
use midiroute::reader::MessageLogger;
use midiroute::{Position, Reader, ReaderOptions, ReaderState, SmfWriter};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn quiet_reader() -> Reader {
    Reader::with_options(ReaderOptions::default().no_logger())
}

/// Tempo 160, a note on at tick 0 and its note off at tick 4000
fn single_note_file() -> Vec<u8> {
    let mut writer = SmfWriter::new_smf(1).unwrap();
    writer.tempo(160).unwrap();
    writer.note_on(2, 65, 90).unwrap();
    writer.set_delta(4000);
    writer.note_off(2, 65).unwrap();
    writer.end_of_track().unwrap();
    writer.finish().unwrap()
}

fn record_notes(reader: &mut Reader, log: &Log) {
    let l = Arc::clone(log);
    reader.callbacks.meta.tempo = Some(Box::new(move |pos: Position, bpm| {
        l.lock()
            .unwrap()
            .push(format!("tempo {} @{}", bpm, pos.absolute_ticks));
    }));
    let l = Arc::clone(log);
    reader.callbacks.channel.note_on = Some(Box::new(move |pos: Option<Position>, ch, key, vel| {
        let pos = pos.unwrap();
        l.lock()
            .unwrap()
            .push(format!("note_on {} {} {} @{}", ch, key, vel, pos.absolute_ticks));
    }));
    let l = Arc::clone(log);
    reader.callbacks.channel.note_off = Some(Box::new(move |pos: Option<Position>, ch, key, vel| {
        let pos = pos.unwrap();
        l.lock()
            .unwrap()
            .push(format!("note_off {} {} {} @{}", ch, key, vel, pos.absolute_ticks));
    }));
    let l = Arc::clone(log);
    reader.callbacks.meta.end_of_track = Some(Box::new(move |pos: Position| {
        l.lock().unwrap().push(format!(
            "end_of_track #{} @{} d{}",
            pos.track, pos.absolute_ticks, pos.delta_ticks
        ));
    }));
}

#[test]
fn test_single_note_file() {
    let log = Log::default();
    let mut reader = quiet_reader();
    record_notes(&mut reader, &log);

    reader.read_smf(&single_note_file()).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "tempo 160 @0",
            "note_on 2 65 90 @0",
            "note_off 2 65 0 @4000",
            "end_of_track #0 @0 d0",
        ]
    );
    assert_eq!(reader.state(), ReaderState::Idle);
}

#[test]
fn test_time_at_follows_tempo_changes() {
    let mut reader = quiet_reader();
    reader.read_smf(&single_note_file()).unwrap();

    assert_eq!(reader.resolution(), Some(960));
    assert_eq!(reader.time_at(0), Some(Duration::ZERO));
    // 4000 ticks at 160 BPM and 960 ticks per quarter
    assert_eq!(reader.time_at(4000), Some(Duration::from_micros(1_562_500)));
    assert_eq!(reader.tempo().current_bpm(), 160);
}

#[test]
fn test_each_runs_before_typed_callback() {
    let log = Log::default();
    let mut reader = quiet_reader();

    let l = Arc::clone(&log);
    reader.callbacks.each = Some(Box::new(move |_pos: Option<Position>, msg: &Message| {
        l.lock().unwrap().push(format!("each {}", msg.category()));
    }));
    let l = Arc::clone(&log);
    reader.callbacks.channel.note_on = Some(Box::new(move |_pos: Option<Position>, _, _, _| {
        l.lock().unwrap().push("note_on".into());
    }));

    let mut writer = SmfWriter::new_smf(1).unwrap();
    writer.note_on(0, 60, 100).unwrap();
    reader.read_smf(&writer.finish().unwrap()).unwrap();

    assert_eq!(entries(&log), vec!["each channel", "note_on", "each meta"]);
}

#[test]
fn test_velocity_zero_note_on_is_not_remapped() {
    let log = Log::default();
    let mut reader = quiet_reader();
    record_notes(&mut reader, &log);

    let mut writer = SmfWriter::new_smf(1).unwrap();
    writer.note_on(0, 60, 100).unwrap();
    writer.set_delta(10);
    writer.note_on(0, 60, 0).unwrap();
    writer.set_delta(10);
    writer.note_off_velocity(0, 61, 33).unwrap_err();
    writer.note_on(0, 61, 100).unwrap();
    writer.note_off_velocity(0, 61, 33).unwrap();
    reader.read_smf(&writer.finish().unwrap()).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "note_on 0 60 100 @0",
            "note_on 0 60 0 @10",
            "note_on 0 61 100 @20",
            "note_off 0 61 33 @20",
            "end_of_track #0 @0 d0",
        ]
    );
}

#[test]
fn test_positions_restart_per_track() {
    let log = Log::default();
    let mut reader = quiet_reader();
    record_notes(&mut reader, &log);

    let headers = Arc::new(Mutex::new(Vec::new()));
    let h = Arc::clone(&headers);
    reader.callbacks.smf_header = Some(Box::new(move |header| {
        h.lock().unwrap().push(*header);
    }));

    let mut writer = SmfWriter::new_smf(2).unwrap().with_resolution(480);
    writer.set_delta(100);
    writer.tempo(90).unwrap();
    writer.end_of_track().unwrap();
    writer.set_delta(50);
    writer.note_on(9, 36, 127).unwrap();
    writer.set_delta(50);
    writer.note_off(9, 36).unwrap();
    writer.end_of_track().unwrap();
    reader.read_smf(&writer.finish().unwrap()).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "tempo 90 @100",
            "end_of_track #0 @0 d0",
            "note_on 9 36 127 @50",
            "note_off 9 36 0 @100",
            "end_of_track #1 @0 d0",
        ]
    );

    let headers = headers.lock().unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].format, SmfFormat::Parallel);
    assert_eq!(headers[0].num_tracks, 2);
    assert_eq!(headers[0].time_format, TimeFormat::Metric(480));
}

#[test]
fn test_smpte_files_have_no_time() {
    use midly::num::u28;
    use midly::{Format, Fps, Header, Smf, Timing, TrackEvent, TrackEventKind};

    let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Timecode(Fps::Fps25, 40)));
    smf.tracks.push(vec![TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    }]);
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();

    let mut reader = quiet_reader();
    reader.read_smf(&bytes).unwrap();

    assert_eq!(
        reader.header().unwrap().time_format,
        TimeFormat::Smpte {
            fps: 25,
            subframes: 40
        }
    );
    assert_eq!(reader.resolution(), None);
    assert_eq!(reader.time_at(100), None);
}

#[test]
fn test_meta_and_sysex_callbacks() {
    let log = Log::default();
    let mut reader = quiet_reader();

    let l = Arc::clone(&log);
    reader.callbacks.meta.track = Some(Box::new(move |_pos: Position, name: &str| {
        l.lock().unwrap().push(format!("track {}", name));
    }));
    let l = Arc::clone(&log);
    reader.callbacks.meta.time_signature = Some(Box::new(move |_pos: Position, num, denom, clocks, demi| {
        l.lock()
            .unwrap()
            .push(format!("meter {}/{} {} {}", num, denom, clocks, demi));
    }));
    let l = Arc::clone(&log);
    reader.callbacks.meta.key_signature = Some(Box::new(move |_pos: Position, key, major, num, flat| {
        l.lock()
            .unwrap()
            .push(format!("key {} {} {} {}", key, major, num, flat));
    }));
    let l = Arc::clone(&log);
    reader.callbacks.sysex.complete = Some(Box::new(move |pos: Option<Position>, data: &[u8]| {
        l.lock()
            .unwrap()
            .push(format!("sysex {:?} {}", data, pos.is_some()));
    }));

    let mut writer = SmfWriter::new_smf(1).unwrap();
    writer.track("Bass").unwrap();
    writer.meter(6, 8).unwrap();
    // E flat major
    writer.key_signature(3, true, 3, true).unwrap();
    writer.system_exclusive(&[0x7E, 0x7F, 0x09, 0x01]).unwrap();
    reader.read_smf(&writer.finish().unwrap()).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "track Bass",
            "meter 6/8 12 8",
            "key 3 true 3 true",
            "sysex [126, 127, 9, 1] true",
        ]
    );
}

#[test]
fn test_unknown_meta_goes_to_unknown() {
    use midly::num::{u15, u28};
    use midly::{Format, Header, Smf, Timing, TrackEvent, TrackEventKind};

    let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(u15::new(96))));
    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(midly::MetaMessage::Unknown(0x60, &[1, 2])),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
        },
    ]);
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();

    let unknown = Arc::new(Mutex::new(Vec::new()));
    let u = Arc::clone(&unknown);
    let mut reader = quiet_reader();
    reader.callbacks.unknown = Some(Box::new(move |_pos: Option<Position>, raw: &[u8]| {
        u.lock().unwrap().push(raw.to_vec());
    }));
    reader.read_smf(&bytes).unwrap();

    assert_eq!(*unknown.lock().unwrap(), vec![vec![0xFF, 0x60, 1, 2]]);
}

#[test]
fn test_tempo_changes_accumulate_across_reads() {
    let mut reader = quiet_reader();
    let file = single_note_file();
    reader.read_smf(&file).unwrap();
    reader.read_smf_from(Cursor::new(file)).unwrap();

    // the implicit initial tempo plus one change per read
    assert_eq!(reader.tempo().changes().len(), 3);
}

#[test]
fn test_garbage_fails_to_decode() {
    let mut reader = quiet_reader();
    assert!(matches!(
        reader.read_smf(b"MThd garbage"),
        Err(midiroute::Error::Decode(_))
    ));
    assert_eq!(reader.state(), ReaderState::Idle);
}

#[test]
fn test_malformed_event_fails_after_earlier_tracks() {
    use midly::num::{u15, u28, u4, u7};
    use midly::{Format, Header, Smf, Timing, TrackEvent, TrackEventKind};

    let note_track = |channel: u8| {
        vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel: u4::new(channel),
                    message: midly::MidiMessage::NoteOn {
                        key: u7::new(60),
                        vel: u7::new(100),
                    },
                },
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
            },
        ]
    };
    let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(96))));
    smf.tracks.push(note_track(0));
    smf.tracks.push(note_track(1));
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();

    // status byte of the first event in the second track, after its delta
    let second_track = bytes.windows(4).rposition(|w| w == b"MTrk").unwrap();
    bytes[second_track + 9] = 0xF4;

    let log = Log::default();
    let mut reader = quiet_reader();
    record_notes(&mut reader, &log);
    let result = reader.read_smf(&bytes);

    assert!(matches!(result, Err(midiroute::Error::Decode(_))));
    assert_eq!(
        entries(&log),
        vec!["note_on 0 60 100 @0", "end_of_track #0 @0 d0"]
    );
    assert_eq!(reader.state(), ReaderState::Idle);
}

struct CountingLogger(Arc<Mutex<usize>>);

impl MessageLogger for CountingLogger {
    fn log_message(&mut self, position: Option<&Position>, _msg: &Message) {
        assert!(position.is_some());
        *self.0.lock().unwrap() += 1;
    }
}

#[test]
fn test_custom_logger_sees_every_message() {
    let count = Arc::new(Mutex::new(0));
    let mut reader =
        Reader::with_options(ReaderOptions::default().logger(CountingLogger(Arc::clone(&count))));
    reader.read_smf(&single_note_file()).unwrap();
    // tempo, note on, note off, end of track
    assert_eq!(*count.lock().unwrap(), 4);
}

#[test]
fn test_live_stream_has_no_positions() {
    let log = Log::default();
    let mut reader = quiet_reader();
    let l = Arc::clone(&log);
    reader.callbacks.each = Some(Box::new(move |pos: Option<Position>, msg: &Message| {
        l.lock().unwrap().push(format!("{:?} {:?}", pos, msg));
    }));

    // note on using running status for the second note, clock in between
    let bytes = vec![0x90, 60, 100, 0xF8, 62, 100];
    reader.read(Cursor::new(bytes)).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            format!("None {:?}", Message::note_on(0, 60, 100)),
            format!(
                "None {:?}",
                Message::Realtime(midiroute::midi::RealtimeMessage::TimingClock)
            ),
            format!("None {:?}", Message::note_on(0, 62, 100)),
        ]
    );
    assert_eq!(reader.position(), None);
}

#[test]
fn test_meta_end_of_track_message_value() {
    // the end of track message itself is passed unchanged to the catch-all
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let mut reader = quiet_reader();
    reader.callbacks.each = Some(Box::new(move |_pos: Option<Position>, msg: &Message| {
        s.lock().unwrap().push(msg.clone());
    }));
    reader.read_smf(&single_note_file()).unwrap();
    assert_eq!(
        seen.lock().unwrap().last(),
        Some(&Message::Meta(MetaMessage::EndOfTrack))
    );
}
