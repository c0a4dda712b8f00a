use clap::Parser;
use log::LevelFilter;
use midiroute::*;
use std::path::PathBuf;

#[test]
fn test_args_with_device() {
    let args = Args::parse_from(["test", "--device", "Mock Device 1"]);
    assert_eq!(args.device, Some("Mock Device 1".to_string()));
    assert!(!args.device_list);
    assert_eq!(args.file, None);
}

#[test]
fn test_args_with_output() {
    let args = Args::parse_from(["test", "--device", "Keys", "--output", "Synth"]);
    assert_eq!(args.output, Some("Synth".to_string()));
    assert!(!args.output_list);

    // forwarding needs an input to listen to
    assert!(Args::try_parse_from(["test", "--output", "Synth"]).is_err());
    assert!(Args::parse_from(["test", "--output-list"]).output_list);
}

#[test]
fn test_args_with_file() {
    let args = Args::parse_from(["test", "song.mid", "--quiet", "-vv"]);
    assert_eq!(args.file, Some(PathBuf::from("song.mid")));
    assert!(args.quiet);
    assert!(!args.raw);
    assert_eq!(args.verbose, 2);
    assert_eq!(args.level_filter(LevelFilter::Info), LevelFilter::Trace);
}

#[test]
fn test_verbosity_never_lowers_the_level() {
    let args = Args::parse_from(["test", "--raw", "-v"]);
    assert!(args.raw);
    assert_eq!(args.level_filter(LevelFilter::Warn), LevelFilter::Debug);
    assert_eq!(args.level_filter(LevelFilter::Trace), LevelFilter::Trace);

    let args = Args::parse_from(["test"]);
    assert_eq!(args.level_filter(LevelFilter::Warn), LevelFilter::Warn);
}

#[test]
fn test_valid_device() {
    let devices = vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()];
    assert!(validate_device("Device 2", &devices).is_ok());
}

#[test]
fn test_invalid_device() {
    let devices = vec!["Mock Device 1".to_string()];
    let error_msg = validate_device("Nonexistent Device", &devices).unwrap_err();
    assert!(error_msg.contains("Nonexistent Device"));
    assert!(error_msg.contains("  - Mock Device 1"));
}

#[cfg(not(feature = "midi-io"))]
#[test]
fn test_no_devices_without_midi_io() {
    assert!(handle_device_list().unwrap().is_empty());
    assert!(handle_output_list().unwrap().is_empty());
}
