use clap::Parser;
#[cfg(feature = "midi-io")]
use midiroute::cli::validate_device;
use midiroute::{
    handle_device_list, handle_output_list, logging, Args, Message, Position, Reader, Settings,
};
use std::fs::File;
use std::io::{self, Read};
use std::sync::{Arc, Mutex, PoisonError};

fn main() {
    let args = parse_command_line_arguments();
    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => exit_with_error(&format!("Error loading settings: {}", e)),
    };
    initialize_logging(&args, &settings);

    if args.device_list {
        list_available_devices("input", handle_device_list());
        return;
    }
    if args.output_list {
        list_available_devices("output", handle_output_list());
        return;
    }

    let result = match &args.device {
        Some(device_name) => listen(device_name, &args, &settings),
        None => dump(&args, &settings),
    };

    if let Err(e) = result {
        exit_with_error(&format!("Error: {}", e));
    }
}

fn parse_command_line_arguments() -> Args {
    Args::parse()
}

fn initialize_logging(args: &Args, settings: &Settings) {
    let level = match settings.level_filter() {
        Ok(level) => args.level_filter(level),
        Err(e) => exit_with_error(&e.to_string()),
    };
    let log_file = args.log_file.clone().or_else(logging::default_log_path);
    if let Err(e) = logging::init_logger(level, log_file.as_deref()) {
        eprintln!("{}", e);
    }
    log::info!("Application starting");
}

fn exit_with_error(error_msg: &str) -> ! {
    log::error!("{}", error_msg);
    eprintln!("{}", error_msg);
    std::process::exit(1);
}

fn list_available_devices(direction: &str, devices: midiroute::Result<Vec<String>>) {
    match devices {
        Ok(devices) => {
            println!("Available MIDI {} devices:", direction);
            for device in devices {
                println!("  - {}", device);
            }
        }
        Err(e) => exit_with_error(&format!("Error listing MIDI devices: {}", e)),
    }
}

fn create_reader(args: &Args, settings: &Settings) -> Reader {
    let mut options = settings.reader_options();
    if args.quiet {
        options = options.no_logger();
    }
    Reader::with_options(options)
}

/// Reads the whole input, then prints every message with its time
fn dump(args: &Args, settings: &Settings) -> midiroute::Result<()> {
    let mut input: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin().lock()),
    };

    let events: Arc<Mutex<Vec<(Option<Position>, Message)>>> = Arc::default();
    let mut reader = create_reader(args, settings);
    let collected = Arc::clone(&events);
    reader.callbacks.each = Some(Box::new(move |pos: Option<Position>, msg: &Message| {
        collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((pos, msg.clone()));
    }));

    if args.raw {
        reader.read(&mut input)?;
    } else {
        reader.read_smf_from(&mut input)?;
        if let Some(header) = reader.header() {
            println!(
                "{:?}, {} tracks, {:?}",
                header.format, header.num_tracks, header.time_format
            );
        }
    }

    let events = events.lock().unwrap_or_else(PoisonError::into_inner);
    for (pos, msg) in events.iter() {
        match pos {
            Some(pos) => {
                let time = reader
                    .time_at(pos.absolute_ticks)
                    .map(|t| format!("{:>10.3}s", t.as_secs_f64()))
                    .unwrap_or_else(|| format!("{:>11}", "-"));
                println!(
                    "#{} {:>8} {} {:?}",
                    pos.track, pos.absolute_ticks, time, msg
                );
            }
            None => println!("{:?}", msg),
        }
    }
    Ok(())
}

#[cfg(feature = "midi-io")]
fn listen(device_name: &str, args: &Args, settings: &Settings) -> midiroute::Result<()> {
    use midiroute::midi::MidirIn;
    use midiroute::StopHandle;

    let devices = handle_device_list()?;
    if let Err(error_msg) = validate_device(device_name, &devices) {
        exit_with_error(&error_msg);
    }

    let mut input = MidirIn::open(device_name)?;
    println!("Listening to {}. Press Enter to stop...", input.name());

    let stop = StopHandle::new();
    let stopper = stop.clone();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
        stopper.stop();
    });

    let mut forward = match &args.output {
        Some(output_name) => Some(open_output(output_name, settings)?),
        None => None,
    };

    let mut reader = create_reader(args, settings);
    reader.callbacks.each = Some(Box::new(move |pos: Option<Position>, msg: &Message| {
        match pos {
            Some(pos) => println!("#{} {:>8} {:?}", pos.track, pos.absolute_ticks, msg),
            None => println!("{:?}", msg),
        }
        if let Some(writer) = forward.as_mut() {
            if let Err(e) = writer.write(msg) {
                log::warn!("Not forwarded: {:?}: {}", msg, e);
            }
        }
    }));
    let clock = reader.clock_tracker();
    reader.callbacks.realtime.stop = Some(Box::new(move || {
        if let Some(bpm) = clock.current_bpm() {
            println!("Clock stopped at {:.1} BPM", bpm);
        }
    }));

    reader.listen_to(&mut input, &stop)
}

#[cfg(feature = "midi-io")]
fn open_output(
    output_name: &str,
    settings: &Settings,
) -> midiroute::Result<midiroute::Writer<midiroute::writer::LiveSink<midiroute::midi::MidirOut>>> {
    use midiroute::midi::MidirOut;

    let devices = handle_output_list()?;
    if let Err(error_msg) = validate_device(output_name, &devices) {
        exit_with_error(&error_msg);
    }

    let output = MidirOut::open(output_name)?;
    println!("Forwarding to {}", output.name());
    let mut writer = midiroute::Writer::new(output);
    settings.configure_writer(&mut writer);
    Ok(writer)
}

#[cfg(not(feature = "midi-io"))]
fn listen(device_name: &str, _args: &Args, _settings: &Settings) -> midiroute::Result<()> {
    Err(midiroute::Error::Connection(format!(
        "can't listen to '{}': built without the midi-io feature",
        device_name
    )))
}
