//! Hardware MIDI ports via midir

use super::{InputListener, MidiIn, MidiOut};
use crate::error::{Error, Result};
use log::{debug, info};
use midir::{
    Ignore, MidiInput, MidiInputConnection, MidiInputPort, MidiOutput, MidiOutputConnection,
};

const CLIENT_NAME: &str = "midiroute";

/// Names of the available input ports
pub fn input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new(CLIENT_NAME)?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect())
}

/// Names of the available output ports
pub fn output_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect())
}

/// A live input port, matched by a substring of its name
pub struct MidirIn {
    name: String,
    port: MidiInputPort,
    input: Option<MidiInput>,
    connection: Option<MidiInputConnection<()>>,
}

impl MidirIn {
    pub fn open(device_name: &str) -> Result<Self> {
        let mut midi_in = MidiInput::new(&format!("{}-in", CLIENT_NAME))?;
        midi_in.ignore(Ignore::None);

        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| {
                midi_in
                    .port_name(p)
                    .unwrap_or_default()
                    .contains(device_name)
            })
            .ok_or_else(|| {
                Error::Connection(format!("Input device '{}' not found", device_name))
            })?;
        let name = midi_in.port_name(&port).unwrap_or_default();
        info!("Opened MIDI input: {}", name);

        Ok(Self {
            name,
            port,
            input: Some(midi_in),
            connection: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MidiIn for MidirIn {
    fn set_listener(&mut self, mut listener: InputListener) -> Result<()> {
        let midi_in = self
            .input
            .take()
            .ok_or_else(|| Error::Connection(format!("{} is already listening", self.name)))?;

        let mut last_stamp: Option<u64> = None;
        let connection = midi_in.connect(
            &self.port,
            &format!("{}-input", CLIENT_NAME),
            move |stamp, message, _| {
                let delta = last_stamp.map_or(0, |prev| stamp.saturating_sub(prev) as i64);
                last_stamp = Some(stamp);
                listener(message, delta);
            },
            (),
        )?;
        debug!("Listening on {}", self.name);
        self.connection = Some(connection);
        Ok(())
    }

    fn stop_listening(&mut self) {
        if let Some(connection) = self.connection.take() {
            let (midi_in, _) = connection.close();
            self.input = Some(midi_in);
            debug!("Stopped listening on {}", self.name);
        }
    }
}

/// A live output port, matched by a substring of its name
pub struct MidirOut {
    name: String,
    connection: MidiOutputConnection,
}

impl MidirOut {
    pub fn open(device_name: &str) -> Result<Self> {
        let midi_out = MidiOutput::new(&format!("{}-out", CLIENT_NAME))?;

        let port = midi_out
            .ports()
            .into_iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .unwrap_or_default()
                    .contains(device_name)
            })
            .ok_or_else(|| {
                Error::Connection(format!("Output device '{}' not found", device_name))
            })?;
        let name = midi_out.port_name(&port).unwrap_or_default();
        let connection = midi_out.connect(&port, &format!("{}-output", CLIENT_NAME))?;
        info!("Opened MIDI output: {}", name);

        Ok(Self { name, connection })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MidiOut for MidirOut {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.connection.send(bytes)?;
        Ok(())
    }
}
