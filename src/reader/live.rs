use super::{Position, Reader, ReaderState};
use crate::error::Result;
use crate::midi::{wire, Message, MidiIn, RealtimeMessage};
use crossbeam::channel::{bounded, select, unbounded, Receiver, Sender};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Stops a [`Reader::listen_to`] session from any thread.
///
/// Once stopped, a handle stays stopped. No callback runs after the
/// listening loop has observed the request.
#[derive(Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.wake_tx.try_send(());
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Reader {
    /// Dispatches messages from a live input until `stop` is triggered or the
    /// input drops its listener.
    ///
    /// Positions are synthesized from the time between messages at the most
    /// recent tempo, accumulating for the whole session. This
    /// reconstruction drifts and is not exact. The resolution falls back to the
    /// configured live resolution when nothing established one before.
    pub fn listen_to(&mut self, input: &mut dyn MidiIn, stop: &StopHandle) -> Result<()> {
        if self.tempo.resolution().is_none() {
            self.tempo.set_resolution(Some(self.live_resolution));
        }

        let (tx, rx) = unbounded::<(Vec<u8>, i64)>();
        input.set_listener(Box::new(move |bytes, delta| {
            // the receiver is gone once listening ended
            let _ = tx.send((bytes.to_vec(), delta));
        }))?;
        info!("Listening for live MIDI input");

        self.position = Some(Position::default());
        self.state = ReaderState::ReadingLive;
        let result = self.listen_loop(&rx, stop);

        input.stop_listening();
        self.position = None;
        self.state = ReaderState::Idle;
        info!("Stopped listening");
        result
    }

    fn listen_loop(&mut self, rx: &Receiver<(Vec<u8>, i64)>, stop: &StopHandle) -> Result<()> {
        let mut elapsed = Duration::ZERO;

        loop {
            if stop.is_stopped() {
                return Ok(());
            }

            let (bytes, delta) = select! {
                recv(rx) -> packet => match packet {
                    Ok(packet) => packet,
                    Err(_) => {
                        debug!("Input closed");
                        return Ok(());
                    }
                },
                recv(stop.wake_rx) -> _ => continue,
            };

            if stop.is_stopped() {
                return Ok(());
            }

            let delta = Duration::from_micros(delta.max(0) as u64);
            elapsed += delta;

            let msg = wire::decode(&bytes)?;
            self.advance_live_position(delta);
            if msg == Message::Realtime(RealtimeMessage::TimingClock) {
                self.clock.clock(elapsed);
            }
            self.dispatch(&msg);
        }
    }

    fn advance_live_position(&mut self, delta: Duration) {
        let ticks = self
            .tempo
            .ticks_for(self.tempo.current_bpm(), delta)
            .unwrap_or(0);
        let pos = self.position.get_or_insert_with(Position::default);
        pos.track = 0;
        pos.delta_ticks = ticks;
        pos.absolute_ticks += ticks as u64;
    }
}
