//! In-memory MIDI connections for tests and dry runs

use super::{InputListener, MidiIn, MidiOut};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type FailurePredicate = Arc<dyn Fn(usize, &[u8]) -> bool + Send + Sync>;

/// Output that records every message sent to it.
///
/// Clones share the same record, so a test can keep one clone and hand the
/// other to a writer.
#[derive(Clone, Default)]
pub struct MockMidiOut {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    attempts: Arc<AtomicUsize>,
    fail_when: Option<FailurePredicate>,
}

impl MockMidiOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sends fail when `predicate` returns true for the attempt index and bytes.
    /// Failed sends are not recorded.
    pub fn fail_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(usize, &[u8]) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Arc::new(predicate));
        self
    }

    /// Messages that were sent successfully, in order
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of send calls, failed ones included
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl MidiOut for MockMidiOut {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(fail) = &self.fail_when {
            if fail(attempt, bytes) {
                return Err(Error::Write(format!(
                    "mock output rejected {:02X?} (attempt {})",
                    bytes, attempt
                )));
            }
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bytes.to_vec());
        Ok(())
    }
}

/// Input that plays back a scripted list of `(bytes, delta_micros)` messages.
///
/// Playback runs on its own thread once a listener is installed. The
/// listener is dropped when the script is exhausted.
pub struct MockMidiIn {
    script: Vec<(Vec<u8>, i64)>,
    pause: Duration,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    stopped: bool,
}

impl MockMidiIn {
    pub fn new(script: Vec<(Vec<u8>, i64)>) -> Self {
        Self {
            script,
            pause: Duration::ZERO,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            stopped: false,
        }
    }

    /// Waits between scripted messages
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Returns true once `stop_listening` has been called
    pub fn was_stopped(&self) -> bool {
        self.stopped
    }
}

impl MidiIn for MockMidiIn {
    fn set_listener(&mut self, mut listener: InputListener) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::Connection("mock input is already listening".into()));
        }

        let script = self.script.clone();
        let pause = self.pause;
        let stop = Arc::clone(&self.stop);
        stop.store(false, Ordering::SeqCst);
        self.stopped = false;

        self.worker = Some(thread::spawn(move || {
            for (bytes, delta) in script {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                listener(&bytes, delta);
                if !pause.is_zero() {
                    thread::sleep(pause);
                }
            }
        }));
        Ok(())
    }

    fn stop_listening(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.stopped = true;
    }
}

impl Drop for MockMidiIn {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop_listening();
        }
    }
}
