//! BPM calculation from incoming MIDI timing clock

use crate::config::CLOCKS_PER_QUARTER;
use log::debug;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Tracks transport state and tempo from realtime messages received live.
///
/// Clock timestamps are passed in by the caller (time since the listening
/// session started), so the calculation does not depend on when the tracker
/// itself gets to run.
#[derive(Debug)]
pub struct ClockTracker {
    state: Mutex<ClockState>,
    ppq: u32,           // Clock pulses per quarter note
    window_size: usize, // Number of intervals to average
}

#[derive(Debug, Default)]
struct ClockState {
    last_clock: Option<Duration>,
    is_playing: bool,
    clock_count: u64,
    intervals: Vec<Duration>,
}

impl Default for ClockTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockTracker {
    /// Creates a tracker with standard MIDI timing (24 clocks per quarter note)
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClockState {
                intervals: Vec::with_capacity(32),
                ..ClockState::default()
            }),
            ppq: CLOCKS_PER_QUARTER,
            window_size: CLOCKS_PER_QUARTER as usize,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self) {
        let mut state = self.lock();
        state.is_playing = true;
        state.last_clock = None;
        state.clock_count = 0;
        state.intervals.clear();
        debug!("Clock started");
    }

    pub fn stop(&self) {
        self.lock().is_playing = false;
        debug!("Clock stopped");
    }

    pub fn resume(&self) {
        self.lock().is_playing = true;
        debug!("Clock resumed");
    }

    /// Registers a timing clock received at `at` and returns the BPM if it can be calculated.
    ///
    /// Clocks are counted while stopped too, since many devices send them continuously.
    pub fn clock(&self, at: Duration) -> Option<f64> {
        let mut state = self.lock();

        if let Some(last) = state.last_clock {
            let interval = at.saturating_sub(last);

            // Only include reasonable intervals (filter out extreme values)
            if interval.as_micros() > 1000 && interval.as_micros() < 100_000 {
                state.intervals.push(interval);
                while state.intervals.len() > self.window_size {
                    state.intervals.remove(0);
                }
            }
        }

        state.last_clock = Some(at);
        state.clock_count += 1;
        self.bpm_of(&state.intervals)
    }

    /// Returns the current BPM if it can be calculated
    pub fn current_bpm(&self) -> Option<f64> {
        let state = self.lock();
        self.bpm_of(&state.intervals)
    }

    pub fn is_playing(&self) -> bool {
        self.lock().is_playing
    }

    /// Number of timing clocks since the last start
    pub fn clock_count(&self) -> u64 {
        self.lock().clock_count
    }

    pub fn reset(&self) {
        *self.lock() = ClockState::default();
    }

    fn bpm_of(&self, intervals: &[Duration]) -> Option<f64> {
        // Need at least a few intervals to calculate meaningful BPM
        if intervals.len() < 3 {
            return None;
        }

        // Sort intervals and take the median section to avoid outliers
        let mut sorted = intervals.to_vec();
        sorted.sort();
        let median = &sorted[sorted.len() / 4..(sorted.len() * 3) / 4];

        let avg_interval: Duration = median.iter().sum::<Duration>() / median.len() as u32;
        let clocks_per_minute = 60.0 / avg_interval.as_secs_f64();
        Some(clocks_per_minute / self.ppq as f64)
    }
}
