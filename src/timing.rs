//! Tick to wall-clock conversion under piecewise constant tempo

use crate::config::DEFAULT_BPM;
use std::time::Duration;

const NANOS_PER_MINUTE: u128 = 60_000_000_000;

/// A tempo taking effect at an absolute tick position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoChange {
    pub absolute_ticks: u64,
    pub bpm: u32,
}

/// Ordered record of tempo changes plus the resolution they are measured in.
///
/// There is always an implicit 120 BPM tempo at tick 0. Changes are only ever
/// appended.
#[derive(Debug, Clone)]
pub struct TempoMap {
    resolution: Option<u16>,
    changes: Vec<TempoChange>,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoMap {
    pub fn new() -> Self {
        Self {
            resolution: None,
            changes: vec![TempoChange {
                absolute_ticks: 0,
                bpm: DEFAULT_BPM,
            }],
        }
    }

    /// Ticks per quarter note, None when unknown
    pub fn resolution(&self) -> Option<u16> {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: Option<u16>) {
        self.resolution = resolution.filter(|r| *r > 0);
    }

    pub fn register_tempo_change(&mut self, absolute_ticks: u64, bpm: u32) {
        self.changes.push(TempoChange {
            absolute_ticks,
            bpm,
        });
    }

    /// All changes, including the implicit initial tempo
    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// BPM of the most recent change
    pub fn current_bpm(&self) -> u32 {
        self.changes.last().map_or(DEFAULT_BPM, |c| c.bpm)
    }

    /// Duration of `ticks` at a constant tempo
    pub fn duration_of(&self, ticks: u64, bpm: u32) -> Option<Duration> {
        let resolution = self.resolution?;
        Some(duration_of(ticks, bpm, resolution))
    }

    /// Wall-clock time from tick 0 to `absolute_ticks`.
    ///
    /// Changes are applied in the order they were registered. Each segment
    /// runs from one change up to the next, and the final segment up to
    /// `absolute_ticks` uses the tempo in effect at its start.
    pub fn duration_at(&self, absolute_ticks: u64) -> Option<Duration> {
        let resolution = self.resolution?;

        let mut total = Duration::ZERO;
        let mut last_ticks = 0u64;
        let mut last_bpm = DEFAULT_BPM;

        for change in &self.changes {
            if change.absolute_ticks >= absolute_ticks {
                break;
            }
            total += duration_of(
                change.absolute_ticks.saturating_sub(last_ticks),
                last_bpm,
                resolution,
            );
            last_ticks = change.absolute_ticks;
            last_bpm = change.bpm;
        }

        total += duration_of(absolute_ticks.saturating_sub(last_ticks), last_bpm, resolution);
        Some(total)
    }

    /// Ticks covering `duration` at a constant tempo, rounded to the nearest tick
    pub fn ticks_for(&self, bpm: u32, duration: Duration) -> Option<u32> {
        let resolution = self.resolution?;
        if bpm == 0 {
            return Some(0);
        }
        let scaled = duration.as_nanos() * bpm as u128 * resolution as u128;
        let ticks = (scaled + NANOS_PER_MINUTE / 2) / NANOS_PER_MINUTE;
        Some(ticks.min(u32::MAX as u128) as u32)
    }
}

fn duration_of(ticks: u64, bpm: u32, resolution: u16) -> Duration {
    if bpm == 0 {
        return Duration::ZERO;
    }
    let nanos = ticks as u128 * NANOS_PER_MINUTE / (bpm as u128 * resolution as u128);
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(resolution: u16) -> TempoMap {
        let mut map = TempoMap::new();
        map.set_resolution(Some(resolution));
        map
    }

    #[test]
    fn test_unknown_resolution() {
        let map = TempoMap::new();
        assert_eq!(map.duration_at(100), None);
        assert_eq!(map.ticks_for(120, Duration::from_secs(1)), None);
    }

    #[test]
    fn test_zero_ticks_is_zero() {
        assert_eq!(map(960).duration_at(0), Some(Duration::ZERO));
    }

    #[test]
    fn test_one_quarter_at_default_tempo() {
        assert_eq!(map(1920).duration_at(1920), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_tempo_change_segments() {
        let mut map = map(960);
        map.register_tempo_change(960, 60);
        // 960 ticks at 120 then 960 ticks at 60
        assert_eq!(map.duration_at(1920), Some(Duration::from_millis(1500)));
        // a change exactly at the position does not apply yet
        assert_eq!(map.duration_at(960), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_change_at_zero_applies_immediately() {
        let mut map = map(960);
        map.register_tempo_change(0, 160);
        assert_eq!(map.duration_at(960), Some(Duration::from_nanos(375_000_000)));
    }

    #[test]
    fn test_monotonic() {
        let mut map = map(480);
        map.register_tempo_change(100, 90);
        map.register_tempo_change(700, 200);
        map.register_tempo_change(1500, 45);
        let mut last = Duration::ZERO;
        for ticks in (0..3000).step_by(50) {
            let at = map.duration_at(ticks).unwrap();
            assert!(at >= last, "{} ticks went backwards", ticks);
            last = at;
        }
    }

    #[test]
    fn test_ticks_for_rounds() {
        let map = map(1920);
        assert_eq!(map.ticks_for(120, Duration::from_millis(500)), Some(1920));
        // 20833us at 120 BPM is 79.99 ticks
        assert_eq!(map.ticks_for(120, Duration::from_micros(20_833)), Some(80));
        assert_eq!(map.current_bpm(), 120);
    }
}
