//! Transport clock: a periodic callback that advances the shared play-head.
//!
//! The callback period is `100 * (60 / BPM)` milliseconds.  Every callback
//! adds its period to a sub-second accumulator (whole seconds are
//! published as they complete) and every tenth callback publishes the
//! current tick and advances it, so ticks advance once per beat.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::playhead::{PlayHead, SharedPlayHead};
use super::timer::PeriodicTimer;
use crate::error::{HostError, Result};

/// Callbacks per published tick.
pub const SUB_TICKS_PER_TICK: u32 = 10;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Timer period for a tempo: `100 * (60 / bpm)` ms, never below 1µs.
pub fn interval_for_bpm(bpm: u32) -> Duration {
    Duration::from_micros((6 * MICROS_PER_SECOND / u64::from(bpm.max(1))).max(1))
}

/// Counters owned by the timer thread.  The control thread only touches
/// them to reset.
#[derive(Debug, Default)]
struct ClockCounters {
    time_in_seconds: u64,
    ppq_position: u64,
    sub_ticks: u32,
    /// Time accumulated towards the next whole second.
    sub_position_us: u64,
}

impl ClockCounters {
    fn advance(&mut self, interval: Duration, play_head: &PlayHead) {
        self.sub_position_us += interval.as_micros() as u64;
        if self.sub_position_us >= MICROS_PER_SECOND {
            self.time_in_seconds += self.sub_position_us / MICROS_PER_SECOND;
            self.sub_position_us %= MICROS_PER_SECOND;
            play_head.set_time_in_seconds(self.time_in_seconds);
        }

        if self.sub_ticks == 0 {
            play_head.set_ppq_position(self.ppq_position);
            self.ppq_position += 1;
        }
        self.sub_ticks = (self.sub_ticks + 1) % SUB_TICKS_PER_TICK;
    }
}

pub struct TransportClock {
    play_head: SharedPlayHead,
    counters: Arc<Mutex<ClockCounters>>,
    bpm: u32,
    timer: Option<PeriodicTimer>,
}

impl TransportClock {
    pub fn new(bpm: u32) -> Result<Self> {
        if bpm == 0 {
            return Err(HostError::InvalidBpm(bpm));
        }
        Ok(Self {
            play_head: PlayHead::new(bpm),
            counters: Arc::new(Mutex::new(ClockCounters::default())),
            bpm,
            timer: None,
        })
    }

    pub fn play_head(&self) -> SharedPlayHead {
        self.play_head.clone()
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// True while the periodic callback is armed.
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Period of the armed timer, `None` when stopped.
    pub fn interval(&self) -> Option<Duration> {
        self.timer.as_ref().map(PeriodicTimer::interval)
    }

    /// Start or stop the transport.  With `reset_position` the position is
    /// zeroed before the timer resumes.
    pub fn set_playing(&mut self, start: bool, reset_position: bool) {
        self.play_head.set_playing(start);

        if !start {
            self.stop_timer();
        }
        if reset_position {
            self.reset_position();
        }
        if start && self.timer.is_none() {
            self.start_timer();
        }
    }

    /// Change tempo.  A running timer is re-armed at the new period; the
    /// accumulated position is kept.
    pub fn set_bpm(&mut self, bpm: u32) -> Result<()> {
        if bpm == 0 {
            return Err(HostError::InvalidBpm(bpm));
        }
        self.bpm = bpm;
        self.play_head.set_bpm(bpm);
        log::debug!("Transport tempo set to {} BPM", bpm);

        if self.timer.is_some() {
            self.stop_timer();
            self.start_timer();
        }
        Ok(())
    }

    /// Zero seconds, ticks and the sub-tick/sub-second state.
    pub fn reset_position(&mut self) {
        let mut counters = self.counters.lock();
        *counters = ClockCounters::default();
        self.play_head.reset_position();
    }

    fn start_timer(&mut self) {
        let interval = interval_for_bpm(self.bpm);
        let counters = self.counters.clone();
        let play_head = self.play_head.clone();

        match PeriodicTimer::start(interval, move || counters.lock().advance(interval, &play_head)) {
            Ok(timer) => {
                log::debug!("Transport running, period {:?}", interval);
                self.timer = Some(timer);
            }
            Err(e) => {
                log::error!("Failed to start transport clock: {}", e);
                self.play_head.set_playing(false);
            }
        }
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
    }

    /// Run one callback synchronously.
    #[cfg(test)]
    fn step(&self) {
        self.counters
            .lock()
            .advance(interval_for_bpm(self.bpm), &self.play_head);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_formula() {
        assert_eq!(interval_for_bpm(60), Duration::from_millis(100));
        assert_eq!(interval_for_bpm(120), Duration::from_millis(50));
        assert_eq!(interval_for_bpm(30), Duration::from_millis(200));
    }

    #[test]
    fn test_extreme_tempo_keeps_a_nonzero_period() {
        assert_eq!(interval_for_bpm(6_000_000), Duration::from_micros(1));
        assert_eq!(interval_for_bpm(6_000_001), Duration::from_micros(1));
        assert_eq!(interval_for_bpm(u32::MAX), Duration::from_micros(1));

        let mut clock = TransportClock::new(u32::MAX).unwrap();
        clock.set_playing(true, false);
        assert_eq!(clock.interval(), Some(Duration::from_micros(1)));
        clock.set_playing(false, false);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_zero_bpm_rejected() {
        assert!(matches!(TransportClock::new(0), Err(HostError::InvalidBpm(0))));

        let mut clock = TransportClock::new(60).unwrap();
        assert!(clock.set_bpm(0).is_err());
        assert_eq!(clock.bpm(), 60);
        assert_eq!(clock.play_head().bpm(), 60);
    }

    #[test]
    fn test_ticks_advance_every_ten_callbacks() {
        let clock = TransportClock::new(60).unwrap();
        let head = clock.play_head();

        clock.step();
        assert_eq!(head.ppq_position(), 0);
        for _ in 0..10 {
            clock.step();
        }
        // Callbacks 1 and 11 each published a tick.
        assert_eq!(head.ppq_position(), 1);
    }

    #[test]
    fn test_seconds_follow_accumulated_time() {
        // 60 BPM: 100ms per callback, so ten callbacks make one second.
        let clock = TransportClock::new(60).unwrap();
        let head = clock.play_head();
        for _ in 0..9 {
            clock.step();
        }
        assert_eq!(head.time_in_seconds(), 0);
        clock.step();
        assert_eq!(head.time_in_seconds(), 1);
        for _ in 0..20 {
            clock.step();
        }
        assert_eq!(head.time_in_seconds(), 3);
    }

    #[test]
    fn test_set_bpm_while_playing_rearms_timer() {
        let mut clock = TransportClock::new(60).unwrap();
        assert_eq!(clock.interval(), None);

        clock.set_playing(true, false);
        assert_eq!(clock.interval(), Some(Duration::from_millis(100)));

        clock.set_bpm(120).unwrap();
        assert!(clock.is_running());
        assert_eq!(clock.interval(), Some(Duration::from_millis(50)));
        assert_eq!(clock.play_head().bpm(), 120);

        clock.set_playing(false, false);
        assert!(!clock.is_running());
        clock.set_bpm(240).unwrap();
        assert_eq!(clock.interval(), None);
    }

    #[test]
    fn test_bpm_change_keeps_position() {
        let mut clock = TransportClock::new(60).unwrap();
        for _ in 0..25 {
            clock.step();
        }
        let before = clock.play_head().current();
        clock.set_playing(true, false);
        clock.set_bpm(90).unwrap();
        clock.set_playing(false, false);
        let after = clock.play_head().current();
        assert!(after.time_in_seconds >= before.time_in_seconds);
        assert!(after.ppq_position >= before.ppq_position);
    }

    #[test]
    fn test_stop_then_restart_with_reset() {
        let mut clock = TransportClock::new(60).unwrap();
        for _ in 0..35 {
            clock.step();
        }
        assert!(clock.play_head().time_in_seconds() > 0);

        clock.set_playing(false, false);
        clock.set_playing(true, true);
        let snap = clock.play_head().current();
        assert!(snap.is_playing);
        // The first real callback is at least 100ms away.
        assert_eq!(snap.time_in_seconds, 0);
        assert_eq!(snap.ppq_position, 0);
        clock.set_playing(false, false);
    }

    #[test]
    fn test_running_clock_advances_play_head() {
        let mut clock = TransportClock::new(600).unwrap();
        clock.set_playing(true, true);
        std::thread::sleep(Duration::from_millis(300));
        clock.set_playing(false, false);

        let snap = clock.play_head().current();
        assert!(!snap.is_playing);
        assert!(snap.ppq_position >= 1);
    }
}
