//! Master clock: epoch discipline and the render-position counter.
//!
//! The render position is a relaxed atomic advanced exactly once per emitted
//! frame, in both modes — it is written only by whichever thread renders and
//! can be read by anyone. The mode lives behind a mutex that is touched only
//! by host-thread state transitions, never on the render path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use sq_common::Tz;

use crate::error::MixError;

/// Operating mode of the clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockState {
    /// No epoch yet; nothing renders.
    Unstarted,
    /// Realtime: the epoch is a wall-clock instant and `now` is derived
    /// from it.
    Realtime { epoch: Instant },
    /// Offline: `now` is the pure render counter, bounded by `total`.
    Offline { total: Tz },
    /// Terminal.
    TornDown,
}

pub struct MasterClock {
    freq: f64,
    state: Mutex<ClockState>,
    pos: AtomicU64,
}

impl MasterClock {
    pub fn new(freq: f64) -> Self {
        Self {
            freq,
            state: Mutex::new(ClockState::Unstarted),
            pos: AtomicU64::new(0),
        }
    }

    /// Enter realtime mode with the given epoch. Only valid once, from
    /// Unstarted.
    pub fn start_realtime(&self, epoch: Instant) -> Result<(), MixError> {
        let mut state = self.state.lock();
        match *state {
            ClockState::Unstarted => {
                *state = ClockState::Realtime { epoch };
                Ok(())
            }
            ClockState::TornDown => Err(MixError::State("mixer is torn down")),
            _ => Err(MixError::State("mixer already running")),
        }
    }

    /// Enter offline mode with a known total length. Only valid once, from
    /// Unstarted.
    pub fn start_offline(&self, total: Tz) -> Result<(), MixError> {
        let mut state = self.state.lock();
        match *state {
            ClockState::Unstarted => {
                *state = ClockState::Offline { total };
                Ok(())
            }
            ClockState::TornDown => Err(MixError::State("mixer is torn down")),
            _ => Err(MixError::State("mixer already running")),
        }
    }

    /// Terminal transition; idempotent.
    pub fn teardown(&self) {
        *self.state.lock() = ClockState::TornDown;
    }

    pub fn state(&self) -> ClockState {
        *self.state.lock()
    }

    pub fn is_torn_down(&self) -> bool {
        matches!(*self.state.lock(), ClockState::TornDown)
    }

    /// Total frame count of the offline render, when offline.
    pub fn offline_total(&self) -> Option<Tz> {
        match *self.state.lock() {
            ClockState::Offline { total } => Some(total),
            _ => None,
        }
    }

    /// Frames rendered since the epoch.
    pub fn render_pos(&self) -> Tz {
        Tz(self.pos.load(Ordering::Relaxed))
    }

    /// Advance the render position. Called once per emitted frame block by
    /// the rendering thread only.
    pub fn advance(&self, frames: u64) {
        self.pos.fetch_add(frames, Ordering::Relaxed);
    }

    /// The current mix position.
    ///
    /// Realtime mode derives it from the wall clock
    /// (`max(0, round((now - epoch) * freq))`), so fire expiry is observable
    /// even when no driver is pulling. Offline mode reports the render
    /// counter.
    pub fn now(&self) -> Tz {
        match *self.state.lock() {
            ClockState::Unstarted => Tz::ZERO,
            ClockState::Realtime { epoch } => {
                let elapsed = Instant::now()
                    .checked_duration_since(epoch)
                    .unwrap_or(Duration::ZERO);
                Tz::from_duration(elapsed, self.freq)
            }
            ClockState::Offline { .. } | ClockState::TornDown => self.render_pos(),
        }
    }

    /// `now` as a duration since the epoch.
    pub fn now_at(&self) -> Duration {
        self.now().as_duration(self.freq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unstarted_at_zero() {
        let clock = MasterClock::new(48000.0);
        assert_eq!(clock.state(), ClockState::Unstarted);
        assert_eq!(clock.now(), Tz::ZERO);
        assert_eq!(clock.render_pos(), Tz::ZERO);
    }

    #[test]
    fn offline_now_is_render_pos() {
        let clock = MasterClock::new(48000.0);
        clock.start_offline(Tz(48000)).unwrap();

        clock.advance(100);
        assert_eq!(clock.now(), Tz(100));
        clock.advance(1);
        assert_eq!(clock.now(), Tz(101));
    }

    #[test]
    fn double_start_is_state_error() {
        let clock = MasterClock::new(48000.0);
        clock.start_offline(Tz(10)).unwrap();
        assert!(matches!(
            clock.start_realtime(Instant::now()),
            Err(MixError::State(_))
        ));
        assert!(matches!(
            clock.start_offline(Tz(10)),
            Err(MixError::State(_))
        ));
    }

    #[test]
    fn start_after_teardown_is_state_error() {
        let clock = MasterClock::new(48000.0);
        clock.teardown();
        assert!(matches!(
            clock.start_realtime(Instant::now()),
            Err(MixError::State(_))
        ));
        assert!(clock.is_torn_down());
    }

    #[test]
    fn teardown_is_idempotent() {
        let clock = MasterClock::new(48000.0);
        clock.start_offline(Tz(10)).unwrap();
        clock.teardown();
        clock.teardown();
        assert!(clock.is_torn_down());
    }

    #[test]
    fn realtime_epoch_in_future_reports_zero() {
        let clock = MasterClock::new(48000.0);
        clock
            .start_realtime(Instant::now() + Duration::from_secs(60))
            .unwrap();
        assert_eq!(clock.now(), Tz::ZERO);
    }

    #[test]
    fn realtime_now_tracks_wall_clock() {
        let clock = MasterClock::new(48000.0);
        clock
            .start_realtime(Instant::now() - Duration::from_millis(100))
            .unwrap();
        let now = clock.now();
        // 100ms at 48kHz is 4800 frames; allow generous scheduling slack
        assert!(now.0 >= 4700, "now = {now}");
        assert!(now.0 < 48000, "now = {now}");
    }

    #[test]
    fn offline_total_accessor() {
        let clock = MasterClock::new(48000.0);
        assert_eq!(clock.offline_total(), None);
        clock.start_offline(Tz(123)).unwrap();
        assert_eq!(clock.offline_total(), Some(Tz(123)));
    }
}
