//! Mix telemetry: wait-free counters, peak tracking, and an event stream.
//!
//! Everything here is updatable from the audio thread without blocking:
//! counters are relaxed atomics, the peak is a compare-exchange loop over
//! f64 bits, and events go through a bounded channel with `try_send` (full
//! channel drops the event rather than stalling the render).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::debug;

use sq_common::Tz;

use crate::fire::FireId;

/// Capacity of the event channel. Events past this are counted but dropped.
const EVENT_BUFFER: usize = 256;

/// Informational events on the mix path. Never fatal (spec: the audio
/// thread substitutes silence and carries on).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// A fire was scheduled with a begin already in the past and admitted
    /// at the current position instead.
    FireLate {
        id: FireId,
        requested: Tz,
        admitted: Tz,
    },
    /// A fire reached its begin before its source finished loading;
    /// silence was emitted in its place.
    SourceLate { id: FireId, key: String },
}

/// Counters and event plumbing for one mixer.
pub struct Telemetry {
    debug: AtomicBool,
    frames_rendered: AtomicU64,
    fires_admitted: AtomicU64,
    fires_late: AtomicU64,
    sources_late: AtomicU64,
    garbage_cycles: AtomicU64,
    clipped_frames: AtomicU64,
    /// Highest number of simultaneously-live fires seen.
    live_peak: AtomicU64,
    /// Highest post-compressor output magnitude, stored as f64 bits.
    peak_bits: AtomicU64,
    events_tx: Sender<TelemetryEvent>,
    events_rx: Receiver<TelemetryEvent>,
}

/// Point-in-time copy of the counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub frames_rendered: u64,
    pub fires_admitted: u64,
    pub fires_late: u64,
    pub sources_late: u64,
    pub garbage_cycles: u64,
    pub clipped_frames: u64,
    pub live_peak: u64,
    pub output_peak: f64,
}

impl Telemetry {
    pub fn new() -> Self {
        let (events_tx, events_rx) = bounded(EVENT_BUFFER);
        Self {
            debug: AtomicBool::new(false),
            frames_rendered: AtomicU64::new(0),
            fires_admitted: AtomicU64::new(0),
            fires_late: AtomicU64::new(0),
            sources_late: AtomicU64::new(0),
            garbage_cycles: AtomicU64::new(0),
            clipped_frames: AtomicU64::new(0),
            live_peak: AtomicU64::new(0),
            peak_bits: AtomicU64::new(0.0f64.to_bits()),
            events_tx,
            events_rx,
        }
    }

    /// Toggle verbose telemetry logging.
    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::Relaxed);
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn record_frames(&self, n: u64) {
        self.frames_rendered.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_fire_admitted(&self) {
        self.fires_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fire_late(&self, id: FireId, requested: Tz, admitted: Tz) {
        self.fires_late.fetch_add(1, Ordering::Relaxed);
        self.emit(TelemetryEvent::FireLate {
            id,
            requested,
            admitted,
        });
        debug!(%id, %requested, %admitted, "Fire scheduled in the past, admitted at now");
    }

    pub fn record_source_late(&self, id: FireId, key: &str) {
        self.sources_late.fetch_add(1, Ordering::Relaxed);
        self.emit(TelemetryEvent::SourceLate {
            id,
            key: key.to_string(),
        });
    }

    pub fn record_garbage_cycle(&self, collected: usize, live: usize) {
        self.garbage_cycles.fetch_add(1, Ordering::Relaxed);
        let live = live as u64;
        self.live_peak.fetch_max(live, Ordering::Relaxed);
        if self.is_debug() {
            debug!(collected, live, "Mix cycle");
        }
    }

    pub fn record_live_count(&self, live: usize) {
        self.live_peak.fetch_max(live as u64, Ordering::Relaxed);
    }

    pub fn record_clipped_frame(&self) {
        self.clipped_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Track the running output peak (post-compressor).
    pub fn note_output_level(&self, magnitude: f64) {
        let mut current = self.peak_bits.load(Ordering::Relaxed);
        while magnitude > f64::from_bits(current) {
            match self.peak_bits.compare_exchange_weak(
                current,
                magnitude.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen) => current = seen,
            }
        }
    }

    /// Drain all pending events.
    pub fn drain_events(&self) -> Vec<TelemetryEvent> {
        self.events_rx.try_iter().collect()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            fires_admitted: self.fires_admitted.load(Ordering::Relaxed),
            fires_late: self.fires_late.load(Ordering::Relaxed),
            sources_late: self.sources_late.load(Ordering::Relaxed),
            garbage_cycles: self.garbage_cycles.load(Ordering::Relaxed),
            clipped_frames: self.clipped_frames.load(Ordering::Relaxed),
            live_peak: self.live_peak.load(Ordering::Relaxed),
            output_peak: f64::from_bits(self.peak_bits.load(Ordering::Relaxed)),
        }
    }

    fn emit(&self, event: TelemetryEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) | Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let telemetry = Telemetry::new();
        assert_eq!(telemetry.snapshot(), TelemetrySnapshot::default());
    }

    #[test]
    fn fire_late_counts_and_emits() {
        let telemetry = Telemetry::new();
        telemetry.record_fire_late(FireId(7), Tz(100), Tz(250));

        let snap = telemetry.snapshot();
        assert_eq!(snap.fires_late, 1);

        let events = telemetry.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            TelemetryEvent::FireLate {
                id: FireId(7),
                requested: Tz(100),
                admitted: Tz(250),
            }
        );

        // Drained: nothing left
        assert!(telemetry.drain_events().is_empty());
    }

    #[test]
    fn source_late_event_carries_key() {
        let telemetry = Telemetry::new();
        telemetry.record_source_late(FireId(1), "kick1.wav");
        let events = telemetry.drain_events();
        assert_eq!(
            events[0],
            TelemetryEvent::SourceLate {
                id: FireId(1),
                key: "kick1.wav".to_string(),
            }
        );
    }

    #[test]
    fn full_event_buffer_drops_instead_of_blocking() {
        let telemetry = Telemetry::new();
        for i in 0..(EVENT_BUFFER as u64 + 50) {
            telemetry.record_fire_late(FireId(i), Tz(0), Tz(1));
        }
        // Every late fire is counted even when the event was dropped
        assert_eq!(telemetry.snapshot().fires_late, EVENT_BUFFER as u64 + 50);
        assert_eq!(telemetry.drain_events().len(), EVENT_BUFFER);
    }

    #[test]
    fn output_peak_is_monotonic_max() {
        let telemetry = Telemetry::new();
        telemetry.note_output_level(0.4);
        telemetry.note_output_level(0.9);
        telemetry.note_output_level(0.2);
        assert!((telemetry.snapshot().output_peak - 0.9).abs() < 1e-12);
    }

    #[test]
    fn live_peak_tracks_maximum() {
        let telemetry = Telemetry::new();
        telemetry.record_live_count(3);
        telemetry.record_live_count(10);
        telemetry.record_live_count(5);
        assert_eq!(telemetry.snapshot().live_peak, 10);
    }

    #[test]
    fn debug_flag_toggles() {
        let telemetry = Telemetry::new();
        assert!(!telemetry.is_debug());
        telemetry.set_debug(true);
        assert!(telemetry.is_debug());
        telemetry.set_debug(false);
        assert!(!telemetry.is_debug());
    }
}
