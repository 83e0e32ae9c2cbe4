//! The mix engine: scheduling, the per-sample pipeline, and operating modes.
//!
//! A [`Mixer`] owns its spec, source cache, fire store, clock, compressor
//! state, and driver binding — several independent mixers can coexist in one
//! process. The host thread schedules fires and drives mode transitions;
//! rendering happens either on the output driver's callback thread
//! (realtime) or synchronously inside `output_continue_to` (offline). Both
//! paths share one per-frame pipeline:
//!
//! ```text
//! fire store -> promote/retire -> sum (volume, pan) -> compressor -> out
//! ```
//!
//! The render path takes the fire-store lock once per block, never per
//! frame, and does not allocate after warm-up.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use sq_common::{AudioSpec, FrameSink, FrameSource, MixerConfig, OutputDriver, SourceLoader, Tz};

use crate::clock::{ClockState, MasterClock};
use crate::compressor::Compressor;
use crate::error::MixError;
use crate::fire::{FireId, FireState, FireStore};
use crate::source::SourceCache;
use crate::telemetry::Telemetry;

/// Frames rendered per chunk in offline mode.
const OFFLINE_CHUNK_FRAMES: u64 = 1024;

/// State owned by whichever thread renders. Guarded by its own mutex so the
/// host thread can schedule fires while a block is being mixed.
struct RenderState {
    compressor: Compressor,
    /// Sample index at which the next mix cycle (garbage collection) runs.
    next_cycle: u64,
    /// Scratch frame, `channels` wide.
    frame: Vec<f64>,
}

/// Everything shared between the host thread and the render thread.
struct EngineCore {
    spec: AudioSpec,
    cache: SourceCache,
    fires: Mutex<FireStore>,
    clock: MasterClock,
    render: Mutex<RenderState>,
    telemetry: Telemetry,
    /// Mix cycle period in frames.
    cycle_frames: AtomicU64,
}

impl EngineCore {
    /// Render `frames` frames from the current position, handing each
    /// finished frame to `emit`. Advances the render position by exactly
    /// `frames`.
    fn render_block(&self, frames: usize, mut emit: impl FnMut(&[f64])) {
        let channels = self.spec.channels as usize;
        let mut render = self.render.lock();
        let RenderState {
            compressor,
            next_cycle,
            frame,
        } = &mut *render;
        frame.resize(channels, 0.0);

        let mut fires = self.fires.lock();
        let cycle = self.cycle_frames.load(Ordering::Relaxed).max(1);
        let start = self.clock.render_pos().0;
        let mut block_peak = 0.0f64;

        for i in 0..frames {
            let t = Tz(start + i as u64);

            if t.0 >= *next_cycle {
                let collected = fires.collect_garbage(t);
                self.telemetry
                    .record_garbage_cycle(collected, fires.live_ids().len());
                *next_cycle = t.0 + cycle;
            }

            fires.promote_until(t);
            self.telemetry.record_live_count(fires.live_ids().len());

            frame.fill(0.0);
            if self.mix_frame_into(&mut fires, t, frame) {
                fires.compact_live();
            }

            let raw_peak = frame.iter().fold(0.0f64, |m, s| m.max(s.abs()));
            if raw_peak > 1.0 {
                self.telemetry.record_clipped_frame();
            }

            compressor.process(frame);
            block_peak = frame
                .iter()
                .fold(block_peak, |m, s| m.max(s.abs()));

            emit(frame);
        }

        fires.compact_live();
        drop(fires);

        self.telemetry.note_output_level(block_peak);
        self.telemetry.record_frames(frames as u64);
        self.clock.advance(frames as u64);
    }

    /// Sum every live fire's contribution at sample `t` into `sum`.
    ///
    /// Fires whose read offset has run past their source are retired here,
    /// which covers both `sustain = 0` (end derived from source length) and
    /// a sustain longer than the source. Returns whether any fire finished
    /// at this sample, so the caller can compact the live set.
    fn mix_frame_into(&self, fires: &mut FireStore, t: Tz, sum: &mut [f64]) -> bool {
        let mut any_finished = false;
        for idx in 0..fires.live_ids().len() {
            let id = fires.live_ids()[idx];
            let fire = match fires.get_mut(id) {
                Some(f) => f,
                None => continue,
            };

            if fire.end.0 <= t.0 {
                fire.state = FireState::Done;
                any_finished = true;
                continue;
            }

            // A fire can reach its begin before its source finished loading.
            // Emit silence for it rather than ever waiting on the cache.
            if fire.source.is_none() {
                fire.source = self.cache.try_get(&fire.source_key);
                if fire.source.is_none() {
                    if !fire.source_late {
                        fire.source_late = true;
                        self.telemetry.record_source_late(id, &fire.source_key);
                    }
                    continue;
                }
            }

            let offset = (t.0 - fire.begin.0) as usize;
            let (gain_l, gain_r) = fire.stereo_gains();
            let volume = fire.volume;
            let mut finished = false;

            if let Some(source) = fire.source.as_deref() {
                match source.frame_at(offset) {
                    Some(src_frame) => {
                        if sum.len() == 2 {
                            sum[0] += src_frame[0] * gain_l;
                            sum[1] += src_frame[1] * gain_r;
                        } else {
                            // Pan is ignored off-stereo: uniform gain.
                            for (out, s) in sum.iter_mut().zip(src_frame) {
                                *out += s * volume;
                            }
                        }
                    }
                    None => finished = true,
                }
            }

            if finished {
                fire.state = FireState::Done;
                any_finished = true;
            }
        }
        any_finished
    }
}

/// Engine handle handed to realtime drivers. Pulling renders the next block
/// on the caller's (audio) thread.
struct EngineHandle(Arc<EngineCore>);

impl FrameSource for EngineHandle {
    fn spec(&self) -> AudioSpec {
        self.0.spec
    }

    fn pull(&self, out: &mut [f32]) {
        let channels = self.0.spec.channels as usize;
        let frames = out.len() / channels;

        match self.0.clock.state() {
            ClockState::Realtime { epoch } => {
                // Before the epoch the mixer emits silence without advancing.
                if Instant::now() < epoch {
                    out.fill(0.0);
                    return;
                }
            }
            _ => {
                out.fill(0.0);
                return;
            }
        }

        let mut at = 0;
        self.0.render_block(frames, |frame| {
            for &s in frame {
                out[at] = s as f32;
                at += 1;
            }
        });
    }
}

/// A sequence-based mixer.
///
/// Construction is configuration: the spec is validated and the loader and
/// output driver are bound once, up front. The mixer then runs in exactly
/// one of two modes — realtime ([`start`](Self::start)) where the driver
/// pulls frames, or offline ([`output_start`](Self::output_start)) where the
/// host pushes a known-duration range into a sink.
pub struct Mixer {
    core: Arc<EngineCore>,
    driver: Box<dyn OutputDriver>,
    sink: Option<Box<dyn FrameSink>>,
}

impl Mixer {
    /// Create a mixer: validate the spec and bind the loader and driver.
    pub fn new(
        spec: AudioSpec,
        loader: Box<dyn SourceLoader>,
        driver: Box<dyn OutputDriver>,
    ) -> Result<Self, MixError> {
        spec.validate()?;

        let cycle_frames = spec.freq.round() as u64;
        let core = Arc::new(EngineCore {
            spec,
            cache: SourceCache::new(spec, loader),
            fires: Mutex::new(FireStore::new()),
            clock: MasterClock::new(spec.freq),
            render: Mutex::new(RenderState {
                compressor: Compressor::new(spec.freq),
                next_cycle: 0,
                frame: Vec::new(),
            }),
            telemetry: Telemetry::new(),
            cycle_frames: AtomicU64::new(cycle_frames),
        });

        info!(%spec, "Mixer configured");
        Ok(Self {
            core,
            driver,
            sink: None,
        })
    }

    /// Create a mixer from a full configuration: spec, mix-cycle period,
    /// and sounds path in one value.
    pub fn with_config(
        config: MixerConfig,
        loader: Box<dyn SourceLoader>,
        driver: Box<dyn OutputDriver>,
    ) -> Result<Self, MixError> {
        let mixer = Self::new(config.spec, loader, driver)?;
        mixer.set_mix_cycle_duration(config.cycle);
        mixer.core.cache.set_sounds_path(config.sounds_path);
        Ok(mixer)
    }

    /// The output spec this mixer renders at.
    pub fn spec(&self) -> &AudioSpec {
        &self.core.spec
    }

    /// Toggle verbose telemetry logging.
    pub fn debug(&self, on: bool) {
        self.core.telemetry.set_debug(on);
    }

    /// Counters and the FireLate/SourceLate event stream.
    pub fn telemetry(&self) -> &Telemetry {
        &self.core.telemetry
    }

    /// Prefix prepended to every source key before the loader is invoked.
    pub fn set_sounds_path(&self, prefix: &str) {
        self.core.cache.set_sounds_path(prefix);
    }

    /// Period of the mix cycle that retires finished fires.
    pub fn set_mix_cycle_duration(&self, d: Duration) {
        let frames = Tz::from_duration(d, self.core.spec.freq).0.max(1);
        self.core.cycle_frames.store(frames, Ordering::Relaxed);
    }

    /// Schedule a fire: `source_key` playing from `begin` for `sustain`
    /// (or the full source length when `sustain` is zero), at `volume` with
    /// stereo `pan`.
    ///
    /// The source is loaded (and converted) on this thread if it is not
    /// cached yet, so the audio thread never touches the loader. A begin
    /// already in the past is admitted at the current position and recorded
    /// as a `FireLate` telemetry event.
    pub fn set_fire(
        &self,
        source_key: &str,
        begin: Duration,
        sustain: Duration,
        volume: f64,
        pan: f64,
    ) -> Result<FireId, MixError> {
        if self.core.clock.is_torn_down() {
            return Err(MixError::State("mixer is torn down"));
        }

        let source = self.core.cache.get_or_load(source_key)?;
        let freq = self.core.spec.freq;

        let requested = Tz::from_duration(begin, freq);
        let length = if sustain > Duration::ZERO {
            Tz::from_duration(sustain, freq).0
        } else {
            source.frame_count() as u64
        };

        // Late-fire policy: admit at now, keeping the scheduled length.
        let now = self.core.clock.now();
        let admitted = if requested < now { now } else { requested };
        let end = admitted + length;

        let id = self.core.fires.lock().insert(
            source_key.to_string(),
            admitted,
            end,
            volume,
            pan,
            Some(source),
        );

        self.core.telemetry.record_fire_admitted();
        if admitted != requested {
            self.core.telemetry.record_fire_late(id, requested, admitted);
        }
        debug!(%id, key = source_key, begin = %admitted, end = %end, "Fire set");
        Ok(id)
    }

    /// Count of fires that are still pending or playing.
    pub fn fire_count(&self) -> usize {
        self.core.fires.lock().count_active(self.core.clock.now())
    }

    /// Remove every fire regardless of state. Idempotent.
    pub fn clear_all_fires(&self) {
        self.core.fires.lock().clear();
        debug!("All fires cleared");
    }

    /// Enter realtime mode with the epoch at the current instant.
    pub fn start(&mut self) -> Result<(), MixError> {
        self.start_at(Instant::now())
    }

    /// Enter realtime mode with an explicit (possibly future) epoch.
    ///
    /// The bound driver starts pulling immediately; frames before the epoch
    /// are silence.
    pub fn start_at(&mut self, epoch: Instant) -> Result<(), MixError> {
        // Bind and start the driver first: a pull before the clock is
        // running just produces silence, while the reverse order could
        // leave a running clock with no driver on failure.
        self.driver
            .bind(Arc::new(EngineHandle(Arc::clone(&self.core))));
        self.driver.start()?;

        if let Err(err) = self.core.clock.start_realtime(epoch) {
            self.driver.stop();
            return Err(err);
        }

        info!("Mixer running (realtime)");
        Ok(())
    }

    /// Current mix position as a duration since the epoch.
    pub fn get_now_at(&self) -> Duration {
        self.core.clock.now_at()
    }

    /// Enter offline mode: bind a sink and fix the total output length.
    pub fn output_start(
        &mut self,
        length: Duration,
        mut sink: Box<dyn FrameSink>,
    ) -> Result<(), MixError> {
        let total = Tz::from_duration(length, self.core.spec.freq);
        if self.core.clock.state() != ClockState::Unstarted {
            return Err(match self.core.clock.state() {
                ClockState::TornDown => MixError::State("mixer is torn down"),
                _ => MixError::State("mixer already running"),
            });
        }

        sink.start(&self.core.spec, total.0)?;
        self.core.clock.start_offline(total)?;
        self.sink = Some(sink);

        info!(frames = total.0, "Mixer running (offline)");
        Ok(())
    }

    /// Render and write frames up to `t` since the epoch (truncating to the
    /// frame below, and never past the total length).
    pub fn output_continue_to(&mut self, t: Duration) -> Result<(), MixError> {
        let target = Tz::from_duration_floor(t, self.core.spec.freq);
        self.render_offline_to(target)
    }

    /// Render any remainder of the fixed length, then finalize the sink.
    pub fn output_close(&mut self) -> Result<(), MixError> {
        let total = self
            .core
            .clock
            .offline_total()
            .ok_or(MixError::State("offline output not started"))?;
        self.render_offline_to(total)?;

        let mut sink = self
            .sink
            .take()
            .ok_or(MixError::State("offline output already closed"))?;
        sink.close()?;

        info!("Offline output closed");
        Ok(())
    }

    /// Render one frame and return it. This is the single-step primitive the
    /// per-frame contract is stated in terms of; drivers normally pull whole
    /// blocks instead.
    pub fn next_sample(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.core.spec.channels as usize];
        if self.core.clock.is_torn_down() {
            return out;
        }
        self.core.render_block(1, |frame| out.copy_from_slice(frame));
        out
    }

    /// The render position in frames (advances once per emitted frame).
    pub fn render_pos(&self) -> Tz {
        self.core.clock.render_pos()
    }

    /// Release everything: stop the driver, close any open sink, drop all
    /// fires and cached sources. Terminal and idempotent; every later
    /// operation fails with a state error.
    pub fn teardown(&mut self) {
        if self.core.clock.is_torn_down() {
            return;
        }
        // Stopping the driver first drains the audio thread to a block
        // boundary before buffers are released.
        self.driver.stop();
        if let Some(mut sink) = self.sink.take() {
            if let Err(err) = sink.close() {
                warn!(error = %err, "Sink close failed during teardown");
            }
        }
        self.core.fires.lock().clear();
        self.core.cache.flush();
        self.core.clock.teardown();
        info!("Mixer torn down");
    }

    fn render_offline_to(&mut self, target: Tz) -> Result<(), MixError> {
        let total = self
            .core
            .clock
            .offline_total()
            .ok_or(MixError::State("offline output not started"))?;
        let sink = self
            .sink
            .as_mut()
            .ok_or(MixError::State("offline output already closed"))?;

        let target = target.min(total);
        let channels = self.core.spec.channels as usize;
        let mut block = Vec::with_capacity(OFFLINE_CHUNK_FRAMES as usize * channels);

        let mut pos = self.core.clock.render_pos();
        while pos < target {
            let n = ((target.0 - pos.0).min(OFFLINE_CHUNK_FRAMES)) as usize;
            block.clear();
            self.core
                .render_block(n, |frame| block.extend_from_slice(frame));
            sink.push(&block)?;
            pos = self.core.clock.render_pos();
        }
        Ok(())
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sq_common::{DriverError, RawAudio, SampleFormat, SourceLoadError};
    use std::path::Path;

    /// Loader that synthesizes one second of constant-amplitude stereo.
    struct ConstLoader {
        amplitude: f64,
        frames: usize,
    }

    impl SourceLoader for ConstLoader {
        fn load(&self, _path: &Path) -> Result<RawAudio, SourceLoadError> {
            Ok(RawAudio {
                samples: vec![self.amplitude; self.frames * 2],
                spec: AudioSpec::new(48000.0, SampleFormat::F32, 2),
            })
        }
    }

    /// Driver that accepts a source and does nothing (no pull).
    struct IdleDriver;

    impl OutputDriver for IdleDriver {
        fn bind(&mut self, _source: Arc<dyn FrameSource>) {}
        fn start(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
        fn stop(&mut self) {}
    }

    fn test_mixer(amplitude: f64, frames: usize) -> Mixer {
        Mixer::new(
            AudioSpec::new(48000.0, SampleFormat::F32, 2),
            Box::new(ConstLoader { amplitude, frames }),
            Box::new(IdleDriver),
        )
        .unwrap()
    }

    #[test]
    fn invalid_spec_is_config_error() {
        let result = Mixer::new(
            AudioSpec::new(-1.0, SampleFormat::F32, 2),
            Box::new(ConstLoader {
                amplitude: 0.0,
                frames: 1,
            }),
            Box::new(IdleDriver),
        );
        assert!(matches!(result, Err(MixError::Config(_))));
    }

    #[test]
    fn clock_advances_by_one_per_next_sample() {
        let mixer = test_mixer(0.5, 100);
        assert_eq!(mixer.render_pos(), Tz(0));
        for i in 1..=10 {
            mixer.next_sample();
            assert_eq!(mixer.render_pos(), Tz(i));
        }
    }

    #[test]
    fn silence_with_no_fires() {
        let mixer = test_mixer(0.5, 100);
        for _ in 0..100 {
            let frame = mixer.next_sample();
            assert_eq!(frame, vec![0.0, 0.0]);
        }
    }

    #[test]
    fn silence_with_zero_volume_fire() {
        let mixer = test_mixer(0.5, 100);
        mixer
            .set_fire("c.wav", Duration::ZERO, Duration::ZERO, 0.0, 0.0)
            .unwrap();
        for _ in 0..50 {
            let frame = mixer.next_sample();
            assert_eq!(frame, vec![0.0, 0.0]);
        }
    }

    #[test]
    fn fire_plays_at_half_volume_transparently() {
        let mixer = test_mixer(0.5, 100);
        mixer
            .set_fire("c.wav", Duration::ZERO, Duration::ZERO, 1.0, 0.0)
            .unwrap();
        // 0.5 is inside the compressor's unity region: exact passthrough
        for _ in 0..100 {
            let frame = mixer.next_sample();
            assert_eq!(frame, vec![0.5, 0.5]);
        }
        // Past the source: silence again
        assert_eq!(mixer.next_sample(), vec![0.0, 0.0]);
    }

    #[test]
    fn superposition_before_compressor() {
        let mixer = test_mixer(0.5, 10);
        mixer
            .set_fire("c.wav", Duration::ZERO, Duration::ZERO, 0.5, 0.0)
            .unwrap();
        mixer
            .set_fire("c.wav", Duration::ZERO, Duration::ZERO, 0.5, 0.0)
            .unwrap();

        // Drive the summing stage directly: two half-volume copies equal the
        // source at full amplitude before any compression.
        let mut fires = mixer.core.fires.lock();
        fires.promote_until(Tz(0));
        let mut sum = vec![0.0; 2];
        mixer.core.mix_frame_into(&mut fires, Tz(0), &mut sum);
        assert!((sum[0] - 0.5).abs() < 1e-12);
        assert!((sum[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn doubled_fire_stays_under_ceiling() {
        let mixer = test_mixer(1.0, 100);
        mixer
            .set_fire("c.wav", Duration::ZERO, Duration::ZERO, 1.0, 0.0)
            .unwrap();
        mixer
            .set_fire("c.wav", Duration::ZERO, Duration::ZERO, 1.0, 0.0)
            .unwrap();
        for _ in 0..100 {
            let frame = mixer.next_sample();
            assert!(frame[0].abs() <= 1.0);
            assert!(frame[1].abs() <= 1.0);
        }
        assert!(mixer.telemetry().snapshot().clipped_frames > 0);
    }

    #[test]
    fn pan_hard_left_zeroes_right() {
        let mixer = test_mixer(0.5, 100);
        mixer
            .set_fire("c.wav", Duration::ZERO, Duration::ZERO, 1.0, -1.0)
            .unwrap();
        for _ in 0..100 {
            let frame = mixer.next_sample();
            assert_eq!(frame[0], 0.5);
            assert_eq!(frame[1], 0.0);
        }
    }

    #[test]
    fn sustain_truncates_source() {
        let mixer = test_mixer(0.5, 48000); // 1s source
        mixer
            .set_fire(
                "c.wav",
                Duration::ZERO,
                Duration::from_millis(500),
                1.0,
                0.0,
            )
            .unwrap();
        for _ in 0..24000 {
            assert_eq!(mixer.next_sample(), vec![0.5, 0.5]);
        }
        for _ in 0..100 {
            assert_eq!(mixer.next_sample(), vec![0.0, 0.0]);
        }
    }

    #[test]
    fn sustain_longer_than_source_goes_silent_at_source_end() {
        let mixer = test_mixer(0.5, 10);
        mixer
            .set_fire("c.wav", Duration::ZERO, Duration::from_secs(1), 1.0, 0.0)
            .unwrap();
        for _ in 0..10 {
            assert_eq!(mixer.next_sample(), vec![0.5, 0.5]);
        }
        assert_eq!(mixer.next_sample(), vec![0.0, 0.0]);
    }

    #[test]
    fn fire_count_and_clear() {
        let mixer = test_mixer(0.5, 100);
        mixer
            .set_fire("c.wav", Duration::from_secs(1), Duration::ZERO, 1.0, 0.0)
            .unwrap();
        mixer
            .set_fire("c.wav", Duration::from_secs(2), Duration::ZERO, 1.0, 0.0)
            .unwrap();
        assert_eq!(mixer.fire_count(), 2);

        mixer.clear_all_fires();
        assert_eq!(mixer.fire_count(), 0);
        mixer.clear_all_fires();
        assert_eq!(mixer.fire_count(), 0);
    }

    #[test]
    fn set_fire_after_teardown_is_state_error() {
        let mut mixer = test_mixer(0.5, 100);
        mixer.teardown();
        let result = mixer.set_fire("c.wav", Duration::ZERO, Duration::ZERO, 1.0, 0.0);
        assert!(matches!(result, Err(MixError::State(_))));
    }

    #[test]
    fn teardown_is_idempotent_and_releases() {
        let mut mixer = test_mixer(0.5, 100);
        mixer
            .set_fire("c.wav", Duration::ZERO, Duration::ZERO, 1.0, 0.0)
            .unwrap();
        mixer.teardown();
        mixer.teardown();
        assert_eq!(mixer.fire_count(), 0);
    }

    #[test]
    fn offline_ops_require_output_start() {
        let mut mixer = test_mixer(0.5, 100);
        assert!(matches!(
            mixer.output_continue_to(Duration::from_secs(1)),
            Err(MixError::State(_))
        ));
        assert!(matches!(mixer.output_close(), Err(MixError::State(_))));
    }

    #[test]
    fn realtime_then_offline_is_state_error() {
        struct NullSink;
        impl FrameSink for NullSink {
            fn start(&mut self, _spec: &AudioSpec, _total: u64) -> std::io::Result<()> {
                Ok(())
            }
            fn push(&mut self, _frames: &[f64]) -> std::io::Result<()> {
                Ok(())
            }
            fn close(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut mixer = test_mixer(0.5, 100);
        mixer.start().unwrap();
        let result = mixer.output_start(Duration::from_secs(1), Box::new(NullSink));
        assert!(matches!(result, Err(MixError::State(_))));
    }

    #[test]
    fn late_fire_is_admitted_at_now_with_telemetry() {
        let mut mixer = test_mixer(0.5, 4800);
        mixer
            .start_at(Instant::now() - Duration::from_millis(100))
            .unwrap();

        // Scheduled 50ms ago relative to the epoch
        let id = mixer
            .set_fire("c.wav", Duration::from_millis(50), Duration::ZERO, 1.0, 0.0)
            .unwrap();

        let snap = mixer.telemetry().snapshot();
        assert_eq!(snap.fires_late, 1);

        let events = mixer.telemetry().drain_events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            crate::telemetry::TelemetryEvent::FireLate {
                id: event_id,
                requested,
                admitted,
            } => {
                assert_eq!(*event_id, id);
                assert!(admitted > requested);
            }
            other => panic!("Expected FireLate, got {other:?}"),
        }

        // Admitted, so it still counts as scheduled
        assert_eq!(mixer.fire_count(), 1);
    }

    #[test]
    fn on_time_fire_has_no_late_event() {
        let mixer = test_mixer(0.5, 100);
        mixer
            .set_fire("c.wav", Duration::from_secs(1), Duration::ZERO, 1.0, 0.0)
            .unwrap();
        assert_eq!(mixer.telemetry().snapshot().fires_late, 0);
        assert!(mixer.telemetry().drain_events().is_empty());
    }

    #[test]
    fn garbage_cycle_collects_done_fires() {
        let mixer = test_mixer(0.5, 10);
        mixer.set_mix_cycle_duration(Duration::from_millis(1));
        mixer
            .set_fire("c.wav", Duration::ZERO, Duration::ZERO, 1.0, 0.0)
            .unwrap();

        // Play out the 10-frame source, then keep rendering past a cycle
        for _ in 0..200 {
            mixer.next_sample();
        }
        assert_eq!(mixer.fire_count(), 0);
        assert_eq!(mixer.core.fires.lock().len(), 0);
        assert!(mixer.telemetry().snapshot().garbage_cycles > 0);
    }

    #[test]
    fn missing_source_fails_set_fire() {
        struct NotFoundLoader;
        impl SourceLoader for NotFoundLoader {
            fn load(&self, path: &Path) -> Result<RawAudio, SourceLoadError> {
                Err(SourceLoadError::NotFound(path.display().to_string()))
            }
        }

        let mixer = Mixer::new(
            AudioSpec::new(48000.0, SampleFormat::F32, 2),
            Box::new(NotFoundLoader),
            Box::new(IdleDriver),
        )
        .unwrap();

        let result = mixer.set_fire("gone.wav", Duration::ZERO, Duration::ZERO, 1.0, 0.0);
        assert!(matches!(result, Err(MixError::SourceLoad { .. })));
        assert_eq!(mixer.fire_count(), 0);
    }

    #[test]
    fn get_now_at_is_zero_before_start() {
        let mixer = test_mixer(0.5, 100);
        assert_eq!(mixer.get_now_at(), Duration::ZERO);
    }

    #[test]
    fn with_config_applies_cycle_and_path() {
        struct PathCheck;
        impl SourceLoader for PathCheck {
            fn load(&self, path: &Path) -> Result<RawAudio, SourceLoadError> {
                assert!(path.starts_with("sound/808"));
                Ok(RawAudio {
                    samples: vec![0.0; 4],
                    spec: AudioSpec::new(48000.0, SampleFormat::F32, 2),
                })
            }
        }

        let config = MixerConfig {
            spec: AudioSpec::new(48000.0, SampleFormat::F32, 2),
            cycle: Duration::from_millis(250),
            sounds_path: "sound/808".into(),
        };
        let mixer =
            Mixer::with_config(config, Box::new(PathCheck), Box::new(IdleDriver)).unwrap();

        assert_eq!(mixer.core.cycle_frames.load(Ordering::Relaxed), 12000);
        mixer
            .set_fire("kick1.wav", Duration::ZERO, Duration::ZERO, 1.0, 0.0)
            .unwrap();
    }
}
