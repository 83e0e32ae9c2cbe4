//! Loudness-normalizing dynamic range compression.
//!
//! The summed mix can exceed full scale whenever several fires overlap, so
//! every output frame passes through a compressor before it leaves the
//! engine. A single envelope follower (shared across channels) tracks the
//! per-frame peak with attack/release smoothing; the gain derived from it is
//! unity below the knee and falls off smoothly above it, so quiet material
//! passes through untouched while dense sections are pulled into range
//! without hard clipping. A final instantaneous stage bounds attack
//! transients, keeping `|y| <= 1` unconditionally.

use std::time::Duration;

/// Below this level the mapping is exactly unity. `1/phi`, which leaves a
/// single full-volume source at half scale completely untouched.
const KNEE: f64 = 0.618_033_988_749_894_9;

/// Default envelope attack time constant.
pub const DEFAULT_ATTACK: Duration = Duration::from_millis(10);

/// Default envelope release time constant.
pub const DEFAULT_RELEASE: Duration = Duration::from_millis(100);

/// Per-mixer compressor state.
#[derive(Clone, Debug)]
pub struct Compressor {
    /// Smoothed peak estimate of the summed signal.
    envelope: f64,
    attack_alpha: f64,
    release_alpha: f64,
}

impl Compressor {
    /// Compressor with default time constants at the given sample rate.
    pub fn new(freq: f64) -> Self {
        Self::with_times(freq, DEFAULT_ATTACK, DEFAULT_RELEASE)
    }

    /// Compressor with explicit attack/release time constants.
    pub fn with_times(freq: f64, attack: Duration, release: Duration) -> Self {
        Self {
            envelope: 0.0,
            attack_alpha: alpha(attack, freq),
            release_alpha: alpha(release, freq),
        }
    }

    /// Compress one frame in place.
    pub fn process(&mut self, frame: &mut [f64]) {
        let peak = frame.iter().fold(0.0f64, |m, s| m.max(s.abs()));

        let a = if peak > self.envelope {
            self.attack_alpha
        } else {
            self.release_alpha
        };
        self.envelope += a * (peak - self.envelope);

        let gain = gain_for(self.envelope);
        for s in frame.iter_mut() {
            *s = soft_limit(*s * gain);
        }
    }

    /// Current smoothed gain (1.0 at rest and under quiet input).
    pub fn gain(&self) -> f64 {
        gain_for(self.envelope)
    }
}

/// Per-sample smoothing coefficient for a time constant:
/// `alpha = 1 - exp(-1 / (tau * freq))`.
fn alpha(tau: Duration, freq: f64) -> f64 {
    let tau_samples = tau.as_secs_f64() * freq;
    if tau_samples <= 0.0 {
        return 1.0;
    }
    1.0 - (-1.0 / tau_samples).exp()
}

/// Gain for a given envelope level: unity up to the knee, then the knee
/// curve's level divided by the input level.
fn gain_for(envelope: f64) -> f64 {
    if envelope <= KNEE {
        1.0
    } else {
        soft_limit(envelope) / envelope
    }
}

/// Smooth bounded transfer curve: identity below the knee, saturating above
/// it, always strictly inside `(-1, 1)`.
fn soft_limit(x: f64) -> f64 {
    let mag = x.abs();
    if mag <= KNEE {
        x
    } else {
        let span = 1.0 - KNEE;
        x.signum() * (KNEE + span * ((mag - KNEE) / span).tanh())
    }
}
