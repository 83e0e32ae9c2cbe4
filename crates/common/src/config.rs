//! Mixer configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{AudioSpec, SampleFormat};

/// Top-level mixer configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MixerConfig {
    /// Output format the mixer renders at.
    pub spec: AudioSpec,
    /// Period of the background mix cycle that retires finished fires.
    pub cycle: Duration,
    /// Prefix prepended to every source key before the loader is invoked.
    pub sounds_path: PathBuf,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            spec: AudioSpec::new(48000.0, SampleFormat::F32, 2),
            cycle: Duration::from_secs(1),
            sounds_path: PathBuf::new(),
        }
    }
}
