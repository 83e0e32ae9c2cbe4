//! Keyed source cache with load-time format conversion.
//!
//! A source is decoded once, converted to the mixer spec (rate, channels),
//! and then shared immutably as an [`Arc<Source>`]. First load for a key is
//! single-flight: concurrent requests for the same key wait for the one
//! in-progress decode instead of decoding twice. Populated reads take only a
//! read lock, which is what the audio thread's [`try_get`](SourceCache::try_get)
//! relies on.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::debug;

use sq_common::{AudioSpec, SourceLoadError, SourceLoader};
#[cfg(test)]
use sq_common::RawAudio;

use crate::error::MixError;
use crate::resample::resample_linear;

/// A fully-decoded, mixer-format, in-memory buffer of frames.
#[derive(Debug)]
pub struct Source {
    /// Cache key (path relative to the sounds path).
    pub key: String,
    /// Interleaved samples at the mixer rate and channel count.
    pub frames: Vec<f64>,
    /// Channel count of `frames` (equals the mixer spec's).
    pub channels: u16,
    /// The spec the file was stored in, before conversion.
    pub native_spec: AudioSpec,
}

impl Source {
    /// Number of frames in the converted buffer.
    pub fn frame_count(&self) -> usize {
        self.frames.len() / self.channels.max(1) as usize
    }

    /// The frame at `offset`, or `None` past the end.
    pub fn frame_at(&self, offset: usize) -> Option<&[f64]> {
        let ch = self.channels as usize;
        let start = offset * ch;
        self.frames.get(start..start + ch)
    }
}

/// Keyed store mapping a path string to a converted in-memory source.
pub struct SourceCache {
    spec: AudioSpec,
    loader: Box<dyn SourceLoader>,
    sounds_path: RwLock<PathBuf>,
    loaded: RwLock<HashMap<String, Arc<Source>>>,
    inflight: Mutex<HashSet<String>>,
    inflight_done: Condvar,
}

impl SourceCache {
    pub fn new(spec: AudioSpec, loader: Box<dyn SourceLoader>) -> Self {
        Self {
            spec,
            loader,
            sounds_path: RwLock::new(PathBuf::new()),
            loaded: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashSet::new()),
            inflight_done: Condvar::new(),
        }
    }

    /// Set the prefix prepended to every key before the loader sees it.
    pub fn set_sounds_path(&self, prefix: impl Into<PathBuf>) {
        *self.sounds_path.write() = prefix.into();
    }

    /// Non-blocking lookup of an already-populated source.
    ///
    /// This is the only cache entry point the audio thread uses.
    pub fn try_get(&self, key: &str) -> Option<Arc<Source>> {
        self.loaded.read().get(key).cloned()
    }

    /// Fetch a source, invoking the loader on first reference.
    ///
    /// At most one decode per key runs at a time; concurrent callers for the
    /// same key block until it completes and then share the result. Failed
    /// loads are not negative-cached — the next request retries.
    pub fn get_or_load(&self, key: &str) -> Result<Arc<Source>, MixError> {
        if let Some(source) = self.try_get(key) {
            return Ok(source);
        }

        // Claim the key, or wait out another thread's in-progress load.
        {
            let mut inflight = self.inflight.lock();
            loop {
                if let Some(source) = self.try_get(key) {
                    return Ok(source);
                }
                if inflight.insert(key.to_string()) {
                    break;
                }
                self.inflight_done.wait(&mut inflight);
            }
        }

        let result = self.load_and_convert(key);

        let mut inflight = self.inflight.lock();
        inflight.remove(key);
        if let Ok(ref source) = result {
            self.loaded
                .write()
                .insert(key.to_string(), Arc::clone(source));
        }
        self.inflight_done.notify_all();
        drop(inflight);

        result.map_err(|source| MixError::SourceLoad {
            key: key.to_string(),
            source,
        })
    }

    /// Number of populated sources.
    pub fn len(&self) -> usize {
        self.loaded.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.read().is_empty()
    }

    /// Drop every cached source.
    pub fn flush(&self) {
        self.loaded.write().clear();
    }

    fn load_and_convert(&self, key: &str) -> Result<Arc<Source>, SourceLoadError> {
        let path = self.sounds_path.read().join(key);
        let raw = self.loader.load(&path)?;

        if !raw.spec.freq.is_finite() || raw.spec.freq <= 0.0 {
            return Err(SourceLoadError::SpecInvalid(format!(
                "{key}: source frequency {} Hz",
                raw.spec.freq
            )));
        }
        if raw.spec.channels == 0 {
            return Err(SourceLoadError::SpecInvalid(format!(
                "{key}: source has no channels"
            )));
        }

        let native_spec = raw.spec;
        let resampled = resample_linear(
            &raw.samples,
            native_spec.channels as usize,
            native_spec.freq,
            self.spec.freq,
        );
        let frames = map_channels(
            &resampled,
            native_spec.channels as usize,
            self.spec.channels as usize,
        );

        debug!(
            key = key,
            native = %native_spec,
            frames = frames.len() / self.spec.channels as usize,
            "Loaded source"
        );

        Ok(Arc::new(Source {
            key: key.to_string(),
            frames,
            channels: self.spec.channels,
            native_spec,
        }))
    }
}

/// Convert an interleaved buffer between channel counts.
///
/// Mono fans out to every output channel; stereo folds to mono by averaging;
/// stereo into a wider layout lands in channels 0 and 1 with the rest zeroed.
/// Other layouts copy the channels they share and zero-fill the remainder.
fn map_channels(input: &[f64], from: usize, to: usize) -> Vec<f64> {
    if from == to || from == 0 || to == 0 {
        return input.to_vec();
    }

    let frames = input.len() / from;
    let mut output = Vec::with_capacity(frames * to);

    for frame in input.chunks_exact(from) {
        match (from, to) {
            (1, _) => {
                for _ in 0..to {
                    output.push(frame[0]);
                }
            }
            (_, 1) => {
                let sum: f64 = frame.iter().sum();
                output.push(sum / from as f64);
            }
            (2, _) => {
                output.push(frame[0]);
                output.push(frame[1]);
                for _ in 2..to {
                    output.push(0.0);
                }
            }
            _ => {
                for c in 0..to {
                    output.push(if c < from { frame[c] } else { 0.0 });
                }
            }
        }
    }

    output
}
