//! Capability traits at the engine boundary.
//!
//! The mixer core consumes a [`SourceLoader`] and an [`OutputDriver`]
//! (realtime) or a [`FrameSink`] (offline); concrete drivers live in the
//! `sq-io` crate. Selection happens at mixer construction — there is no
//! runtime string dispatch in the hot path.

use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::error::{DriverError, SourceLoadError};
use crate::types::AudioSpec;

/// A decoded audio file before conversion to the mixer spec.
///
/// Samples are interleaved `f64` normalized to `[-1, 1]` — loaders convert
/// integer PCM at the decode boundary. `spec` describes the *native* stream
/// (rate, channel count, and the encoding it was stored in).
#[derive(Clone, Debug)]
pub struct RawAudio {
    /// Interleaved samples at the native rate and channel count.
    pub samples: Vec<f64>,
    /// Native stream spec.
    pub spec: AudioSpec,
}

impl RawAudio {
    /// Number of frames in the buffer.
    pub fn frame_count(&self) -> usize {
        if self.spec.channels == 0 {
            return 0;
        }
        self.samples.len() / self.spec.channels as usize
    }
}

/// Decodes a source file into normalized samples.
///
/// Invoked by the source cache on first reference to a key, always from a
/// host thread — never from the audio callback.
pub trait SourceLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<RawAudio, SourceLoadError>;
}

/// The engine side of the realtime contract: something a driver can pull
/// interleaved frames from.
///
/// `pull` runs on the audio thread. Implementations must not block or
/// allocate.
pub trait FrameSource: Send + Sync {
    /// The output spec frames are produced at.
    fn spec(&self) -> AudioSpec;

    /// Fill `out` (interleaved, `frames * channels` long) with the next
    /// frames of output.
    fn pull(&self, out: &mut [f32]);
}

/// A realtime output driver: binds a [`FrameSource`] and pulls from it on
/// its own callback thread once started.
pub trait OutputDriver {
    /// Bind the frame source the driver will pull from.
    fn bind(&mut self, source: Arc<dyn FrameSource>);

    /// Start pulling. Fails if no source is bound or the device is missing.
    fn start(&mut self) -> Result<(), DriverError>;

    /// Stop pulling and release the device.
    fn stop(&mut self);
}

/// An offline byte-stream sink: accepts a known-duration range of frames.
pub trait FrameSink {
    /// Begin output. `total_frames` is the exact number of frames that will
    /// be pushed; sinks that emit a header (WAV) derive their sizes from it.
    fn start(&mut self, spec: &AudioSpec, total_frames: u64) -> io::Result<()>;

    /// Encode and write interleaved `f64` frames.
    fn push(&mut self, interleaved: &[f64]) -> io::Result<()>;

    /// Finalize and flush the stream.
    fn close(&mut self) -> io::Result<()>;
}
