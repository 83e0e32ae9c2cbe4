//! CPAL-backed realtime output driver.
//!
//! The driver owns the CPAL stream and pulls frames from the bound
//! [`FrameSource`] inside the audio callback. The callback never blocks or
//! allocates: mixing happens in the source's pull, straight into CPAL's
//! buffer, and when the driver is stopped the callback fills silence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tracing::{debug, error, info};

use sq_common::{DriverError, FrameSource, OutputDriver};

/// Realtime output through the default CPAL device.
#[derive(Default)]
pub struct CpalDriver {
    stream: Option<Stream>,
    source: Option<Arc<dyn FrameSource>>,
    playing: Arc<AtomicBool>,
}

impl CpalDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputDriver for CpalDriver {
    fn bind(&mut self, source: Arc<dyn FrameSource>) {
        self.source = Some(source);
    }

    fn start(&mut self) -> Result<(), DriverError> {
        let source = self.source.clone().ok_or(DriverError::NotBound)?;
        let spec = source.spec();

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(DriverError::NoDevice)?;

        info!(
            device = device
                .name()
                .unwrap_or_else(|_| "unknown".to_string())
                .as_str(),
            "Using audio output device"
        );

        let config = StreamConfig {
            channels: spec.channels,
            sample_rate: SampleRate(spec.freq.round() as u32),
            buffer_size: cpal::BufferSize::Default,
        };

        let playing = Arc::clone(&self.playing);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Audio thread: pull straight into CPAL's buffer.
                    if playing.load(Ordering::Relaxed) {
                        source.pull(data);
                    } else {
                        data.fill(0.0);
                    }
                },
                move |err| {
                    error!(error = %err, "Audio output stream error");
                },
                None,
            )
            .map_err(|e| DriverError::StreamBuild(format!("{e}")))?;

        stream
            .play()
            .map_err(|e| DriverError::StreamPlay(format!("{e}")))?;
        self.playing.store(true, Ordering::Relaxed);
        self.stream = Some(stream);

        debug!(
            sample_rate = spec.freq,
            channels = spec.channels,
            "Audio output stream started"
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.playing.store(false, Ordering::Relaxed);
        // Dropping the stream stops the callback thread.
        self.stream = None;
        debug!("Audio output stream stopped");
    }
}

// CPAL streams are not Send on every backend; the driver is owned and
// operated by the host thread, which is how the mixer uses it.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_without_bind_is_not_bound() {
        let mut driver = CpalDriver::new();
        // No source bound: must fail before touching any device.
        assert!(matches!(driver.start(), Err(DriverError::NotBound)));
    }

    #[test]
    fn stop_without_start_is_a_noop() {
        let mut driver = CpalDriver::new();
        driver.stop();
        assert!(!driver.playing.load(Ordering::Relaxed));
    }

    // NOTE: starting a real stream needs an output device; that path is
    // exercised by running the demo, not by unit tests.
}
