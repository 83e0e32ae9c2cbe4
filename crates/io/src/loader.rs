//! Source file decoding via Symphonia.
//!
//! Decodes an entire audio file into interleaved samples normalized to
//! `[-1, 1]`. Sources are fully loaded at schedule time — the mixer never
//! streams from disk during playback — so this loader always decodes to the
//! end of the stream.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use sq_common::{AudioSpec, RawAudio, SampleFormat, SourceLoadError, SourceLoader};

/// Symphonia-backed loader for WAV, MP3, AAC, FLAC, and Vorbis sources.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaLoader;

impl SymphoniaLoader {
    pub fn new() -> Self {
        Self
    }
}

impl SourceLoader for SymphoniaLoader {
    fn load(&self, path: &Path) -> Result<RawAudio, SourceLoadError> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SourceLoadError::NotFound(path.display().to_string())
            } else {
                SourceLoadError::Io(e)
            }
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Hint the probe with the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| SourceLoadError::Decode(format!("probe failed: {e}")))?;

        let mut reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.channels.is_some())
            .ok_or_else(|| SourceLoadError::Decode("no audio track".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| SourceLoadError::SpecInvalid("no sample rate".to_string()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| SourceLoadError::SpecInvalid("no channel info".to_string()))?;
        let native_format = native_sample_format(&codec_params);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| SourceLoadError::Decode(format!("codec init failed: {e}")))?;

        let mut samples: Vec<f64> = Vec::new();

        loop {
            let packet = match reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => return Err(SourceLoadError::Decode(format!("{e}"))),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    warn!(path = %path.display(), error = %msg, "Skipping corrupted packet");
                    continue;
                }
                Err(e) => return Err(SourceLoadError::Decode(format!("{e}"))),
            };

            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend(sample_buf.samples().iter().map(|&s| s as f64));
        }

        debug!(
            path = %path.display(),
            sample_rate,
            channels,
            frames = samples.len() / channels as usize,
            "Decoded source"
        );

        Ok(RawAudio {
            samples,
            spec: AudioSpec::new(sample_rate as f64, native_format, channels),
        })
    }
}

/// Best-effort mapping of the stream's stored encoding, defaulting to the
/// f32 the decoder hands back.
fn native_sample_format(params: &symphonia::core::codecs::CodecParameters) -> SampleFormat {
    use symphonia::core::codecs;

    match params.codec {
        c if c == codecs::CODEC_TYPE_PCM_U8 => SampleFormat::U8,
        c if c == codecs::CODEC_TYPE_PCM_S8 => SampleFormat::S8,
        c if c == codecs::CODEC_TYPE_PCM_S16LE => SampleFormat::S16,
        c if c == codecs::CODEC_TYPE_PCM_S32LE => SampleFormat::S32,
        c if c == codecs::CODEC_TYPE_PCM_F32LE => SampleFormat::F32,
        c if c == codecs::CODEC_TYPE_PCM_F64LE => SampleFormat::F64,
        _ => SampleFormat::F32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let loader = SymphoniaLoader::new();
        let result = loader.load(Path::new("/nonexistent/sounds/kick1.wav"));
        match result {
            Err(SourceLoadError::NotFound(path)) => assert!(path.contains("kick1.wav")),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let dir = std::env::temp_dir();
        let path = dir.join("sq_io_loader_garbage_test.wav");
        std::fs::write(&path, b"definitely not audio data").unwrap();

        let loader = SymphoniaLoader::new();
        let result = loader.load(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(SourceLoadError::Decode(_))));
    }

    #[test]
    fn pcm_format_mapping() {
        use symphonia::core::codecs::{CodecParameters, CODEC_TYPE_PCM_S16LE};
        let mut params = CodecParameters::new();
        params.for_codec(CODEC_TYPE_PCM_S16LE);
        assert_eq!(native_sample_format(&params), SampleFormat::S16);
    }
}
