//! Streaming WAV encoding for offline output.
//!
//! The offline contract supplies the total length up front, so the RIFF
//! sizes are exact when the header is written and the sink works on
//! non-seekable writers — a pipe to `aplay`, stdout redirected to a file.
//! (This is also why the sink does not go through `hound`: `WavWriter`
//! needs `Write + Seek` to patch sizes at the end.)

use std::io::{self, Write};

use tracing::{debug, warn};

use sq_common::{AudioSpec, FrameSink, SampleFormat};

/// WAV `fmt` tag for integer PCM.
const WAVE_FORMAT_PCM: u16 = 1;
/// WAV `fmt` tag for IEEE float.
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// Encodes interleaved `f64` frames into a RIFF/WAVE byte stream.
pub struct WavSink<W: Write> {
    writer: W,
    spec: Option<AudioSpec>,
    total_frames: u64,
    frames_written: u64,
}

impl<W: Write> WavSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            spec: None,
            total_frames: 0,
            frames_written: 0,
        }
    }

    /// Consume the sink, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self, spec: &AudioSpec, total_frames: u64) -> io::Result<()> {
        let channels = spec.channels as u32;
        let bytes_per_sample = spec.format.bytes_per_sample() as u32;
        let sample_rate = spec.freq.round() as u32;
        let block_align = channels * bytes_per_sample;
        let byte_rate = sample_rate * block_align;
        let data_size = (total_frames * block_align as u64) as u32;
        let format_tag = if spec.format.is_float() {
            WAVE_FORMAT_IEEE_FLOAT
        } else {
            WAVE_FORMAT_PCM
        };

        let w = &mut self.writer;
        w.write_all(b"RIFF")?;
        w.write_all(&(36 + data_size).to_le_bytes())?;
        w.write_all(b"WAVE")?;

        w.write_all(b"fmt ")?;
        w.write_all(&16u32.to_le_bytes())?;
        w.write_all(&format_tag.to_le_bytes())?;
        w.write_all(&(channels as u16).to_le_bytes())?;
        w.write_all(&sample_rate.to_le_bytes())?;
        w.write_all(&byte_rate.to_le_bytes())?;
        w.write_all(&(block_align as u16).to_le_bytes())?;
        w.write_all(&spec.format.bits_per_sample().to_le_bytes())?;

        w.write_all(b"data")?;
        w.write_all(&data_size.to_le_bytes())?;
        Ok(())
    }
}

impl<W: Write> FrameSink for WavSink<W> {
    fn start(&mut self, spec: &AudioSpec, total_frames: u64) -> io::Result<()> {
        if self.spec.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "WAV output already started",
            ));
        }
        self.write_header(spec, total_frames)?;
        self.spec = Some(*spec);
        self.total_frames = total_frames;
        debug!(%spec, frames = total_frames, "WAV header written");
        Ok(())
    }

    fn push(&mut self, interleaved: &[f64]) -> io::Result<()> {
        let spec = self.spec.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "WAV output not started")
        })?;

        let channels = spec.channels as usize;
        let frames = interleaved.len() / channels;
        if self.frames_written + frames as u64 > self.total_frames {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "more frames than the declared WAV length",
            ));
        }

        for &sample in interleaved {
            encode_sample(&mut self.writer, sample, spec.format)?;
        }
        self.frames_written += frames as u64;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.frames_written != self.total_frames {
            warn!(
                written = self.frames_written,
                declared = self.total_frames,
                "WAV closed short of its declared length"
            );
        }
        self.writer.flush()
    }
}

/// Encode one sample to its little-endian wire form.
///
/// Integer formats saturate from the clamped `[-1, 1]` range; unsigned
/// formats are offset binary.
fn encode_sample<W: Write>(w: &mut W, sample: f64, format: SampleFormat) -> io::Result<()> {
    let clamped = sample.clamp(-1.0, 1.0);
    match format {
        SampleFormat::U8 => {
            let v = ((clamped + 1.0) / 2.0 * 255.0).round() as u8;
            w.write_all(&[v])
        }
        SampleFormat::S8 => {
            let v = (clamped * 127.0).round() as i8;
            w.write_all(&v.to_le_bytes())
        }
        SampleFormat::U16 => {
            let v = ((clamped + 1.0) / 2.0 * 65535.0).round() as u16;
            w.write_all(&v.to_le_bytes())
        }
        SampleFormat::S16 => {
            let v = (clamped * 32767.0).round() as i16;
            w.write_all(&v.to_le_bytes())
        }
        SampleFormat::S32 => {
            let v = (clamped * 2_147_483_647.0).round() as i32;
            w.write_all(&v.to_le_bytes())
        }
        SampleFormat::F32 => w.write_all(&(clamped as f32).to_le_bytes()),
        SampleFormat::F64 => w.write_all(&clamped.to_le_bytes()),
    }
}
