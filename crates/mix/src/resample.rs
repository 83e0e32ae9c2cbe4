//! Sample rate conversion using linear interpolation.
//!
//! Sources are converted to the mixer rate once, at load time, so the
//! conversion here is one-shot over a complete buffer rather than streaming.
//! Linear interpolation is the baseline; playback reads the converted buffer
//! directly afterwards, so load-time cost is the only cost.

/// Resample a complete interleaved buffer from `from_hz` to `to_hz`.
///
/// Output frame `k` reads the source at fractional position
/// `k * from_hz / to_hz` and linearly interpolates between the two adjacent
/// source frames (clamping at the final frame).
///
/// A same-rate conversion is an exact copy, which is what makes a
/// mixer-format source bit-identical to its file payload after loading.
pub fn resample_linear(input: &[f64], channels: usize, from_hz: f64, to_hz: f64) -> Vec<f64> {
    if channels == 0 || input.is_empty() {
        return Vec::new();
    }

    if (from_hz - to_hz).abs() < f64::EPSILON {
        return input.to_vec();
    }

    let in_frames = input.len() / channels;
    if in_frames == 0 {
        return Vec::new();
    }

    let out_frames = ((in_frames as f64) * to_hz / from_hz).round() as usize;
    let step = from_hz / to_hz;
    let mut output = Vec::with_capacity(out_frames * channels);

    for k in 0..out_frames {
        let pos = k as f64 * step;
        let idx = (pos as usize).min(in_frames - 1);
        let next = (idx + 1).min(in_frames - 1);
        let frac = pos - idx as f64;

        for c in 0..channels {
            let a = input[idx * channels + c];
            let b = input[next * channels + c];
            output.push(a + (b - a) * frac);
        }
    }

    output
}
