//! `sq-io` — Boundary drivers for the SeqMix mixer.
//!
//! The engine consumes the `sq-common` traits; this crate provides the
//! concrete implementations:
//!
//! - **Loading**: [`SymphoniaLoader`] decodes WAV, MP3, AAC, FLAC, Vorbis
//! - **Realtime output**: [`CpalDriver`] pulls frames from the engine on the
//!   CPAL audio callback
//! - **Null output**: [`NullDriver`] for headless operation
//! - **Offline output**: [`WavSink`] streams RIFF/WAVE bytes to any writer

pub mod cpal_driver;
pub mod loader;
pub mod null_driver;
pub mod wav;

// Re-export primary types at crate root for convenience
pub use cpal_driver::CpalDriver;
pub use loader::SymphoniaLoader;
pub use null_driver::NullDriver;
pub use wav::WavSink;
