//! `sq-common` — Shared types, traits, and errors for the SeqMix mixer.
//!
//! This crate is the foundation the engine and driver crates depend on.
//! It defines the core abstractions:
//!
//! - **Types**: `AudioSpec`, `SampleFormat`, `Tz` (sample index newtype)
//! - **Traits**: `SourceLoader`, `FrameSource`, `OutputDriver`, `FrameSink`
//!   (boundary abstraction — drivers are chosen at construction)
//! - **Errors**: `ConfigError`, `SourceLoadError`, `DriverError`
//!   (thiserror-based)
//! - **Config**: `MixerConfig`

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use config::MixerConfig;
pub use error::{ConfigError, DriverError, SourceLoadError};
pub use traits::{FrameSink, FrameSource, OutputDriver, RawAudio, SourceLoader};
pub use types::{AudioSpec, SampleFormat, Tz};
