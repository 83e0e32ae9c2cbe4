//! `sq-mix` — Sequence-based mix engine for music applications.
//!
//! Game mixers optimize for low-latency reaction to unpredictable events;
//! this engine assumes a pre-scheduled program ("fires") and renders it with
//! sample-accurate alignment. Sources are decoded once, converted to the
//! output spec, and cached in memory; every output frame sums the live
//! fires' contributions and passes through a loudness-normalizing
//! compressor.
//!
//! # Architecture
//!
//! ```text
//! SourceLoader -> SourceCache -> FireStore -> Mixer -> OutputDriver (pull)
//!                                   |           |          or
//!                                   v           v       FrameSink (push)
//!                              MasterClock  Compressor
//! ```
//!
//! The host thread schedules fires ([`Mixer::set_fire`]) and picks a mode:
//! realtime ([`Mixer::start`], the driver's callback pulls frames) or
//! offline ([`Mixer::output_start`], the host pushes a known-duration range
//! into a sink). Mixing is `f64` throughout; the configured sample format
//! only matters at the encode boundary.

pub mod clock;
pub mod compressor;
pub mod engine;
pub mod error;
pub mod fire;
pub mod resample;
pub mod source;
pub mod telemetry;

// Re-export primary types at crate root for convenience
pub use clock::{ClockState, MasterClock};
pub use compressor::Compressor;
pub use engine::Mixer;
pub use error::MixError;
pub use fire::{Fire, FireId, FireState, FireStore};
pub use source::{Source, SourceCache};
pub use telemetry::{Telemetry, TelemetryEvent, TelemetrySnapshot};
