//! Shared error types (thiserror-based).

use thiserror::Error;

/// Invalid mixer configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Output frequency must be positive and finite.
    #[error("Invalid output frequency: {0} Hz")]
    InvalidFreq(f64),

    /// At least one output channel is required.
    #[error("Invalid channel count: {0}")]
    InvalidChannels(u16),
}

/// Failure to load a source into the cache.
#[derive(Error, Debug)]
pub enum SourceLoadError {
    /// The source file does not exist.
    #[error("Source not found: {0}")]
    NotFound(String),

    /// The file exists but could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The decoded stream carries an unusable spec (zero rate, no channels).
    #[error("Invalid source spec: {0}")]
    SpecInvalid(String),

    /// IO error while reading the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output driver error, surfaced from host-thread calls only.
#[derive(Error, Debug)]
pub enum DriverError {
    /// No audio output device is available.
    #[error("No audio output device found")]
    NoDevice,

    /// The driver was started without a bound frame source.
    #[error("Output driver has no bound frame source")]
    NotBound,

    /// Failed to build the output stream.
    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    /// Failed to start the output stream.
    #[error("Failed to play audio stream: {0}")]
    StreamPlay(String),
}
