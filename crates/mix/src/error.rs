//! Mix engine error type (thiserror-based).

use sq_common::{ConfigError, DriverError, SourceLoadError};
use thiserror::Error;

/// Errors surfaced by host-thread mixer operations.
///
/// The audio thread never returns these — runtime trouble on the mix path
/// (late source, late fire) degrades to silence and telemetry instead.
#[derive(Error, Debug)]
pub enum MixError {
    /// The output spec failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Operation called in the wrong clock state.
    #[error("Invalid mixer state: {0}")]
    State(&'static str),

    /// The loader failed for a source key.
    #[error("Failed to load source {key:?}: {source}")]
    SourceLoad {
        key: String,
        source: SourceLoadError,
    },

    /// The bound output driver failed to start.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The offline sink failed to accept frames.
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}
