//! Diagnostic logging.
//!
//! Diagnostics go to stderr through `tracing`; stdout carries only the stable
//! progress lines from [`crate::output`]. Verbosity follows `RUST_LOG` and
//! defaults to `info` (e.g. `RUST_LOG=sitebatch=debug` shows per-page hash
//! failures).

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("Failed to initialize tracing subscriber: {0}")]
    Init(String),
}

pub fn init() -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| LoggingError::Init(err.to_string()))
}
