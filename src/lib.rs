//! spanforge generates synthetic distributed traces at a controlled rate
//! and ships them to a tracing backend, a file, or nowhere at all.
//!
//! The pipeline has three stages connected by bounded queues: a
//! token-bucket scheduler fans jobs out to seeded generator workers, a
//! single consumer batches the resulting traces per output format, and a
//! bounded pool of send tasks delivers encoded batches to the configured
//! sink with retry and timeout.

pub mod config;
pub mod encode;
pub mod generator;
pub mod model;
pub mod run;
pub mod sink;

pub use config::Config;
pub use run::run;

use std::time::Duration;

/// Errors raised by configuration, encoding, sinks, or the run itself.
///
/// [`Error::Cancelled`] is distinct so callers can tell a clean shutdown
/// from a failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    Config(String),

    #[error("encode: {0}")]
    Encode(String),

    #[error("sink {endpoint}: {message}")]
    Sink { endpoint: String, message: String },

    #[error("sink {endpoint}: unexpected status {status}: {body}")]
    SinkStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("sink request timed out after {0:?}")]
    SinkTimeout(Duration),

    #[error("run cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
