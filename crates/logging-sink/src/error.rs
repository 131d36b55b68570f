//! crates/logging-sink/src/error.rs
//! Errors raised while constructing a sink.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to build a handler.
///
/// Once a handler exists it never returns errors; see
/// [`ErrorManager`](crate::ErrorManager).
#[derive(Debug, Error)]
pub enum SinkError {
    /// The log file (or its parent directory) could not be opened.
    #[error("failed to open log file '{path}': {source}")]
    Open {
        /// File that was being opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A rotation step failed while preparing the log file.
    #[error("failed to rotate log file '{path}': {source}")]
    Rotate {
        /// File being rotated.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The syslog endpoint could not be resolved to an address.
    #[error("failed to resolve syslog endpoint '{endpoint}': {source}")]
    Resolve {
        /// Endpoint as configured.
        endpoint: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The syslog endpoint resolved to no addresses.
    #[error("syslog endpoint '{0}' resolved to no addresses")]
    NoAddress(String),
    /// Binding the local datagram socket failed.
    #[error("failed to create syslog socket: {0}")]
    Socket(#[source] io::Error),
    /// The asynchronous consumer thread could not be started.
    #[error("failed to start asynchronous log consumer: {0}")]
    Spawn(#[source] io::Error),
}

/// Result alias for handler construction.
pub type SinkResult<T> = Result<T, SinkError>;

impl SinkError {
    /// Maps the error onto the error-manager code it is reported under.
    pub const fn code(&self) -> crate::ErrorCode {
        match self {
            Self::Open { .. } | Self::Rotate { .. } => crate::ErrorCode::Open,
            Self::Resolve { .. } | Self::NoAddress(_) | Self::Socket(_) | Self::Spawn(_) => {
                crate::ErrorCode::Generic
            }
        }
    }
}
