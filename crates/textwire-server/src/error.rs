use std::{io::Error as IoError, result::Result as StdResult};

use thiserror::Error;

/// The main error type for textwire-server operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid service configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The listener could not be started.
    #[error("listener error: {0}")]
    Listen(String),

    /// IO-related errors.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// Protocol-level failures reported by a controller-side client.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = StdResult<T, Error>;
