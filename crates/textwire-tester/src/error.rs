use thiserror::Error;

/// Errors surfaced by tester commands.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection or protocol failure talking to the service.
    #[error(transparent)]
    Server(#[from] textwire_server::Error),

    /// The service answered with an `ERR` line.
    #[error("service error: {0}")]
    Service(String),
}

/// Convenience alias for tester results.
pub type Result<T> = std::result::Result<T, Error>;
