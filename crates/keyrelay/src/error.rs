use thiserror::Error;

/// Failure injecting a key edge into the host.
///
/// Injection failures are host issues, not protocol errors: callers log them
/// and continue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectError {
    /// The host rejected or dropped the event.
    #[error("host rejected key event: {0}")]
    Rejected(String),
}

/// Convenience alias for injector results.
pub type Result<T> = std::result::Result<T, InjectError>;
