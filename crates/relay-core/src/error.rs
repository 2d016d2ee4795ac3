use thiserror::Error;

/// Errors surfaced by relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("identity '{0}' is already taken")]
    DuplicateIdentity(String),

    #[error("identity 'Server' is reserved for relay announcements")]
    ReservedIdentity,

    #[error("identity must not be empty")]
    EmptyIdentity,

    #[error("identity '{0}' contains whitespace or control characters")]
    InvalidIdentity(String),

    #[error("no blob stored for id {0}")]
    BlobNotFound(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A single recipient's delivery outcome. Never aborts a broadcast;
/// each recipient fails independently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("participant connection closed")]
    Closed,

    #[error("delivery timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Transport(String),
}
