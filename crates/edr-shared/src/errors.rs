use thiserror::Error;

/// Error taxonomy for the control plane. Variants map 1:1 onto the kinds the
/// control plane distinguishes when deciding whether to surface a reply to a
/// caller, log and continue from a background task, or treat the condition
/// as a bug.
#[derive(Error, Debug)]
pub enum EdrError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("agent not online: {0}")]
    NotOnline(String),

    #[error("stream closed for agent: {0}")]
    StreamClosed(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("corrupted store: {0}")]
    Corruption(String),

    #[error("invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, EdrError>;
