use tether_protocol::SessionId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown session {session_id}")]
    UnknownSession { session_id: SessionId },
}

impl SessionError {
    pub fn unknown(id: &SessionId) -> Self {
        Self::UnknownSession {
            session_id: id.clone(),
        }
    }
}

/// Failure inside a turn that is not attributable to cancellation.
///
/// Cancellation is deliberately not a variant here: a cancelled turn resolves
/// to [`crate::TurnOutcome::Cancelled`], never to an error.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The peer went away while the turn was still emitting updates.
    #[error("update channel closed")]
    UpdateChannelClosed,
    #[error("turn step failed: {message}")]
    StepFailed { message: String },
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to read credential file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed credential record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("secret is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("secret must decode to 32 bytes, got {len}")]
    BadSecretLength { len: usize },
}
