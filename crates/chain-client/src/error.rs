use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Connection-level failure or timeout; retried with backoff.
    #[error("transport: {0}")]
    Transport(String),

    /// Error object returned by the upstream node.
    #[error("rpc: {0}")]
    Rpc(String),

    /// Response shape did not match what the method promises.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Whether the retry loop should try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

/// Upstream clients answer queries for not-yet-produced blocks with a
/// "future epoch" style error; those are normalized to empty results.
pub(crate) fn is_future_epoch_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("future epoch") || message.contains("future block")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_epoch_detection() {
        assert!(is_future_epoch_message(
            "requested epoch was a future epoch"
        ));
        assert!(is_future_epoch_message("cannot query Future Block"));
        assert!(!is_future_epoch_message("execution reverted"));
    }

    #[test]
    fn only_transport_is_transient() {
        assert!(ClientError::Transport("reset".into()).is_transient());
        assert!(!ClientError::Rpc("bad params".into()).is_transient());
        assert!(!ClientError::InvalidResponse("short".into()).is_transient());
    }
}
