use thiserror::Error;

/// Failures on the live-update path.
///
/// None of these escape the supervisor: each one ends up as a connection
/// state transition or a logged no-op.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Credential service unreachable, refused, or too slow. Real-time mode
    /// is abandoned and the caller falls back to seed data.
    #[error("credential fetch failed: {0}")]
    CredentialFetch(String),

    #[error("transport open failed: {0}")]
    TransportOpen(String),

    #[error("transport error: {0}")]
    TransportRuntime(String),

    #[error("malformed message: {0}")]
    MessageParse(#[from] serde_json::Error),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },
}

impl LiveError {
    /// True when the caller should fall back to static seed data.
    pub fn is_degraded(&self) -> bool {
        matches!(self, LiveError::CredentialFetch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_only_for_credential_failures() {
        assert!(LiveError::CredentialFetch("503".into()).is_degraded());
        assert!(!LiveError::TransportOpen("refused".into()).is_degraded());
        assert!(!LiveError::Timeout {
            operation: "transport open",
            secs: 10
        }
        .is_degraded());
    }

    #[test]
    fn test_parse_error_converts() {
        let err: LiveError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, LiveError::MessageParse(_)));
        assert!(err.to_string().starts_with("malformed message"));
    }
}
