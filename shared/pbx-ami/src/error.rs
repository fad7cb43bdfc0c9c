//! Error types for the AMI SDK

/// Result type alias
pub type Result<T> = std::result::Result<T, AmiError>;

/// AMI session errors
#[derive(Debug, thiserror::Error)]
pub enum AmiError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection closed by manager")]
    ConnectionClosed,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

impl AmiError {
    /// Whether a fresh attempt could plausibly succeed.
    ///
    /// Credential rejections, malformed actions and state misuse are
    /// definitive; transport trouble is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::ConnectionClosed | Self::Timeout(_) | Self::Io(_)
        )
    }
}

impl From<std::io::Error> for AmiError {
    fn from(err: std::io::Error) -> Self {
        AmiError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AmiError::Connection("refused".into()).is_transient());
        assert!(AmiError::Timeout("Login".into()).is_transient());
        assert!(AmiError::ConnectionClosed.is_transient());
        assert!(!AmiError::Authentication("bad secret".into()).is_transient());
        assert!(!AmiError::InvalidField("Exten".into()).is_transient());
    }
}
