//! Error types for the click-to-call workflow

use pbx_ami::AmiError;

/// Result type alias
pub type Result<T> = std::result::Result<T, CallError>;

/// Why a call request did not result in a placed call.
///
/// The `Display` text becomes the `Description` of the call result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Unauthorized IP address: {0}")]
    Unauthorized(String),

    #[error("Socket connection failed: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Manager interface did not answer in time: waiting for {0}")]
    ProtocolTimeout(String),

    #[error("Failed to retrieve technology for extension: {0}")]
    Lookup(String),

    #[error("Call initiation failed: {0}")]
    Originate(String),
}

impl CallError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Authentication(_) => "AUTH_ERROR",
            Self::ProtocolTimeout(_) => "PROTOCOL_TIMEOUT",
            Self::Lookup(_) => "LOOKUP_ERROR",
            Self::Originate(_) => "ORIGINATE_ERROR",
        }
    }

    /// Worth another attempt on a fresh connection
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::ProtocolTimeout(_))
    }
}

impl From<AmiError> for CallError {
    fn from(err: AmiError) -> Self {
        match err {
            AmiError::Connection(msg) | AmiError::Io(msg) => CallError::Connection(msg),
            AmiError::ConnectionClosed => {
                CallError::Connection("connection closed by manager".to_string())
            }
            AmiError::Authentication(reason) => CallError::Authentication(reason),
            AmiError::Timeout(what) => CallError::ProtocolTimeout(what),
            AmiError::Protocol(msg) | AmiError::InvalidState(msg) => {
                CallError::Connection(format!("manager protocol error: {}", msg))
            }
            AmiError::InvalidField(msg) => CallError::InvalidInput(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ami_error_mapping() {
        assert_eq!(
            CallError::from(AmiError::Timeout("DBGet".into())),
            CallError::ProtocolTimeout("DBGet".into())
        );
        assert_eq!(
            CallError::from(AmiError::Authentication("Authentication failed".into())),
            CallError::Authentication("Authentication failed".into())
        );
        assert!(matches!(
            CallError::from(AmiError::ConnectionClosed),
            CallError::Connection(_)
        ));
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            CallError::Unauthorized("10.9.9.9".into()).to_string(),
            "Unauthorized IP address: 10.9.9.9"
        );
        assert_eq!(
            CallError::Lookup("101".into()).to_string(),
            "Failed to retrieve technology for extension: 101"
        );
    }

    #[test]
    fn test_only_transport_failures_are_transient() {
        assert!(CallError::Connection("refused".into()).is_transient());
        assert!(CallError::ProtocolTimeout("Login".into()).is_transient());
        assert!(!CallError::Authentication("denied".into()).is_transient());
        assert!(!CallError::Lookup("101".into()).is_transient());
        assert!(!CallError::Originate("busy".into()).is_transient());
    }
}
