//! Call request and result records

use regex::Regex;
use serde::Serialize;

use crate::error::CallError;

/// A request to connect `extension` to `number`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub extension: String,
    pub number: String,
}

impl CallRequest {
    /// Build a request from raw caller input; surrounding whitespace is dropped
    pub fn new(extension: &str, number: &str) -> Self {
        Self {
            extension: extension.trim().to_string(),
            number: number.trim().to_string(),
        }
    }
}

/// Shape checks applied before any manager I/O
#[derive(Debug, Clone)]
pub struct RequestValidator {
    extension: Regex,
    number: Regex,
}

impl RequestValidator {
    pub fn new() -> Self {
        Self {
            extension: Regex::new(r"^[0-9]+$").expect("extension pattern compiles"),
            number: Regex::new(r"^\+?[0-9]+$").expect("number pattern compiles"),
        }
    }

    pub fn validate(&self, request: &CallRequest) -> Result<(), CallError> {
        if !self.extension.is_match(&request.extension) {
            return Err(CallError::InvalidInput(format!(
                "Invalid extension format: {}",
                request.extension
            )));
        }
        if !self.number.is_match(&request.number) {
            return Err(CallError::InvalidInput(format!(
                "Invalid number format: {}",
                request.number
            )));
        }
        Ok(())
    }
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one call request.
///
/// Built once at the end of the workflow and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallResult {
    success: bool,
    valid_input: bool,
    description: String,
    technology: String,
    #[serde(rename = "OriginateResponse")]
    originate_response: String,
}

impl CallResult {
    /// The PBX accepted the originate request
    pub fn placed(request: &CallRequest, technology: &str, originate_response: &str) -> Self {
        Self {
            success: true,
            valid_input: true,
            description: format!(
                "Extension {} is calling {}.",
                request.extension, request.number
            ),
            technology: technology.to_string(),
            originate_response: originate_response.to_string(),
        }
    }

    /// The request failed; whatever was learned before the failure is kept
    pub fn failed(error: &CallError, technology: &str, originate_response: &str) -> Self {
        Self {
            success: false,
            valid_input: !matches!(error, CallError::InvalidInput(_)),
            description: error.to_string(),
            technology: technology.to_string(),
            originate_response: originate_response.to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn valid_input(&self) -> bool {
        self.valid_input
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn technology(&self) -> &str {
        &self.technology
    }

    /// Raw text of the manager's reply to Originate
    pub fn originate_response(&self) -> &str {
        &self.originate_response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let validator = RequestValidator::new();
        assert!(validator.validate(&CallRequest::new("101", "+15551234567")).is_ok());
        assert!(validator.validate(&CallRequest::new(" 101 ", "0031201234567\n")).is_ok());
    }

    #[test]
    fn test_invalid_extension() {
        let validator = RequestValidator::new();
        let err = validator
            .validate(&CallRequest::new("10a", "+15551234567"))
            .unwrap_err();
        assert_eq!(err, CallError::InvalidInput("Invalid extension format: 10a".into()));
    }

    #[test]
    fn test_invalid_numbers() {
        let validator = RequestValidator::new();
        for number in ["", "+", "++1", "1+1", "555-1234", "5551234567;x", "123\r\nAction: Logoff"] {
            assert!(
                validator.validate(&CallRequest::new("101", number)).is_err(),
                "{:?} accepted",
                number
            );
        }
        assert!(validator.validate(&CallRequest::new("", "123")).is_err());
    }

    #[test]
    fn test_extension_error_reported_first() {
        let validator = RequestValidator::new();
        let err = validator.validate(&CallRequest::new("x", "y")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid extension format: x");
    }

    #[test]
    fn test_invalid_input_clears_valid_flag() {
        let result = CallResult::failed(&CallError::InvalidInput("Invalid number format: x".into()), "", "");
        assert!(!result.success());
        assert!(!result.valid_input());

        let result = CallResult::failed(&CallError::Authentication("denied".into()), "", "");
        assert!(!result.success());
        assert!(result.valid_input());
    }

    #[test]
    fn test_placed_description() {
        let request = CallRequest::new("101", "+15551234567");
        let result = CallResult::placed(&request, "PJSIP", "Response: Success");
        assert!(result.success());
        assert_eq!(result.description(), "Extension 101 is calling +15551234567.");
        assert_eq!(result.technology(), "PJSIP");
    }

    #[test]
    fn test_serialized_field_names() {
        let request = CallRequest::new("101", "200");
        let json = serde_json::to_value(CallResult::placed(&request, "SIP", "raw")).unwrap();
        assert_eq!(json["Success"], true);
        assert_eq!(json["ValidInput"], true);
        assert_eq!(json["Description"], "Extension 101 is calling 200.");
        assert_eq!(json["Technology"], "SIP");
        assert_eq!(json["OriginateResponse"], "raw");
    }
}
