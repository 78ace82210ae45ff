//! Request and Response message types.
//!
//! Defines the message format for command requests and responses
//! between local end (Rust) and remote end (in-page agent).

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{ControlId, RequestId};

use super::Command;

// ============================================================================
// Error Codes
// ============================================================================

/// Agent error code for a control reference that no longer resolves.
pub const STALE_CONTROL: &str = "stale control";

/// Agent error code for a selection the page rejected.
pub const SELECT_FAILED: &str = "select failed";

/// Agent error code for a value missing from the control.
pub const NO_SUCH_OPTION: &str = "no such option";

// ============================================================================
// Request
// ============================================================================

/// A command request from local end to remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "method": "module.methodName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a new request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            id: RequestId::generate(),
            command,
        }
    }

    /// Creates a new request with specific ID.
    #[inline]
    #[must_use]
    pub fn with_id(id: RequestId, command: Command) -> Self {
        Self { id, command }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from remote end to local end.
///
/// # Format
///
/// Success:
/// ```json
/// {
///   "id": "uuid",
///   "type": "success",
///   "result": { ... }
/// }
/// ```
///
/// Error:
/// ```json
/// {
///   "id": "uuid",
///   "type": "error",
///   "error": "stale control",
///   "message": "control ctl-4 is detached"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the command `id`.
    pub id: RequestId,

    /// Response type.
    #[serde(rename = "type")]
    pub response_type: ResponseType,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error code (if error).
    #[serde(default)]
    pub error: Option<String>,

    /// Error message (if error).
    #[serde(default)]
    pub message: Option<String>,
}

impl Response {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_type == ResponseType::Success
    }

    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the response was an error.
    pub fn into_result(self) -> Result<Value> {
        match self.response_type {
            ResponseType::Success => Ok(self.result.unwrap_or(Value::Null)),
            ResponseType::Error => {
                let error_code = self.error.unwrap_or_else(|| "unknown error".to_string());
                let message = self.message.unwrap_or_else(|| error_code.clone());
                Err(Error::protocol(message))
            }
        }
    }

    /// Like [`into_result`](Self::into_result), but maps the agent's
    /// control error codes to the recoverable variants.
    ///
    /// | Code | Error |
    /// |------|-------|
    /// | `stale control` | [`Error::StaleControl`] |
    /// | `select failed`, `no such option` | [`Error::TransientSelection`] |
    /// | anything else | [`Error::Protocol`] |
    ///
    /// # Errors
    ///
    /// Returns the mapped error if the response was an error.
    pub fn into_control_result(self, control_id: &ControlId, value: &str) -> Result<Value> {
        if self.is_success() {
            return self.into_result();
        }

        match self.error.as_deref() {
            Some(STALE_CONTROL) => Err(Error::stale_control(control_id.clone())),
            Some(code @ (SELECT_FAILED | NO_SUCH_OPTION)) => {
                let message = self.message.as_deref().unwrap_or(code);
                Err(Error::transient_selection(
                    control_id.clone(),
                    value,
                    message,
                ))
            }
            _ => self.into_result(),
        }
    }

    /// Gets a string value from the result.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets a u64 value from the result.
    ///
    /// Returns 0 if key not found or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    }

    /// Gets a boolean value from the result.
    ///
    /// Returns false if key not found or not a boolean.
    #[inline]
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_bool())
            .unwrap_or_default()
    }
}

// ============================================================================
// ResponseType
// ============================================================================

/// Response type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Successful response.
    Success,
    /// Error response.
    Error,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Locator;

    fn error_response(code: &str, message: &str) -> Response {
        let json_str = format!(
            r#"{{
                "id": "550e8400-e29b-41d4-a716-446655440000",
                "type": "error",
                "error": "{code}",
                "message": "{message}"
            }}"#
        );
        serde_json::from_str(&json_str).expect("parse")
    }

    #[test]
    fn test_request_serialization() {
        let request = Request::new(Command::Locate(Locator::css("select#zone")));
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["method"], "control.locate");
        assert_eq!(json["params"]["strategy"], "css");
        assert_eq!(json["id"], request.id.to_string());
        assert!(json.get("tabId").is_none());
    }

    #[test]
    fn test_request_with_id() {
        let id = RequestId::generate();
        let request = Request::with_id(id, Command::Screenshot);
        assert_eq!(request.id, id);
    }

    #[test]
    fn test_success_response() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "success",
            "result": {"url": "https://example.org/search"}
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert!(response.is_success());
        assert!(!response.is_error());
        assert_eq!(response.get_string("url"), "https://example.org/search");
    }

    #[test]
    fn test_into_result_error() {
        let response = error_response("timeout", "Operation timed out");
        assert!(response.is_error());
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_control_error_codes() {
        let control = ControlId::new("ctl-4");

        let err = error_response("stale control", "detached")
            .into_control_result(&control, "12")
            .unwrap_err();
        assert!(matches!(err, Error::StaleControl { .. }));

        let err = error_response("no such option", "12 not offered")
            .into_control_result(&control, "12")
            .unwrap_err();
        match err {
            Error::TransientSelection { value, message, .. } => {
                assert_eq!(value, "12");
                assert_eq!(message, "12 not offered");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = error_response("select failed", "change handler threw")
            .into_control_result(&control, "12")
            .unwrap_err();
        assert!(err.is_recoverable());

        let err = error_response("javascript error", "boom")
            .into_control_result(&control, "12")
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_response_get_helpers() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "success",
            "result": {
                "name": "test",
                "count": 42,
                "enabled": true
            }
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert_eq!(response.get_string("name"), "test");
        assert_eq!(response.get_u64("count"), 42);
        assert!(response.get_bool("enabled"));

        // Missing keys return defaults
        assert_eq!(response.get_string("missing"), "");
        assert_eq!(response.get_u64("missing"), 0);
        assert!(!response.get_bool("missing"));
    }
}
