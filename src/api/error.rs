//! Normalized failure type for every remote call

use std::collections::BTreeMap;
use thiserror::Error;

/// Field name → validation messages, as sent in the `errors` body field
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Result of a remote call after envelope unwrapping
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Message used when the request never produced a response
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

/// A failed remote call.
///
/// Every transport error, non-2xx status and `success: false` envelope is
/// converted into one of these before it reaches a store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The server answered but refused the request
    #[error("{message}")]
    Rejected { message: String, status: Option<u16> },

    /// The server rejected individual fields
    #[error("{message}")]
    Validation {
        message: String,
        status: Option<u16>,
        field_errors: FieldErrors,
    },

    /// No usable response (connection refused, timeout, DNS...)
    #[error("{message}")]
    Transport { message: String },

    /// The response body did not match the expected shape
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            status: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// HTTP status code, when the failure came with one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } | Self::Validation { status, .. } => *status,
            Self::Transport { .. } | Self::Decode(_) => None,
        }
    }

    /// Field-level messages, empty unless this is a validation failure
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { field_errors, .. } => Some(field_errors),
            _ => None,
        }
    }

    /// Whether retrying later could succeed without changing the request
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Build the normalized error for an HTTP failure response.
    ///
    /// `error` and `errors` come from the response body when it could be parsed;
    /// otherwise the status reason is used as the message.
    pub fn from_response(
        status: u16,
        reason: Option<&str>,
        error: Option<String>,
        errors: Option<FieldErrors>,
    ) -> Self {
        let message = error
            .filter(|m| !m.trim().is_empty())
            .or_else(|| reason.map(str::to_string))
            .unwrap_or_else(|| format!("Request failed with status {}", status));

        match errors {
            Some(field_errors) if !field_errors.is_empty() => Self::Validation {
                message,
                status: Some(status),
                field_errors,
            },
            _ => Self::Rejected {
                message,
                status: Some(status),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_prefers_body_message() {
        let err = ApiError::from_response(404, Some("Not Found"), Some("Project not found".into()), None);
        assert_eq!(err.to_string(), "Project not found");
        assert_eq!(err.status(), Some(404));
        assert!(err.field_errors().is_none());
    }

    #[test]
    fn test_from_response_falls_back_to_reason() {
        let err = ApiError::from_response(502, Some("Bad Gateway"), Some("  ".into()), None);
        assert_eq!(err.to_string(), "Bad Gateway");

        let err = ApiError::from_response(599, None, None, None);
        assert_eq!(err.to_string(), "Request failed with status 599");
    }

    #[test]
    fn test_from_response_with_field_errors() {
        let mut fields = FieldErrors::new();
        fields.insert("name".into(), vec!["Name is required".into()]);
        let err = ApiError::from_response(400, Some("Bad Request"), Some("Validation failed".into()), Some(fields));

        match &err {
            ApiError::Validation { field_errors, .. } => {
                assert_eq!(field_errors["name"], vec!["Name is required"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_transport_has_no_status() {
        let err = ApiError::transport(NETWORK_ERROR_MESSAGE);
        assert!(err.is_transport());
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), NETWORK_ERROR_MESSAGE);
    }
}
