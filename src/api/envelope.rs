//! The `{success, data, error?}` wrapper around every API response

use super::error::{ApiError, ApiResult, FieldErrors};
use serde::Deserialize;

/// Raw response envelope.
///
/// Only ever inspected here: [`Envelope::into_result`] turns it into a plain
/// `Result` so callers never look at the `success` flag themselves.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub errors: Option<FieldErrors>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload of a 2xx response.
    ///
    /// `fallback` is the message used when the server reports failure without
    /// saying why.
    pub fn into_result(self, fallback: &str) -> ApiResult<T> {
        if !self.success {
            let message = self
                .error
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string());
            return Err(match self.errors {
                Some(field_errors) if !field_errors.is_empty() => ApiError::Validation {
                    message,
                    status: None,
                    field_errors,
                },
                _ => ApiError::rejected(message),
            });
        }

        self.data
            .ok_or_else(|| ApiError::Decode("response is missing `data`".to_string()))
    }
}

/// Body shape of error responses; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<FieldErrors>,
}

impl ErrorBody {
    /// `error` wins over `message` when both are present
    pub fn into_parts(self) -> (Option<String>, Option<FieldErrors>) {
        (self.error.or(self.message), self.errors)
    }
}
