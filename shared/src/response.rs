//! API Response types
//!
//! Standardized response envelope used by the store's REST surface.

use serde::{Deserialize, Serialize};

/// Standard API response code
pub const API_CODE_SUCCESS: &str = "E0000";

/// Unified API response structure
///
/// All store responses follow this format:
/// ```json
/// {
///     "code": "E0000",
///     "message": "Success",
///     "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response code (E0000 = success, others = error codes)
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Response data (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn ok(data: T) -> Self {
        Self {
            code: API_CODE_SUCCESS.to_string(),
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    /// Create an error response
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Whether the response carries the success code
    pub fn is_success(&self) -> bool {
        self.code == API_CODE_SUCCESS
    }
}
