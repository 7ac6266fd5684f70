//! The `{success, data|error}` envelope every JSON endpoint responds with.
//!
//! Successful handlers return [`ApiResponse<T>`]; failures go through
//! [`crate::errors::Error`]'s `IntoResponse`, which writes an [`ErrorEnvelope`].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Successful response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

/// Error details inside a failed response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

/// Failed response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn new(code: &str, message: String, details: Option<String>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_omits_missing_message() {
        let value = serde_json::to_value(ApiResponse::ok(json!({"created": 2}))).unwrap();
        assert_eq!(value, json!({"success": true, "data": {"created": 2}}));

        let value = serde_json::to_value(ApiResponse::with_message(1, "Webhook received")).unwrap();
        assert_eq!(value["message"], "Webhook received");
    }
}
