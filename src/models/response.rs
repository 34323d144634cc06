use serde::Serialize;

use crate::error::DispatchError;

/// Envelope for every JSON body the HTTP surface returns.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,

    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            attempts: None,
            message: message.into(),
        }
    }

    pub fn dispatch_failure(error: &DispatchError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.kind().to_string()),
            attempts: Some(error.attempts()).filter(|attempts| *attempts > 0),
            message: error.to_string(),
        }
    }
}
