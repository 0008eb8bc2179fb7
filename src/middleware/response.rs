use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Map, Value};

use crate::error::ApiError;

/// Result type returned by every view
pub type ApiResult = Result<ApiResponse, ApiError>;

/// Successful view output: a bare JSON object or list, or an `info` envelope
#[derive(Debug)]
pub struct ApiResponse {
    pub data: Value,
    pub status_code: Option<StatusCode>,
}

impl ApiResponse {
    /// Create a successful API response with default 200 status
    pub fn success(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            status_code: None,
        }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: impl Into<Value>, status_code: StatusCode) -> Self {
        Self {
            data: data.into(),
            status_code: Some(status_code),
        }
    }

    /// `{"info": {...}}` response
    pub fn info(info: Map<String, Value>) -> Self {
        Self::success(json!({ "info": info }))
    }

    /// `{"info": {"count": N}}` response
    pub fn count(count: u64) -> Self {
        let mut info = Map::new();
        info.insert("count".to_string(), json!(count));
        Self::info(info)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);
        (status, Json(self.data)).into_response()
    }
}
