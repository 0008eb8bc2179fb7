// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::database::DatabaseError;
use crate::filter::QueryFilterError;
use crate::resource::base::{ConfigurationError, InvalidRequestDataError};
use crate::schemas::ValidationError;

/// Translation of every error the resource layer can raise into a status code
/// and a `{"message": ..., "error": {"code": ...}}` envelope
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    ValidationError {
        message: String,
        fields: BTreeMap<String, String>,
    },
    InvalidJsonData(String),
    CollectionExpected,
    ObjectNotAllowed,
    CollectionNotAllowed,
    QueryFilter {
        parameter: String,
        message: String,
    },
    DataIntegrity(String),
    /// Application level error with its own code (e.g. `INVALID_SIGNIN`)
    Coded {
        code: &'static str,
        message: String,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJsonData(_) => 400,
            ApiError::CollectionExpected => 400,
            ApiError::ObjectNotAllowed => 400,
            ApiError::CollectionNotAllowed => 400,
            ApiError::QueryFilter { .. } => 400,
            ApiError::DataIntegrity(_) => 400,
            ApiError::Coded { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJsonData(msg) => msg,
            ApiError::CollectionExpected => "Submitted data is not a collection",
            ApiError::ObjectNotAllowed => "This operation is not allowed for single objects",
            ApiError::CollectionNotAllowed => "This operation is not allowed for collections",
            ApiError::QueryFilter { message, .. } => message,
            ApiError::DataIntegrity(_) => "Data integrity error",
            ApiError::Coded { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::MethodNotAllowed(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJsonData(_) => "INVALID_JSON_DATA",
            ApiError::CollectionExpected => "COLLECTION_EXPECTED",
            ApiError::ObjectNotAllowed => "OBJECT_NOT_ALLOWED",
            ApiError::CollectionNotAllowed => "COLLECTION_NOT_ALLOWED",
            // Filter errors use the offending query parameter as code
            ApiError::QueryFilter { parameter, .. } => parameter,
            ApiError::DataIntegrity(_) => "DATA_INTEGRITY_ERROR",
            ApiError::Coded { code, .. } => code,
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut error = Map::new();
        error.insert("code".to_string(), json!(self.error_code()));

        match self {
            ApiError::ValidationError { fields, .. } => {
                error.insert("fields".to_string(), json!(fields));
            }
            ApiError::DataIntegrity(details) => {
                error.insert("details".to_string(), json!(details));
            }
            _ => {}
        }

        json!({
            "message": self.message(),
            "error": error,
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation_error(message: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            fields,
        }
    }

    /// Validation error for a single field
    pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), message.into());
        ApiError::validation_error("Submitted data is not valid", fields)
    }

    pub fn coded(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Coded {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        ApiError::MethodNotAllowed(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Integrity(details) => ApiError::DataIntegrity(details),
            DatabaseError::UnknownColumn(column) => {
                // Columns reach SQL only after being checked against the model
                tracing::error!("Unknown column reached the query builder: {}", column);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<QueryFilterError> for ApiError {
    fn from(err: QueryFilterError) -> Self {
        ApiError::QueryFilter {
            message: err.to_string(),
            parameter: err.parameter,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation_error("Submitted data is not valid", err.fields)
    }
}

impl From<InvalidRequestDataError> for ApiError {
    fn from(err: InvalidRequestDataError) -> Self {
        ApiError::InvalidJsonData(err.to_string())
    }
}

impl From<ConfigurationError> for ApiError {
    fn from(err: ConfigurationError) -> Self {
        tracing::error!("Resource configuration error: {}", err);
        ApiError::internal_server_error("An error occurred while processing your request")
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_filter_error_uses_parameter_as_code() {
        let err = ApiError::from(QueryFilterError::new("unknownfield__eq"));
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_json()["error"]["code"], "unknownfield__eq");
    }

    #[test]
    fn validation_error_lists_fields() {
        let err = ApiError::field_error("name", "Required");
        let body = err.to_json();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["fields"]["name"], "Required");
        assert_eq!(body["message"], "Submitted data is not valid");
    }

    #[test]
    fn integrity_error_is_bad_request() {
        let err = ApiError::from(DatabaseError::Integrity("UNIQUE constraint failed".to_string()));
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_json()["error"]["details"], "UNIQUE constraint failed");
    }
}
