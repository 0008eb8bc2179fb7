use thiserror::Error;

/// A query filter rejected a user supplied parameter.
///
/// `parameter` names the offending query parameter and is reported as the
/// error code of the response.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct QueryFilterError {
    pub parameter: String,
    pub message: String,
}

impl QueryFilterError {
    pub fn new(parameter: impl Into<String>) -> Self {
        let parameter = parameter.into();
        Self {
            message: format!("Invalid query filter '{}'", parameter),
            parameter,
        }
    }

    pub fn with_message(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}
