//! Boundary result object
//!
//! The shape every operation is reported in at the edge of the system:
//! `{ success, message, data? }`.

use serde::Serialize;

use super::error::{ErrorKind, LendingError, LendingResult};

/// Result object returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    kind: Option<ErrorKind>,
}

impl<T> OperationResult<T> {
    /// A successful result carrying `data`
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    /// A failed result built from a lending error
    pub fn failed(err: &LendingError) -> Self {
        Self {
            success: false,
            message: err.message().to_string(),
            data: None,
            error: Some(err.kind().name().to_string()),
            kind: Some(err.kind()),
        }
    }

    /// Wraps an operation result, using `message` on success
    pub fn from_result(result: LendingResult<T>, message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self::ok(message, data),
            Err(err) => Self::failed(&err),
        }
    }

    /// Status code for the boundary: 200 on success, otherwise the
    /// error kind's mapping
    pub fn status_code(&self) -> u16 {
        self.kind.map_or(200, |kind| kind.status_code())
    }
}
