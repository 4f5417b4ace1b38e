//! # Error handling for the lineout service
//!
//! This module provides error types and response structures for the lineout
//! service. It covers JavaScript execution, WebAssembly execution, HTTP
//! downloads and general application errors. Relaying output itself never
//! fails and has no error type.

use anyhow::Error as AnyhowError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Error information returned to API clients
#[derive(serde::Serialize, Debug)]
pub struct ErrorInfo {
    /// Error code identifier
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details about the error
    pub details: Option<HashMap<String, serde_json::Value>>,
}

/// Metadata about code execution
#[derive(serde::Serialize, Debug)]
pub struct ExecutionMetadata {
    /// Execution time in milliseconds
    pub execution_time: u64,
    /// Type of code executed ("javascript" or "webassembly")
    pub code_type: String,
    /// ISO timestamp of execution
    pub timestamp: String,
    /// Size of the executed code in bytes
    pub resource_size: usize,
    /// Bytes the guest wrote to its output descriptors
    pub bytes_relayed: usize,
    /// Complete lines flushed to the output
    pub lines_relayed: usize,
}

/// Response for the execute endpoint
#[derive(serde::Serialize, Debug)]
pub struct ExecuteResponse {
    /// Status of execution ("success" or "error")
    pub status: String,
    /// Result summary from the guest (if successful)
    pub output: Option<String>,
    /// Complete lines the guest wrote
    pub stdout: Option<String>,
    /// Unterminated text after the last line, if any
    pub pending: Option<String>,
    /// Error information (if execution failed)
    pub error: Option<ErrorInfo>,
    /// Metadata about the execution
    pub metadata: ExecutionMetadata,
}

/// Application error types
///
/// This enum represents the different kinds of errors that can occur
/// while fetching and running a guest program.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// QuickJS JavaScript engine errors
    #[error("JavaScript Execution Error: {0}")]
    QuickJs(#[from] rquickjs::Error),
    /// Uncaught exception thrown by a JavaScript guest
    #[error("Uncaught JavaScript exception: {0}")]
    JsException(String),
    /// Wasmtime WebAssembly engine errors
    #[error("WebAssembly Execution Error: {0}")]
    Wasmtime(#[from] AnyhowError),
    /// HTTP request errors
    #[error("Failed to fetch resource: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// The resource is neither JavaScript nor WebAssembly
    #[error("Unsupported file extension in '{0}'. Only .js, .wasm and .wat are supported.")]
    UnsupportedCodeType(String),
    /// Internal application errors
    #[error("{0}")]
    Internal(String),
}

/// Current time as an RFC 3339 string.
pub fn timestamp_now() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => chrono::DateTime::<chrono::Utc>::from_timestamp(
            duration.as_secs() as i64,
            duration.subsec_nanos(),
        )
        .unwrap_or_else(chrono::Utc::now)
        .to_rfc3339(),
        Err(_) => chrono::Utc::now().to_rfc3339(),
    }
}

fn engine_details(engine: &str) -> HashMap<String, serde_json::Value> {
    let mut details = HashMap::new();
    details.insert(
        "errorType".to_string(),
        serde_json::Value::String(engine.to_string()),
    );
    details
}

impl AppError {
    fn status_and_info(&self) -> (StatusCode, ErrorInfo) {
        let message = self.to_string();
        match self {
            AppError::QuickJs(_) | AppError::JsException(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorInfo {
                    code: "JAVASCRIPT_EXECUTION_ERROR".to_string(),
                    message,
                    details: Some(engine_details("QuickJS")),
                },
            ),
            AppError::Wasmtime(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorInfo {
                    code: "WEBASSEMBLY_EXECUTION_ERROR".to_string(),
                    message,
                    details: Some(engine_details("Wasmtime")),
                },
            ),
            AppError::Reqwest(e) => {
                let mut details = HashMap::new();
                if let Some(url) = e.url().map(|u| u.to_string()) {
                    details.insert("url".to_string(), serde_json::Value::String(url));
                }
                if let Some(status) = e.status() {
                    details.insert(
                        "status".to_string(),
                        serde_json::Value::Number(serde_json::Number::from(status.as_u16())),
                    );
                }
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorInfo {
                        code: "FETCH_ERROR".to_string(),
                        message,
                        details: Some(details),
                    },
                )
            }
            AppError::UnsupportedCodeType(_) => (
                StatusCode::BAD_REQUEST,
                ErrorInfo {
                    code: "UNSUPPORTED_CODE_TYPE".to_string(),
                    message,
                    details: None,
                },
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorInfo {
                    code: "INTERNAL_ERROR".to_string(),
                    message,
                    details: None,
                },
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_info) = self.status_and_info();
        tracing::warn!(code = %error_info.code, error = %error_info.message, "request failed");

        let metadata = ExecutionMetadata {
            execution_time: 0, // Nothing ran, or the run did not complete
            code_type: "unknown".to_string(),
            timestamp: timestamp_now(),
            resource_size: 0,
            bytes_relayed: 0,
            lines_relayed: 0,
        };

        let body = Json(ExecuteResponse {
            status: "error".to_string(),
            output: None,
            stdout: None,
            pending: None,
            error: Some(error_info),
            metadata,
        });

        (status_code, body).into_response()
    }
}
