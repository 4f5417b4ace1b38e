//! HTTP execution API.

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::{timestamp_now, AppError, ExecuteResponse, ExecutionMetadata};
use crate::guest::{self, CodeType};
use crate::relay::SharedSurface;

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub url: url::Url,
}

pub fn router() -> Router {
    Router::new()
        .route("/execute", post(execute_handler))
        .route("/health", get(|| async { "ok" }))
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router().into_make_service()).await?;
    Ok(())
}

async fn execute_handler(
    Json(payload): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, AppError> {
    tracing::info!(url = %payload.url, "received execute request");

    let code_type = CodeType::from_path(payload.url.path())
        .ok_or_else(|| AppError::UnsupportedCodeType(payload.url.to_string()))?;

    let response = reqwest::get(payload.url.clone()).await?;
    if !response.status().is_success() {
        return Err(AppError::Internal(format!(
            "Failed to download code: HTTP status {}",
            response.status()
        )));
    }
    let downloaded_code = response.bytes().await?;
    let resource_size = downloaded_code.len();

    let surface = SharedSurface::new();
    let guest_surface = surface.clone();
    let (report, relay) = tokio::task::spawn_blocking(move || {
        guest::execute(code_type, &downloaded_code, guest_surface)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Guest task failed: {}", e)))??;

    let stats = relay.stats();
    let pending = relay.pending();

    Ok(Json(ExecuteResponse {
        status: "success".to_string(),
        output: Some(report.output),
        stdout: Some(surface.take()),
        pending: (!pending.is_empty()).then_some(pending),
        error: None,
        metadata: ExecutionMetadata {
            execution_time: report.elapsed_ms,
            code_type: code_type.as_str().to_string(),
            timestamp: timestamp_now(),
            resource_size,
            bytes_relayed: stats.bytes_received,
            lines_relayed: stats.lines_flushed,
        },
    }))
}
