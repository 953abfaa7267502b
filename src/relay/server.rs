//! 下发服务的 HTTP 接口
//!
//! `POST /api/relay/download` 接收 `{downloadUrl, filename, destinationId}`，
//! 请求头 `Authorization: Bearer <token>` 按配置映射到操作者。

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::{Actor, RelayFailure, StoredArtifact, TransferRelay};
use crate::core::model::TransferRequest;
use crate::error::{AppError, AppResult};
use crate::infrastructure::config::Config;

/// 共享给所有请求的状态
#[derive(Clone)]
pub struct RelayState {
    relay: Arc<TransferRelay>,
    config: Arc<Config>,
}

impl RelayState {
    pub fn new(relay: Arc<TransferRelay>, config: Arc<Config>) -> Self {
        Self { relay, config }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub download_url: String,
    pub filename: String,
    #[serde(alias = "serverUuid")]
    pub destination_id: String,
}

impl From<DownloadRequest> for TransferRequest {
    fn from(req: DownloadRequest) -> Self {
        Self {
            source_url: req.download_url,
            target_filename: req.filename,
            destination_id: req.destination_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<StoredArtifact> for DownloadResponse {
    fn from(stored: StoredArtifact) -> Self {
        Self {
            success: true,
            path: Some(stored.path),
            size_bytes: Some(stored.size_bytes),
            sha256: Some(stored.sha256),
            message: None,
        }
    }
}

impl DownloadResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            path: None,
            size_bytes: None,
            sha256: None,
            message: Some(message.into()),
        }
    }
}

impl RelayFailure {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayFailure::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayFailure::Forbidden(_) => StatusCode::FORBIDDEN,
            RelayFailure::UpstreamFetchFailed { .. } => StatusCode::BAD_GATEWAY,
            RelayFailure::StorageUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayFailure {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(DownloadResponse::failure(self.to_string())),
        )
            .into_response()
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(DownloadResponse::failure("unauthorised")),
    )
        .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn download(
    State(state): State<RelayState>,
    headers: HeaderMap,
    body: Result<Json<DownloadRequest>, JsonRejection>,
) -> Response {
    let Some(actor) = bearer_token(&headers).and_then(|t| state.config.actor_for_token(t)) else {
        warn!("relay request without a valid token");
        return unauthorized();
    };

    let request: TransferRequest = match body {
        Ok(Json(body)) => body.into(),
        Err(rejection) => {
            return RelayFailure::InvalidRequest(rejection.body_text()).into_response();
        }
    };

    match state.relay.relay(&request, &Actor::new(actor)).await {
        Ok(stored) => Json(DownloadResponse::from(stored)).into_response(),
        Err(failure) => failure.into_response(),
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/relay/download", post(download))
        .with_state(state)
}

/// 启动下发服务，直到收到 Ctrl-C
pub async fn serve(config: Config) -> AppResult<()> {
    if config.relay.tokens.is_empty() {
        warn!("没有配置 [[relay.tokens]]，所有请求都会被拒绝");
    }

    let relay = Arc::new(TransferRelay::from_config(&config)?);
    let bind = config.relay.bind.clone();
    let app = router(RelayState::new(relay, Arc::new(config)));

    let listener = TcpListener::bind(&bind).await?;
    info!(addr = %bind, "relay server listening");
    println!("🚀 下发服务已启动: http://{bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
        .map_err(|e| AppError::internal(format!("下发服务异常退出: {e}")))?;

    info!("relay server stopped");
    Ok(())
}
