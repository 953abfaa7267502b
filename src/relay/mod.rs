//! 插件下发
//!
//! 一次下发依次经过：校验 → 授权 → 拉取 → 写入。任一步失败都会返回带原因的
//! [`RelayFailure`]，不会重试，也不会清理已经写入的内容。
//! 每次调用最多拉取一次、写入一次。

pub mod server;

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::core::constants::relay::LANDING_DIR;
use crate::core::model::TransferRequest;
use crate::error::AppResult;
use crate::infrastructure::auth::{Authorizer, ConfigAuthorizer};
use crate::infrastructure::config::Config;
use crate::infrastructure::remote::{fetch_artifact, FetchError, HttpClient};
use crate::infrastructure::store::{DaemonFileStore, DestinationStore, StoreError};
use crate::utils::ValidationUtils;

/// 发起下发的操作者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// 下发失败的原因，`reason` 原样展示给用户
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayFailure {
    #[error("请求无效: {0}")]
    InvalidRequest(String),

    #[error("没有权限: {0}")]
    Forbidden(String),

    #[error("下载插件失败: {reason}")]
    UpstreamFetchFailed { status: Option<u16>, reason: String },

    #[error("无法写入服务器: {0}")]
    StorageUnavailable(String),
}

impl From<FetchError> for RelayFailure {
    fn from(err: FetchError) -> Self {
        RelayFailure::UpstreamFetchFailed {
            status: err.status(),
            reason: err.to_string(),
        }
    }
}

impl From<StoreError> for RelayFailure {
    fn from(err: StoreError) -> Self {
        RelayFailure::StorageUnavailable(err.to_string())
    }
}

/// 已写入服务器的文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    pub path: String,
    pub size_bytes: u64,
    pub sha256: String,
}

pub type RelayOutcome = Result<StoredArtifact, RelayFailure>;

/// 校验通过的请求
struct ValidatedRequest<'a> {
    url: String,
    filename: &'a str,
    destination_id: &'a str,
}

pub struct TransferRelay {
    http: Client,
    store: Arc<dyn DestinationStore>,
    authorizer: Arc<dyn Authorizer>,
    max_artifact_bytes: u64,
}

impl TransferRelay {
    pub fn new(
        http: Client,
        store: Arc<dyn DestinationStore>,
        authorizer: Arc<dyn Authorizer>,
        max_artifact_bytes: u64,
    ) -> Self {
        Self {
            http,
            store,
            authorizer,
            max_artifact_bytes,
        }
    }

    /// 按配置创建：守护进程存储 + 配置文件授权
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let http = HttpClient::with_settings(config.http.timeout_secs, &config.http.user_agent)?
            .inner()
            .clone();

        Ok(Self::new(
            http.clone(),
            Arc::new(DaemonFileStore::from_config(http, config)),
            Arc::new(ConfigAuthorizer::from_config(config)),
            config.relay.max_artifact_bytes,
        ))
    }

    pub async fn relay(&self, request: &TransferRequest, actor: &Actor) -> RelayOutcome {
        self.relay_with_progress(request, actor, |_, _| {}).await
    }

    /// 下发一个插件，`progress` 接收已下载字节数和总字节数（未知时为 0）
    pub async fn relay_with_progress(
        &self,
        request: &TransferRequest,
        actor: &Actor,
        progress: impl Fn(u64, u64) + Send,
    ) -> RelayOutcome {
        let span = info_span!(
            "relay",
            request_id = %Uuid::new_v4(),
            actor = %actor.id,
            destination = %request.destination_id,
        );

        async move {
            let outcome = self.run(request, actor, progress).await;
            match &outcome {
                Ok(stored) => info!(path = %stored.path, size = stored.size_bytes, "relay done"),
                Err(failure) => warn!(%failure, "relay failed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request: &TransferRequest,
        actor: &Actor,
        progress: impl Fn(u64, u64) + Send,
    ) -> RelayOutcome {
        let validated = self.validate(request)?;
        info!(filename = validated.filename, "validated");

        if !self
            .authorizer
            .can_create_files(&actor.id, validated.destination_id)
        {
            return Err(RelayFailure::Forbidden(format!(
                "{} 不能在服务器 {} 上创建文件",
                actor.id, validated.destination_id
            )));
        }
        info!("authorized");

        info!(url = %validated.url, "fetching");
        let fetched =
            fetch_artifact(&self.http, &validated.url, self.max_artifact_bytes, progress).await?;

        let path = format!("{LANDING_DIR}/{}", validated.filename);
        let size_bytes = fetched.len();
        info!(%path, size = size_bytes, "writing");
        self.store
            .write_content(validated.destination_id, &path, fetched.bytes)
            .await?;

        Ok(StoredArtifact {
            path,
            size_bytes,
            sha256: fetched.sha256,
        })
    }

    fn validate<'a>(&self, request: &'a TransferRequest) -> Result<ValidatedRequest<'a>, RelayFailure> {
        let url = ValidationUtils::validate_download_url(&request.source_url)
            .map_err(RelayFailure::InvalidRequest)?;
        ValidationUtils::validate_artifact_filename(&request.target_filename)
            .map_err(RelayFailure::InvalidRequest)?;

        let destination_id = request.destination_id.trim();
        if destination_id.is_empty() {
            return Err(RelayFailure::InvalidRequest("缺少目标服务器".to_string()));
        }
        if !self.store.contains(destination_id) {
            return Err(RelayFailure::InvalidRequest(format!(
                "未知的目标服务器: {destination_id}"
            )));
        }

        Ok(ValidatedRequest {
            url: url.to_string(),
            filename: &request.target_filename,
            destination_id,
        })
    }
}
