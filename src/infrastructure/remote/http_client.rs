use crate::core::constants::network;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// HTTP 客户端包装器
///
/// 内部的 `reqwest::Client` 自带连接池，克隆开销很小，可在适配器之间共享。
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// 创建新的 HTTP 客户端
    pub fn new() -> Result<Self, NetworkError> {
        Self::with_settings(network::DEFAULT_TIMEOUT_SECS, network::USER_AGENT)
    }

    /// 创建带自定义超时和 User-Agent 的 HTTP 客户端
    pub fn with_settings(timeout_secs: u64, user_agent: &str) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// 底层客户端
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// GET 请求，不检查状态码
    pub async fn get(&self, url: Url) -> Result<Response, NetworkError> {
        let response = self.client.get(url).send().await?;
        Ok(response)
    }

    /// GET 请求并返回 JSON，非 2xx 状态码视为错误
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, NetworkError> {
        let response = self.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::from_status(status));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| NetworkError::Decode(e.to_string()))
    }
}

/// 在基础地址后追加路径段，路径段会被正确转义
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, NetworkError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| NetworkError::GenericError(format!("无法作为基础地址: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// 网络错误类型
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Not found")]
    NotFound,

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Malformed response body: {0}")]
    Decode(String),

    #[error("Generic error: {0}")]
    GenericError(String),
}

impl NetworkError {
    /// 从 HTTP 状态码创建错误
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::INTERNAL_SERVER_ERROR => {
                Self::ServerError("Internal server error".to_string())
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                Self::ServerError("Service unavailable".to_string())
            }
            _ => Self::Status(status.as_u16()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
