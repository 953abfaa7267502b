use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};

/// 拉取失败的原因
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// 上游返回了非 2xx 状态码
    #[error("上游返回状态码 {0}")]
    Status(u16),

    /// 连接、超时或读取数据失败
    #[error("网络请求失败: {0}")]
    Transport(String),

    #[error("文件超过大小限制 ({limit} 字节)")]
    TooLarge { limit: u64 },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// 拉取到内存中的文件
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub bytes: Vec<u8>,
    pub sha256: String,
}

impl FetchedArtifact {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 流式下载到内存，同时计算 SHA-256 并回调进度
///
/// 只请求一次，不做重试。`max_bytes` 同时检查 Content-Length 和实际读到的字节数。
pub async fn fetch_artifact(
    client: &Client,
    url: &str,
    max_bytes: u64,
    progress: impl Fn(u64, u64),
) -> Result<FetchedArtifact, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let total_size = response.content_length().unwrap_or(0);
    if total_size > max_bytes {
        return Err(FetchError::TooLarge { limit: max_bytes });
    }

    let mut hasher = Sha256::new();
    let mut downloaded = 0u64;
    let mut data = Vec::with_capacity(total_size as usize);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::Transport(format!("读取数据失败: {e}")))?;
        downloaded += chunk.len() as u64;
        if downloaded > max_bytes {
            return Err(FetchError::TooLarge { limit: max_bytes });
        }
        progress(downloaded, total_size);
        hasher.update(&chunk);
        data.extend_from_slice(&chunk);
    }

    Ok(FetchedArtifact {
        bytes: data,
        sha256: hex::encode(hasher.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_server;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicU64, Ordering};

    async fn server() -> String {
        let router = Router::new()
            .route("/ok.jar", get(|| async { vec![7u8; 2048] }))
            .route("/missing.jar", get(|| async { StatusCode::NOT_FOUND }));
        spawn_server(router).await
    }

    #[tokio::test]
    async fn test_fetch_reports_progress_and_digest() {
        let base = server().await;
        let seen = AtomicU64::new(0);
        let fetched = fetch_artifact(&Client::new(), &format!("{base}/ok.jar"), 4096, |done, _| {
            seen.store(done, Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert_eq!(fetched.len(), 2048);
        assert_eq!(seen.load(Ordering::SeqCst), 2048);
        assert_eq!(fetched.sha256, hex::encode(Sha256::digest(vec![7u8; 2048])));
    }

    #[tokio::test]
    async fn test_fetch_status_failure() {
        let base = server().await;
        let err = fetch_artifact(&Client::new(), &format!("{base}/missing.jar"), 4096, |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Status(404));
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_fetch_size_limit() {
        let base = server().await;
        let err = fetch_artifact(&Client::new(), &format!("{base}/ok.jar"), 1024, |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::TooLarge { limit: 1024 });
    }

    #[tokio::test]
    async fn test_fetch_transport_failure() {
        let err = fetch_artifact(&Client::new(), "http://127.0.0.1:1/x.jar", 1024, |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
        assert_eq!(err.status(), None);
    }
}
