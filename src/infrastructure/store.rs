//! 目标服务器的文件存储
//!
//! 下发流程只通过 [`DestinationStore`] 写文件，具体实现可以替换。

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

use crate::infrastructure::config::{resolve_env_var, Config, DestinationConfig};
use crate::infrastructure::remote::endpoint;

/// 写入失败的原因
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("存储服务无法访问: {0}")]
    Unreachable(String),

    #[error("存储服务拒绝写入 (HTTP {status})")]
    Rejected { status: u16 },

    #[error("未知的目标服务器: {0}")]
    UnknownDestination(String),
}

#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// 目标服务器是否存在
    fn contains(&self, destination_id: &str) -> bool;

    /// 把内容写入目标服务器的指定路径，已存在时覆盖
    async fn write_content(
        &self,
        destination_id: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError>;
}

/// 通过 Wings 风格的守护进程 API 写文件
pub struct DaemonFileStore {
    client: Client,
    destinations: HashMap<String, DestinationConfig>,
}

impl DaemonFileStore {
    pub fn new(client: Client, destinations: impl IntoIterator<Item = DestinationConfig>) -> Self {
        Self {
            client,
            destinations: destinations
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
        }
    }

    pub fn from_config(client: Client, config: &Config) -> Self {
        Self::new(client, config.destinations.iter().cloned())
    }

    fn write_url(destination: &DestinationConfig, path: &str) -> Result<Url, StoreError> {
        let base = Url::parse(&destination.daemon_url)
            .map_err(|e| StoreError::Unreachable(format!("守护进程地址无效: {e}")))?;
        let mut url = endpoint(
            &base,
            &["api", "servers", &destination.server_uuid, "files", "write"],
        )
        .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        url.query_pairs_mut().append_pair("file", path);
        Ok(url)
    }
}

#[async_trait]
impl DestinationStore for DaemonFileStore {
    fn contains(&self, destination_id: &str) -> bool {
        self.destinations.contains_key(destination_id)
    }

    async fn write_content(
        &self,
        destination_id: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        let destination = self
            .destinations
            .get(destination_id)
            .ok_or_else(|| StoreError::UnknownDestination(destination_id.to_string()))?;
        let url = Self::write_url(destination, path)?;
        debug!(%url, size = bytes.len(), "daemon write");

        let mut request = self.client.post(url).body(bytes);
        let token = resolve_env_var(&destination.token);
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::sync::Mutex;

    /// 记录写入内容的内存存储
    #[derive(Default)]
    pub struct MemoryStore {
        pub destinations: Vec<String>,
        pub fail_with: Option<StoreError>,
        pub writes: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    impl MemoryStore {
        pub fn with_destinations(ids: &[&str]) -> Self {
            Self {
                destinations: ids.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DestinationStore for MemoryStore {
        fn contains(&self, destination_id: &str) -> bool {
            self.destinations.iter().any(|d| d == destination_id)
        }

        async fn write_content(
            &self,
            destination_id: &str,
            path: &str,
            bytes: Vec<u8>,
        ) -> Result<(), StoreError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.writes
                .lock()
                .unwrap()
                .push((destination_id.to_string(), path.to_string(), bytes));
            Ok(())
        }
    }
}
