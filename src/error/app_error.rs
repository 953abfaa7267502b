use std::io;
use thiserror::Error;

use crate::core::model::SourceKind;
use crate::infrastructure::remote::NetworkError;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO 错误: {0}")]
    Io(#[from] io::Error),

    #[error("配置错误: {message}")]
    Config { message: String },

    #[error("网络错误: {message}")]
    Network { message: String },

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("验证错误: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("内部错误: {message}")]
    Internal { message: String },
}

/// 插件市场访问错误
///
/// 网络失败、非 2xx 响应与无法解析的响应体统一归为 `Unavailable`，
/// 空结果不是错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("{market} 暂不可用{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Unavailable {
        market: SourceKind,
        message: Option<String>,
    },
}

impl SourceError {
    pub fn unavailable(market: SourceKind, message: impl Into<String>) -> Self {
        Self::Unavailable {
            market,
            message: Some(message.into()),
        }
    }

    /// 出错的市场
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Self::Unavailable { market, .. } => *market,
        }
    }
}

/// 应用程序 Result 类型
pub type AppResult<T> = Result<T, AppError>;

/// 便捷的错误创建函数
impl AppError {
    pub fn config_load_failed(path: &str, reason: &str) -> Self {
        Self::Config {
            message: format!("无法加载配置文件 {}: {}", path, reason),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<NetworkError> for AppError {
    fn from(error: NetworkError) -> Self {
        Self::Network {
            message: error.to_string(),
        }
    }
}

impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}
