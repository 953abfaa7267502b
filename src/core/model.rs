//! 统一的插件数据模型
//!
//! 所有市场适配器都把各自的响应转换为这里的类型，
//! 会话、过滤和下发逻辑只面向这些类型工作。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 插件市场
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Modrinth JSON API
    Modrinth,
    /// SpigotMC 社区镜像 (Spiget)
    #[serde(rename = "spigot")]
    Spiget,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Modrinth, SourceKind::Spiget];

    /// 命令行与配置中使用的标识
    pub fn slug(&self) -> &'static str {
        match self {
            SourceKind::Modrinth => "modrinth",
            SourceKind::Spiget => "spigot",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Modrinth => write!(f, "Modrinth"),
            SourceKind::Spiget => write!(f, "SpigotMC"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "modrinth" | "mr" => Ok(SourceKind::Modrinth),
            "spigot" | "spigotmc" | "spiget" => Ok(SourceKind::Spiget),
            other => Err(format!("不支持的插件市场: {other}")),
        }
    }
}

/// 搜索排序方式，各适配器自行映射到最接近的上游排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Relevance,
    Downloads,
    Popularity,
    Newest,
    RecentlyUpdated,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relevance" => Ok(SortKey::Relevance),
            "downloads" => Ok(SortKey::Downloads),
            "popularity" | "follows" => Ok(SortKey::Popularity),
            "newest" => Ok(SortKey::Newest),
            "updated" | "recently_updated" => Ok(SortKey::RecentlyUpdated),
            other => Err(format!("不支持的排序方式: {other}")),
        }
    }
}

/// 发布渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Release,
    Beta,
    Alpha,
}

impl Channel {
    /// 解析上游的渠道字段，未知值按 release 处理
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "release" => Ok(Channel::Release),
            "beta" => Ok(Channel::Beta),
            "alpha" => Ok(Channel::Alpha),
            other => Err(format!("未知的发布渠道: {other}")),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Release => write!(f, "release"),
            Channel::Beta => write!(f, "beta"),
            Channel::Alpha => write!(f, "alpha"),
        }
    }
}

/// 市场中的一个插件条目
///
/// `id` 只在同一市场内唯一，全局标识是 `(source, id)`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub download_count: u64,
    pub icon_url: Option<String>,
    pub categories: Vec<String>,
    pub last_modified: DateTime<Utc>,
    pub source: SourceKind,
}

impl UnifiedItem {
    pub fn key(&self) -> (SourceKind, &str) {
        (self.source, self.id.as_str())
    }
}

/// 一个可下载文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub url: String,
    pub filename: String,
    pub is_primary: bool,
    pub size_bytes: u64,
}

/// 插件的一个发布版本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedVersion {
    pub id: String,
    pub display_name: String,
    pub channel: Channel,
    pub published_at: DateTime<Utc>,
    pub download_count: u64,
    pub artifacts: Vec<Artifact>,
    pub compatible_game_versions: Vec<String>,
    pub compatible_loaders: Vec<String>,
}

impl UnifiedVersion {
    /// 实际下载的文件：标记为 primary 的文件，否则第一个
    pub fn effective_artifact(&self) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|a| a.is_primary)
            .or_else(|| self.artifacts.first())
    }

    /// 没有任何文件的版本不可用
    pub fn is_valid(&self) -> bool {
        !self.artifacts.is_empty()
    }

    /// 统一上游数据：去掉重复的兼容性条目，最多保留一个 primary 文件
    pub fn normalized(mut self) -> Self {
        dedup_in_place(&mut self.compatible_game_versions);
        dedup_in_place(&mut self.compatible_loaders);

        let mut seen_primary = false;
        for artifact in &mut self.artifacts {
            if artifact.is_primary {
                if seen_primary {
                    artifact.is_primary = false;
                }
                seen_primary = true;
            }
        }
        self
    }

    /// 比较时忽略下载量这类随时间变化的字段
    pub fn same_release(&self, other: &Self) -> bool {
        self.id == other.id
            && self.display_name == other.display_name
            && self.channel == other.channel
            && self.published_at == other.published_at
            && self.artifacts == other.artifacts
            && self.compatible_game_versions == other.compatible_game_versions
            && self.compatible_loaders == other.compatible_loaders
    }
}

fn dedup_in_place(values: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    values.retain(|v| seen.insert(v.clone()));
}

/// 丢弃无效版本并统一剩余版本
pub fn sanitize_versions(versions: Vec<UnifiedVersion>) -> Vec<UnifiedVersion> {
    versions
        .into_iter()
        .filter(UnifiedVersion::is_valid)
        .map(UnifiedVersion::normalized)
        .collect()
}

/// 统一搜索条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub free_text: String,
    pub category: Option<String>,
    pub loader: Option<String>,
    pub sort: SortKey,
    pub source: SourceKind,
    /// 页码（从 0 开始）
    pub page: u32,
}

impl SearchQuery {
    /// 指定市场的默认查询
    pub fn for_source(source: SourceKind) -> Self {
        Self {
            free_text: String::new(),
            category: None,
            loader: None,
            sort: SortKey::default(),
            source,
            page: 0,
        }
    }

    /// 去掉首尾空白后的关键词，空串视为未填写
    pub fn text(&self) -> Option<&str> {
        let text = self.free_text.trim();
        (!text.is_empty()).then_some(text)
    }

    pub fn category(&self) -> Option<&str> {
        non_blank(self.category.as_deref())
    }

    pub fn loader(&self) -> Option<&str> {
        non_blank(self.loader.as_deref())
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// 上游报告的结果总数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TotalCount {
    Exact(u64),
    /// 上游无法给出总数，可能还有更多页
    Unknown,
}

/// 一页搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultPage {
    pub items: Vec<UnifiedItem>,
    pub total_available: TotalCount,
}

impl SearchResultPage {
    pub fn empty(total_available: TotalCount) -> Self {
        Self {
            items: Vec::new(),
            total_available,
        }
    }
}

/// 下发请求，只在一次下发调用期间存在
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_url: String,
    pub target_filename: String,
    pub destination_id: String,
}

impl TransferRequest {
    /// 用版本的实际下载文件构造请求
    pub fn from_version(version: &UnifiedVersion, destination_id: &str) -> Option<Self> {
        version.effective_artifact().map(|artifact| Self {
            source_url: artifact.url.clone(),
            target_filename: artifact.filename.clone(),
            destination_id: destination_id.to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn artifact(name: &str, primary: bool) -> Artifact {
        Artifact {
            url: format!("https://cdn.example.test/{name}"),
            filename: name.to_string(),
            is_primary: primary,
            size_bytes: 1024,
        }
    }

    pub fn version(id: &str, game_versions: &[&str], loaders: &[&str]) -> UnifiedVersion {
        UnifiedVersion {
            id: id.to_string(),
            display_name: format!("v{id}"),
            channel: Channel::Release,
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            download_count: 10,
            artifacts: vec![artifact(&format!("{id}.jar"), true)],
            compatible_game_versions: game_versions.iter().map(|s| s.to_string()).collect(),
            compatible_loaders: loaders.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn item(source: SourceKind, id: &str, title: &str) -> UnifiedItem {
        UnifiedItem {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            author: "Unknown".to_string(),
            download_count: 0,
            icon_url: None,
            categories: vec!["Plugin".to_string()],
            last_modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            source,
        }
    }
}
