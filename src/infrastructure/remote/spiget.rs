use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

use super::http_client::{endpoint, HttpClient, NetworkError};
use super::source::{PageCursor, Pagination, SourceAdapter};
use super::{normalize_author, normalize_categories, normalize_icon};
use crate::core::catalog::SPIGET_LOADERS;
use crate::core::constants::paging::SPIGET_VERSION_LIMIT;
use crate::core::constants::relay::ARTIFACT_EXTENSION;
use crate::core::model::{
    sanitize_versions, Artifact, Channel, SearchQuery, SearchResultPage, SortKey, SourceKind,
    TotalCount, UnifiedItem, UnifiedVersion,
};
use crate::error::SourceError;

#[derive(Debug, Deserialize)]
struct SpigetResource {
    id: u64,
    name: String,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    author: Option<SpigetRef>,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    icon: Option<SpigetIcon>,
    #[serde(default)]
    category: Option<SpigetRef>,
    #[serde(rename = "updateDate", default)]
    update_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SpigetRef {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpigetIcon {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct SpigetVersion {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "releaseDate", default)]
    release_date: Option<i64>,
    #[serde(default)]
    downloads: u64,
}

/// 秒级时间戳转换为 UTC 时间，缺失或越界时取 Unix 纪元
fn from_epoch_seconds(secs: Option<i64>) -> DateTime<Utc> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or_default()
}

/// 用资源名生成文件名，非字母数字字符替换为下划线
pub(crate) fn artifact_filename(title: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]").expect("static regex"));
    format!("{}{}", re.replace_all(title, "_"), ARTIFACT_EXTENSION)
}

/// Spiget 适配器：按路径区分搜索模式，页号分页，不提供总数
pub struct SpigetAdapter {
    http: HttpClient,
    base_url: Url,
    site_url: String,
}

impl SpigetAdapter {
    pub fn new(http: HttpClient, base_url: &str, site_url: &str) -> Result<Self, NetworkError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            site_url: site_url.trim_end_matches('/').to_string(),
        })
    }

    /// Spiget 没有相关度和关注度排序，按下载量代替
    fn sort_param(sort: SortKey) -> &'static str {
        match sort {
            SortKey::Relevance | SortKey::Downloads | SortKey::Popularity => "-downloads",
            SortKey::Newest => "-releaseDate",
            SortKey::RecentlyUpdated => "-updateDate",
        }
    }

    pub(crate) fn search_url(
        &self,
        query: &SearchQuery,
        cursor: PageCursor,
    ) -> Result<Url, NetworkError> {
        let (page, size) = match cursor {
            PageCursor::Page { number, size } => (number, size),
            PageCursor::Offset { offset, limit } => (offset / limit.max(1) + 1, limit),
        };

        if query.loader().is_some() {
            debug!("spiget 不支持按加载器过滤，忽略 loader 条件");
        }

        let mut url = match (query.text(), query.category()) {
            (Some(text), category) => {
                if category.is_some() {
                    debug!("spiget 关键词搜索不支持分类，忽略 category 条件");
                }
                let mut url = endpoint(&self.base_url, &["search", "resources", text])?;
                url.query_pairs_mut().append_pair("field", "name");
                url
            }
            (None, Some(category)) => {
                endpoint(&self.base_url, &["categories", category, "resources"])?
            }
            (None, None) => endpoint(&self.base_url, &["resources"])?,
        };

        url.query_pairs_mut()
            .append_pair("size", &size.to_string())
            .append_pair("page", &page.to_string())
            .append_pair("sort", Self::sort_param(query.sort));
        Ok(url)
    }

    fn into_item(&self, resource: SpigetResource) -> UnifiedItem {
        let icon_url = resource
            .icon
            .map(|icon| icon.url)
            .filter(|path| !path.is_empty())
            .map(|path| format!("{}/{}", self.site_url, path.trim_start_matches('/')));

        UnifiedItem {
            id: resource.id.to_string(),
            title: resource.name,
            description: resource.tag.unwrap_or_default(),
            author: normalize_author(resource.author.and_then(|a| a.name)),
            download_count: resource.downloads,
            icon_url: normalize_icon(icon_url),
            categories: normalize_categories(
                resource.category.and_then(|c| c.name).into_iter().collect(),
            ),
            last_modified: from_epoch_seconds(resource.update_date),
            source: SourceKind::Spiget,
        }
    }

    fn download_url(&self, item_id: &str, version_id: u64) -> Result<Url, NetworkError> {
        endpoint(
            &self.base_url,
            &["resources", item_id, "versions", &version_id.to_string(), "download"],
        )
    }

    fn unavailable(err: NetworkError) -> SourceError {
        SourceError::unavailable(SourceKind::Spiget, err.to_string())
    }
}

#[async_trait]
impl SourceAdapter for SpigetAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Spiget
    }

    fn pagination(&self) -> Pagination {
        Pagination::OneBasedPage
    }

    async fn search(
        &self,
        query: &SearchQuery,
        cursor: PageCursor,
    ) -> Result<SearchResultPage, SourceError> {
        let url = self.search_url(query, cursor).map_err(Self::unavailable)?;
        debug!(%url, "spiget search");

        let resources: Vec<SpigetResource> = match self.http.get_json(url).await {
            Ok(resources) => resources,
            // Spiget 对没有结果的搜索返回 404
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(Self::unavailable(e)),
        };

        let mut items: Vec<UnifiedItem> = resources.into_iter().map(|r| self.into_item(r)).collect();
        items.truncate(cursor.limit() as usize);

        Ok(SearchResultPage {
            items,
            total_available: TotalCount::Unknown,
        })
    }

    async fn list_versions(&self, item_id: &str) -> Result<Vec<UnifiedVersion>, SourceError> {
        let resource_url =
            endpoint(&self.base_url, &["resources", item_id]).map_err(Self::unavailable)?;
        let mut versions_url = endpoint(&self.base_url, &["resources", item_id, "versions"])
            .map_err(Self::unavailable)?;
        versions_url
            .query_pairs_mut()
            .append_pair("size", &SPIGET_VERSION_LIMIT.to_string())
            .append_pair("sort", "-releaseDate");
        debug!(%versions_url, "spiget versions");

        // 文件名取自资源名，需要同时拉取资源详情
        let (resource, versions) = tokio::try_join!(
            self.http.get_json::<SpigetResource>(resource_url),
            self.http.get_json::<Vec<SpigetVersion>>(versions_url),
        )
        .map_err(Self::unavailable)?;

        let filename = artifact_filename(&resource.name);
        let mut unified = Vec::with_capacity(versions.len());
        for version in versions {
            let url = match self.download_url(item_id, version.id) {
                Ok(url) => url,
                Err(e) => {
                    warn!(version = version.id, error = %e, "无法构造下载地址，跳过该版本");
                    continue;
                }
            };
            unified.push(UnifiedVersion {
                id: version.id.to_string(),
                display_name: version
                    .name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| format!("Version {}", version.id)),
                channel: Channel::Release,
                published_at: from_epoch_seconds(version.release_date),
                download_count: version.downloads,
                artifacts: vec![Artifact {
                    url: url.to_string(),
                    filename: filename.clone(),
                    is_primary: true,
                    size_bytes: 0,
                }],
                compatible_game_versions: Vec::new(),
                compatible_loaders: SPIGET_LOADERS.iter().map(|l| l.to_string()).collect(),
            });
        }

        Ok(sanitize_versions(unified))
    }
}
