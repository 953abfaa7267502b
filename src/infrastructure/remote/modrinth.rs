use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::http_client::{endpoint, HttpClient, NetworkError};
use super::source::{PageCursor, Pagination, SourceAdapter};
use super::{normalize_author, normalize_categories, normalize_icon};
use crate::core::model::{
    sanitize_versions, Artifact, Channel, SearchQuery, SearchResultPage, SortKey, SourceKind,
    TotalCount, UnifiedItem, UnifiedVersion,
};
use crate::error::SourceError;

/// Modrinth 搜索返回体
#[derive(Debug, Deserialize)]
struct ModrinthSearchResponse {
    #[serde(default)]
    hits: Vec<ModrinthHit>,
    total_hits: u64,
}

#[derive(Debug, Deserialize)]
struct ModrinthHit {
    project_id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    icon_url: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    date_modified: DateTime<Utc>,
}

impl ModrinthHit {
    fn into_item(self) -> UnifiedItem {
        UnifiedItem {
            id: self.project_id,
            title: self.title,
            description: self.description,
            author: normalize_author(self.author),
            download_count: self.downloads,
            icon_url: normalize_icon(self.icon_url),
            categories: normalize_categories(self.categories),
            last_modified: self.date_modified,
            source: SourceKind::Modrinth,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModrinthVersion {
    id: String,
    name: String,
    #[serde(default)]
    version_type: String,
    date_published: DateTime<Utc>,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    files: Vec<ModrinthFile>,
    #[serde(default)]
    game_versions: Vec<String>,
    #[serde(default)]
    loaders: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModrinthFile {
    url: String,
    filename: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    size: u64,
}

impl ModrinthVersion {
    fn into_version(self) -> UnifiedVersion {
        UnifiedVersion {
            id: self.id,
            display_name: self.name,
            channel: Channel::parse_lenient(&self.version_type),
            published_at: self.date_published,
            download_count: self.downloads,
            artifacts: self
                .files
                .into_iter()
                .map(|f| Artifact {
                    url: f.url,
                    filename: f.filename,
                    is_primary: f.primary,
                    size_bytes: f.size,
                })
                .collect(),
            compatible_game_versions: self.game_versions,
            compatible_loaders: self.loaders,
        }
    }
}

/// Modrinth 适配器：结构化 facets 过滤，偏移量分页，返回精确总数
pub struct ModrinthAdapter {
    http: HttpClient,
    base_url: Url,
}

impl ModrinthAdapter {
    pub fn new(http: HttpClient, base_url: &str) -> Result<Self, NetworkError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    fn sort_index(sort: SortKey) -> &'static str {
        match sort {
            SortKey::Relevance => "relevance",
            SortKey::Downloads => "downloads",
            SortKey::Popularity => "follows",
            SortKey::Newest => "newest",
            SortKey::RecentlyUpdated => "updated",
        }
    }

    /// 构造 facets：每个内层数组是一组 OR 条件，数组之间为 AND
    fn facets(query: &SearchQuery) -> String {
        let mut facets = vec![vec!["project_type:plugin".to_string()]];
        if let Some(category) = query.category() {
            facets.push(vec![format!("categories:{category}")]);
        }
        if let Some(loader) = query.loader() {
            facets.push(vec![format!("categories:{loader}")]);
        }
        serde_json::Value::from(facets).to_string()
    }

    pub(crate) fn search_url(
        &self,
        query: &SearchQuery,
        cursor: PageCursor,
    ) -> Result<Url, NetworkError> {
        let (offset, limit) = match cursor {
            PageCursor::Offset { offset, limit } => (offset, limit),
            PageCursor::Page { number, size } => (number.saturating_sub(1) * size, size),
        };

        let mut url = endpoint(&self.base_url, &["search"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("facets", &Self::facets(query))
                .append_pair("limit", &limit.to_string())
                .append_pair("offset", &offset.to_string())
                .append_pair("index", Self::sort_index(query.sort));
            if let Some(text) = query.text() {
                pairs.append_pair("query", text);
            }
        }
        Ok(url)
    }

    fn unavailable(err: NetworkError) -> SourceError {
        SourceError::unavailable(SourceKind::Modrinth, err.to_string())
    }
}

#[async_trait]
impl SourceAdapter for ModrinthAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Modrinth
    }

    fn pagination(&self) -> Pagination {
        Pagination::Offset
    }

    async fn search(
        &self,
        query: &SearchQuery,
        cursor: PageCursor,
    ) -> Result<SearchResultPage, SourceError> {
        let url = self.search_url(query, cursor).map_err(Self::unavailable)?;
        debug!(%url, "modrinth search");

        let response: ModrinthSearchResponse =
            self.http.get_json(url).await.map_err(Self::unavailable)?;

        let mut items: Vec<UnifiedItem> =
            response.hits.into_iter().map(ModrinthHit::into_item).collect();
        items.truncate(cursor.limit() as usize);

        Ok(SearchResultPage {
            items,
            total_available: TotalCount::Exact(response.total_hits),
        })
    }

    async fn list_versions(&self, item_id: &str) -> Result<Vec<UnifiedVersion>, SourceError> {
        let url = endpoint(&self.base_url, &["project", item_id, "version"])
            .map_err(Self::unavailable)?;
        debug!(%url, "modrinth versions");

        let versions: Vec<ModrinthVersion> =
            self.http.get_json(url).await.map_err(Self::unavailable)?;

        Ok(sanitize_versions(
            versions.into_iter().map(ModrinthVersion::into_version).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_server;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn hit(id: &str, title: &str) -> Value {
        json!({
            "project_id": id,
            "title": title,
            "description": "Edit the world",
            "author": "sk89q",
            "downloads": 1200,
            "icon_url": "https://cdn.modrinth.com/icon.png",
            "categories": ["utility", "paper"],
            "date_modified": "2024-03-01T12:00:00Z"
        })
    }

    async fn adapter_for(router: Router) -> ModrinthAdapter {
        let base = spawn_server(router).await;
        ModrinthAdapter::new(HttpClient::new().unwrap(), &format!("{base}/v2")).unwrap()
    }

    #[test]
    fn test_search_url_shape() {
        let adapter =
            ModrinthAdapter::new(HttpClient::new().unwrap(), "https://api.modrinth.com/v2")
                .unwrap();
        let mut query = SearchQuery::for_source(SourceKind::Modrinth);
        query.free_text = "world edit".to_string();
        query.category = Some("utility".to_string());
        query.loader = Some("paper".to_string());
        query.sort = SortKey::Popularity;

        let url = adapter
            .search_url(&query, PageCursor::Offset { offset: 24, limit: 12 })
            .unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/v2/search");
        assert_eq!(
            pairs["facets"],
            r#"[["project_type:plugin"],["categories:utility"],["categories:paper"]]"#
        );
        assert_eq!(pairs["limit"], "12");
        assert_eq!(pairs["offset"], "24");
        assert_eq!(pairs["index"], "follows");
        assert_eq!(pairs["query"], "world edit");
    }

    #[test]
    fn test_blank_text_omits_query_param() {
        let adapter =
            ModrinthAdapter::new(HttpClient::new().unwrap(), "https://api.modrinth.com/v2")
                .unwrap();
        let mut query = SearchQuery::for_source(SourceKind::Modrinth);
        query.free_text = "   ".to_string();
        let url = adapter
            .search_url(&query, PageCursor::Offset { offset: 0, limit: 12 })
            .unwrap();
        assert!(!url.query_pairs().any(|(k, _)| k == "query"));
    }

    #[tokio::test]
    async fn test_search_two_hits() {
        let router = Router::new().route(
            "/v2/search",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("query").map(String::as_str), Some("worldedit"));
                Json(json!({
                    "hits": [hit("1u6JkXh5", "WorldEdit"), hit("abc", "WorldEditSUI")],
                    "total_hits": 2
                }))
            }),
        );
        let adapter = adapter_for(router).await;

        let mut query = SearchQuery::for_source(SourceKind::Modrinth);
        query.free_text = "worldedit".to_string();
        let page = adapter
            .search(&query, PageCursor::for_page(Pagination::Offset, 0, 12))
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_available, TotalCount::Exact(2));
        assert!(page.items.iter().all(|i| i.source == SourceKind::Modrinth));
        assert_eq!(page.items[0].author, "sk89q");
        assert_eq!(page.items[0].download_count, 1200);
    }

    #[tokio::test]
    async fn test_search_defaults_and_page_cap() {
        let hits: Vec<Value> = (0..15)
            .map(|i| {
                json!({
                    "project_id": format!("p{i}"),
                    "title": format!("Plugin {i}"),
                    "icon_url": "",
                    "date_modified": "2024-03-01T12:00:00Z"
                })
            })
            .collect();
        let router = Router::new().route(
            "/v2/search",
            get(move || {
                let hits = hits.clone();
                async move { Json(json!({ "hits": hits, "total_hits": 300 })) }
            }),
        );
        let adapter = adapter_for(router).await;

        let page = adapter
            .search(
                &SearchQuery::for_source(SourceKind::Modrinth),
                PageCursor::for_page(Pagination::Offset, 0, 12),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 12);
        let first = &page.items[0];
        assert_eq!(first.author, "Unknown");
        assert_eq!(first.download_count, 0);
        assert_eq!(first.icon_url, None);
        assert_eq!(first.categories, vec!["Plugin"]);
    }

    #[tokio::test]
    async fn test_search_failures_are_source_unavailable() {
        let router = Router::new()
            .route(
                "/v2/search",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
            )
            .route("/v2/project/{id}/version", get(|| async { "not json" }));
        let adapter = adapter_for(router).await;

        let err = adapter
            .search(
                &SearchQuery::for_source(SourceKind::Modrinth),
                PageCursor::for_page(Pagination::Offset, 0, 12),
            )
            .await
            .unwrap_err();
        assert_eq!(err.source_kind(), SourceKind::Modrinth);

        let err = adapter.list_versions("abc").await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { message: Some(_), .. }));
    }

    #[tokio::test]
    async fn test_list_versions_normalizes() {
        let router = Router::new().route(
            "/v2/project/{id}/version",
            get(|Path(id): Path<String>| async move {
                assert_eq!(id, "worldedit");
                Json(json!([
                    {
                        "id": "v2",
                        "name": "7.3.0-beta",
                        "version_type": "beta",
                        "date_published": "2024-02-01T00:00:00Z",
                        "downloads": 50,
                        "files": [
                            {"url": "https://cdn.modrinth.com/we-sources.jar", "filename": "we-sources.jar", "primary": false, "size": 10},
                            {"url": "https://cdn.modrinth.com/we.jar", "filename": "we.jar", "primary": true, "size": 2048}
                        ],
                        "game_versions": ["1.20.4", "1.20.1"],
                        "loaders": ["paper", "spigot"]
                    },
                    {
                        "id": "broken",
                        "name": "no files",
                        "version_type": "release",
                        "date_published": "2024-01-01T00:00:00Z",
                        "files": []
                    },
                    {
                        "id": "v1",
                        "name": "7.2.0",
                        "version_type": "release",
                        "date_published": "2023-12-01T00:00:00Z",
                        "files": [
                            {"url": "https://cdn.modrinth.com/a.jar", "filename": "a.jar", "primary": false, "size": 1},
                            {"url": "https://cdn.modrinth.com/b.jar", "filename": "b.jar", "primary": false, "size": 1}
                        ]
                    }
                ]))
            }),
        );
        let adapter = adapter_for(router).await;

        let versions = adapter.list_versions("worldedit").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].channel, Channel::Beta);
        assert_eq!(versions[0].effective_artifact().unwrap().filename, "we.jar");
        assert_eq!(versions[1].effective_artifact().unwrap().filename, "a.jar");
        assert!(versions[1].compatible_loaders.is_empty());

        let again = adapter.list_versions("worldedit").await.unwrap();
        assert!(versions.iter().zip(&again).all(|(a, b)| a.same_release(b)));
    }
}
