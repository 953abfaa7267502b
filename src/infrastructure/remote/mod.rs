pub mod download;
pub mod http_client;
pub mod modrinth;
pub mod source;
pub mod spiget;

pub use download::{fetch_artifact, FetchError, FetchedArtifact};
pub use http_client::*;
pub use modrinth::ModrinthAdapter;
pub use source::{PageCursor, Pagination, SourceAdapter};
pub use spiget::SpigetAdapter;

use std::sync::Arc;

use crate::infrastructure::config::Config;

/// 作者缺失时的占位
pub(crate) fn normalize_author(author: Option<String>) -> String {
    author
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// 没有分类的条目归入 "Plugin"
pub(crate) fn normalize_categories(categories: Vec<String>) -> Vec<String> {
    let categories: Vec<String> = categories
        .into_iter()
        .filter(|c| !c.trim().is_empty())
        .collect();
    if categories.is_empty() {
        vec!["Plugin".to_string()]
    } else {
        categories
    }
}

pub(crate) fn normalize_icon(icon: Option<String>) -> Option<String> {
    icon.filter(|url| !url.trim().is_empty())
}

/// 按配置创建所有市场适配器，共享同一个 HTTP 客户端
pub fn build_adapters(config: &Config) -> Result<Vec<Arc<dyn SourceAdapter>>, NetworkError> {
    let http = HttpClient::with_settings(config.http.timeout_secs, &config.http.user_agent)?;
    let modrinth = ModrinthAdapter::new(http.clone(), &config.sources.modrinth_url)?;
    let spiget = SpigetAdapter::new(
        http,
        &config.sources.spiget_url,
        &config.sources.spigot_site_url,
    )?;
    Ok(vec![Arc::new(modrinth), Arc::new(spiget)])
}
