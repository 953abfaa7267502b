//! 多市场聚合
//!
//! 按 [`SourceKind`] 注册适配器，把调用方给出的页码换算成各上游自己的分页参数，
//! 并把不同市场对总数的报告方式统一成界面可以直接使用的分页信息。

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::constants::paging::{ESTIMATED_TOTAL_PLACEHOLDER, PAGE_SIZE};
use super::model::{SearchQuery, SearchResultPage, SourceKind, TotalCount, UnifiedVersion};
use crate::error::SourceError;
use crate::infrastructure::remote::{PageCursor, SourceAdapter};

/// 聚合后的一页结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedPage {
    pub page: SearchResultPage,
    /// 页码（从 0 开始）
    pub page_index: u32,
    /// 用于展示的总数
    pub display_total: u64,
    pub has_next: bool,
    /// `display_total` 是估算值而不是上游报告的总数
    pub total_is_estimate: bool,
}

impl AggregatedPage {
    fn from_page(page: SearchResultPage, page_index: u32, page_size: u32) -> Self {
        let seen_before = page_index as u64 * page_size as u64;
        let seen = seen_before + page.items.len() as u64;

        let (display_total, has_next, total_is_estimate) = match page.total_available {
            TotalCount::Exact(total) => (total, seen < total && !page.items.is_empty(), false),
            // 不足一页说明已经到底，总数就是已看到的条目数
            TotalCount::Unknown if (page.items.len() as u32) < page_size => (seen, false, false),
            TotalCount::Unknown => (seen.max(ESTIMATED_TOTAL_PLACEHOLDER), true, true),
        };

        Self {
            page,
            page_index,
            display_total,
            has_next,
            total_is_estimate,
        }
    }

    /// 总页数，至少为 1
    pub fn page_count(&self, page_size: u32) -> u64 {
        let size = page_size.max(1) as u64;
        self.display_total.div_ceil(size).max(1)
    }
}

/// 适配器注册表
pub struct Aggregator {
    adapters: HashMap<SourceKind, Arc<dyn SourceAdapter>>,
    page_size: u32,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            page_size: PAGE_SIZE,
        }
    }

    /// 用一组适配器创建聚合器
    pub fn with_adapters(adapters: impl IntoIterator<Item = Arc<dyn SourceAdapter>>) -> Self {
        let mut aggregator = Self::new();
        for adapter in adapters {
            aggregator.register(adapter);
        }
        aggregator
    }

    /// 注册适配器，同一市场重复注册时替换旧的
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// 已注册的市场，按固定顺序
    pub fn sources(&self) -> Vec<SourceKind> {
        let mut sources: Vec<SourceKind> = self.adapters.keys().copied().collect();
        sources.sort();
        sources
    }

    fn adapter(&self, source: SourceKind) -> Result<&Arc<dyn SourceAdapter>, SourceError> {
        self.adapters
            .get(&source)
            .ok_or_else(|| SourceError::unavailable(source, "未注册该市场的适配器"))
    }

    /// 把查询发给对应市场
    pub async fn query(&self, query: &SearchQuery) -> Result<AggregatedPage, SourceError> {
        let adapter = self.adapter(query.source)?;
        let cursor = PageCursor::for_page(adapter.pagination(), query.page, self.page_size);
        debug!(source = %query.source, page = query.page, ?cursor, "dispatch search");

        let mut page = adapter.search(query, cursor).await?;
        page.items.truncate(self.page_size as usize);
        page.items.retain(|item| item.source == query.source);

        Ok(AggregatedPage::from_page(page, query.page, self.page_size))
    }

    pub async fn list_versions(
        &self,
        source: SourceKind,
        item_id: &str,
    ) -> Result<Vec<UnifiedVersion>, SourceError> {
        self.adapter(source)?.list_versions(item_id).await
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockAdapter;
    use super::*;

    fn aggregator(adapters: Vec<Arc<MockAdapter>>) -> Aggregator {
        Aggregator::with_adapters(adapters.into_iter().map(|a| a as Arc<dyn SourceAdapter>))
    }

    #[tokio::test]
    async fn test_page_cursor_per_source() {
        let modrinth = Arc::new(MockAdapter::new(SourceKind::Modrinth, 100, TotalCount::Exact(100)));
        let spiget = Arc::new(MockAdapter::new(SourceKind::Spiget, 100, TotalCount::Unknown));
        let agg = aggregator(vec![modrinth.clone(), spiget.clone()]);

        let mut query = SearchQuery::for_source(SourceKind::Modrinth);
        query.page = 2;
        agg.query(&query).await.unwrap();
        query.source = SourceKind::Spiget;
        agg.query(&query).await.unwrap();

        assert_eq!(
            modrinth.cursors.lock().unwrap()[0],
            PageCursor::Offset { offset: 24, limit: 12 }
        );
        assert_eq!(
            spiget.cursors.lock().unwrap()[0],
            PageCursor::Page { number: 3, size: 12 }
        );
    }

    #[tokio::test]
    async fn test_pages_are_bounded_and_single_source() {
        let agg = aggregator(vec![
            Arc::new(MockAdapter::new(SourceKind::Modrinth, 40, TotalCount::Exact(40))),
            Arc::new(MockAdapter::new(SourceKind::Spiget, 40, TotalCount::Unknown)),
        ]);

        for source in SourceKind::ALL {
            for page in 0..5 {
                let mut query = SearchQuery::for_source(source);
                query.page = page;
                let result = agg.query(&query).await.unwrap();
                assert!(result.page.items.len() <= PAGE_SIZE as usize);
                assert!(result.page.items.iter().all(|i| i.source == source));
            }
        }
    }

    #[tokio::test]
    async fn test_exact_total() {
        let agg = aggregator(vec![Arc::new(MockAdapter::new(
            SourceKind::Modrinth,
            30,
            TotalCount::Exact(30),
        ))]);

        let mut query = SearchQuery::for_source(SourceKind::Modrinth);
        let first = agg.query(&query).await.unwrap();
        assert_eq!(first.display_total, 30);
        assert!(first.has_next);
        assert!(!first.total_is_estimate);
        assert_eq!(first.page_count(PAGE_SIZE), 3);

        query.page = 2;
        let last = agg.query(&query).await.unwrap();
        assert_eq!(last.page.items.len(), 6);
        assert!(!last.has_next);
    }

    #[tokio::test]
    async fn test_unknown_total_is_estimated_until_the_end() {
        let agg = aggregator(vec![Arc::new(MockAdapter::new(
            SourceKind::Spiget,
            24,
            TotalCount::Unknown,
        ))]);

        let mut query = SearchQuery::for_source(SourceKind::Spiget);
        let first = agg.query(&query).await.unwrap();
        assert_eq!(first.display_total, ESTIMATED_TOTAL_PLACEHOLDER);
        assert!(first.total_is_estimate);
        assert!(first.has_next);

        query.page = 2;
        let past_end = agg.query(&query).await.unwrap();
        assert!(past_end.page.items.is_empty());
        assert!(!past_end.has_next);
        assert!(!past_end.total_is_estimate);
        assert_eq!(past_end.display_total, 24);
    }

    #[tokio::test]
    async fn test_short_unknown_page_ends_results() {
        let agg = aggregator(vec![Arc::new(MockAdapter::new(
            SourceKind::Spiget,
            5,
            TotalCount::Unknown,
        ))]);
        let result = agg.query(&SearchQuery::for_source(SourceKind::Spiget)).await.unwrap();
        assert_eq!(result.display_total, 5);
        assert!(!result.has_next);
    }

    #[tokio::test]
    async fn test_unregistered_source() {
        let agg = Aggregator::new();
        let err = agg
            .query(&SearchQuery::for_source(SourceKind::Spiget))
            .await
            .unwrap_err();
        assert_eq!(err.source_kind(), SourceKind::Spiget);
        assert!(agg.list_versions(SourceKind::Modrinth, "x").await.is_err());
    }

    #[tokio::test]
    async fn test_failures_propagate() {
        let agg = aggregator(vec![Arc::new(MockAdapter::failing(SourceKind::Modrinth))]);
        let err = agg
            .query(&SearchQuery::for_source(SourceKind::Modrinth))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_register_replaces_same_source() {
        let mut agg = Aggregator::new();
        agg.register(Arc::new(MockAdapter::new(SourceKind::Spiget, 1, TotalCount::Unknown)));
        agg.register(Arc::new(MockAdapter::new(SourceKind::Spiget, 3, TotalCount::Unknown)));
        assert_eq!(agg.sources(), vec![SourceKind::Spiget]);
        let page = agg.query(&SearchQuery::for_source(SourceKind::Spiget)).await.unwrap();
        assert_eq!(page.page.items.len(), 3);
    }
}
