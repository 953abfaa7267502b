use async_trait::async_trait;

use crate::core::model::{SearchQuery, SearchResultPage, SourceKind, UnifiedVersion};
use crate::error::SourceError;

/// 上游的分页方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// 偏移量 + 条数（Modrinth）
    Offset,
    /// 从 1 开始的页号 + 每页条数（Spiget）
    OneBasedPage,
}

/// 发给适配器的分页参数，由聚合器根据页码换算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    Offset { offset: u32, limit: u32 },
    Page { number: u32, size: u32 },
}

impl PageCursor {
    /// 按上游分页方式换算页码（从 0 开始）
    pub fn for_page(pagination: Pagination, page_index: u32, page_size: u32) -> Self {
        match pagination {
            Pagination::Offset => PageCursor::Offset {
                offset: page_index.saturating_mul(page_size),
                limit: page_size,
            },
            Pagination::OneBasedPage => PageCursor::Page {
                number: page_index.saturating_add(1),
                size: page_size,
            },
        }
    }

    /// 本页最多返回的条目数
    pub fn limit(&self) -> u32 {
        match self {
            PageCursor::Offset { limit, .. } => *limit,
            PageCursor::Page { size, .. } => *size,
        }
    }
}

/// 插件市场适配器
///
/// 适配器不保存状态，可以被并发调用。新增市场只需实现该 trait
/// 并注册到 [`crate::core::aggregator::Aggregator`]。
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn pagination(&self) -> Pagination;

    /// 搜索一页插件，零结果返回空页而不是错误
    async fn search(
        &self,
        query: &SearchQuery,
        cursor: PageCursor,
    ) -> Result<SearchResultPage, SourceError>;

    /// 列出插件的所有可用版本，不含没有文件的版本
    async fn list_versions(&self, item_id: &str) -> Result<Vec<UnifiedVersion>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_conversion() {
        assert_eq!(
            PageCursor::for_page(Pagination::Offset, 3, 12),
            PageCursor::Offset { offset: 36, limit: 12 }
        );
        assert_eq!(
            PageCursor::for_page(Pagination::OneBasedPage, 0, 12),
            PageCursor::Page { number: 1, size: 12 }
        );
        assert_eq!(PageCursor::for_page(Pagination::OneBasedPage, 4, 12).limit(), 12);
    }
}
