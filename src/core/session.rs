//! 浏览会话状态
//!
//! [`BrowserSession`] 是纯状态机：每次会影响查询的修改都会签发一个递增的票据，
//! 只有最新票据对应的结果才会被应用，旧结果直接丢弃。
//! [`SessionDriver`] 负责按票据真正发起请求。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::aggregator::{AggregatedPage, Aggregator};
use super::constants::SEARCH_DEBOUNCE;
use super::filter::{self, VersionFilters};
use super::model::{SearchQuery, SortKey, SourceKind, UnifiedItem, UnifiedVersion};
use crate::error::SourceError;

/// 搜索阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchPhase {
    /// 尚未发起搜索
    Idle,
    Searching { ticket: u64 },
    /// 最新一次搜索已完成（成功或失败）
    Browsing,
}

/// 需要执行的搜索
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub ticket: u64,
    pub query: SearchQuery,
    /// 执行前等待的时间，关键词输入使用防抖
    pub delay: Duration,
}

/// 需要拉取的版本列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInspection {
    pub ticket: u64,
    pub source: SourceKind,
    pub item_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// 结果已过期，被丢弃
    Stale,
}

/// 正在查看的插件及其版本
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionState {
    pub item: UnifiedItem,
    pub ticket: u64,
    pub loading: bool,
    pub versions: Vec<UnifiedVersion>,
    pub error: Option<String>,
    pub filters: VersionFilters,
    pub available_game_versions: Vec<String>,
    pub available_loaders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Inspection {
    NoSelection,
    Inspecting(Box<InspectionState>),
}

/// 一个浏览会话
#[derive(Debug, Clone)]
pub struct BrowserSession {
    query: SearchQuery,
    phase: SearchPhase,
    latest_ticket: u64,
    results: Option<AggregatedPage>,
    error: Option<String>,
    inspection: Inspection,
    inspection_ticket: u64,
}

impl BrowserSession {
    pub fn new(source: SourceKind) -> Self {
        Self {
            query: SearchQuery::for_source(source),
            phase: SearchPhase::Idle,
            latest_ticket: 0,
            results: None,
            error: None,
            inspection: Inspection::NoSelection,
            inspection_ticket: 0,
        }
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn results(&self) -> Option<&AggregatedPage> {
        self.results.as_ref()
    }

    pub fn items(&self) -> &[UnifiedItem] {
        self.results
            .as_ref()
            .map(|r| r.page.items.as_slice())
            .unwrap_or_default()
    }

    /// 最近一次搜索失败的提示
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn inspection(&self) -> &Inspection {
        &self.inspection
    }

    /// 当前状态的副本，供界面读取
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        ticket == self.latest_ticket
    }

    fn issue(&mut self, delay: Duration) -> PendingQuery {
        self.latest_ticket += 1;
        self.phase = SearchPhase::Searching {
            ticket: self.latest_ticket,
        };
        PendingQuery {
            ticket: self.latest_ticket,
            query: self.query.clone(),
            delay,
        }
    }

    fn issue_from_first_page(&mut self, delay: Duration) -> PendingQuery {
        self.query.page = 0;
        self.issue(delay)
    }

    /// 修改关键词，带防抖
    pub fn set_free_text(&mut self, text: impl Into<String>) -> PendingQuery {
        self.query.free_text = text.into();
        self.issue_from_first_page(SEARCH_DEBOUNCE)
    }

    pub fn set_category(&mut self, category: Option<String>) -> PendingQuery {
        self.query.category = category;
        self.issue_from_first_page(Duration::ZERO)
    }

    pub fn set_loader(&mut self, loader: Option<String>) -> PendingQuery {
        self.query.loader = loader;
        self.issue_from_first_page(Duration::ZERO)
    }

    pub fn set_sort(&mut self, sort: SortKey) -> PendingQuery {
        self.query.sort = sort;
        self.issue_from_first_page(Duration::ZERO)
    }

    /// 切换市场：关键词、过滤条件、排序和页码全部恢复默认
    pub fn set_source(&mut self, source: SourceKind) -> PendingQuery {
        debug!(from = %self.query.source, to = %source, "switch source");
        self.query = SearchQuery::for_source(source);
        self.results = None;
        self.error = None;
        self.close_inspection();
        self.issue(Duration::ZERO)
    }

    /// 下一页，已经到底时返回 `None`
    pub fn next_page(&mut self) -> Option<PendingQuery> {
        let has_next = self.results.as_ref().is_some_and(|r| r.has_next);
        if !has_next {
            return None;
        }
        self.query.page += 1;
        Some(self.issue(Duration::ZERO))
    }

    pub fn prev_page(&mut self) -> Option<PendingQuery> {
        if self.query.page == 0 {
            return None;
        }
        self.query.page -= 1;
        Some(self.issue(Duration::ZERO))
    }

    /// 用当前条件重新搜索，也用于首次加载和失败后重试
    pub fn refresh(&mut self) -> PendingQuery {
        self.issue(Duration::ZERO)
    }

    /// 应用搜索结果，非最新票据的结果被丢弃
    pub fn apply_search(
        &mut self,
        ticket: u64,
        result: Result<AggregatedPage, SourceError>,
    ) -> ApplyOutcome {
        if !self.is_current(ticket) {
            trace!(ticket, latest = self.latest_ticket, "drop stale search result");
            return ApplyOutcome::Stale;
        }

        self.phase = SearchPhase::Browsing;
        match result {
            Ok(page) => {
                self.results = Some(page);
                self.error = None;
            }
            Err(e) => {
                self.results = None;
                self.error = Some(e.to_string());
            }
        }
        ApplyOutcome::Applied
    }

    /// 选中一个插件，开始加载版本列表
    pub fn inspect(&mut self, item: UnifiedItem) -> PendingInspection {
        self.inspection_ticket += 1;
        let pending = PendingInspection {
            ticket: self.inspection_ticket,
            source: item.source,
            item_id: item.id.clone(),
        };
        self.inspection = Inspection::Inspecting(Box::new(InspectionState {
            item,
            ticket: self.inspection_ticket,
            loading: true,
            versions: Vec::new(),
            error: None,
            filters: VersionFilters::default(),
            available_game_versions: Vec::new(),
            available_loaders: Vec::new(),
        }));
        pending
    }

    pub fn apply_versions(
        &mut self,
        ticket: u64,
        result: Result<Vec<UnifiedVersion>, SourceError>,
    ) -> ApplyOutcome {
        let state = match &mut self.inspection {
            Inspection::Inspecting(state) if state.ticket == ticket => state,
            _ => {
                trace!(ticket, "drop stale version list");
                return ApplyOutcome::Stale;
            }
        };

        state.loading = false;
        match result {
            Ok(versions) => {
                state.available_game_versions = filter::available_game_versions(&versions);
                state.available_loaders = filter::available_loaders(&versions);
                state.versions = versions;
                state.error = None;
            }
            Err(e) => {
                state.versions.clear();
                state.available_game_versions.clear();
                state.available_loaders.clear();
                state.error = Some(e.to_string());
            }
        }
        ApplyOutcome::Applied
    }

    pub fn close_inspection(&mut self) {
        self.inspection = Inspection::NoSelection;
    }

    pub fn set_version_filters(&mut self, filters: VersionFilters) {
        if let Inspection::Inspecting(state) = &mut self.inspection {
            state.filters = filters;
        }
    }

    /// 过滤后的版本列表
    pub fn visible_versions(&self) -> Vec<UnifiedVersion> {
        match &self.inspection {
            Inspection::Inspecting(state) => filter::apply(&state.versions, &state.filters),
            Inspection::NoSelection => Vec::new(),
        }
    }
}

/// 异步执行会话签发的请求
///
/// 网络请求在锁外进行，结果回到锁内按票据应用。
#[derive(Clone)]
pub struct SessionDriver {
    session: Arc<Mutex<BrowserSession>>,
    aggregator: Arc<Aggregator>,
}

impl SessionDriver {
    pub fn new(aggregator: Arc<Aggregator>, source: SourceKind) -> Self {
        Self {
            session: Arc::new(Mutex::new(BrowserSession::new(source))),
            aggregator,
        }
    }

    pub async fn snapshot(&self) -> BrowserSession {
        self.session.lock().await.snapshot()
    }

    /// 在锁内修改会话，如果产生了新查询就立即派发
    pub async fn update<F>(&self, mutate: F) -> Option<JoinHandle<ApplyOutcome>>
    where
        F: FnOnce(&mut BrowserSession) -> Option<PendingQuery>,
    {
        let pending = {
            let mut session = self.session.lock().await;
            mutate(&mut session)
        };
        pending.map(|p| self.dispatch(p))
    }

    /// 派发一个查询：等待防抖，检查是否已被取代，然后搜索
    pub fn dispatch(&self, pending: PendingQuery) -> JoinHandle<ApplyOutcome> {
        let session = Arc::clone(&self.session);
        let aggregator = Arc::clone(&self.aggregator);
        tokio::spawn(async move {
            if !pending.delay.is_zero() {
                tokio::time::sleep(pending.delay).await;
                if !session.lock().await.is_current(pending.ticket) {
                    trace!(ticket = pending.ticket, "query superseded during debounce");
                    return ApplyOutcome::Stale;
                }
            }

            let result = aggregator.query(&pending.query).await;
            session.lock().await.apply_search(pending.ticket, result)
        })
    }

    /// 选中插件并加载版本
    pub async fn inspect(&self, item: UnifiedItem) -> JoinHandle<ApplyOutcome> {
        let pending = self.session.lock().await.inspect(item);
        let session = Arc::clone(&self.session);
        let aggregator = Arc::clone(&self.aggregator);
        tokio::spawn(async move {
            let result = aggregator
                .list_versions(pending.source, &pending.item_id)
                .await;
            session.lock().await.apply_versions(pending.ticket, result)
        })
    }

    pub async fn set_version_filters(&self, filters: VersionFilters) {
        self.session.lock().await.set_version_filters(filters);
    }

    pub async fn close_inspection(&self) {
        self.session.lock().await.close_inspection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregator::mock::MockAdapter;
    use crate::core::model::{fixtures, SearchResultPage, TotalCount};
    use crate::infrastructure::remote::SourceAdapter;

    fn page_of(titles: &[&str], source: SourceKind) -> AggregatedPage {
        AggregatedPage {
            page: SearchResultPage {
                items: titles
                    .iter()
                    .enumerate()
                    .map(|(i, t)| fixtures::item(source, &i.to_string(), t))
                    .collect(),
                total_available: TotalCount::Exact(titles.len() as u64),
            },
            page_index: 0,
            display_total: titles.len() as u64,
            has_next: false,
            total_is_estimate: false,
        }
    }

    #[test]
    fn test_older_result_is_discarded() {
        let mut session = BrowserSession::new(SourceKind::Modrinth);
        let a = session.set_free_text("a");
        let b = session.set_category(Some("economy".to_string()));
        assert!(b.ticket > a.ticket);

        let applied = session.apply_search(b.ticket, Ok(page_of(&["from-b"], SourceKind::Modrinth)));
        assert_eq!(applied, ApplyOutcome::Applied);
        let stale = session.apply_search(a.ticket, Ok(page_of(&["from-a"], SourceKind::Modrinth)));
        assert_eq!(stale, ApplyOutcome::Stale);

        assert_eq!(session.items()[0].title, "from-b");
        assert_eq!(session.phase(), SearchPhase::Browsing);
    }

    #[test]
    fn test_debounce_only_for_free_text() {
        let mut session = BrowserSession::new(SourceKind::Modrinth);
        assert_eq!(session.set_free_text("essentials").delay, SEARCH_DEBOUNCE);
        assert_eq!(session.set_sort(SortKey::Downloads).delay, Duration::ZERO);
        assert_eq!(session.set_loader(Some("paper".into())).delay, Duration::ZERO);
    }

    #[test]
    fn test_source_switch_resets_query() {
        let mut session = BrowserSession::new(SourceKind::Modrinth);
        session.set_free_text("worldedit");
        session.set_category(Some("utility".to_string()));
        session.set_loader(Some("paper".to_string()));
        session.set_sort(SortKey::Newest);
        session.inspect(fixtures::item(SourceKind::Modrinth, "1", "WorldEdit"));

        let pending = session.set_source(SourceKind::Spiget);
        assert_eq!(pending.query, SearchQuery::for_source(SourceKind::Spiget));
        assert_eq!(pending.delay, Duration::ZERO);
        assert_eq!(session.inspection(), &Inspection::NoSelection);
        assert!(session.items().is_empty());
    }

    #[test]
    fn test_filter_change_resets_page() {
        let mut session = BrowserSession::new(SourceKind::Modrinth);
        let first = session.refresh();
        let mut page = page_of(&["x"], SourceKind::Modrinth);
        page.has_next = true;
        session.apply_search(first.ticket, Ok(page));

        let next = session.next_page().unwrap();
        assert_eq!(next.query.page, 1);
        let sorted = session.set_sort(SortKey::Downloads);
        assert_eq!(sorted.query.page, 0);
        assert!(session.prev_page().is_none());
    }

    #[test]
    fn test_next_page_stops_at_end() {
        let mut session = BrowserSession::new(SourceKind::Spiget);
        assert!(session.next_page().is_none());
        let pending = session.refresh();
        session.apply_search(pending.ticket, Ok(page_of(&["only"], SourceKind::Spiget)));
        assert!(session.next_page().is_none());
    }

    #[test]
    fn test_failed_search_clears_items() {
        let mut session = BrowserSession::new(SourceKind::Modrinth);
        let ok = session.refresh();
        session.apply_search(ok.ticket, Ok(page_of(&["a", "b"], SourceKind::Modrinth)));

        let retry = session.refresh();
        session.apply_search(
            retry.ticket,
            Err(SourceError::unavailable(SourceKind::Modrinth, "HTTP 503")),
        );
        assert!(session.items().is_empty());
        assert!(session.error().unwrap().contains("503"));
    }

    #[test]
    fn test_inspection_lifecycle() {
        let mut session = BrowserSession::new(SourceKind::Modrinth);
        let first = session.inspect(fixtures::item(SourceKind::Modrinth, "a", "A"));
        let second = session.inspect(fixtures::item(SourceKind::Modrinth, "b", "B"));

        let versions = vec![
            fixtures::version("2", &["1.20.4"], &["paper"]),
            fixtures::version("1", &["1.9"], &["spigot"]),
        ];
        assert_eq!(
            session.apply_versions(first.ticket, Ok(versions.clone())),
            ApplyOutcome::Stale
        );
        assert_eq!(
            session.apply_versions(second.ticket, Ok(versions)),
            ApplyOutcome::Applied
        );

        let Inspection::Inspecting(state) = session.inspection() else {
            panic!("expected an inspection");
        };
        assert_eq!(state.item.id, "b");
        assert!(!state.loading);
        assert_eq!(state.available_game_versions, vec!["1.20.4", "1.9"]);
        assert_eq!(state.available_loaders, vec!["paper", "spigot"]);

        session.set_version_filters(VersionFilters {
            loader: Some("spigot".to_string()),
            ..Default::default()
        });
        let visible = session.visible_versions();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "1");

        session.close_inspection();
        assert!(session.visible_versions().is_empty());
    }

    #[test]
    fn test_failed_versions_keep_error() {
        let mut session = BrowserSession::new(SourceKind::Spiget);
        let pending = session.inspect(fixtures::item(SourceKind::Spiget, "9", "Nine"));
        session.apply_versions(
            pending.ticket,
            Err(SourceError::unavailable(SourceKind::Spiget, "timeout")),
        );
        let Inspection::Inspecting(state) = session.inspection() else {
            panic!("expected an inspection");
        };
        assert!(state.versions.is_empty());
        assert!(state.error.as_deref().unwrap().contains("timeout"));
    }

    fn driver_with(adapter: Arc<MockAdapter>) -> SessionDriver {
        let aggregator = Aggregator::with_adapters([adapter as Arc<dyn SourceAdapter>]);
        SessionDriver::new(Arc::new(aggregator), SourceKind::Modrinth)
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_supersedes_pending_search() {
        let adapter = Arc::new(MockAdapter::new(SourceKind::Modrinth, 3, TotalCount::Exact(3)));
        let driver = driver_with(adapter.clone());

        let first = driver
            .update(|s| Some(s.set_free_text("wo")))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(200)).await;
        let second = driver
            .update(|s| Some(s.set_free_text("world")))
            .await
            .unwrap();

        assert_eq!(first.await.unwrap(), ApplyOutcome::Stale);
        assert_eq!(second.await.unwrap(), ApplyOutcome::Applied);
        assert_eq!(adapter.cursors.lock().unwrap().len(), 1);

        let snapshot = driver.snapshot().await;
        assert_eq!(snapshot.items().len(), 3);
        assert!(snapshot.items()[0].title.starts_with("world"));
    }

    #[tokio::test]
    async fn test_driver_inspect_loads_versions() {
        let adapter = Arc::new(MockAdapter::new(SourceKind::Modrinth, 3, TotalCount::Exact(3)));
        let driver = driver_with(adapter);

        let handle = driver
            .inspect(fixtures::item(SourceKind::Modrinth, "p", "P"))
            .await;
        assert_eq!(handle.await.unwrap(), ApplyOutcome::Applied);

        let snapshot = driver.snapshot().await;
        let Inspection::Inspecting(state) = snapshot.inspection() else {
            panic!("expected an inspection");
        };
        assert_eq!(state.versions.len(), 2);
    }
}
