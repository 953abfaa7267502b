use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use crate::cli::browse::BrowseRepl;
use crate::cli::commands::*;
use crate::cli::output::{OutputFormat, FORMATTER};
use crate::core::aggregator::Aggregator;
use crate::core::catalog;
use crate::core::constants::relay::LOCAL_ACTOR;
use crate::core::filter::{self, VersionFilters};
use crate::core::model::{SearchQuery, SourceKind, TransferRequest, UnifiedVersion};
use crate::infrastructure::config::Config;
use crate::infrastructure::remote::build_adapters;
use crate::relay::{server, Actor, StoredArtifact, TransferRelay};

/// 命令处理器
pub struct CommandHandler {
    config: Config,
    aggregator: Arc<Aggregator>,
}

impl CommandHandler {
    /// 创建新的命令处理器
    pub fn new(config: Config) -> Result<Self, String> {
        let adapters = build_adapters(&config).map_err(|e| format!("无法创建 HTTP 客户端: {e}"))?;
        Ok(Self {
            config,
            aggregator: Arc::new(Aggregator::with_adapters(adapters)),
        })
    }

    /// 处理命令
    pub async fn handle_command(&mut self, command: Commands) -> Result<(), String> {
        match command {
            Commands::Search {
                query,
                source,
                category,
                loader,
                sort,
                page,
                json,
            } => {
                let query = SearchQuery {
                    free_text: query,
                    category,
                    loader,
                    sort,
                    source,
                    page: page.saturating_sub(1),
                };
                self.handle_search(query, OutputFormat::from_flag(json)).await
            }
            Commands::Versions {
                target,
                filters,
                json,
            } => {
                self.handle_versions(target, filters.into(), OutputFormat::from_flag(json))
                    .await
            }
            Commands::Install {
                target,
                destination,
                version_id,
                filters,
                json,
            } => {
                self.handle_install(
                    target,
                    &destination,
                    version_id.as_deref(),
                    filters.into(),
                    OutputFormat::from_flag(json),
                )
                .await
            }
            Commands::Browse { source } => {
                BrowseRepl::new(Arc::clone(&self.aggregator), self.config.clone(), source)
                    .run()
                    .await
            }
            Commands::Serve { bind } => {
                let mut config = self.config.clone();
                if let Some(bind) = bind {
                    config.relay.bind = bind;
                }
                server::serve(config).await.map_err(String::from)
            }
            Commands::Sources { json } => {
                let output =
                    FORMATTER.format_sources(&self.aggregator.sources(), OutputFormat::from_flag(json))?;
                print!("{output}");
                Ok(())
            }
        }
    }

    async fn handle_search(&self, query: SearchQuery, format: OutputFormat) -> Result<(), String> {
        if format == OutputFormat::Text {
            print_query_hints(&query);
        }

        let page = self
            .aggregator
            .query(&query)
            .await
            .map_err(|e| format!("{e}，请稍后重试"))?;
        print!("{}", FORMATTER.format_search_page(&page, format)?);
        Ok(())
    }

    async fn load_versions(&self, target: &PluginTarget) -> Result<Vec<UnifiedVersion>, String> {
        self.aggregator
            .list_versions(target.source, &target.id)
            .await
            .map_err(|e| format!("没有找到版本: {e}"))
    }

    async fn handle_versions(
        &self,
        target: PluginTarget,
        filters: VersionFilters,
        format: OutputFormat,
    ) -> Result<(), String> {
        let versions = self.load_versions(&target).await?;
        let visible = filter::apply(&versions, &filters);

        if format == OutputFormat::Text && !versions.is_empty() {
            let game_versions = filter::available_game_versions(&versions);
            if !game_versions.is_empty() {
                println!("🎮 可选游戏版本: {}", game_versions.join(", "));
            }
            let loaders = filter::available_loaders(&versions);
            if !loaders.is_empty() {
                println!("🧩 可选加载器: {}", loaders.join(", "));
            }
        }

        print!("{}", FORMATTER.format_versions(&visible, versions.len(), format)?);
        Ok(())
    }

    async fn handle_install(
        &self,
        target: PluginTarget,
        destination: &str,
        version_id: Option<&str>,
        filters: VersionFilters,
        format: OutputFormat,
    ) -> Result<(), String> {
        let versions = self.load_versions(&target).await?;
        let version = match version_id {
            Some(id) => versions
                .iter()
                .find(|v| v.id == id)
                .ok_or_else(|| format!("版本 '{id}' 不存在"))?,
            None => versions
                .iter()
                .find(|v| filters.matches(v))
                .ok_or_else(|| "没有符合条件的版本".to_string())?,
        };

        let request = TransferRequest::from_version(version, destination)
            .ok_or_else(|| format!("版本 '{}' 没有可下载的文件", version.id))?;

        if format == OutputFormat::Text {
            println!("📥 下发 {} ({}) → {destination}", version.display_name, request.target_filename);
        }

        let stored = install(&self.config, &request, format == OutputFormat::Text).await?;
        print!("{}", FORMATTER.format_stored(&stored, format)?);
        Ok(())
    }
}

/// 以本地操作者身份执行一次下发
pub(crate) async fn install(
    config: &Config,
    request: &TransferRequest,
    show_progress: bool,
) -> Result<StoredArtifact, String> {
    let relay = TransferRelay::from_config(config).map_err(String::from)?;
    let actor = Actor::new(LOCAL_ACTOR);

    let pb = if show_progress {
        create_progress_bar()
    } else {
        ProgressBar::hidden()
    };
    let outcome = relay
        .relay_with_progress(request, &actor, |downloaded, total| {
            if total > 0 {
                pb.set_length(total);
            }
            pb.set_position(downloaded);
        })
        .await;
    pb.finish_and_clear();

    outcome.map_err(|failure| failure.to_string())
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta}) {percent}%")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// 对上游不支持或不认识的条件给出提示，条件本身仍原样发送
fn print_query_hints(query: &SearchQuery) {
    if let Some(category) = query.category() {
        if !catalog::is_known_category(query.source, category) {
            eprintln!("⚠️  {} 的分类中没有 '{category}'，请用 `plugnav sources` 查看", query.source);
        }
    }
    if query.loader().is_some() && !catalog::supports_loader_filter(query.source) {
        eprintln!("⚠️  {} 不支持按加载器搜索，已忽略", query.source);
    }
    if query.source == SourceKind::Spiget && query.text().is_some() && query.category().is_some() {
        eprintln!("⚠️  {} 关键词搜索时不支持分类，已忽略", query.source);
    }
}
