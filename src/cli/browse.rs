//! 交互式浏览
//!
//! 每行一个命令，修改会话后等待对应的查询完成再渲染当前状态。
//! 直接输入文字即按关键词搜索（带防抖）。

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::cli::handlers::install;
use crate::cli::output::{OutputFormat, FORMATTER};
use crate::core::aggregator::Aggregator;
use crate::core::filter::VersionFilters;
use crate::core::model::{Channel, SortKey, SourceKind, TransferRequest};
use crate::core::session::{ApplyOutcome, BrowserSession, Inspection, SessionDriver};
use crate::infrastructure::config::Config;

const HELP: &str = "\
命令:
  <关键词>            按关键词搜索
  :source <市场>      切换市场 (modrinth / spigot)，清空所有条件
  :cat <分类|->       设置或清除分类
  :loader <加载器|->  设置或清除加载器
  :sort <排序>        relevance / downloads / follows / newest / updated
  n / p               下一页 / 上一页
  r                   重新搜索
  i <序号>            查看插件版本
  :gv <版本|->        按游戏版本过滤
  :vl <加载器|->      按加载器过滤版本
  :ch <渠道|->        按发布渠道过滤 (release / beta / alpha)
  install <序号> <服务器>  下发第 N 个可见版本
  c                   关闭版本列表
  h                   帮助
  q                   退出";

/// 解析后的一行输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BrowseCommand {
    Text(String),
    Source(SourceKind),
    Category(Option<String>),
    Loader(Option<String>),
    Sort(SortKey),
    NextPage,
    PrevPage,
    Refresh,
    Inspect(usize),
    GameVersion(Option<String>),
    VersionLoader(Option<String>),
    Channel(Option<Channel>),
    Install { index: usize, destination: String },
    Close,
    Help,
    Quit,
}

/// `-` 表示清除
fn optional(arg: &str) -> Option<String> {
    match arg.trim() {
        "" | "-" => None,
        value => Some(value.to_string()),
    }
}

fn index(arg: &str) -> Result<usize, String> {
    arg.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| format!("无效的序号: {arg}"))
}

pub(crate) fn parse_line(line: &str) -> Result<BrowseCommand, String> {
    let line = line.trim();
    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match head {
        "q" | ":q" | "quit" => BrowseCommand::Quit,
        "h" | "?" | "help" => BrowseCommand::Help,
        "n" => BrowseCommand::NextPage,
        "p" => BrowseCommand::PrevPage,
        "r" => BrowseCommand::Refresh,
        "c" => BrowseCommand::Close,
        "i" => BrowseCommand::Inspect(index(rest)?),
        ":source" => BrowseCommand::Source(rest.parse()?),
        ":cat" => BrowseCommand::Category(optional(rest)),
        ":loader" => BrowseCommand::Loader(optional(rest)),
        ":sort" => BrowseCommand::Sort(rest.parse()?),
        ":gv" => BrowseCommand::GameVersion(optional(rest)),
        ":vl" => BrowseCommand::VersionLoader(optional(rest)),
        ":ch" => BrowseCommand::Channel(optional(rest).map(|c| c.parse()).transpose()?),
        "install" => {
            let (n, destination) = rest
                .split_once(' ')
                .ok_or_else(|| "用法: install <序号> <服务器>".to_string())?;
            BrowseCommand::Install {
                index: index(n)?,
                destination: destination.trim().to_string(),
            }
        }
        _ if head.starts_with(':') => return Err(format!("未知命令: {head}，输入 h 查看帮助")),
        _ => BrowseCommand::Text(line.to_string()),
    };
    Ok(command)
}

pub struct BrowseRepl {
    driver: SessionDriver,
    config: Config,
}

impl BrowseRepl {
    pub fn new(aggregator: Arc<Aggregator>, config: Config, source: SourceKind) -> Self {
        Self {
            driver: SessionDriver::new(aggregator, source),
            config,
        }
    }

    pub async fn run(&self) -> Result<(), String> {
        println!("🔎 plugnav 浏览模式，输入 h 查看帮助");
        let first = self.driver.update(|s| Some(s.refresh())).await;
        self.settle(first).await;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => return Err(format!("读取输入失败: {e}")),
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line) {
                Ok(BrowseCommand::Quit) => break,
                Ok(command) => {
                    if let Err(e) = self.execute(command).await {
                        print!("{}", FORMATTER.format_error(&e, OutputFormat::Text));
                    }
                }
                Err(e) => print!("{}", FORMATTER.format_error(&e, OutputFormat::Text)),
            }
        }
        Ok(())
    }

    async fn execute(&self, command: BrowseCommand) -> Result<(), String> {
        let handle = match command {
            BrowseCommand::Text(text) => self.driver.update(|s| Some(s.set_free_text(text))).await,
            BrowseCommand::Source(source) => self.driver.update(|s| Some(s.set_source(source))).await,
            BrowseCommand::Category(c) => self.driver.update(|s| Some(s.set_category(c))).await,
            BrowseCommand::Loader(l) => self.driver.update(|s| Some(s.set_loader(l))).await,
            BrowseCommand::Sort(sort) => self.driver.update(|s| Some(s.set_sort(sort))).await,
            BrowseCommand::NextPage => self.driver.update(BrowserSession::next_page).await,
            BrowseCommand::PrevPage => self.driver.update(BrowserSession::prev_page).await,
            BrowseCommand::Refresh => self.driver.update(|s| Some(s.refresh())).await,
            BrowseCommand::Inspect(n) => {
                let snapshot = self.driver.snapshot().await;
                let item = snapshot
                    .items()
                    .get(n - 1)
                    .cloned()
                    .ok_or_else(|| format!("当前页没有第 {n} 个插件"))?;
                let handle = self.driver.inspect(item).await;
                let _ = handle.await;
                return self.render_inspection().await;
            }
            BrowseCommand::GameVersion(v) => {
                return self.update_filters(|f| f.game_version = v).await;
            }
            BrowseCommand::VersionLoader(l) => return self.update_filters(|f| f.loader = l).await,
            BrowseCommand::Channel(c) => return self.update_filters(|f| f.channel = c).await,
            BrowseCommand::Install { index, destination } => {
                return self.install(index, &destination).await;
            }
            BrowseCommand::Close => {
                self.driver.close_inspection().await;
                None
            }
            BrowseCommand::Help => {
                println!("{HELP}");
                return Ok(());
            }
            BrowseCommand::Quit => return Ok(()),
        };

        if handle.is_none() {
            println!("ℹ️  已经没有更多页了");
        }
        self.settle(handle).await;
        Ok(())
    }

    /// 等待查询完成并渲染，过期的查询不渲染
    async fn settle(&self, handle: Option<JoinHandle<ApplyOutcome>>) {
        if let Some(handle) = handle {
            if !matches!(handle.await, Ok(ApplyOutcome::Applied)) {
                return;
            }
        }
        self.render_results().await;
    }

    async fn render_results(&self) {
        let snapshot = self.driver.snapshot().await;
        let query = snapshot.query();
        println!(
            "\n── {} · 关键词 '{}' · 分类 {} · 加载器 {} · 排序 {:?}",
            query.source,
            query.free_text,
            query.category().unwrap_or("-"),
            query.loader().unwrap_or("-"),
            query.sort
        );

        if let Some(error) = snapshot.error() {
            println!("❌ {error}，输入 r 重试");
            return;
        }
        if let Some(page) = snapshot.results() {
            for (i, item) in page.page.items.iter().enumerate() {
                println!("{:>3}. {} [{}] by {}", i + 1, item.title, item.id, item.author);
            }
            match FORMATTER.format_search_page(page, OutputFormat::Text) {
                Ok(text) => {
                    if let Some(summary) = text.lines().last() {
                        println!("{summary}");
                    }
                }
                Err(e) => println!("{e}"),
            }
        }
    }

    async fn update_filters(&self, change: impl FnOnce(&mut VersionFilters)) -> Result<(), String> {
        let snapshot = self.driver.snapshot().await;
        let Inspection::Inspecting(state) = snapshot.inspection() else {
            return Err("请先用 i <序号> 选择插件".to_string());
        };
        let mut filters = state.filters.clone();
        change(&mut filters);
        self.driver.set_version_filters(filters).await;
        self.render_inspection().await
    }

    async fn render_inspection(&self) -> Result<(), String> {
        let snapshot = self.driver.snapshot().await;
        let Inspection::Inspecting(state) = snapshot.inspection() else {
            return Err("没有选中的插件".to_string());
        };

        println!("\n📦 {} ({})", state.item.title, state.item.source);
        if let Some(error) = &state.error {
            println!("没有找到版本: {error}");
            return Ok(());
        }
        if !state.available_game_versions.is_empty() {
            println!("🎮 {}", state.available_game_versions.join(", "));
        }
        if !state.available_loaders.is_empty() {
            println!("🧩 {}", state.available_loaders.join(", "));
        }

        let visible = snapshot.visible_versions();
        for (i, version) in visible.iter().enumerate() {
            println!(
                "{:>3}. {} [{}] {} {}",
                i + 1,
                version.display_name,
                version.id,
                version.channel,
                version.published_at.format("%Y-%m-%d")
            );
        }
        println!("显示 {}/{} 个版本", visible.len(), state.versions.len());
        Ok(())
    }

    async fn install(&self, n: usize, destination: &str) -> Result<(), String> {
        let snapshot = self.driver.snapshot().await;
        let version = snapshot
            .visible_versions()
            .into_iter()
            .nth(n - 1)
            .ok_or_else(|| format!("没有第 {n} 个版本"))?;
        let request = TransferRequest::from_version(&version, destination)
            .ok_or_else(|| "该版本没有可下载的文件".to_string())?;

        let stored = install(&self.config, &request, true).await?;
        print!("{}", FORMATTER.format_stored(&stored, OutputFormat::Text)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_line("world edit").unwrap(),
            BrowseCommand::Text("world edit".to_string())
        );
        assert_eq!(
            parse_line(":source spigot").unwrap(),
            BrowseCommand::Source(SourceKind::Spiget)
        );
        assert_eq!(parse_line(":cat -").unwrap(), BrowseCommand::Category(None));
        assert_eq!(
            parse_line(":loader paper").unwrap(),
            BrowseCommand::Loader(Some("paper".to_string()))
        );
        assert_eq!(
            parse_line(":sort downloads").unwrap(),
            BrowseCommand::Sort(SortKey::Downloads)
        );
        assert_eq!(parse_line("i 3").unwrap(), BrowseCommand::Inspect(3));
        assert_eq!(
            parse_line(":ch beta").unwrap(),
            BrowseCommand::Channel(Some(Channel::Beta))
        );
        assert_eq!(
            parse_line("install 1 survival").unwrap(),
            BrowseCommand::Install {
                index: 1,
                destination: "survival".to_string()
            }
        );
        assert_eq!(parse_line("q").unwrap(), BrowseCommand::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("i 0").is_err());
        assert!(parse_line("i x").is_err());
        assert!(parse_line(":source curseforge").is_err());
        assert!(parse_line(":bogus").is_err());
        assert!(parse_line("install 1").is_err());
    }
}
