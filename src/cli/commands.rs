use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::filter::VersionFilters;
use crate::core::model::{Channel, SortKey, SourceKind};

/// plugnav CLI 应用程序
#[derive(Parser)]
#[command(name = "plugnav")]
#[command(about = "多源插件市场浏览与服务器插件下发工具", long_about = None)]
#[command(version)]
pub struct Cli {
    /// 配置文件路径，默认 $PLUGNAV_CONFIG 或 ~/.plugnav/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 顶级命令
#[derive(Subcommand)]
pub enum Commands {
    /// 搜索插件
    Search {
        /// 搜索关键词
        #[arg(default_value = "")]
        query: String,
        /// 插件市场 (modrinth / spigot)
        #[arg(short, long, default_value = "modrinth", value_parser = parse_source)]
        source: SourceKind,
        /// 分类
        #[arg(short, long)]
        category: Option<String>,
        /// 加载器 (paper / spigot / ...)
        #[arg(short, long)]
        loader: Option<String>,
        /// 排序 (relevance / downloads / follows / newest / updated)
        #[arg(long, default_value = "relevance", value_parser = parse_sort)]
        sort: SortKey,
        /// 页码，从 1 开始
        #[arg(short, long, default_value = "1")]
        page: u32,
        /// JSON 格式输出
        #[arg(long)]
        json: bool,
    },
    /// 列出插件的版本
    Versions {
        #[command(flatten)]
        target: PluginTarget,
        #[command(flatten)]
        filters: VersionFilterArgs,
        /// JSON 格式输出
        #[arg(long)]
        json: bool,
    },
    /// 把插件下发到服务器的 /plugins 目录
    Install {
        #[command(flatten)]
        target: PluginTarget,
        /// 目标服务器 ID
        #[arg(short, long)]
        destination: String,
        /// 版本 ID，默认取过滤后的最新版本
        #[arg(long = "version-id")]
        version_id: Option<String>,
        #[command(flatten)]
        filters: VersionFilterArgs,
        /// JSON 格式输出
        #[arg(long)]
        json: bool,
    },
    /// 交互式浏览
    Browse {
        /// 初始插件市场
        #[arg(short, long, default_value = "modrinth", value_parser = parse_source)]
        source: SourceKind,
    },
    /// 启动下发服务
    Serve {
        /// 监听地址，覆盖配置中的 relay.bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// 列出支持的插件市场、分类和加载器
    Sources {
        /// JSON 格式输出
        #[arg(long)]
        json: bool,
    },
}

/// 指定一个插件
#[derive(Args, Debug, Clone)]
pub struct PluginTarget {
    /// 插件市场 (modrinth / spigot)
    #[arg(value_parser = parse_source)]
    pub source: SourceKind,
    /// 插件 ID
    pub id: String,
}

/// 版本过滤参数
#[derive(Args, Debug, Clone, Default)]
pub struct VersionFilterArgs {
    /// 游戏版本，例如 1.20.4
    #[arg(long)]
    pub game_version: Option<String>,
    /// 加载器
    #[arg(long)]
    pub loader: Option<String>,
    /// 发布渠道 (release / beta / alpha)
    #[arg(long, value_parser = parse_channel)]
    pub channel: Option<Channel>,
}

impl From<VersionFilterArgs> for VersionFilters {
    fn from(args: VersionFilterArgs) -> Self {
        Self {
            game_version: args.game_version,
            loader: args.loader,
            channel: args.channel,
        }
    }
}

fn parse_source(value: &str) -> Result<SourceKind, String> {
    value.parse()
}

fn parse_sort(value: &str) -> Result<SortKey, String> {
    value.parse()
}

fn parse_channel(value: &str) -> Result<Channel, String> {
    value.parse()
}
