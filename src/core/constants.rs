//! 应用程序常量定义
//!
//! 本模块包含全局使用的常量，避免魔数并提供统一的配置值。

use std::time::Duration;

/// 分页相关常量
pub mod paging {
    /// 所有市场统一的每页条目数
    pub const PAGE_SIZE: u32 = 12;
    /// 上游无法提供总数时用于保持“下一页”可用的估计值，不是真实数量
    pub const ESTIMATED_TOTAL_PLACEHOLDER: u64 = 1000;
    /// Spiget 单次拉取的版本数量
    pub const SPIGET_VERSION_LIMIT: u32 = 20;
}

/// 搜索输入防抖时间
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(600);

/// 网络相关常量
pub mod network {
    /// 默认请求超时时间（秒）
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// 默认 User-Agent
    pub const USER_AGENT: &str = concat!("plugnav/", env!("CARGO_PKG_VERSION"));
}

/// 上游市场地址
pub mod upstream {
    pub const MODRINTH_API: &str = "https://api.modrinth.com/v2";
    pub const SPIGET_API: &str = "https://api.spiget.org/v2";
    /// Spiget 返回的图标是站内相对路径
    pub const SPIGOT_SITE: &str = "https://www.spigotmc.org";
}

/// 下发相关常量
pub mod relay {
    /// 插件文件在目标服务器上的固定目录
    pub const LANDING_DIR: &str = "/plugins";
    /// 允许下发的文件扩展名
    pub const ARTIFACT_EXTENSION: &str = ".jar";
    /// 默认最大文件大小（字节）
    pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 64 * 1024 * 1024; // 64MB
    /// 默认监听地址
    pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
    /// 本地 install 命令使用的操作者
    pub const LOCAL_ACTOR: &str = "local";
}

/// 默认配置值
pub mod defaults {
    /// 默认配置目录
    pub const DEFAULT_CONFIG_DIR: &str = ".plugnav";
    /// 配置文件名
    pub const CONFIG_FILE: &str = "config.toml";
    /// 指定配置文件路径的环境变量
    pub const CONFIG_ENV: &str = "PLUGNAV_CONFIG";
    /// 覆盖日志级别的环境变量
    pub const LOG_ENV: &str = "PLUGNAV_LOG";
    /// 默认日志级别
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}
