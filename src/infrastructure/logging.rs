use tracing_subscriber::EnvFilter;

use crate::core::constants::defaults::{DEFAULT_LOG_LEVEL, LOG_ENV};
use crate::infrastructure::config::LoggingConfig;

/// 构造日志过滤器：`PLUGNAV_LOG` 优先，其次是配置中的级别
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => filter,
        Err(_) => match config.level.parse::<EnvFilter>() {
            Ok(filter) => filter,
            Err(e) => {
                eprintln!(
                    "⚠️  日志级别 '{}' 无效 ({e})，使用 '{DEFAULT_LOG_LEVEL}'",
                    config.level
                );
                EnvFilter::new(DEFAULT_LOG_LEVEL)
            }
        },
    }
}

/// 初始化全局日志，输出到 stderr，stdout 留给命令结果
pub fn init(config: &LoggingConfig) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config))
        .with_target(true)
        .with_writer(std::io::stderr);

    // 重复初始化时保留已有的订阅者
    let result = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    if let Err(e) = result {
        eprintln!("⚠️  日志初始化失败: {e}");
    }
}
