// 核心模块
pub mod cli;
pub mod core;
pub mod error;
pub mod infrastructure;
pub mod relay;
pub mod utils;

#[cfg(test)]
mod testing;

// 重新导出常用类型
pub use crate::core::{AggregatedPage, Aggregator, BrowserSession, SessionDriver};
pub use error::*;
pub use infrastructure::config::Config;
pub use infrastructure::remote::{ModrinthAdapter, SourceAdapter, SpigetAdapter};
pub use relay::{Actor, RelayFailure, StoredArtifact, TransferRelay};
// 使用命名空间导入常量，避免冲突
pub use crate::core::constants as app_constants;
