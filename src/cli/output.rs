use serde::Serialize;

use crate::core::aggregator::AggregatedPage;
use crate::core::catalog;
use crate::core::constants::paging::PAGE_SIZE;
use crate::core::model::{SourceKind, UnifiedItem, UnifiedVersion};
use crate::relay::StoredArtifact;

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// 输出格式化器
pub struct OutputFormatter;

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value)
        .map(|s| s + "\n")
        .map_err(|e| format!("序列化输出失败: {e}"))
}

fn format_count(count: u64) -> String {
    match count {
        n if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        n if n >= 1_000 => format!("{:.1}K", n as f64 / 1_000.0),
        n => n.to_string(),
    }
}

impl OutputFormatter {
    /// 格式化一页搜索结果
    pub fn format_search_page(
        &self,
        page: &AggregatedPage,
        format: OutputFormat,
    ) -> Result<String, String> {
        match format {
            OutputFormat::Text => {
                let mut output = String::new();
                if page.page.items.is_empty() {
                    output.push_str("没有找到插件\n");
                    return Ok(output);
                }
                for item in &page.page.items {
                    output.push_str(&self.format_item_line(item));
                }
                let total = if page.total_is_estimate {
                    format!("约 {}+", page.display_total)
                } else {
                    page.display_total.to_string()
                };
                output.push_str(&format!(
                    "\n第 {}/{} 页，共 {} 个结果{}\n",
                    page.page_index + 1,
                    page.page_count(PAGE_SIZE),
                    total,
                    if page.has_next { "，还有下一页" } else { "" }
                ));
                Ok(output)
            }
            OutputFormat::Json => to_json(page),
        }
    }

    fn format_item_line(&self, item: &UnifiedItem) -> String {
        let mut line = format!(
            "📦 {} [{}] by {} · ⬇ {}\n",
            item.title,
            item.id,
            item.author,
            format_count(item.download_count)
        );
        if !item.description.is_empty() {
            line.push_str(&format!("   {}\n", item.description));
        }
        line
    }

    /// 格式化版本列表
    pub fn format_versions(
        &self,
        versions: &[UnifiedVersion],
        total: usize,
        format: OutputFormat,
    ) -> Result<String, String> {
        match format {
            OutputFormat::Text => {
                if versions.is_empty() {
                    return Ok("没有找到符合条件的版本\n".to_string());
                }
                let mut output = format!("显示 {}/{} 个版本:\n", versions.len(), total);
                for version in versions {
                    output.push_str(&format!(
                        "  {} [{}] {} · {}\n",
                        version.display_name,
                        version.id,
                        version.channel,
                        version.published_at.format("%Y-%m-%d")
                    ));
                    if !version.compatible_game_versions.is_empty() {
                        output.push_str(&format!(
                            "    游戏版本: {}\n",
                            version.compatible_game_versions.join(", ")
                        ));
                    }
                    if !version.compatible_loaders.is_empty() {
                        output.push_str(&format!(
                            "    加载器: {}\n",
                            version.compatible_loaders.join(", ")
                        ));
                    }
                    if let Some(artifact) = version.effective_artifact() {
                        output.push_str(&format!("    文件: {}\n", artifact.filename));
                    }
                }
                Ok(output)
            }
            OutputFormat::Json => to_json(versions),
        }
    }

    /// 格式化下发结果
    pub fn format_stored(
        &self,
        stored: &StoredArtifact,
        format: OutputFormat,
    ) -> Result<String, String> {
        match format {
            OutputFormat::Text => Ok(format!(
                "✅ 已写入 {} ({} 字节)\n   sha256: {}\n",
                stored.path, stored.size_bytes, stored.sha256
            )),
            OutputFormat::Json => to_json(&serde_json::json!({
                "success": true,
                "path": stored.path,
                "sizeBytes": stored.size_bytes,
                "sha256": stored.sha256,
            })),
        }
    }

    /// 格式化支持的市场
    pub fn format_sources(&self, sources: &[SourceKind], format: OutputFormat) -> Result<String, String> {
        match format {
            OutputFormat::Text => {
                let mut output = String::new();
                for source in sources {
                    output.push_str(&format!("🌐 {} ({})\n", source, source.slug()));
                    let categories: Vec<String> = catalog::categories(*source)
                        .iter()
                        .map(|c| format!("{}={}", c.id, c.name))
                        .collect();
                    output.push_str(&format!("   分类: {}\n", categories.join(", ")));
                    if catalog::supports_loader_filter(*source) {
                        output.push_str(&format!("   加载器: {}\n", catalog::LOADERS.join(", ")));
                    } else {
                        output.push_str("   加载器: 不支持按加载器搜索\n");
                    }
                }
                Ok(output)
            }
            OutputFormat::Json => {
                let entries: Vec<serde_json::Value> = sources
                    .iter()
                    .map(|source| {
                        let loaders: &[&str] = if catalog::supports_loader_filter(*source) {
                            catalog::LOADERS
                        } else {
                            &[]
                        };
                        serde_json::json!({
                            "source": source.slug(),
                            "name": source.to_string(),
                            "categories": catalog::categories(*source),
                            "loaders": loaders,
                        })
                    })
                    .collect();
                to_json(&entries)
            }
        }
    }

    /// 格式化错误信息
    pub fn format_error(&self, error: &str, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => format!("❌ {error}\n"),
            OutputFormat::Json => {
                let json_output = serde_json::json!({
                    "error": error,
                    "success": false
                });
                to_json(&json_output).unwrap_or_else(|_| format!("{{\"error\":{error:?}}}\n"))
            }
        }
    }
}

/// 默认输出格式化器实例
pub static FORMATTER: OutputFormatter = OutputFormatter;
