//! 各市场已知的分类与加载器词表
//!
//! 词表只用于提示和校验，查询时原样传给上游，不做跨市场翻译。

use serde::Serialize;

use super::model::SourceKind;

/// 分类选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryOption {
    pub id: &'static str,
    pub name: &'static str,
}

const fn cat(id: &'static str, name: &'static str) -> CategoryOption {
    CategoryOption { id, name }
}

const MODRINTH_CATEGORIES: &[CategoryOption] = &[
    cat("adventure", "Adventure"),
    cat("cursed", "Cursed"),
    cat("decoration", "Decoration"),
    cat("economy", "Economy"),
    cat("equipment", "Equipment"),
    cat("food", "Food"),
    cat("game-mechanics", "Game Mechanics"),
    cat("library", "Library"),
    cat("magic", "Magic"),
    cat("management", "Management"),
    cat("minigame", "Minigame"),
    cat("mobs", "Mobs"),
    cat("optimization", "Optimization"),
    cat("social", "Social"),
    cat("storage", "Storage"),
    cat("technology", "Technology"),
    cat("transportation", "Transportation"),
    cat("utility", "Utility"),
    cat("worldgen", "World Generation"),
];

// Spiget 使用数字分类 id
const SPIGET_CATEGORIES: &[CategoryOption] = &[
    cat("2", "Bungee - Spigot"),
    cat("4", "Spigot"),
    cat("5", "Transportation"),
    cat("6", "Chat"),
    cat("7", "Tools and Utilities"),
    cat("8", "Misc"),
    cat("9", "Libraries / APIs"),
    cat("10", "Transportation"),
    cat("11", "Chat"),
    cat("12", "Tools and Utilities"),
    cat("17", "Economy"),
    cat("18", "Game Mode"),
    cat("22", "World Management"),
    cat("23", "Mechanics"),
    cat("24", "Fun"),
];

/// 服务端加载器
pub const LOADERS: &[&str] = &[
    "paper",
    "purpur",
    "spigot",
    "bukkit",
    "folia",
    "velocity",
    "waterfall",
    "bungeecord",
];

/// Spiget 资源默认兼容的加载器
pub const SPIGET_LOADERS: &[&str] = &["spigot", "paper", "bukkit"];

pub fn categories(source: SourceKind) -> &'static [CategoryOption] {
    match source {
        SourceKind::Modrinth => MODRINTH_CATEGORIES,
        SourceKind::Spiget => SPIGET_CATEGORIES,
    }
}

/// 该市场是否支持按加载器过滤搜索
pub fn supports_loader_filter(source: SourceKind) -> bool {
    matches!(source, SourceKind::Modrinth)
}

/// 判断分类 id 是否属于该市场的词表
pub fn is_known_category(source: SourceKind, id: &str) -> bool {
    categories(source).iter().any(|c| c.id == id)
}
