//! 版本过滤
//!
//! 纯函数，不做任何 I/O。未设置的条件匹配所有版本；
//! 一旦指定了游戏版本或加载器，未上报兼容信息的版本视为不匹配。

use super::model::{non_blank, Channel, UnifiedVersion};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// 版本过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFilters {
    pub game_version: Option<String>,
    pub loader: Option<String>,
    pub channel: Option<Channel>,
}

impl VersionFilters {
    pub fn is_empty(&self) -> bool {
        non_blank(self.game_version.as_deref()).is_none()
            && non_blank(self.loader.as_deref()).is_none()
            && self.channel.is_none()
    }

    /// 判断单个版本是否满足条件
    pub fn matches(&self, version: &UnifiedVersion) -> bool {
        if let Some(game_version) = non_blank(self.game_version.as_deref()) {
            if !version.compatible_game_versions.iter().any(|v| v == game_version) {
                return false;
            }
        }
        if let Some(loader) = non_blank(self.loader.as_deref()) {
            if !version
                .compatible_loaders
                .iter()
                .any(|l| l.eq_ignore_ascii_case(loader))
            {
                return false;
            }
        }
        if let Some(channel) = self.channel {
            if version.channel != channel {
                return false;
            }
        }
        true
    }
}

/// 按条件过滤版本列表，保持原有顺序
pub fn apply(versions: &[UnifiedVersion], filters: &VersionFilters) -> Vec<UnifiedVersion> {
    if filters.is_empty() {
        return versions.to_vec();
    }
    versions
        .iter()
        .filter(|v| filters.matches(v))
        .cloned()
        .collect()
}

/// 未过滤列表中出现过的所有游戏版本，新版本在前
pub fn available_game_versions(versions: &[UnifiedVersion]) -> Vec<String> {
    let mut all: Vec<String> = versions
        .iter()
        .flat_map(|v| v.compatible_game_versions.iter().cloned())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    all.sort_by(|a, b| compare_game_versions(b, a));
    all
}

/// 未过滤列表中出现过的所有加载器，保持上游给出的先后顺序
pub fn available_loaders(versions: &[UnifiedVersion]) -> Vec<String> {
    let mut seen = HashSet::new();
    versions
        .iter()
        .flat_map(|v| v.compatible_loaders.iter())
        .filter(|l| seen.insert(l.as_str()))
        .cloned()
        .collect()
}

/// 按数字段比较版本号，"1.20.4" 大于 "1.9"；非数字段按字符串比较
pub fn compare_game_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split(['.', '-']);
    let mut right = b.split(['.', '-']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            // 多出来的是预发布标签时，较短的一方（正式版）更新
            (Some(l), None) => return trailing_order(l),
            (None, Some(r)) => return trailing_order(r).reverse(),
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    // 纯数字段（正式版）排在预发布标签之后
                    (Ok(_), Err(_)) => Ordering::Greater,
                    (Err(_), Ok(_)) => Ordering::Less,
                    (Err(_), Err(_)) => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn trailing_order(extra: &str) -> Ordering {
    if extra.parse::<u64>().is_ok() {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}
