use url::Url;

use crate::core::constants::relay::ARTIFACT_EXTENSION;

/// 验证工具
pub struct ValidationUtils;

impl ValidationUtils {
    /// 验证下载地址：必须是绝对的 http/https 地址
    pub fn validate_download_url(url: &str) -> Result<Url, String> {
        let parsed = Url::parse(url.trim()).map_err(|e| format!("下载地址无效: {e}"))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(format!("不支持的协议 '{other}'，只允许 http/https")),
        }

        if parsed.host_str().map_or(true, str::is_empty) {
            return Err("下载地址缺少主机名".to_string());
        }

        Ok(parsed)
    }

    /// 验证插件文件名：只能是插件目录下的一个 .jar 文件
    pub fn validate_artifact_filename(name: &str) -> Result<(), String> {
        if name.trim().is_empty() {
            return Err("文件名不能为空".to_string());
        }

        if name.len() > 255 {
            return Err("文件名过长 (最多 255 个字符)".to_string());
        }

        if name.contains('/') || name.contains('\\') {
            return Err("文件名不能包含路径分隔符".to_string());
        }

        if name.contains("..") {
            return Err("文件名不能包含 '..'".to_string());
        }

        if name.chars().any(char::is_control) {
            return Err("文件名不能包含控制字符".to_string());
        }

        let stem_len = name.len().saturating_sub(ARTIFACT_EXTENSION.len());
        let has_extension = name
            .get(stem_len..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION));
        if !has_extension || stem_len == 0 {
            return Err(format!("文件名必须以 {ARTIFACT_EXTENSION} 结尾"));
        }

        Ok(())
    }
}
