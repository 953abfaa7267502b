use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::constants::{defaults, network, relay, upstream};
use crate::error::{AppError, AppResult};

/// 配置文件结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    /// 可以接收插件的服务器
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

/// 上游市场地址
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_modrinth_url")]
    pub modrinth_url: String,
    #[serde(default = "default_spiget_url")]
    pub spiget_url: String,
    /// 拼接 Spiget 图标路径用的站点地址
    #[serde(default = "default_spigot_site_url")]
    pub spigot_site_url: String,
}

fn default_modrinth_url() -> String {
    upstream::MODRINTH_API.to_string()
}

fn default_spiget_url() -> String {
    upstream::SPIGET_API.to_string()
}

fn default_spigot_site_url() -> String {
    upstream::SPIGOT_SITE.to_string()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            modrinth_url: default_modrinth_url(),
            spiget_url: default_spiget_url(),
            spigot_site_url: default_spigot_site_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    network::DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    network::USER_AGENT.to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// 日志配置，`PLUGNAV_LOG` 环境变量优先于 `level`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    defaults::DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// 下发服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: u64,
    /// Bearer token 到操作者的映射
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    /// 操作者可以写入的服务器
    #[serde(default)]
    pub grants: Vec<GrantConfig>,
}

fn default_bind() -> String {
    relay::DEFAULT_BIND.to_string()
}

fn default_max_artifact_bytes() -> u64 {
    relay::DEFAULT_MAX_ARTIFACT_BYTES
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_artifact_bytes: default_max_artifact_bytes(),
            tokens: Vec::new(),
            grants: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub actor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantConfig {
    pub actor: String,
    /// 服务器 ID 列表，`"*"` 表示全部
    #[serde(default)]
    pub destinations: Vec<String>,
}

/// 一台目标服务器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub id: String,
    /// 守护进程地址，例如 `https://node1.example.com:8080`
    pub daemon_url: String,
    pub server_uuid: String,
    /// 守护进程的访问令牌，支持 `${VAR}`
    #[serde(default)]
    pub token: String,
}

impl Config {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从默认位置加载配置，文件不存在时写入默认配置
    pub fn load() -> AppResult<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// 从指定文件加载配置
    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            let config = Config::new();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config_load_failed(&path.display().to_string(), &e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::config_load_failed(&path.display().to_string(), &e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 检查配置的一致性
    pub fn validate(&self) -> AppResult<()> {
        if self.relay.max_artifact_bytes == 0 {
            return Err(AppError::invalid("relay.max_artifact_bytes", "必须大于 0"));
        }
        for (i, dest) in self.destinations.iter().enumerate() {
            if dest.id.trim().is_empty() {
                return Err(AppError::invalid("destinations.id", "不能为空"));
            }
            if self.destinations[..i].iter().any(|d| d.id == dest.id) {
                return Err(AppError::invalid(
                    "destinations.id",
                    format!("重复的服务器 ID: {}", dest.id),
                ));
            }
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        // 确保配置目录存在
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_content = toml::to_string_pretty(self).map_err(|e| AppError::Config {
            message: format!("序列化配置失败: {e}"),
        })?;

        fs::write(path, toml_content)?;
        Ok(())
    }

    /// 按 token 查找操作者
    pub fn actor_for_token(&self, token: &str) -> Option<&str> {
        self.relay
            .tokens
            .iter()
            .find(|t| !t.token.is_empty() && resolve_env_var(&t.token) == token)
            .map(|t| t.actor.as_str())
    }
}

/// 解析环境变量引用（如 ${VAR_NAME}）
pub fn resolve_env_var(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        env::var(var_name).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

/// 获取配置文件路径，`PLUGNAV_CONFIG` 优先
pub fn get_config_path() -> AppResult<PathBuf> {
    if let Ok(path) = env::var(defaults::CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(get_config_dir()?.join(defaults::CONFIG_FILE))
}

/// 获取配置目录
pub fn get_config_dir() -> AppResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| AppError::Config {
        message: "无法获取用户主目录".to_string(),
    })?;

    Ok(home_dir.join(defaults::DEFAULT_CONFIG_DIR))
}
