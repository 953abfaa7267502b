use std::collections::HashMap;

use crate::infrastructure::config::Config;

const ALL_DESTINATIONS: &str = "*";

/// 操作者对目标服务器的写权限
pub trait Authorizer: Send + Sync {
    fn can_create_files(&self, actor: &str, destination_id: &str) -> bool;
}

/// 基于配置文件 `[[relay.grants]]` 的授权
#[derive(Debug, Clone, Default)]
pub struct ConfigAuthorizer {
    grants: HashMap<String, Vec<String>>,
}

impl ConfigAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let mut authorizer = Self::new();
        for grant in &config.relay.grants {
            for destination in &grant.destinations {
                authorizer.grant(&grant.actor, destination);
            }
        }
        authorizer
    }

    /// 授予写权限，`"*"` 表示所有服务器
    pub fn grant(&mut self, actor: &str, destination_id: &str) -> &mut Self {
        self.grants
            .entry(actor.to_string())
            .or_default()
            .push(destination_id.to_string());
        self
    }
}

impl Authorizer for ConfigAuthorizer {
    fn can_create_files(&self, actor: &str, destination_id: &str) -> bool {
        self.grants.get(actor).is_some_and(|allowed| {
            allowed
                .iter()
                .any(|d| d == ALL_DESTINATIONS || d == destination_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::GrantConfig;

    #[test]
    fn test_grants_from_config() {
        let mut config = Config::new();
        config.relay.grants = vec![
            GrantConfig {
                actor: "alice".to_string(),
                destinations: vec!["survival".to_string()],
            },
            GrantConfig {
                actor: "admin".to_string(),
                destinations: vec!["*".to_string()],
            },
        ];
        let auth = ConfigAuthorizer::from_config(&config);

        assert!(auth.can_create_files("alice", "survival"));
        assert!(!auth.can_create_files("alice", "creative"));
        assert!(auth.can_create_files("admin", "creative"));
        assert!(!auth.can_create_files("bob", "survival"));
    }
}
