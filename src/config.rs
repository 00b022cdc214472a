use crate::catalog::{AgentCatalog, AgentDescriptor, AgentId};
use crate::error::ConfigError;
use crate::executor::ExecutorSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Env var consulted when the gateway api key is absent from the file.
const GATEWAY_KEY_ENV: &str = "TASKWEAVE_GATEWAY_KEY";

// ─── Top-level config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    /// The agent registry for this deployment, passed by reference through
    /// configuration at startup. No dynamic loading by name.
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host, `host[:port]` (default: 127.0.0.1:8000)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Use https (default: false)
    #[serde(default)]
    pub secure: bool,
    /// Api key; falls back to TASKWEAVE_GATEWAY_KEY when unset
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_gateway_host() -> String {
    "127.0.0.1:8000".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            secure: false,
            api_key: None,
        }
    }
}

impl GatewayConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(GATEWAY_KEY_ENV).ok())
    }
}

// ─── Planner ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Planning agent reference, `name:version` (default: planner:0.1)
    #[serde(default = "default_planner_agent")]
    pub agent: String,
}

fn default_planner_agent() -> String {
    "planner:0.1".into()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            agent: default_planner_agent(),
        }
    }
}

// ─── Executor ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_replan_attempts")]
    pub max_replan_attempts: u32,
    #[serde(default = "default_true")]
    pub streaming: bool,
    /// Keepalive pulse interval for unary dispatches; 0 disables
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_max_replan_attempts() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_keepalive_secs() -> u64 {
    15
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_replan_attempts: default_max_replan_attempts(),
            streaming: true,
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

impl ExecutorConfig {
    pub fn to_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            max_concurrency: self.max_concurrency,
            max_replan_attempts: self.max_replan_attempts,
            streaming: self.streaming,
            keepalive_interval: match self.keepalive_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

// ─── Agent registry entries ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    /// Agent reference, `name:version`
    pub name: String,
    #[serde(default)]
    pub description: String,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.max_concurrency == 0 {
            return Err(ConfigError::Validation(
                "executor.max_concurrency must be at least 1".into(),
            ));
        }
        self.planner.agent.parse::<AgentId>().map_err(|_| {
            ConfigError::Validation(format!(
                "planner.agent must be name:version, got {}",
                self.planner.agent
            ))
        })?;
        for entry in &self.agents {
            entry.name.parse::<AgentId>().map_err(|_| {
                ConfigError::Validation(format!(
                    "agents entry must be name:version, got {}",
                    entry.name
                ))
            })?;
        }
        Ok(())
    }

    /// The planning agent reference. Only valid after a successful load.
    pub fn planner_id(&self) -> AgentId {
        self.planner
            .agent
            .parse()
            .unwrap_or_else(|_| AgentId::new(self.planner.agent.clone(), "0"))
    }

    pub fn catalog(&self) -> AgentCatalog {
        AgentCatalog::new(
            self.agents
                .iter()
                .filter_map(|entry| {
                    entry
                        .name
                        .parse::<AgentId>()
                        .ok()
                        .map(|id| AgentDescriptor::new(id, entry.description.clone()))
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let file = write_config("");
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.gateway.host, "127.0.0.1:8000");
        assert!(!config.gateway.secure);
        assert_eq!(config.executor.max_concurrency, 4);
        assert_eq!(config.executor.max_replan_attempts, 2);
        assert!(config.executor.streaming);
        assert_eq!(config.planner_id(), AgentId::new("planner", "0.1"));
        assert!(config.catalog().is_empty());
    }

    #[test]
    fn full_config_round_trip() {
        let file = write_config(
            r#"
[gateway]
host = "agents.internal"
secure = true
api_key = "k-123"

[planner]
agent = "orchestration-planner:1.0"

[executor]
max_concurrency = 8
max_replan_attempts = 1
streaming = false
keepalive_secs = 0

[[agents]]
name = "researcher:0.1"
description = "Finds information"

[[agents]]
name = "writer:0.1"
description = "Writes prose"
"#,
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.gateway.host, "agents.internal");
        assert!(config.gateway.secure);
        assert_eq!(config.gateway.resolved_api_key().as_deref(), Some("k-123"));
        assert_eq!(
            config.planner_id(),
            AgentId::new("orchestration-planner", "1.0")
        );
        assert_eq!(config.catalog().len(), 2);

        let settings = config.executor.to_settings();
        assert_eq!(settings.max_concurrency, 8);
        assert_eq!(settings.max_replan_attempts, 1);
        assert!(!settings.streaming);
        assert!(settings.keepalive_interval.is_none());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let file = write_config("[executor]\nmax_concurrency = 0\n");
        assert!(matches!(
            Config::load(file.path()).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn bare_agent_name_is_rejected() {
        let file = write_config("[[agents]]\nname = \"researcher\"\n");
        assert!(matches!(
            Config::load(file.path()).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            Config::load(Path::new("/nonexistent/taskweave.toml")).unwrap_err(),
            ConfigError::Io(_)
        ));
    }

    #[test]
    fn malformed_toml_is_a_load_error() {
        let file = write_config("[gateway\nhost=");
        assert!(matches!(
            Config::load(file.path()).unwrap_err(),
            ConfigError::Load(_)
        ));
    }
}
