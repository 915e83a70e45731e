use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{AgentError, AgentResult};
use crate::llm::provider::ParseMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub api_base: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// How this provider's output is normalized into actions.
    #[serde(default)]
    pub parse_mode: ParseMode,
    #[serde(default = "default_true")]
    pub stream: bool,
    /// Optional API key stored in config.toml (falls back to env var
    /// SCREENPILOT_<ID>_API_KEY, then OPENROUTER_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_step_delay")]
    pub step_delay_secs: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            step_delay_secs: default_step_delay(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_temperature() -> f64 {
    0.0
}

fn default_true() -> bool {
    true
}

fn default_max_steps() -> u32 {
    30
}

fn default_step_delay() -> f64 {
    1.5
}

fn default_max_tokens() -> u32 {
    4096
}

impl AppConfig {
    /// OpenRouter out of the box; only the API key has to come from the
    /// environment.
    pub fn built_in_default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "openrouter".to_string(),
            ProviderEntry {
                api_base: "https://openrouter.ai/api/v1".to_string(),
                model: "qwen/qwen3.5-plus-02-15".to_string(),
                temperature: default_temperature(),
                parse_mode: ParseMode::Tagged,
                stream: true,
                api_key: None,
            },
        );
        Self {
            llm: LlmConfig {
                active_provider: "openrouter".to_string(),
                providers,
            },
            agent: AgentSettings::default(),
        }
    }

    pub fn provider(&self, id: &str) -> AgentResult<&ProviderEntry> {
        self.llm.providers.get(id).ok_or_else(|| {
            AgentError::Config(format!("provider '{id}' not found in configuration"))
        })
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in working directory");
            return Some(candidate);
        }
    }

    None
}

/// Load configuration from an explicit path. Missing file is an error here;
/// an explicit path is a deliberate choice, not a probe.
pub fn load_from(path: &std::path::Path) -> AgentResult<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AgentError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(
        path = %path.display(),
        provider = %config.llm.active_provider,
        "config loaded"
    );
    Ok(config)
}

/// Load `config.toml` from next to the executable or the working directory,
/// falling back to the built-in defaults when neither exists.
pub fn load_or_default() -> AgentResult<AppConfig> {
    let Some(path) = resolve_config_path() else {
        tracing::info!("no config.toml found, using built-in defaults");
        return Ok(AppConfig::built_in_default());
    };
    let content = std::fs::read_to_string(&path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(
        path = %path.display(),
        provider = %config.llm.active_provider,
        "config loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_default_resolves_its_own_provider() {
        let config = AppConfig::built_in_default();
        let entry = config.provider(&config.llm.active_provider).unwrap();
        assert_eq!(entry.api_base, "https://openrouter.ai/api/v1");
        assert_eq!(entry.parse_mode, ParseMode::Tagged);
        assert_eq!(config.agent.max_steps, 30);
        assert!((config.agent.step_delay_secs - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let toml_src = r#"
            [llm]
            active_provider = "local"

            [llm.providers.local]
            api_base = "http://localhost:1234/v1"
            model = "qwen2.5-vl"
        "#;
        let config: AppConfig = toml::from_str(toml_src).unwrap();
        let entry = config.provider("local").unwrap();
        assert!(entry.stream);
        assert_eq!(entry.temperature, 0.0);
        assert_eq!(entry.parse_mode, ParseMode::Tagged);
        assert_eq!(config.agent.max_tokens, 4096);
    }

    #[test]
    fn parse_mode_is_readable_from_toml() {
        let toml_src = r#"
            [llm]
            active_provider = "or"

            [llm.providers.or]
            api_base = "https://openrouter.ai/api/v1"
            model = "gpt-4o"
            parse_mode = "tool_call"
            stream = false
        "#;
        let config: AppConfig = toml::from_str(toml_src).unwrap();
        let entry = config.provider("or").unwrap();
        assert_eq!(entry.parse_mode, ParseMode::ToolCall);
        assert!(!entry.stream);
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let config = AppConfig::built_in_default();
        assert!(config.provider("nope").is_err());
    }
}
