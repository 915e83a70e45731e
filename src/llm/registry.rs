//! Builds model providers from configuration and hands out shared handles.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{LlmConfig, ProviderEntry};
use crate::errors::{AgentError, AgentResult};
use crate::llm::provider::ModelProvider;
use crate::llm::providers::OpenAiCompatProvider;

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    /// Instantiate every configured provider whose API key can be resolved.
    /// Key resolution order: `SCREENPILOT_<ID>_API_KEY` environment variable,
    /// `api_key` in config.toml, then `OPENROUTER_API_KEY`. Entries with no
    /// key are skipped with a warning, not an error, so one missing key does
    /// not take down the rest of the configuration.
    pub fn from_config(llm: &LlmConfig) -> AgentResult<Self> {
        let mut providers: HashMap<String, Arc<dyn ModelProvider>> = HashMap::new();

        for (id, entry) in &llm.providers {
            let Some(api_key) = resolve_api_key(id, entry) else {
                tracing::warn!(provider = %id, "no API key resolved, provider skipped");
                continue;
            };
            let provider = OpenAiCompatProvider::new(
                id.clone(),
                entry.api_base.clone(),
                api_key,
                entry.parse_mode,
            );
            providers.insert(id.clone(), Arc::new(provider));
        }

        if providers.is_empty() {
            return Err(AgentError::Config(
                "no provider has an API key; set SCREENPILOT_<ID>_API_KEY or \
                 OPENROUTER_API_KEY, or add api_key to config.toml"
                    .into(),
            ));
        }

        Ok(Self { providers })
    }

    pub fn get(&self, id: &str) -> AgentResult<Arc<dyn ModelProvider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::Config(format!("provider '{id}' is not available")))
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

fn resolve_api_key(id: &str, entry: &ProviderEntry) -> Option<String> {
    let env_name = format!(
        "SCREENPILOT_{}_API_KEY",
        id.to_uppercase().replace('-', "_")
    );
    if let Ok(key) = std::env::var(&env_name) {
        if !key.is_empty() {
            return Some(key);
        }
    }
    if let Some(key) = &entry.api_key {
        if !key.is_empty() {
            return Some(key.clone());
        }
    }
    std::env::var("OPENROUTER_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}
