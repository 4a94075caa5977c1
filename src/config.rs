use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    #[serde(default = "default_vault_path")]
    pub path: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
        }
    }
}

fn default_vault_path() -> PathBuf {
    PathBuf::from("~/notes")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    /// Model used for entity/relationship extraction; empty = use `model`.
    #[serde(default)]
    pub extraction_model: String,
    /// Model used for question answering; empty = use `model`.
    #[serde(default)]
    pub ask_model: String,
    /// Accept any snake_case relationship type from the model instead of
    /// coercing unknown types to `related_to`.
    #[serde(default)]
    pub open_relationship_types: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: String::new(),
            extraction_model: String::new(),
            ask_model: String::new(),
            open_relationship_types: false,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_model() -> String {
    "mistral".to_string()
}

/// Purpose-specific model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPurpose {
    Extraction,
    Ask,
}

pub fn resolve_model(config: &Config, purpose: ModelPurpose) -> &str {
    let specific = match purpose {
        ModelPurpose::Extraction => &config.llm.extraction_model,
        ModelPurpose::Ask => &config.llm.ask_model,
    };
    if specific.is_empty() {
        &config.llm.model
    } else {
        specific
    }
}

/// Default config file location: `<config_dir>/notegraph/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notegraph")
        .join("config.toml")
}

/// Load configuration from a TOML file, falling back to built-in defaults
/// when the file does not exist, then apply environment overrides and
/// tilde-expand the vault path.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.map(PathBuf::from).unwrap_or_else(default_config_path);

    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);

    config.vault.path = expand_tilde(&config.vault.path);

    Ok(config)
}

fn env_override(key: &str, target: &mut String) {
    if let Ok(v) = std::env::var(key) {
        if !v.is_empty() {
            *target = v;
        }
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("NOTEGRAPH_VAULT_PATH") {
        if !v.is_empty() {
            config.vault.path = PathBuf::from(v);
        }
    }
    env_override("NOTEGRAPH_LLM_BASE_URL", &mut config.llm.base_url);
    env_override("NOTEGRAPH_LLM_MODEL", &mut config.llm.model);
    env_override("NOTEGRAPH_LLM_API_KEY", &mut config.llm.api_key);
    env_override(
        "NOTEGRAPH_LLM_EXTRACTION_MODEL",
        &mut config.llm.extraction_model,
    );
    env_override("NOTEGRAPH_LLM_ASK_MODEL", &mut config.llm.ask_model);
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
