use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Built frontend served for every non-API path, with `index.html` fallback.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_max_pdf_bytes")]
    pub max_pdf_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            max_pdf_bytes: default_max_pdf_bytes(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./storage")
}
fn default_max_pdf_bytes() -> usize {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,
    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,
    #[serde(default = "default_context_messages")]
    pub context_messages: i64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_endpoint(),
            model: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            chat_temperature: default_chat_temperature(),
            analysis_temperature: default_analysis_temperature(),
            context_messages: default_context_messages(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_endpoint() -> String {
    "https://router.huggingface.co/v1/chat/completions".to_string()
}
fn default_api_key_env() -> String {
    "HUGGINGFACE_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_chat_temperature() -> f32 {
    0.7
}
fn default_analysis_temperature() -> f32 {
    0.1
}
fn default_context_messages() -> i64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            session_ttl_hours: default_session_ttl_hours(),
            secure_cookies: false,
        }
    }
}

fn default_cookie_name() -> String {
    "legisci_session".to_string()
}
fn default_session_ttl_hours() -> i64 {
    24 * 14
}

impl Config {
    /// Configuration rooted in a single data directory, with the LLM disabled.
    ///
    /// Used by tests and by commands that only need a database path.
    pub fn for_data_dir(dir: &Path) -> Self {
        Self {
            db: DbConfig {
                path: dir.join("legisci.sqlite"),
            },
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
                static_dir: None,
            },
            storage: StorageConfig {
                root: dir.join("storage"),
                max_pdf_bytes: default_max_pdf_bytes(),
            },
            llm: LlmConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.storage.max_pdf_bytes == 0 {
        anyhow::bail!("storage.max_pdf_bytes must be > 0");
    }

    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    for (name, value) in [
        ("llm.chat_temperature", config.llm.chat_temperature),
        ("llm.analysis_temperature", config.llm.analysis_temperature),
    ] {
        if !(0.0..=2.0).contains(&value) {
            anyhow::bail!("{} must be in [0.0, 2.0]", name);
        }
    }

    if config.llm.context_messages < 0 {
        anyhow::bail!("llm.context_messages must be >= 0");
    }

    match config.llm.provider.as_str() {
        "disabled" => {}
        "huggingface" => {
            if config.llm.model.is_none() {
                anyhow::bail!("llm.model must be specified when provider is 'huggingface'");
            }
        }
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or huggingface.",
            other
        ),
    }

    if config.auth.session_ttl_hours <= 0 {
        anyhow::bail!("auth.session_ttl_hours must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/legisci.sqlite"

[server]
bind = "127.0.0.1:8080"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert!(!config.llm.is_enabled());
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.llm.context_messages, 10);
        assert_eq!(config.storage.max_pdf_bytes, 50 * 1024 * 1024);
        assert_eq!(config.auth.cookie_name, "legisci_session");
    }

    #[test]
    fn huggingface_requires_model() {
        let content = format!("{}\n[llm]\nprovider = \"huggingface\"\n", MINIMAL);
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("llm.model"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let content = format!("{}\n[llm]\nprovider = \"openai\"\n", MINIMAL);
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let content = format!("{}\n[llm]\nchat_temperature = 3.5\n", MINIMAL);
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("chat_temperature"));
    }
}
