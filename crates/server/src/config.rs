use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

pub const CONFIG_DIR: &str = ".devcrew";
pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_EXPORT_DIR: &str = "generated_project";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    /// Usually supplied through `GEMINI_API_KEY` rather than the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub max_retries: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: orchestrator::services::DEFAULT_GEMINI_MODEL.to_string(),
            base_url: None,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TavilyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub halt_on_failure: bool,
    /// Maximum steps in flight; 0 or 1 runs sequentially.
    pub concurrency: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            halt_on_failure: false,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Exports are written below this directory.
    pub root: PathBuf,
    pub default_dir: String,
    pub include_docs: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            default_dir: DEFAULT_EXPORT_DIR.to_string(),
            include_docs: true,
        }
    }
}

/// Settings stored in `.devcrew/config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub tavily: TavilyConfig,
    pub execution: ExecutionConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Read `.devcrew/config.toml` below `root`. A missing file yields the
    /// defaults.
    pub async fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(root);
        if fs::metadata(&path).await.is_err() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `GEMINI_API_KEY`, `TAVILY_API_KEY` and `PORT` from the process
    /// environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    pub fn with_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |name| lookup(name).filter(|value: &String| !value.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(key) = non_empty("TAVILY_API_KEY") {
            self.tavily.api_key = Some(key);
        }
        if let Some(port) = non_empty("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: "PORT",
                    value: port,
                })?;
        }
        Ok(self)
    }

    pub fn export_dir(&self, name: Option<&str>) -> PathBuf {
        self.export
            .root
            .join(name.unwrap_or(&self.export.default_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 8080

            [execution]
            halt_on_failure = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.execution.halt_on_failure);
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert!(config.export.include_docs);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "g-key"),
            ("TAVILY_API_KEY", "  "),
            ("PORT", "4000"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::default()
            .with_env_from(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.gemini.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.tavily.api_key, None);
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_invalid_port_env() {
        let err = AppConfig::default()
            .with_env_from(|name| (name == "PORT").then(|| "http".to_string()))
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidEnv { name: "PORT", .. }));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::load(tmp.path()).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn test_round_trip_through_file() {
        let tmp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.execution.concurrency = 4;

        let path = AppConfig::path(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(AppConfig::load(tmp.path()).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_load_rejects_bad_toml() {
        let tmp = TempDir::new().unwrap();
        let path = AppConfig::path(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = AppConfig::load(tmp.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
