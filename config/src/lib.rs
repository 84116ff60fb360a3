use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_VAR: &str = "SALARY_AGENT_CONFIG";

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const MODEL_VAR: &str = "OPENAI_MODEL";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}: export it or set it in the config file")]
    Missing(&'static str),
    #[error("could not read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub ai: AIConfig,
    pub data: DataConfig,
    pub polling: PollingConfig,
}

impl AgentConfig {
    /// Loads `.env`, the config file and the environment, then checks that the
    /// credentials the drivers need are present.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is the common case.
        let _ = dotenvy::dotenv();

        let file = match config_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        file.resolve(|key| std::env::var(key).ok())
    }

    /// Reads a TOML config file. A file that does not exist yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_file = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        toml::from_str(&config_file).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies environment overrides from `env` and validates the result.
    pub fn resolve(mut self, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = lookup(API_KEY_VAR) {
            self.ai.api_key = api_key;
        }
        if let Some(model) = lookup(MODEL_VAR) {
            self.ai.model = model;
        }
        if let Some(url) = lookup(BASE_URL_VAR) {
            self.ai.url = url;
        }

        if self.ai.api_key.trim().is_empty() {
            return Err(ConfigError::Missing(API_KEY_VAR));
        }
        if self.ai.model.trim().is_empty() {
            return Err(ConfigError::Missing(MODEL_VAR));
        }

        Ok(self)
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
        return Some(PathBuf::from(path));
    }

    let Ok(home_dir) = std::env::var("HOME") else {
        return None;
    };

    Some(PathBuf::from(format!(
        "{home_dir}/.config/salary-agent/config.toml"
    )))
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AIConfig {
    pub model: String,
    pub url: String,
    pub api_key: String,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            url: "https://api.openai.com".to_string(),
            api_key: String::new(),
        }
    }
}

impl std::fmt::Debug for AIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AIConfig")
            .field("model", &self.model)
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// Source CSV loaded into the store at startup.
    pub csv_path: PathBuf,
    /// SQLite database file the CSV is loaded into.
    pub database_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("./data/salaries_2023.csv"),
            database_path: PathBuf::from("./db/salary.db"),
        }
    }
}

/// Budget for the assistant run poller.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub max_polls: u32,
    pub max_wait_secs: u64,
}

impl PollingConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_polls: 60,
            max_wait_secs: 300,
        }
    }
}
