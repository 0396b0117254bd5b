use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

pub const CONFIG_FILE: &str = "config.toml";
pub const COOKIE_FILE: &str = "cookies.json";
/// Cookies the backend sets (its session cookie), kept between runs.
pub const SERVER_COOKIE_FILE: &str = "server-cookies.json";

pub const ENV_BASE_URL: &str = "SPARKPOINT_BASE_URL";
pub const ENV_API_PREFIX: &str = "SPARKPOINT_API_PREFIX";
pub const ENV_TIMEOUT_MS: &str = "SPARKPOINT_TIMEOUT_MS";

const DEFAULT_CONFIG: &str = r#"# SparkPoint admin console
base_url = "http://localhost:44363"
api_prefix = "/api"
# request_timeout_ms = 15000
# Lifetime of the locally persisted session cookies; unset keeps them until logout.
# cookie_max_age_secs = 604800
"#;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_prefix: String,
    /// No timeout when unset: a hung request waits indefinitely.
    pub request_timeout_ms: Option<u64>,
    /// Max-Age for the persisted session cookies. Unset means session cookies.
    pub cookie_max_age_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:44363".to_string(),
            api_prefix: "/api".to_string(),
            request_timeout_ms: None,
            cookie_max_age_secs: None,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// True when the backend is reached over TLS; cookies get `Secure`.
    pub fn is_secure(&self) -> bool {
        Url::parse(&self.base_url).is_ok_and(|u| u.scheme() == "https")
    }

    /// Base URL joined with the API prefix, without a trailing slash.
    pub fn api_root(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{prefix}")
        }
    }

    /// Apply overrides from a variable lookup (normally the process env).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(prefix) = lookup(ENV_API_PREFIX) {
            self.api_prefix = prefix;
        }
        if let Some(ms) = non_empty(ENV_TIMEOUT_MS) {
            let ms = ms
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{ENV_TIMEOUT_MS}={ms:?} is not a number")))?;
            self.request_timeout_ms = Some(ms);
        }
        Ok(())
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sparkpoint")
}

/// Read `config.toml` from `dir` (defaults when absent), without env overrides.
pub fn load_config_file(dir: &Path) -> Result<ClientConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ClientConfig::default()),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path,
        message: e.to_string(),
    })
}

/// File, then environment, then validation.
pub fn load_config(dir: &Path) -> Result<ClientConfig, ConfigError> {
    let mut cfg = load_config_file(dir)?;
    cfg.apply_env(|key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

/// Write a commented default `config.toml` unless one exists.
/// Returns whether a file was written.
pub fn write_default_config(dir: &Path) -> Result<bool, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        return Ok(false);
    }
    fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    fs::write(&path, DEFAULT_CONFIG).map_err(|source| ConfigError::Write { path, source })?;
    Ok(true)
}
