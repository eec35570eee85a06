use serde::Deserialize;
use shared::ClassifierKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::relay::{AssetIdentity, RetryPolicy};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid users file: {0}")]
    Users(#[from] serde_json::Error),
    #[error("secret file {0} is empty")]
    EmptySecret(PathBuf),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub relays: HashMap<String, RelayConfig>,
    pub retry: RetryConfig,
    pub endpoint_urls: HashMap<String, String>,
    pub wagri: WagriConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    pub classifier: String,
    #[serde(default)]
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WagriConfig {
    pub token_url: String,
    pub client_id_file: PathBuf,
    pub client_secret_file: PathBuf,
    pub vendor_id_file: PathBuf,
    pub asset_id_prefix: String,
    pub asset_user_id: String,
    pub header_user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub users_file: PathBuf,
    pub allowed_origin: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            relays: HashMap::from([
                (
                    "wagri".to_string(),
                    RelayConfig {
                        classifier: ClassifierKind::NaroPumpkinV1.to_string(),
                        cooldown_secs: 3,
                    },
                ),
                (
                    "local".to_string(),
                    RelayConfig {
                        classifier: ClassifierKind::NaroEdgeV1.to_string(),
                        cooldown_secs: 0,
                    },
                ),
            ]),
            retry: RetryConfig::default(),
            endpoint_urls: HashMap::new(),
            wagri: WagriConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_min_secs: 1,
            backoff_max_secs: 11,
        }
    }
}

impl Default for WagriConfig {
    fn default() -> Self {
        Self {
            token_url: "https://api.wagri.net/Token".into(),
            client_id_file: "/opt/secret/wagri_api_client_id/wagri_api_client_id".into(),
            client_secret_file: "/opt/secret/wagri_api_client_secret/wagri_api_client_secret".into(),
            vendor_id_file: "/opt/secret/wagri_api_vendor_id/wagri_api_vendor_id".into(),
            asset_id_prefix: "naro-pumpkin-system".into(),
            asset_user_id: "naro-pumpkin-system".into(),
            header_user_id: "naro_pumpkin_udonko_system_user".into(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            static_dir: "public".into(),
            upload_dir: "uploads".into(),
            users_file: "/opt/secret/auth/auth".into(),
            allowed_origin: "https://habs.rad.naro.go.jp".into(),
        }
    }
}

impl AppConfig {
    /// Loads `MILDEW_CONFIG` (default `config/app.yaml`); a missing file means
    /// defaults. `PORT` overrides the configured port.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("MILDEW_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/app.yaml"));

        let mut config = if config_path.exists() {
            log::info!("Loading configuration from {}", config_path.display());
            let config_str = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::Read(config_path.clone(), e))?;
            Self::from_yaml(&config_str)?
        } else {
            log::warn!(
                "Configuration file {} not found, using defaults",
                config_path.display()
            );
            Self::default()
        };

        if let Ok(port) = std::env::var("PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", port.clone()))?;
        }
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn retry_policy(&self, relay: &RelayConfig) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            backoff_min: Duration::from_secs(self.retry.backoff_min_secs),
            backoff_max: Duration::from_secs(self.retry.backoff_max_secs),
            cooldown: Duration::from_secs(relay.cooldown_secs),
        }
    }

    pub fn url_overrides(&self) -> Result<HashMap<ClassifierKind, String>, ConfigError> {
        self.endpoint_urls
            .iter()
            .map(|(name, url)| {
                name.parse::<ClassifierKind>()
                    .map(|kind| (kind, url.clone()))
                    .map_err(|_| ConfigError::Invalid("endpoint_urls", name.clone()))
            })
            .collect()
    }
}

impl WagriConfig {
    pub fn asset_identity(&self) -> AssetIdentity {
        AssetIdentity {
            id_prefix: self.asset_id_prefix.clone(),
            user_id: self.asset_user_id.clone(),
        }
    }
}

/// Reads a mounted secret, trimming the trailing newline most secret stores add.
pub fn read_secret(path: &Path) -> Result<String, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let secret = raw.trim();
    if secret.is_empty() {
        return Err(ConfigError::EmptySecret(path.to_path_buf()));
    }
    Ok(secret.to_string())
}
