use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_SESSION_LISTEN_ADDRESS: &str = "127.0.0.1:4320";
const DEFAULT_API_LISTEN_ADDRESS: &str = "127.0.0.1:8080";

/// Startup settings for the backend, loaded once from a YAML file.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub opamp: OpampSettings,
    #[serde(default)]
    pub api: ApiSettings,
}

/// Bind address and TLS material for the agent-session transport.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpampSettings {
    #[serde(default = "default_session_listen_address")]
    pub listen_address: String,
    #[serde(default)]
    pub tls: TlsSettings,
}

impl Default for OpampSettings {
    fn default() -> Self {
        Self {
            listen_address: default_session_listen_address(),
            tls: TlsSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct TlsSettings {
    #[serde(default)]
    pub cert_file: PathBuf,
    #[serde(default)]
    pub key_file: PathBuf,
}

impl TlsSettings {
    /// The listener stays plaintext unless both files are configured.
    pub fn is_enabled(&self) -> bool {
        !self.cert_file.as_os_str().is_empty() && !self.key_file.as_os_str().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_listen_address")]
    pub listen_address: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            listen_address: default_api_listen_address(),
        }
    }
}

fn default_session_listen_address() -> String {
    DEFAULT_SESSION_LISTEN_ADDRESS.to_string()
}

fn default_api_listen_address() -> String {
    DEFAULT_API_LISTEN_ADDRESS.to_string()
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("error loading settings: `{0}`")]
    Io(#[from] std::io::Error),

    #[error("error loading settings: `{0}`")]
    SerdeYaml(#[from] serde_yaml::Error),
}

pub fn load(path: &Path) -> Result<Settings, SettingsError> {
    let file = std::fs::File::open(path)?;
    Ok(serde_yaml::from_reader(file)?)
}
