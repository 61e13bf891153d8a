use log::debug;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://wap.tplinkcloud.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const CONFIG_SECTION: &str = "TPLinkSmartPlug";

/// Account credentials and the endpoint they are valid for.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    pub base_url: String,
}

impl Credentials {
    /// Credentials against the public cloud endpoint.
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_base_url(login, password, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        login: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            base_url: base_url.into(),
        }
    }
}

/// Numeric error codes returned by the cloud service.
///
/// They belong to the remote service, so any of them can be overridden from
/// the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorCodes {
    pub token_expired: i64,
    pub device_offline: i64,
    pub bad_credentials: i64,
    pub invalid_request: i64,
    pub wrong_parameter_type: i64,
}

impl Default for ErrorCodes {
    fn default() -> Self {
        Self {
            token_expired: -20651,
            device_offline: -20571,
            bad_credentials: -20601,
            invalid_request: -20104,
            wrong_parameter_type: -20105,
        }
    }
}

/// The `TPLinkSmartPlug` section of the configuration file.
#[derive(Clone, Deserialize)]
pub struct Config {
    pub login: String,
    pub password: String,
    pub url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub error_codes: ErrorCodes,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "TPLinkSmartPlug")]
    section: Option<Config>,
}

const REDACTED: &str = "<redacted>";

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &REDACTED)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("login", &self.login)
            .field("password", &REDACTED)
            .field("url", &self.url)
            .field("timeout_secs", &self.timeout_secs)
            .field("error_codes", &self.error_codes)
            .finish()
    }
}

impl From<&Config> for Credentials {
    fn from(config: &Config) -> Self {
        Self {
            login: config.login.clone(),
            password: config.password.clone(),
            base_url: config.url.clone(),
        }
    }
}

impl Config {
    /// Load the configuration from a JSON file, or YAML when the extension
    /// is `.yml`/`.yaml`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(Error::Config(format!(
                "Cannot open configuration file: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content, is_yaml(path))?;

        debug!("Loaded configuration for user: {}", config.login);
        Ok(config)
    }

    /// Parse configuration text. Format errors and missing keys are both
    /// reported as [`Error::Config`].
    pub fn parse(content: &str, yaml: bool) -> Result<Self> {
        let file = if yaml {
            serde_yaml::from_str::<ConfigFile>(content).map_err(|e| invalid_format(&e))?
        } else {
            serde_json::from_str::<ConfigFile>(content).map_err(|e| invalid_format(&e))?
        };

        file.section.ok_or_else(|| {
            Error::Config(format!(
                "Supplied configuration file has invalid format: missing section {}",
                CONFIG_SECTION
            ))
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::from(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

fn invalid_format(err: &dyn std::fmt::Display) -> Error {
    Error::Config(format!("Supplied configuration file has invalid format: {}", err))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    )
}

/// Get the path to the default configuration file (~/.kasa.json)
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("Failed to determine home directory".to_string()))?;
    Ok(home.join(".kasa.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_CONFIG: &str = r#"{
        "TPLinkSmartPlug": {
            "login": "me@example.com",
            "password": "hunter2",
            "url": "https://eu-wap.tplinkcloud.com"
        }
    }"#;

    #[test]
    fn test_parse_json_config() {
        let config = Config::parse(JSON_CONFIG, false).unwrap();
        assert_eq!(config.login, "me@example.com");
        assert_eq!(config.password, "hunter2");
        assert_eq!(config.url, "https://eu-wap.tplinkcloud.com");
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.error_codes, ErrorCodes::default());
    }

    #[test]
    fn test_parse_yaml_config_with_overrides() {
        let yaml = "TPLinkSmartPlug:\n  login: me@example.com\n  password: hunter2\n  url: https://x\n  timeout_secs: 3\n  error_codes:\n    token_expired: -1\n";
        let config = Config::parse(yaml, true).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.error_codes.token_expired, -1);
        assert_eq!(config.error_codes.device_offline, -20571);
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let json = r#"{"TPLinkSmartPlug": {"login": "me@example.com", "url": "https://x"}}"#;
        let err = Config::parse(json, false).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("invalid format")));
    }

    #[test]
    fn test_missing_section_is_config_error() {
        let err = Config::parse(r#"{"login": "me@example.com"}"#, false).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("TPLinkSmartPlug")));
    }

    #[test]
    fn test_credentials_from_config() {
        let config = Config::parse(JSON_CONFIG, false).unwrap();
        let credentials = config.credentials();
        assert_eq!(
            credentials,
            Credentials::with_base_url("me@example.com", "hunter2", "https://eu-wap.tplinkcloud.com")
        );
        assert_eq!(Credentials::new("a", "b").base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_debug_output_hides_password() {
        let config = Config::parse(JSON_CONFIG, false).unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("me@example.com"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));

        let debug = format!("{:?}", config.credentials());
        assert!(debug.contains("eu-wap.tplinkcloud.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_yaml_extension_detection() {
        assert!(is_yaml(Path::new("/tmp/kasa.yml")));
        assert!(is_yaml(Path::new("kasa.yaml")));
        assert!(!is_yaml(Path::new("configuration.json")));
    }
}
