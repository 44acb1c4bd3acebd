//! Configuration management for vmwatch
//!
//! Provides a unified configuration system that supports YAML files,
//! environment variables, and command-line argument overrides.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default checkout interval between reconciliation rounds, in seconds
pub const DEFAULT_INTERVAL_SECONDS: u64 = 60;

/// Default label key inspected by the label selection strategy
pub const DEFAULT_LABEL_NAME: &str = "automation";

/// Main configuration structure for the watchdog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Credential acquisition configuration
    pub auth: AuthConfig,

    /// Seconds between reconciliation rounds, measured from the end of one
    /// round to the start of the next
    pub interval: u64,

    /// Explicit instance id list. Non-empty selects the explicit-list
    /// strategy; the label query below is then ignored.
    pub instances: Vec<String>,

    /// Folder to list instances from for the label strategy
    pub folder_id: Option<String>,

    /// Label key inspected by the label strategy
    pub label_name: String,

    /// Allow-list label value. Takes precedence over `label_no_go_value`.
    pub label_go_value: Option<String>,

    /// Deny-list label value. Ignored when `label_go_value` is set.
    pub label_no_go_value: Option<String>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl WatchdogConfig {
    /// Load and validate configuration from multiple sources with
    /// precedence:
    /// 1. Environment variables (highest)
    /// 2. Configuration file
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        let parsed = Self::read()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Read the layered configuration sources without validating.
    /// Callers that apply overrides afterwards validate the final shape.
    pub fn read() -> Result<Self> {
        let mut builder = config::Config::builder();

        // Start with defaults
        builder = builder.add_source(config::Config::try_from(&Self::default())?);

        // Add configuration file if it exists
        if let Ok(config_path) = std::env::var("VMWATCH_CONFIG") {
            builder = builder.add_source(config::File::with_name(&config_path).required(false));
        } else {
            for path in &["./vmwatch.yaml", "/etc/vmwatch/config.yaml"] {
                builder = builder.add_source(config::File::with_name(path).required(false));
            }
        }

        // Add environment variables with VMWATCH_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("VMWATCH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load and validate configuration from a specific file
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let parsed = Self::read_from_file(path)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Parse a configuration file on top of the defaults without validating.
    /// Callers that apply overrides afterwards validate the final shape.
    pub fn read_from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from(path));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Write the configuration to a YAML file
    pub fn to_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path.into(), yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.auth.validate()?;

        if self.interval == 0 {
            return Err(crate::Error::config("interval must be > 0 seconds"));
        }

        if self.instances.is_empty() && self.folder_id.is_none() {
            return Err(crate::Error::config(
                "either an explicit instance list or a folder_id is required",
            ));
        }

        if self.label_name.is_empty() {
            return Err(crate::Error::config("label_name cannot be empty"));
        }

        Ok(())
    }

    /// Checkout interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Whether the explicit-list selection strategy is active.
    /// Decided once at startup from the configuration shape.
    pub fn uses_explicit_instances(&self) -> bool {
        !self.instances.is_empty()
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            interval: DEFAULT_INTERVAL_SECONDS,
            instances: Vec::new(),
            folder_id: None,
            label_name: DEFAULT_LABEL_NAME.to_string(),
            label_go_value: None,
            label_no_go_value: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Credential acquisition method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthType {
    /// Exchange a Yandex Passport OAuth token for an IAM token
    Oauth,
    /// Use a ready IAM token verbatim
    Iam,
    /// Query the IAM token from the metadata service inside a trusted VM
    InsideVm,
    /// Sign a JWT with a service account authorized key and exchange it
    Sa,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthType::Oauth => write!(f, "oauth"),
            AuthType::Iam => write!(f, "iam"),
            AuthType::InsideVm => write!(f, "inside-vm"),
            AuthType::Sa => write!(f, "sa"),
        }
    }
}

impl std::str::FromStr for AuthType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oauth" => Ok(AuthType::Oauth),
            "iam" => Ok(AuthType::Iam),
            "inside-vm" => Ok(AuthType::InsideVm),
            "sa" => Ok(AuthType::Sa),
            _ => Err(format!(
                "Unknown auth type: {}. Known values are \"oauth\", \"iam\", \"inside-vm\", \"sa\"",
                s
            )),
        }
    }
}

/// Credential acquisition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Which credential method to use
    pub auth_type: AuthType,

    /// OAuth or IAM token, required for the `oauth` and `iam` types
    pub token: Option<String>,

    /// Path to the service account `authorized_key.json`, required for `sa`
    pub sa_key_file: Option<PathBuf>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        match self.auth_type {
            AuthType::Oauth | AuthType::Iam => {
                if self.token.as_deref().unwrap_or("").is_empty() {
                    return Err(crate::Error::config(format!(
                        "auth_type {} requires a token",
                        self.auth_type
                    )));
                }
            }
            AuthType::Sa => {
                if self.sa_key_file.is_none() {
                    return Err(crate::Error::config(
                        "auth_type sa requires sa_key_file pointing to authorized_key.json",
                    ));
                }
            }
            AuthType::InsideVm => {}
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_type: AuthType::Sa,
            token: None,
            sa_key_file: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,

    /// Log file path; stderr when unset
    pub file: Option<PathBuf>,

    /// Show target in logs
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
            show_target: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_explicit_config() -> WatchdogConfig {
        WatchdogConfig {
            auth: AuthConfig {
                auth_type: AuthType::Iam,
                token: Some("t1.9euelZqTk8".to_string()),
                sa_key_file: None,
            },
            instances: vec!["efqwe123qwe123qwe123".to_string()],
            ..WatchdogConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = WatchdogConfig::default();
        assert_eq!(config.interval, 60);
        assert_eq!(config.label_name, "automation");
        assert!(!config.uses_explicit_instances());

        // Defaults alone are not runnable: no targets, no sa key
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_config_validates() {
        let config = valid_explicit_config();
        assert!(config.validate().is_ok());
        assert!(config.uses_explicit_instances());
        assert_eq!(config.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_auth_validation() {
        let mut auth = AuthConfig {
            auth_type: AuthType::Oauth,
            token: None,
            sa_key_file: None,
        };
        assert!(auth.validate().is_err());

        auth.token = Some("AQAAAAA".to_string());
        assert!(auth.validate().is_ok());

        auth = AuthConfig {
            auth_type: AuthType::Sa,
            token: None,
            sa_key_file: None,
        };
        assert!(auth.validate().is_err());

        auth.sa_key_file = Some(PathBuf::from("/home/user/.keys/authorized_key.json"));
        assert!(auth.validate().is_ok());

        // inside-vm needs no local material
        let auth = AuthConfig {
            auth_type: AuthType::InsideVm,
            token: None,
            sa_key_file: None,
        };
        assert!(auth.validate().is_ok());
    }

    #[test]
    fn test_auth_type_parsing() {
        assert_eq!("oauth".parse::<AuthType>().unwrap(), AuthType::Oauth);
        assert_eq!("inside-vm".parse::<AuthType>().unwrap(), AuthType::InsideVm);
        assert_eq!("SA".parse::<AuthType>().unwrap(), AuthType::Sa);
        assert!("kerberos".parse::<AuthType>().is_err());
    }

    #[test]
    fn test_target_source_required() {
        let mut config = valid_explicit_config();
        config.instances.clear();
        assert!(config.validate().is_err());

        config.folder_id = Some("b1gafdpppaiaiu2a4444".to_string());
        assert!(config.validate().is_ok());
        assert!(!config.uses_explicit_instances());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = valid_explicit_config();
        config.interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = valid_explicit_config();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: WatchdogConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, deserialized);

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: WatchdogConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.auth.auth_type, deserialized.auth.auth_type);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "auth:\n  auth_type: iam\n  token: t1.token\ninterval: 15\ninstances:\n  - ef1\n  - ef2\n"
        )
        .unwrap();

        let config = WatchdogConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.interval, 15);
        assert_eq!(config.instances, vec!["ef1", "ef2"]);
        // Unset keys keep their defaults
        assert_eq!(config.label_name, "automation");
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "auth:\n  auth_type: iam\n  token: t1.token\n").unwrap();

        // No instances and no folder_id
        assert!(WatchdogConfig::load_from_file(file.path()).is_err());
    }
}
