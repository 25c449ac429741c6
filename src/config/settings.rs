//! Application settings configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ConfigError, Result};
use crate::api::fields::{FieldMap, DEFAULT_ACCEPTANCE_CRITERIA_FIELD};
use crate::api::transport::DEFAULT_TIMEOUT_SECS;
use crate::session::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_IDLE_TTL};

/// Directory name under the platform config directory.
const APP_DIR: &str = "testgen-jira";

/// File name of the settings file.
const CONFIG_FILE: &str = "config.toml";

/// Application-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub tracker: TrackerSettings,
    pub logging: LoggingSettings,
}

/// HTTP facade settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the facade listens on.
    pub bind: String,
    /// Seconds a session may sit unused before it is dropped.
    pub session_idle_ttl_secs: u64,
    /// Most sessions held at once; the least recently used is evicted beyond it.
    pub max_sessions: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            session_idle_ttl_secs: DEFAULT_SESSION_IDLE_TTL.as_secs(),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl ServerSettings {
    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }
}

/// Tracker client settings shared by every session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Per-request timeout enforced by the HTTP transport.
    pub request_timeout_secs: u64,
    /// Field id holding acceptance criteria, unless a connect request names one.
    pub acceptance_criteria_field: String,
    /// Check the field map against the tracker when a session connects.
    pub verify_fields_on_connect: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            acceptance_criteria_field: DEFAULT_ACCEPTANCE_CRITERIA_FIELD.to_string(),
            verify_fields_on_connect: false,
        }
    }
}

impl TrackerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The default field map for new sessions.
    pub fn field_map(&self) -> FieldMap {
        FieldMap::with_acceptance_criteria(self.acceptance_criteria_field.clone())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
    /// Also write logs to a daily rotating file.
    pub log_to_file: bool,
}

impl Settings {
    /// Load settings from `path`, or from the default location.
    ///
    /// A missing file yields defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        let settings = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(ConfigError::ReadError)?;
            debug!(path = %path.display(), "Loaded configuration");
            toml::from_str(&contents)?
        } else {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ValidationError` if the bind address does not
    /// parse, a timeout or the session cap is zero, or the acceptance criteria
    /// field is not a valid field id.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.server.session_idle_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "server.session_idle_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.server.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_sessions must be greater than zero".to_string(),
            ));
        }

        if self.tracker.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tracker.request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        self.tracker
            .field_map()
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("tracker: {}", e)))?;

        Ok(())
    }

    /// The parsed listen address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind.parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "server.bind '{}' is not a valid socket address",
                self.server.bind
            ))
        })
    }
}

/// Default settings file location.
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(dir.join(APP_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.bind, "127.0.0.1:8080");
        assert_eq!(settings.tracker.request_timeout_secs, 30);
        assert_eq!(settings.tracker.acceptance_criteria_field, "customfield_10020");
        assert!(!settings.tracker.verify_fields_on_connect);
        assert!(!settings.logging.log_to_file);
        assert_eq!(settings.server.session_idle_ttl(), Duration::from_secs(1800));
        assert_eq!(settings.server.max_sessions, 256);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
bind = "0.0.0.0:9000"
max_sessions = 4

[tracker]
acceptance_criteria_field = "customfield_10100"
verify_fields_on_connect = true
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.bind_addr().unwrap().port(), 9000);
        assert_eq!(settings.server.max_sessions, 4);
        assert_eq!(settings.server.session_idle_ttl_secs, 1800);
        assert_eq!(
            settings.tracker.field_map().acceptance_criteria,
            "customfield_10100"
        );
        assert!(settings.tracker.verify_fields_on_connect);
        assert_eq!(settings.tracker.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nbind = ").unwrap();
        assert!(matches!(
            Settings::load(Some(file.path())),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut settings = Settings::default();
        settings.server.bind = "not an address".to_string();
        assert!(settings
            .validate()
            .unwrap_err()
            .to_string()
            .contains("server.bind"));

        let mut settings = Settings::default();
        settings.tracker.request_timeout_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.server.max_sessions = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.server.session_idle_ttl_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.tracker.acceptance_criteria_field = "acceptance".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let settings = Settings::default();
        let text = toml::to_string(&settings).unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_default_config_path() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("testgen-jira/config.toml"));
        }
    }
}
