//! Configuration management for testgen-jira.
//!
//! Settings come from a TOML file in the user's config directory (or a path
//! given on the command line). A missing file means defaults.

mod settings;

use thiserror::Error;

pub use settings::{LoggingSettings, ServerSettings, Settings, TrackerSettings};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine configuration directory")]
    NoConfigDir,

    /// The configuration file exists but could not be read.
    #[error("failed to read configuration: {0}")]
    ReadError(#[source] std::io::Error),

    /// The configuration file is not valid TOML for [`Settings`].
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
