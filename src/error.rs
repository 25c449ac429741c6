//! Centralized error types for testgen-jira.
//!
//! Aggregates the per-layer errors and turns them into short messages for
//! the command line, without stack traces.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::remote::RemoteError;

/// The main application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration-related errors.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Tracker client errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Errors talking to the HTTP facade.
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// IO errors (file system, sockets).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Get a user-friendly message for display.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(e) => match e {
                ConfigError::NoConfigDir => {
                    "Could not find configuration directory. Pass --config explicitly.".to_string()
                }
                ConfigError::ReadError(_) => {
                    "Could not read configuration file. Please check the file exists and is readable.".to_string()
                }
                ConfigError::ParseError(_) => {
                    "Configuration file is invalid. Please check the file format.".to_string()
                }
                ConfigError::ValidationError(msg) => format!("Configuration error: {}", msg),
            },
            AppError::Api(e) => e.to_string(),
            AppError::Remote(RemoteError::Http(_)) => {
                "Could not reach the testgen-jira server. Is it running?".to_string()
            }
            AppError::Remote(e) => e.to_string(),
            AppError::Io(_) => "A file or network operation failed.".to_string(),
        }
    }

    /// Get a suggested action for the user.
    pub fn suggested_action(&self) -> Option<&'static str> {
        match self {
            AppError::Api(ApiError::AuthenticationFailed) => Some(
                "Check your API token at https://id.atlassian.com/manage-profile/security/api-tokens",
            ),
            AppError::Api(ApiError::NetworkUnreachable(_))
            | AppError::Api(ApiError::EndpointNotFound(_)) => {
                Some("Check your internet connection and Jira base URL.")
            }
            AppError::Api(ApiError::FieldMapping(_)) => Some(
                "Set tracker.acceptance_criteria_field in config.toml to your instance's field id.",
            ),
            AppError::Remote(RemoteError::Http(_)) => {
                Some("Start the server with 'testgen-jira serve' or set TESTGEN_API_BASE_URL.")
            }
            _ => None,
        }
    }
}

/// Result type for application operations.
pub type Result<T> = std::result::Result<T, AppError>;
