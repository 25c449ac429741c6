//! API error types for the tracker client.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

use super::transport::TransportError;

/// Longest slice of a raw error body carried into messages.
const MAX_DETAIL_CHARS: usize = 200;

/// Which request of the two-step sprint lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprintLookupStage {
    /// Resolving the board for a project key.
    Boards,
    /// Listing the sprints of the resolved board.
    Sprints,
}

impl fmt::Display for SprintLookupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SprintLookupStage::Boards => write!(f, "board lookup"),
            SprintLookupStage::Sprints => write!(f, "sprint lookup"),
        }
    }
}

/// Errors that can occur when interacting with the tracker.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Required connection fields are missing or malformed.
    #[error("{0}")]
    InvalidConfiguration(String),

    /// The tracker rejected the credentials (HTTP 401).
    #[error("Authentication failed. Check your Jira email and API token.")]
    AuthenticationFailed,

    /// The credentials are valid but lack permission (HTTP 403).
    #[error("Access denied. Your Jira user does not have permission to access this resource.")]
    AccessDenied,

    /// The base URL or API path is wrong (HTTP 404).
    #[error("Jira API endpoint not found ({0}). Check your Jira base URL.")]
    EndpointNotFound(String),

    /// The project has no board, so it cannot have sprints.
    #[error("No boards found for project {0}")]
    NoBoardFound(String),

    /// The request never reached the tracker.
    #[error("No response from Jira server. Check your network connection and Jira base URL. ({0})")]
    NetworkUnreachable(String),

    /// Listing projects failed for another reason.
    #[error("Failed to fetch projects from Jira: {0}")]
    FetchFailed(String),

    /// Listing sprints failed in one of its two steps.
    #[error("Failed to fetch sprints from Jira during {stage}: {message}")]
    SprintsFetchFailed {
        stage: SprintLookupStage,
        message: String,
    },

    /// Listing stories failed.
    #[error("Failed to fetch stories from Jira: {0}")]
    StoriesFetchFailed(String),

    /// Fetching a story's details failed.
    #[error("Failed to fetch story details from Jira: {0}")]
    StoryDetailsFetchFailed(String),

    /// The tracker's field layout does not match the configured field map.
    #[error("Field mapping error: {0}")]
    FieldMapping(String),

    /// An operation was attempted without an established connection.
    #[error("Not connected to Jira. Please connect first.")]
    NotConnected,

    /// The HTTP client could not be constructed.
    #[error("Failed to connect to Jira: {0}")]
    ClientBuild(String),
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Map a failed request to the shared taxonomy.
    ///
    /// 401/403/404 and missing responses have dedicated kinds regardless of
    /// the operation; everything else goes to the operation's catch-all.
    pub fn classify(failure: RequestFailure, catch_all: impl FnOnce(String) -> ApiError) -> Self {
        match failure {
            RequestFailure::Status { status, .. } if status == StatusCode::UNAUTHORIZED => {
                ApiError::AuthenticationFailed
            }
            RequestFailure::Status { status, .. } if status == StatusCode::FORBIDDEN => {
                ApiError::AccessDenied
            }
            RequestFailure::Status { status, url, .. } if status == StatusCode::NOT_FOUND => {
                ApiError::EndpointNotFound(url)
            }
            RequestFailure::NoResponse(message) => ApiError::NetworkUnreachable(message),
            other => catch_all(other.to_string()),
        }
    }

    /// Whether the error is the caller's fault (HTTP 400) rather than a
    /// remote or transport failure (HTTP 500).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidConfiguration(_) | ApiError::NotConnected
        )
    }
}

/// Why a single tracker request did not produce a usable payload.
#[derive(Debug, Error)]
pub enum RequestFailure {
    /// The tracker answered with a non-success status.
    #[error("HTTP {status} from {url}: {detail}")]
    Status {
        status: StatusCode,
        url: String,
        detail: String,
    },

    /// No response was received.
    #[error("no response received: {0}")]
    NoResponse(String),

    /// The request could not be performed.
    #[error("{0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("unexpected response payload: {0}")]
    Decode(String),
}

impl RequestFailure {
    /// Build a status failure, extracting the tracker's error text from the body.
    pub fn from_status(status: StatusCode, url: &str, body: &str) -> Self {
        RequestFailure::Status {
            status,
            url: url.to_string(),
            detail: error_detail(body),
        }
    }
}

impl From<TransportError> for RequestFailure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NoResponse(msg) => RequestFailure::NoResponse(msg),
            TransportError::Request(msg) => RequestFailure::Transport(msg),
        }
    }
}

/// Pull a readable message out of a tracker error body.
///
/// JIRA returns `{"errorMessages": [...], "errors": {...}}`; anything else
/// is carried through truncated.
fn error_detail(body: &str) -> String {
    if body.trim().is_empty() {
        return "empty response body".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let mut parts: Vec<String> = Vec::new();
        if let Some(messages) = json.get("errorMessages").and_then(|m| m.as_array()) {
            parts.extend(messages.iter().filter_map(|v| v.as_str()).map(String::from));
        }
        if let Some(errors) = json.get("errors").and_then(|e| e.as_object()) {
            parts.extend(errors.iter().map(|(k, v)| match v.as_str() {
                Some(s) => format!("{}: {}", k, s),
                None => format!("{}: {}", k, v),
            }));
        }
        if !parts.is_empty() {
            return parts.join(", ");
        }
    }

    body.chars().take(MAX_DETAIL_CHARS).collect()
}
