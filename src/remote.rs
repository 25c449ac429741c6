//! Client for the HTTP facade.
//!
//! Mirrors what the browser does: connect once, then fetch projects,
//! sprints, stories, and story details through the facade.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::api::{Credentials, Project, Sprint, Story, StoryDetail};
use crate::server::{ConnectResponse, SESSION_HEADER};
use crate::session::SessionId;

/// Environment variable naming the facade API base URL.
pub const API_BASE_URL_ENV: &str = "TESTGEN_API_BASE_URL";

/// API base URL used when [`API_BASE_URL_ENV`] is unset.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// Errors returned by [`FacadeClient`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The facade could not be reached or returned an unreadable body.
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// The facade answered with an error status.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// No session has been established yet.
    #[error("Not connected to Jira. Please connect first.")]
    NotConnected,
}

/// Result type for facade client operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// The facade API base URL from the environment, or the default.
pub fn api_base_url() -> String {
    std::env::var(API_BASE_URL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the facade.
#[derive(Debug, Clone)]
pub struct FacadeClient {
    http: Client,
    base_url: String,
    session: Option<SessionId>,
}

impl FacadeClient {
    /// Create a client for the given API base URL.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    /// Create a client using [`api_base_url`].
    pub fn from_env() -> Self {
        Self::new(&api_base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Connect to a tracker and keep the returned session.
    #[instrument(skip(self, credentials), fields(base_url = %credentials.base_url))]
    pub async fn connect(&mut self, credentials: &Credentials) -> Result<SessionId> {
        let response = self
            .http
            .post(format!("{}/jira/connect", self.base_url))
            .json(credentials)
            .send()
            .await?;
        let body: ConnectResponse = parse(response, "Failed to connect to Jira").await?;

        let session = body.session_id.ok_or_else(|| RemoteError::Server {
            status: 200,
            message: "Connect response did not include a session id".to_string(),
        })?;
        debug!(session = %session, "Connected through facade");
        self.session = Some(session);
        Ok(session)
    }

    /// End the current session.
    pub async fn disconnect(&mut self) -> Result<()> {
        let request = self
            .authorized(self.http.delete(format!("{}/jira/connect", self.base_url)))?;
        let _: ConnectResponse = parse(request.send().await?, "Failed to disconnect").await?;
        self.session = None;
        Ok(())
    }

    pub async fn projects(&self) -> Result<Vec<Project>> {
        self.get("/jira/projects", "Failed to fetch Jira projects")
            .await
    }

    pub async fn sprints(&self, project_key: &str) -> Result<Vec<Sprint>> {
        let path = format!("/jira/sprints/{}", urlencoding::encode(project_key));
        self.get(&path, "Failed to fetch Jira sprints").await
    }

    pub async fn stories(&self, sprint_id: &str) -> Result<Vec<Story>> {
        let path = format!("/jira/stories?sprint={}", urlencoding::encode(sprint_id));
        self.get(&path, "Failed to fetch Jira stories").await
    }

    pub async fn story_details(&self, id: &str) -> Result<StoryDetail> {
        let path = format!("/jira/story/{}", urlencoding::encode(id));
        self.get(&path, "Failed to fetch Jira story details")
            .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, fallback: &str) -> Result<T> {
        let request = self.authorized(self.http.get(format!("{}{}", self.base_url, path)))?;
        parse(request.send().await?, fallback).await
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let session = self.session.ok_or(RemoteError::NotConnected)?;
        Ok(request.header(SESSION_HEADER, session.to_string()))
    }
}

/// Decode a success body, or turn the facade's `{error}` body into an error.
async fn parse<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_else(|| fallback.to_string());

    Err(RemoteError::Server {
        status: status.as_u16(),
        message,
    })
}
