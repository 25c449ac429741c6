//! Error responses of the HTTP facade.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::api::ApiError;

/// Errors a facade handler can return.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A client or session error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A required request parameter was not supplied.
    #[error("{0}")]
    MissingParameter(&'static str),

    /// The request body was not the expected JSON.
    #[error("Invalid request body: {0}")]
    MalformedBody(String),
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

impl ServerError {
    /// Returns the HTTP status code for this error.
    ///
    /// Configuration and session-state problems are 400; anything that went
    /// wrong talking to the tracker is 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Api(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Api(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingParameter(_) | Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            error!(status = %status, error = %message, "Request failed");
        } else {
            warn!(status = %status, error = %message, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
