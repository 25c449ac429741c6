//! JIRA API client and types.
//!
//! This module provides the interface for reading projects, sprints and
//! stories from the JIRA REST API.

mod auth;
mod client;
pub mod error;
pub mod fields;
pub mod transport;
pub mod types;

pub use auth::{build_auth_header, Auth};
pub use client::{stories_jql, JiraClient, MAX_STORIES};
pub use error::{ApiError, SprintLookupStage};
pub use fields::FieldMap;
pub use transport::{HttpTransport, Transport};
pub use types::{Credentials, Project, Sprint, Story, StoryDetail};
