//! testgen-jira - JIRA integration for a test-generation tool.
//!
//! Reads projects, sprints, stories and story details from JIRA and exposes
//! them to a browser client through a small HTTP facade.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod server;
pub mod session;
