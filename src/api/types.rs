//! JIRA API request and response types.
//!
//! Wire records model the subset of the REST v3 and Agile v1 payloads the
//! client reads. Domain entities are the normalized shapes handed to
//! callers and serialized by the HTTP facade.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::error::{ApiError, Result};

/// Connection details for one tracker.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// The tracker base URL (e.g., "https://company.atlassian.net").
    pub base_url: String,
    /// The account email or username.
    pub email: String,
    /// The API token.
    pub token: String,
}

impl Credentials {
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            email: email.into(),
            token: token.into(),
        }
    }

    /// Check that every field is present.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty()
            || self.email.trim().is_empty()
            || self.token.trim().is_empty()
        {
            return Err(ApiError::InvalidConfiguration(
                "Base URL, email, and token are required".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A tracker project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Short project code used by later lookups (e.g., "PROJ").
    pub key: String,
    pub name: String,
}

/// A sprint. The id is always a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: String,
    pub name: String,
    /// Tracker-defined lifecycle state (future/active/closed).
    pub state: String,
}

/// A story in a sprint listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    /// The issue key (e.g., "PROJ-123").
    pub id: String,
    pub title: String,
}

/// Flattened story content. Missing parts are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDetail {
    pub title: String,
    pub description: String,
    pub acceptance_criteria: String,
}

/// A project record from `GET /rest/api/3/project`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub key: String,
    pub name: String,
}

impl From<ProjectRecord> for Project {
    fn from(record: ProjectRecord) -> Self {
        Self {
            id: record.id,
            key: record.key,
            name: record.name,
        }
    }
}

/// A paged Agile API response (`{"values": [...]}`).
#[derive(Debug, Clone, Deserialize)]
pub struct AgilePage<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

/// A board from `GET /rest/agile/1.0/board`.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardRecord {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
}

/// A sprint from `GET /rest/agile/1.0/board/{id}/sprint`.
#[derive(Debug, Clone, Deserialize)]
pub struct SprintRecord {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: String,
}

impl From<SprintRecord> for Sprint {
    fn from(record: SprintRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            state: record.state,
        }
    }
}

/// Body of `POST /rest/api/3/search/jql`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub jql: String,
    pub fields: Vec<String>,
    pub max_results: u32,
}

/// Response of `POST /rest/api/3/search/jql`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<IssueRecord>,
}

/// An issue in a search result.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRecord {
    pub key: String,
    #[serde(default)]
    pub fields: SummaryFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryFields {
    #[serde(default)]
    pub summary: String,
}

impl From<IssueRecord> for Story {
    fn from(record: IssueRecord) -> Self {
        Self {
            id: record.key,
            title: record.fields.summary,
        }
    }
}

/// An issue from `GET /rest/api/3/issue/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueDetailRecord {
    #[serde(default)]
    pub fields: DetailFields,
}

/// Fields of a detailed issue. Custom fields stay raw and are read through
/// the configured field map.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailFields {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<serde_json::Value>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl DetailFields {
    /// The description's first text run, or empty.
    ///
    /// Accepts both rich documents and plain strings (older API versions).
    pub fn description_text(&self) -> String {
        match &self.description {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(value) => serde_json::from_value::<AtlassianDoc>(value.clone())
                .map(|doc| doc.first_text_run())
                .unwrap_or_default(),
            None => String::new(),
        }
    }
}

/// Atlassian Document Format (ADF) content.
///
/// JIRA uses ADF for rich text fields like descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlassianDoc {
    /// The document type (always "doc" for root documents).
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub content: Vec<serde_json::Value>,
}

impl AtlassianDoc {
    /// The first text node of the first block, or an empty string.
    pub fn first_text_run(&self) -> String {
        self.content
            .first()
            .and_then(|block| block.get("content"))
            .and_then(|inline| inline.as_array())
            .and_then(|inline| inline.first())
            .and_then(|node| node.get("text"))
            .and_then(|text| text.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Convert the whole document to plain text.
    ///
    /// Blocks are separated by newlines and list items get a bullet.
    pub fn to_plain_text(&self) -> String {
        let mut result = String::new();
        for node in &self.content {
            Self::extract_text(node, &mut result);
        }
        result.trim().to_string()
    }

    fn extract_text(node: &serde_json::Value, result: &mut String) {
        let Some(obj) = node.as_object() else {
            return;
        };

        match obj.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(text) = obj.get("text").and_then(|t| t.as_str()) {
                    result.push_str(text);
                }
            }
            Some("hardBreak") => result.push('\n'),
            Some("listItem") => {
                result.push_str("• ");
                Self::extract_children(obj, result);
            }
            Some("paragraph") | Some("heading") | Some("codeBlock") => {
                Self::extract_children(obj, result);
                if !result.is_empty() && !result.ends_with('\n') {
                    result.push('\n');
                }
            }
            Some("mention") => {
                if let Some(text) = obj
                    .get("attrs")
                    .and_then(|a| a.get("text"))
                    .and_then(|t| t.as_str())
                {
                    result.push('@');
                    result.push_str(text);
                }
            }
            Some("inlineCard") | Some("mediaGroup") | Some("mediaSingle") => {}
            _ => Self::extract_children(obj, result),
        }
    }

    fn extract_children(obj: &serde_json::Map<String, serde_json::Value>, result: &mut String) {
        if let Some(items) = obj.get("content").and_then(|c| c.as_array()) {
            for item in items {
                Self::extract_text(item, result);
            }
        }
    }
}

/// Accept numeric or string ids and keep them as strings.
fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}
