//! Mapping of logical story fields to tracker field ids.
//!
//! JIRA instances number their custom fields independently, so the field
//! holding acceptance criteria differs between sites. The mapping is an
//! explicit, versioned table that is validated up front and can be checked
//! against the tracker's field catalogue.

use serde::{Deserialize, Serialize};

use super::error::{ApiError, Result};
use super::types::AtlassianDoc;

/// Current layout version of [`FieldMap`].
pub const FIELD_MAP_VERSION: u32 = 1;

/// Field id used for acceptance criteria when nothing else is configured.
pub const DEFAULT_ACCEPTANCE_CRITERIA_FIELD: &str = "customfield_10020";

/// Which tracker fields back the story detail entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    /// Layout version of this table.
    pub version: u32,
    /// Field id holding acceptance criteria.
    pub acceptance_criteria: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            version: FIELD_MAP_VERSION,
            acceptance_criteria: DEFAULT_ACCEPTANCE_CRITERIA_FIELD.to_string(),
        }
    }
}

/// One entry of `GET /rest/api/3/field`.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
}

impl FieldMap {
    /// Build a map with a custom acceptance-criteria field.
    pub fn with_acceptance_criteria(field: impl Into<String>) -> Self {
        Self {
            acceptance_criteria: field.into(),
            ..Self::default()
        }
    }

    /// Check the table is well formed.
    pub fn validate(&self) -> Result<()> {
        if self.version != FIELD_MAP_VERSION {
            return Err(ApiError::FieldMapping(format!(
                "unsupported field map version {} (expected {})",
                self.version, FIELD_MAP_VERSION
            )));
        }
        if !is_valid_field_id(&self.acceptance_criteria) {
            return Err(ApiError::FieldMapping(format!(
                "'{}' is not a valid field id for acceptance criteria",
                self.acceptance_criteria
            )));
        }
        Ok(())
    }

    /// Confirm every mapped field exists in the tracker's catalogue.
    pub fn check_against(&self, catalogue: &[FieldDescriptor]) -> Result<()> {
        self.validate()?;
        if catalogue.iter().any(|f| f.id == self.acceptance_criteria) {
            Ok(())
        } else {
            Err(ApiError::FieldMapping(format!(
                "field '{}' does not exist on this Jira instance",
                self.acceptance_criteria
            )))
        }
    }

    /// The `fields` parameter for a story detail request.
    pub fn detail_fields(&self) -> String {
        format!("summary,description,{}", self.acceptance_criteria)
    }

    /// Read acceptance criteria out of an issue's raw field value.
    ///
    /// Absent and null values become an empty string. A value whose shape
    /// cannot hold text is a mapping error.
    pub fn acceptance_criteria_text(&self, value: Option<&serde_json::Value>) -> Result<String> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(String::new()),
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(v @ serde_json::Value::Object(_)) => {
                match serde_json::from_value::<AtlassianDoc>(v.clone()) {
                    Ok(doc) if doc.doc_type == "doc" => Ok(doc.to_plain_text()),
                    _ => Err(self.shape_error("an object that is not a document")),
                }
            }
            Some(serde_json::Value::Array(_)) => Err(self.shape_error("an array")),
            Some(serde_json::Value::Number(_)) => Err(self.shape_error("a number")),
            Some(serde_json::Value::Bool(_)) => Err(self.shape_error("a boolean")),
        }
    }

    fn shape_error(&self, found: &str) -> ApiError {
        ApiError::FieldMapping(format!(
            "field '{}' holds {}, expected text; configure the acceptance criteria field for this instance",
            self.acceptance_criteria, found
        ))
    }
}

fn is_valid_field_id(id: &str) -> bool {
    match id.strip_prefix("customfield_") {
        Some(number) => !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()),
        None => matches!(id, "summary" | "description" | "environment"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_map() {
        let map = FieldMap::default();
        assert_eq!(map.acceptance_criteria, "customfield_10020");
        assert!(map.validate().is_ok());
        assert_eq!(map.detail_fields(), "summary,description,customfield_10020");
    }

    #[test]
    fn test_rejects_malformed_ids() {
        for bad in ["", "customfield_", "customfield_12a", "acceptance"] {
            let map = FieldMap::with_acceptance_criteria(bad);
            assert!(
                matches!(map.validate(), Err(ApiError::FieldMapping(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_unknown_version() {
        let map = FieldMap {
            version: 7,
            ..FieldMap::default()
        };
        assert!(map.validate().is_err());
    }

    #[test]
    fn test_check_against_catalogue() {
        let catalogue: Vec<FieldDescriptor> = serde_json::from_value(json!([
            {"id": "summary", "name": "Summary", "custom": false},
            {"id": "customfield_10042", "name": "Acceptance Criteria", "custom": true}
        ]))
        .unwrap();

        assert!(FieldMap::with_acceptance_criteria("customfield_10042")
            .check_against(&catalogue)
            .is_ok());
        assert!(matches!(
            FieldMap::default().check_against(&catalogue),
            Err(ApiError::FieldMapping(_))
        ));
    }

    #[test]
    fn test_acceptance_criteria_absent_is_empty() {
        let map = FieldMap::default();
        assert_eq!(map.acceptance_criteria_text(None).unwrap(), "");
        assert_eq!(map.acceptance_criteria_text(Some(&json!(null))).unwrap(), "");
    }

    #[test]
    fn test_acceptance_criteria_plain_string() {
        let map = FieldMap::default();
        let value = json!("Given a user, when they log in, then they see the dashboard");
        assert_eq!(
            map.acceptance_criteria_text(Some(&value)).unwrap(),
            "Given a user, when they log in, then they see the dashboard"
        );
    }

    #[test]
    fn test_acceptance_criteria_rich_document() {
        let map = FieldMap::default();
        let value = json!({
            "type": "doc",
            "version": 1,
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "Must log in"}]}
            ]
        });
        assert_eq!(map.acceptance_criteria_text(Some(&value)).unwrap(), "Must log in");
    }

    #[test]
    fn test_acceptance_criteria_wrong_shape_fails_loudly() {
        let map = FieldMap::default();
        // customfield_10020 is the sprint field on many instances.
        let sprint_array = json!([{"id": 7, "name": "Sprint 1"}]);
        assert!(matches!(
            map.acceptance_criteria_text(Some(&sprint_array)),
            Err(ApiError::FieldMapping(_))
        ));
        assert!(map.acceptance_criteria_text(Some(&json!(3))).is_err());
        assert!(map
            .acceptance_criteria_text(Some(&json!({"value": "x"})))
            .is_err());
    }
}
