//! JIRA API client implementation.
//!
//! The client is bound to one set of credentials for its whole lifetime.
//! Construction does no I/O; every operation issues its requests through the
//! injected [`Transport`] and maps failures into [`ApiError`].

use std::sync::Arc;

use reqwest::header;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use super::auth::Auth;
use super::error::{ApiError, RequestFailure, Result, SprintLookupStage};
use super::fields::{FieldDescriptor, FieldMap};
use super::transport::{Transport, TransportRequest};
use super::types::{
    AgilePage, BoardRecord, Credentials, IssueDetailRecord, Project, ProjectRecord,
    SearchRequest, SearchResponse, Sprint, SprintRecord, Story, StoryDetail,
};

/// Largest story page requested from the tracker. No further pages are read.
pub const MAX_STORIES: usize = 100;

/// The JIRA API client.
#[derive(Debug)]
pub struct JiraClient {
    /// The HTTP transport.
    transport: Arc<dyn Transport>,
    /// The base URL without trailing slashes.
    base_url: String,
    /// Authentication credentials.
    auth: Auth,
    /// Where story detail fields live on this instance.
    fields: FieldMap,
}

impl JiraClient {
    /// Create a client bound to the given credentials.
    ///
    /// Only normalizes the URL and encodes the token; nothing is sent.
    pub fn new(credentials: &Credentials, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: normalize_base_url(&credentials.base_url),
            auth: Auth::new(&credentials.email, &credentials.token),
            fields: FieldMap::default(),
        }
    }

    /// Use a non-default field map.
    pub fn with_field_map(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the identity the client authenticates as.
    pub fn identity(&self) -> &str {
        self.auth.identity()
    }

    /// Get the active field map.
    pub fn field_map(&self) -> &FieldMap {
        &self.fields
    }

    /// List all projects visible to the user, in tracker order.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let url = format!("{}/rest/api/3/project", self.base_url);
        info!(auth = %self.auth.redacted(), "Fetching Jira projects");

        let records: Vec<ProjectRecord> = self
            .execute(TransportRequest::get(&url))
            .await
            .map_err(|failure| {
                error!(error = %failure, "Error fetching Jira projects");
                ApiError::classify(failure, ApiError::FetchFailed)
            })?;

        debug!(count = records.len(), "Projects found");
        Ok(records.into_iter().map(Project::from).collect())
    }

    /// List sprints of the first board attached to a project.
    ///
    /// The board lookup and the sprint lookup run strictly in sequence.
    #[instrument(skip(self), fields(project_key = %project_key))]
    pub async fn list_sprints(&self, project_key: &str) -> Result<Vec<Sprint>> {
        let board_url = format!("{}/rest/agile/1.0/board", self.base_url);
        let boards: AgilePage<BoardRecord> = self
            .execute(TransportRequest::get(&board_url).query("projectKeyOrId", project_key))
            .await
            .map_err(|failure| sprint_failure(SprintLookupStage::Boards, failure))?;

        let board_id = match boards.values.into_iter().next() {
            Some(board) => board.id,
            None => {
                warn!("No boards found for project");
                return Err(ApiError::NoBoardFound(project_key.to_string()));
            }
        };
        debug!(board_id = %board_id, "Resolved board");

        let sprint_url = format!(
            "{}/rest/agile/1.0/board/{}/sprint",
            self.base_url,
            urlencoding::encode(&board_id)
        );
        let sprints: AgilePage<SprintRecord> = self
            .execute(TransportRequest::get(&sprint_url))
            .await
            .map_err(|failure| sprint_failure(SprintLookupStage::Sprints, failure))?;

        debug!(count = sprints.values.len(), "Sprints found");
        Ok(sprints.values.into_iter().map(Sprint::from).collect())
    }

    /// List stories in a sprint, newest first, at most [`MAX_STORIES`].
    #[instrument(skip(self), fields(sprint_id = %sprint_id))]
    pub async fn list_stories(&self, sprint_id: &str) -> Result<Vec<Story>> {
        if !is_sprint_id(sprint_id) {
            return Err(ApiError::InvalidConfiguration(format!(
                "Sprint ID must be numeric, got '{}'",
                sprint_id
            )));
        }

        let url = format!("{}/rest/api/3/search/jql", self.base_url);
        let request = SearchRequest {
            jql: stories_jql(sprint_id),
            fields: vec!["summary".to_string(), "key".to_string()],
            max_results: MAX_STORIES as u32,
        };
        info!(jql = %request.jql, "Fetching Jira stories");

        let body = serde_json::to_value(&request)
            .map_err(|e| ApiError::StoriesFetchFailed(e.to_string()))?;
        let response: SearchResponse = self
            .execute(
                TransportRequest::post(&url, body)
                    .header(header::CONTENT_TYPE, "application/json"),
            )
            .await
            .map_err(|failure| {
                error!(error = %failure, "Error fetching Jira stories");
                ApiError::classify(failure, ApiError::StoriesFetchFailed)
            })?;

        debug!(count = response.issues.len(), "Issues found");
        Ok(response
            .issues
            .into_iter()
            .take(MAX_STORIES)
            .map(Story::from)
            .collect())
    }

    /// Fetch the title, description, and acceptance criteria of an issue.
    #[instrument(skip(self), fields(issue = %id))]
    pub async fn get_story_details(&self, id: &str) -> Result<StoryDetail> {
        let url = format!(
            "{}/rest/api/3/issue/{}",
            self.base_url,
            urlencoding::encode(id)
        );
        let record: IssueDetailRecord = self
            .execute(TransportRequest::get(&url).query("fields", &self.fields.detail_fields()))
            .await
            .map_err(|failure| {
                error!(error = %failure, "Error fetching Jira story details");
                ApiError::classify(failure, ApiError::StoryDetailsFetchFailed)
            })?;

        let fields = record.fields;
        let acceptance_criteria = self
            .fields
            .acceptance_criteria_text(fields.other.get(&self.fields.acceptance_criteria))?;

        Ok(StoryDetail {
            description: fields.description_text(),
            title: fields.summary,
            acceptance_criteria,
        })
    }

    /// Check the field map against the tracker's field catalogue.
    #[instrument(skip(self))]
    pub async fn verify_field_map(&self) -> Result<()> {
        self.fields.validate()?;

        let url = format!("{}/rest/api/3/field", self.base_url);
        let catalogue: Vec<FieldDescriptor> = self
            .execute(TransportRequest::get(&url))
            .await
            .map_err(|failure| {
                ApiError::classify(failure, |msg| {
                    ApiError::FieldMapping(format!("could not load field catalogue: {}", msg))
                })
            })?;

        self.fields.check_against(&catalogue)?;
        debug!(fields = catalogue.len(), "Field map verified");
        Ok(())
    }

    /// Send an authenticated request and decode a successful JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<T, RequestFailure> {
        let request = request
            .header(header::AUTHORIZATION, self.auth.header_value())
            .header(header::ACCEPT, "application/json");
        let url = request.url.clone();

        let response = self.transport.send(request).await?;

        if response.status.is_success() {
            serde_json::from_str::<T>(&response.body)
                .map_err(|e| RequestFailure::Decode(e.to_string()))
        } else {
            debug!(status = %response.status, body = %response.body, "Error response body");
            Err(RequestFailure::from_status(
                response.status,
                &url,
                &response.body,
            ))
        }
    }
}

fn sprint_failure(stage: SprintLookupStage, failure: RequestFailure) -> ApiError {
    error!(stage = %stage, error = %failure, "Error fetching Jira sprints");
    ApiError::classify(failure, |message| ApiError::SprintsFetchFailed { stage, message })
}

/// Sprint ids are numeric; anything else would change the query.
fn is_sprint_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

/// Query selecting a sprint's stories, newest first.
///
/// `sprint_id` must already be numeric.
pub fn stories_jql(sprint_id: &str) -> String {
    format!(
        "sprint = {} AND issuetype = Story ORDER BY created DESC",
        sprint_id
    )
}

/// Normalize the base URL by removing trailing slashes.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');

    if !url.starts_with("https://") && !url.contains("localhost") && !url.contains("127.0.0.1") {
        warn!("URL does not use HTTPS: {}. This is insecure for production use.", url);
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::MockTransport;
    use crate::api::transport::TransportError;
    use reqwest::Method;
    use serde_json::json;

    fn client(mock: &Arc<MockTransport>) -> JiraClient {
        let creds = Credentials::new("https://x.atlassian.net/", "a@b.com", "t");
        JiraClient::new(&creds, mock.clone())
    }

    #[test]
    fn test_normalize_base_url_removes_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://company.atlassian.net/"),
            "https://company.atlassian.net"
        );
        assert_eq!(
            normalize_base_url("https://company.atlassian.net///"),
            "https://company.atlassian.net"
        );
        assert_eq!(
            normalize_base_url("https://company.atlassian.net/jira/"),
            "https://company.atlassian.net/jira"
        );
    }

    #[test]
    fn test_construction_performs_no_io() {
        let mock = Arc::new(MockTransport::new());
        let client = client(&mock);
        assert_eq!(client.base_url(), "https://x.atlassian.net");
        assert_eq!(client.identity(), "a@b.com");
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_stories_jql() {
        assert_eq!(
            stories_jql("42"),
            "sprint = 42 AND issuetype = Story ORDER BY created DESC"
        );
    }

    #[tokio::test]
    async fn test_list_projects_maps_records() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!([
                {"id": "10000", "key": "ABC", "name": "Alpha", "style": "classic"},
                {"id": "10001", "key": "XYZ", "name": "Zulu"}
            ]),
        );

        let projects = client(&mock).list_projects().await.unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(
            projects[0],
            Project {
                id: "10000".into(),
                key: "ABC".into(),
                name: "Alpha".into()
            }
        );
        assert_eq!(projects[1].key, "XYZ");

        let request = &mock.requests()[0];
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url, "https://x.atlassian.net/rest/api/3/project");
        assert_eq!(
            request.header_value(&header::AUTHORIZATION),
            Some("Basic YUBiLmNvbTp0")
        );
        assert_eq!(request.header_value(&header::ACCEPT), Some("application/json"));
    }

    #[tokio::test]
    async fn test_list_projects_status_mapping() {
        let cases: [(u16, fn(&ApiError) -> bool); 4] = [
            (401, |e| matches!(e, ApiError::AuthenticationFailed)),
            (403, |e| matches!(e, ApiError::AccessDenied)),
            (404, |e| matches!(e, ApiError::EndpointNotFound(_))),
            (500, |e| matches!(e, ApiError::FetchFailed(_))),
        ];

        for (status, check) in cases {
            let mock = Arc::new(MockTransport::new());
            mock.push_json(status, json!({"errorMessages": ["nope"]}));
            let err = client(&mock).list_projects().await.unwrap_err();
            assert!(check(&err), "status {} gave {:?}", status, err);
        }
    }

    #[tokio::test]
    async fn test_list_projects_network_unreachable() {
        let mock = Arc::new(MockTransport::new());
        mock.push_error(TransportError::NoResponse("connection refused".into()));

        let err = client(&mock).list_projects().await.unwrap_err();
        assert!(matches!(err, ApiError::NetworkUnreachable(_)));
    }

    #[tokio::test]
    async fn test_list_projects_malformed_payload() {
        let mock = Arc::new(MockTransport::new());
        mock.push_text(200, "<html>login</html>");

        let err = client(&mock).list_projects().await.unwrap_err();
        assert!(matches!(err, ApiError::FetchFailed(_)));
    }

    #[tokio::test]
    async fn test_list_sprints_no_board_skips_sprint_call() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"maxResults": 50, "total": 0, "values": []}));

        let err = client(&mock).list_sprints("ABC").await.unwrap_err();
        assert!(matches!(err, ApiError::NoBoardFound(ref key) if key == "ABC"));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.requests()[0].query_value("projectKeyOrId"), Some("ABC"));
    }

    #[tokio::test]
    async fn test_list_sprints_uses_first_board() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"values": [{"id": 5, "name": "B1"}, {"id": 9, "name": "B2"}]}))
            .push_json(
                200,
                json!({"values": [{"id": 7, "name": "Sprint 1", "state": "active"}]}),
            );

        let sprints = client(&mock).list_sprints("ABC").await.unwrap();
        assert_eq!(
            sprints,
            vec![Sprint {
                id: "7".into(),
                name: "Sprint 1".into(),
                state: "active".into()
            }]
        );

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "https://x.atlassian.net/rest/agile/1.0/board");
        assert_eq!(
            requests[1].url,
            "https://x.atlassian.net/rest/agile/1.0/board/5/sprint"
        );
    }

    #[tokio::test]
    async fn test_list_sprints_reports_failing_stage() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(500, json!({"errorMessages": ["boom"]}));
        let err = client(&mock).list_sprints("ABC").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::SprintsFetchFailed { stage: SprintLookupStage::Boards, ref message }
                if message.contains("boom")
        ));

        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"values": [{"id": 5}]}))
            .push_text(200, "not json");
        let err = client(&mock).list_sprints("ABC").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::SprintsFetchFailed {
                stage: SprintLookupStage::Sprints,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_list_sprints_auth_failure_is_classified() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(401, json!({}));
        let err = client(&mock).list_sprints("ABC").await.unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_list_stories_request_shape() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!({"issues": [
                {"id": "2", "key": "ABC-2", "fields": {"summary": "Newer"}},
                {"id": "1", "key": "ABC-1", "fields": {"summary": "Older"}}
            ]}),
        );

        let stories = client(&mock).list_stories("7").await.unwrap();
        assert_eq!(
            stories,
            vec![
                Story {
                    id: "ABC-2".into(),
                    title: "Newer".into()
                },
                Story {
                    id: "ABC-1".into(),
                    title: "Older".into()
                },
            ]
        );

        let request = &mock.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "https://x.atlassian.net/rest/api/3/search/jql");
        assert_eq!(
            request.body,
            Some(json!({
                "jql": "sprint = 7 AND issuetype = Story ORDER BY created DESC",
                "fields": ["summary", "key"],
                "maxResults": 100
            }))
        );
    }

    #[tokio::test]
    async fn test_list_stories_truncates_to_page_size() {
        let issues: Vec<_> = (0..150)
            .map(|n| json!({"key": format!("ABC-{}", 150 - n), "fields": {"summary": format!("Story {}", n)}}))
            .collect();
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({ "issues": issues }));

        let stories = client(&mock).list_stories("7").await.unwrap();
        assert_eq!(stories.len(), MAX_STORIES);
        assert_eq!(stories[0].id, "ABC-150");
        assert_eq!(stories[99].title, "Story 99");
    }

    #[tokio::test]
    async fn test_list_stories_rejects_non_numeric_sprint() {
        let mock = Arc::new(MockTransport::new());
        for bad in ["7 OR project = X", "", "abc"] {
            let err = client(&mock).list_stories(bad).await.unwrap_err();
            assert!(
                matches!(err, ApiError::InvalidConfiguration(_)),
                "{:?} gave {:?}",
                bad,
                err
            );
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_list_stories_failure() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(400, json!({"errorMessages": ["bad jql"]}));
        let err = client(&mock).list_stories("7").await.unwrap_err();
        assert!(matches!(err, ApiError::StoriesFetchFailed(ref m) if m.contains("bad jql")));
    }

    #[tokio::test]
    async fn test_get_story_details() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!({
                "key": "ABC-1",
                "fields": {
                    "summary": "Login page",
                    "description": {
                        "type": "doc",
                        "version": 1,
                        "content": [
                            {"type": "paragraph", "content": [{"type": "text", "text": "Users sign in"}]}
                        ]
                    },
                    "customfield_10020": "Shows an error on bad password"
                }
            }),
        );

        let detail = client(&mock).get_story_details("ABC-1").await.unwrap();
        assert_eq!(
            detail,
            StoryDetail {
                title: "Login page".into(),
                description: "Users sign in".into(),
                acceptance_criteria: "Shows an error on bad password".into(),
            }
        );

        let request = &mock.requests()[0];
        assert_eq!(request.url, "https://x.atlassian.net/rest/api/3/issue/ABC-1");
        assert_eq!(
            request.query_value("fields"),
            Some("summary,description,customfield_10020")
        );
    }

    #[tokio::test]
    async fn test_get_story_details_missing_fields_are_empty() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"key": "ABC-1", "fields": {"summary": "Bare"}}));

        let detail = client(&mock).get_story_details("ABC-1").await.unwrap();
        assert_eq!(detail.description, "");
        assert_eq!(detail.acceptance_criteria, "");
    }

    #[tokio::test]
    async fn test_get_story_details_custom_field_map() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!({"fields": {"summary": "S", "customfield_10100": "AC text"}}),
        );

        let client =
            client(&mock).with_field_map(FieldMap::with_acceptance_criteria("customfield_10100"));
        let detail = client.get_story_details("ABC-1").await.unwrap();
        assert_eq!(detail.acceptance_criteria, "AC text");
        assert_eq!(
            mock.requests()[0].query_value("fields"),
            Some("summary,description,customfield_10100")
        );
    }

    #[tokio::test]
    async fn test_get_story_details_failure() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(500, json!({}));
        let err = client(&mock).get_story_details("ABC-1").await.unwrap_err();
        assert!(matches!(err, ApiError::StoryDetailsFetchFailed(_)));

        let mock = Arc::new(MockTransport::new());
        mock.push_json(404, json!({"errorMessages": ["Issue does not exist"]}));
        let err = client(&mock).get_story_details("NOPE-1").await.unwrap_err();
        assert!(matches!(err, ApiError::EndpointNotFound(_)));
    }

    #[tokio::test]
    async fn test_verify_field_map() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!([{"id": "customfield_10020", "name": "AC", "custom": true}]))
            .push_json(200, json!([{"id": "summary", "name": "Summary"}]));

        let client = client(&mock);
        tokio_test::assert_ok!(client.verify_field_map().await);
        let err = client.verify_field_map().await.unwrap_err();
        assert!(matches!(err, ApiError::FieldMapping(_)));
        assert!(mock.requests()[0].url.ends_with("/rest/api/3/field"));
    }

    #[tokio::test]
    async fn test_concurrent_operations_share_client() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!([])).push_json(200, json!([]));

        let client = client(&mock);
        let (a, b) = tokio::join!(client.list_projects(), client.list_projects());
        assert!(a.unwrap().is_empty());
        assert!(b.unwrap().is_empty());
        assert_eq!(mock.call_count(), 2);
    }
}
