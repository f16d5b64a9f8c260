//! GitHub API client implementation.

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use ticketbuddy_core::{Error, Result};
use tracing::{debug, warn};

use crate::repo::RepoRef;
use crate::types::{
    CreateCommentRequest, CreateIssueRequest, GitHubComment, GitHubIssue, GitHubMergeResult,
    GitHubPullRequest, GitHubRepository, GitHubUser, MergePullRequestRequest, UpdateIssueRequest,
};

const API_VERSION: &str = "2022-11-28";
const PER_PAGE: u32 = 100;

/// GitHub API client.
pub struct GitHubClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

/// Why an upstream merge did not happen.
#[derive(Debug, thiserror::Error)]
pub enum MergeFailure {
    #[error("Required status checks have not passed: {0}")]
    StatusChecks(String),

    #[error("A required approving review is missing: {0}")]
    ReviewRequired(String),

    #[error("Pull request has merge conflicts: {0}")]
    Conflicts(String),

    #[error("Head branch was modified since the reference SHA was captured: {0}")]
    HeadModified(String),

    #[error("Pull request was not merged: {0}")]
    NotMerged(String),

    #[error(transparent)]
    Upstream(#[from] Error),
}

impl MergeFailure {
    /// Translate an upstream error response into a merge failure.
    pub fn from_upstream(err: Error) -> Self {
        match err {
            Error::Api {
                status: 405,
                message,
            } => {
                let lower = message.to_lowercase();
                if lower.contains("status check") {
                    MergeFailure::StatusChecks(message)
                } else if lower.contains("review") {
                    MergeFailure::ReviewRequired(message)
                } else if lower.contains("not mergeable") {
                    MergeFailure::Conflicts(message)
                } else {
                    MergeFailure::Upstream(Error::Api {
                        status: 405,
                        message,
                    })
                }
            }
            Error::Api {
                status: 409,
                message,
            } => MergeFailure::HeadModified(message),
            other => MergeFailure::Upstream(other),
        }
    }

    /// HTTP status to report, `None` when the upstream was unreachable.
    pub fn status(&self) -> Option<u16> {
        match self {
            MergeFailure::StatusChecks(_)
            | MergeFailure::ReviewRequired(_)
            | MergeFailure::Conflicts(_) => Some(405),
            MergeFailure::HeadModified(_) | MergeFailure::NotMerged(_) => Some(409),
            MergeFailure::Upstream(err) => err.upstream_status(),
        }
    }
}

impl GitHubClient {
    /// Create a new GitHub client against `base_url`.
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build request with common headers.
    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(USER_AGENT, "ticketbuddy")
    }

    fn repo_url(&self, repo: &RepoRef, endpoint: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.base_url, repo.owner, repo.name, endpoint
        )
    }

    /// Make an authenticated GET request with typed deserialization.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        debug!(url = url, "GitHub GET request");

        let response = self
            .request(Method::GET, url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        self.handle_response(response).await
    }

    /// GET every page of a list endpoint, stopping at the first short page.
    async fn get_all_pages<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut page_query = query.to_vec();
            page_query.push(("per_page", PER_PAGE.to_string()));
            page_query.push(("page", page.to_string()));

            let batch: Vec<T> = self.get(url, &page_query).await?;
            let fetched = batch.len();
            items.extend(batch);

            if fetched < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        debug!(url = url, pages = page, items = items.len(), "GitHub list complete");
        Ok(items)
    }

    /// Make an authenticated request with a JSON body.
    async fn send_json<T: serde::de::DeserializeOwned, B: serde::Serialize>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<T> {
        debug!(url = url, method = %method, "GitHub request");

        let response = self
            .request(method, url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Handle response and map errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!(
                status = status_code,
                message = message,
                "GitHub API error response"
            );
            return Err(Error::from_status(status_code, message));
        }

        response
            .json()
            .await
            .map_err(|e| Error::InvalidData(format!("Failed to parse response: {}", e)))
    }

    // =========================================================================
    // Repository / user
    // =========================================================================

    pub async fn get_repository(&self, repo: &RepoRef) -> Result<GitHubRepository> {
        self.get(&self.repo_url(repo, ""), &[]).await
    }

    /// The user the token belongs to; used as a credentials check.
    pub async fn get_authenticated_user(&self) -> Result<GitHubUser> {
        self.get(&format!("{}/user", self.base_url), &[]).await
    }

    // =========================================================================
    // Pull requests
    // =========================================================================

    pub async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        state: &str,
    ) -> Result<Vec<GitHubPullRequest>> {
        self.get_all_pages(
            &self.repo_url(repo, "/pulls"),
            &[("state", state.to_string())],
        )
        .await
    }

    /// Merge a pull request, translating protection rule rejections into
    /// [`MergeFailure`] variants.
    pub async fn merge_pull_request(
        &self,
        repo: &RepoRef,
        number: u64,
        request: &MergePullRequestRequest,
    ) -> std::result::Result<GitHubMergeResult, MergeFailure> {
        let url = self.repo_url(repo, &format!("/pulls/{}/merge", number));
        let result: GitHubMergeResult = self
            .send_json(Method::PUT, &url, request)
            .await
            .map_err(MergeFailure::from_upstream)?;

        if !result.merged {
            return Err(MergeFailure::NotMerged(result.message));
        }

        Ok(result)
    }

    // =========================================================================
    // Issues
    // =========================================================================

    /// List issues, excluding pull requests (which the issues endpoint also
    /// returns). `labels` is a comma separated filter.
    pub async fn list_issues(
        &self,
        repo: &RepoRef,
        state: &str,
        labels: Option<&str>,
    ) -> Result<Vec<GitHubIssue>> {
        let mut query = vec![("state", state.to_string())];
        if let Some(labels) = labels.filter(|l| !l.trim().is_empty()) {
            query.push(("labels", labels.to_string()));
        }

        let issues: Vec<GitHubIssue> = self
            .get_all_pages(&self.repo_url(repo, "/issues"), &query)
            .await?;

        Ok(issues
            .into_iter()
            .filter(|issue| !issue.is_pull_request())
            .collect())
    }

    pub async fn create_issue(
        &self,
        repo: &RepoRef,
        request: &CreateIssueRequest,
    ) -> Result<GitHubIssue> {
        self.send_json(Method::POST, &self.repo_url(repo, "/issues"), request)
            .await
    }

    pub async fn update_issue(
        &self,
        repo: &RepoRef,
        number: u64,
        request: &UpdateIssueRequest,
    ) -> Result<GitHubIssue> {
        let url = self.repo_url(repo, &format!("/issues/{}", number));
        self.send_json(Method::PATCH, &url, request).await
    }

    pub async fn add_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<GitHubComment> {
        let url = self.repo_url(repo, &format!("/issues/{}/comments", number));
        let request = CreateCommentRequest {
            body: body.to_string(),
        };
        self.send_json(Method::POST, &url, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_failure_translation() {
        let checks = MergeFailure::from_upstream(Error::from_status(
            405,
            r#"{"message":"Required status checks must pass before merging"}"#,
        ));
        assert!(matches!(checks, MergeFailure::StatusChecks(_)));
        assert_eq!(checks.status(), Some(405));

        let review = MergeFailure::from_upstream(Error::from_status(
            405,
            r#"{"message":"At least 1 approving review is required by reviewers with write access"}"#,
        ));
        assert!(matches!(review, MergeFailure::ReviewRequired(_)));

        let conflicts = MergeFailure::from_upstream(Error::from_status(
            405,
            r#"{"message":"Pull Request is not mergeable"}"#,
        ));
        assert!(matches!(conflicts, MergeFailure::Conflicts(_)));

        let modified = MergeFailure::from_upstream(Error::from_status(
            409,
            r#"{"message":"Head branch was modified. Review and try the merge again."}"#,
        ));
        assert_eq!(modified.status(), Some(409));
        assert!(modified.to_string().contains("modified"));

        let other = MergeFailure::from_upstream(Error::from_status(422, "nope"));
        assert_eq!(other.status(), Some(422));

        let down = MergeFailure::from_upstream(Error::Http("connection refused".into()));
        assert_eq!(down.status(), None);
    }

    mod integration {
        use super::*;
        use crate::types::MergeMethod;
        use httpmock::prelude::*;

        fn create_test_client(server: &MockServer) -> GitHubClient {
            GitHubClient::with_base_url(server.base_url(), "test-token")
        }

        fn repo() -> RepoRef {
            RepoRef::new("octo", "shop").unwrap()
        }

        #[tokio::test]
        async fn test_get_repository_sends_headers() {
            let server = MockServer::start();

            let mock = server.mock(|when, then| {
                when.method(GET)
                    .path("/repos/octo/shop")
                    .header("Authorization", "Bearer test-token")
                    .header("Accept", "application/vnd.github+json")
                    .header("X-GitHub-Api-Version", "2022-11-28")
                    .header_exists("User-Agent");
                then.status(200).json_body(serde_json::json!({
                    "full_name": "octo/shop",
                    "html_url": "https://github.com/octo/shop",
                    "default_branch": "trunk",
                    "private": false
                }));
            });

            let client = create_test_client(&server);
            let repository = client.get_repository(&repo()).await.unwrap();

            mock.assert();
            assert_eq!(repository.full_name, "octo/shop");
            assert_eq!(repository.default_branch, "trunk");
        }

        #[tokio::test]
        async fn test_list_issues_drops_pull_requests() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(GET)
                    .path("/repos/octo/shop/issues")
                    .query_param("state", "open")
                    .query_param("labels", "bug");
                then.status(200).json_body(serde_json::json!([
                    {
                        "number": 1,
                        "title": "Real issue",
                        "state": "open",
                        "html_url": "https://github.com/octo/shop/issues/1",
                        "labels": [{"name": "bug"}],
                        "created_at": "2024-01-01T00:00:00Z",
                        "updated_at": "2024-01-01T00:00:00Z"
                    },
                    {
                        "number": 2,
                        "title": "Actually a PR",
                        "state": "open",
                        "html_url": "https://github.com/octo/shop/pull/2",
                        "pull_request": {"url": "https://api.github.com/repos/octo/shop/pulls/2"},
                        "created_at": "2024-01-01T00:00:00Z",
                        "updated_at": "2024-01-01T00:00:00Z"
                    }
                ]));
            });

            let client = create_test_client(&server);
            let issues = client.list_issues(&repo(), "open", Some("bug")).await.unwrap();

            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].number, 1);
        }

        fn issue_page(numbers: std::ops::RangeInclusive<u64>) -> serde_json::Value {
            numbers
                .map(|n| {
                    serde_json::json!({
                        "number": n,
                        "title": format!("Issue {}", n),
                        "state": "open",
                        "html_url": format!("https://github.com/octo/shop/issues/{}", n),
                        "created_at": "2024-01-01T00:00:00Z",
                        "updated_at": "2024-01-01T00:00:00Z"
                    })
                })
                .collect()
        }

        #[tokio::test]
        async fn test_list_issues_follows_pages() {
            let server = MockServer::start();

            let first = server.mock(|when, then| {
                when.method(GET)
                    .path("/repos/octo/shop/issues")
                    .query_param("per_page", "100")
                    .query_param("page", "1");
                then.status(200).json_body(issue_page(1..=100));
            });
            let second = server.mock(|when, then| {
                when.method(GET)
                    .path("/repos/octo/shop/issues")
                    .query_param("page", "2");
                then.status(200).json_body(issue_page(101..=101));
            });

            let client = create_test_client(&server);
            let issues = client.list_issues(&repo(), "all", None).await.unwrap();

            first.assert();
            second.assert();
            assert_eq!(issues.len(), 101);
            assert_eq!(issues[100].number, 101);
        }

        #[tokio::test]
        async fn test_list_pull_requests_stops_at_short_page() {
            let server = MockServer::start();

            let first = server.mock(|when, then| {
                when.method(GET)
                    .path("/repos/octo/shop/pulls")
                    .query_param("state", "open")
                    .query_param("page", "1");
                then.status(200).json_body(serde_json::json!([{
                    "number": 7,
                    "title": "Retry failed invoices",
                    "state": "open",
                    "html_url": "https://github.com/octo/shop/pull/7",
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z"
                }]));
            });

            let client = create_test_client(&server);
            let prs = client.list_pull_requests(&repo(), "open").await.unwrap();

            first.assert_hits(1);
            assert_eq!(prs.len(), 1);
        }

        #[tokio::test]
        async fn test_merge_pull_request_success() {
            let server = MockServer::start();

            let mock = server.mock(|when, then| {
                when.method(PUT)
                    .path("/repos/octo/shop/pulls/7/merge")
                    .json_body(serde_json::json!({"merge_method": "squash", "sha": "a12f9c"}));
                then.status(200).json_body(serde_json::json!({
                    "sha": "b34e01",
                    "merged": true,
                    "message": "Pull Request successfully merged"
                }));
            });

            let client = create_test_client(&server);
            let result = client
                .merge_pull_request(
                    &repo(),
                    7,
                    &MergePullRequestRequest {
                        merge_method: MergeMethod::Squash,
                        sha: Some("a12f9c".to_string()),
                        commit_title: None,
                    },
                )
                .await
                .unwrap();

            mock.assert();
            assert!(result.merged);
            assert_eq!(result.sha.as_deref(), Some("b34e01"));
        }

        #[tokio::test]
        async fn test_merge_pull_request_status_checks() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(PUT).path("/repos/octo/shop/pulls/7/merge");
                then.status(405).json_body(serde_json::json!({
                    "message": "Required status checks must pass before merging"
                }));
            });

            let client = create_test_client(&server);
            let err = client
                .merge_pull_request(&repo(), 7, &MergePullRequestRequest::default())
                .await
                .unwrap_err();

            assert!(matches!(err, MergeFailure::StatusChecks(_)));
        }

        #[tokio::test]
        async fn test_merge_pull_request_not_merged() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(PUT).path("/repos/octo/shop/pulls/7/merge");
                then.status(200).json_body(serde_json::json!({
                    "merged": false,
                    "message": "Merge skipped"
                }));
            });

            let client = create_test_client(&server);
            let err = client
                .merge_pull_request(&repo(), 7, &MergePullRequestRequest::default())
                .await
                .unwrap_err();

            assert!(matches!(err, MergeFailure::NotMerged(ref m) if m == "Merge skipped"));
        }

        #[tokio::test]
        async fn test_update_issue_and_comment() {
            let server = MockServer::start();

            let patch = server.mock(|when, then| {
                when.method(PATCH)
                    .path("/repos/octo/shop/issues/3")
                    .json_body(serde_json::json!({"state": "closed"}));
                then.status(200).json_body(serde_json::json!({
                    "number": 3,
                    "title": "Pay button disabled",
                    "state": "closed",
                    "html_url": "https://github.com/octo/shop/issues/3",
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-02T00:00:00Z"
                }));
            });

            let comment = server.mock(|when, then| {
                when.method(POST)
                    .path("/repos/octo/shop/issues/3/comments")
                    .json_body(serde_json::json!({"body": "Fixed in #7"}));
                then.status(201).json_body(serde_json::json!({
                    "id": 99,
                    "body": "Fixed in #7",
                    "created_at": "2024-01-02T00:00:00Z"
                }));
            });

            let client = create_test_client(&server);
            let issue = client
                .update_issue(
                    &repo(),
                    3,
                    &UpdateIssueRequest {
                        state: Some("closed".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            let created = client.add_comment(&repo(), 3, "Fixed in #7").await.unwrap();

            patch.assert();
            comment.assert();
            assert_eq!(issue.state, "closed");
            assert_eq!(created.id, 99);
        }

        #[tokio::test]
        async fn test_error_carries_upstream_message() {
            let server = MockServer::start();

            server.mock(|when, then| {
                when.method(POST).path("/repos/octo/shop/issues");
                then.status(422)
                    .json_body(serde_json::json!({"message": "Validation Failed"}));
            });

            let client = create_test_client(&server);
            let err = client
                .create_issue(
                    &repo(),
                    &CreateIssueRequest {
                        title: String::new(),
                        body: None,
                        labels: vec![],
                    },
                )
                .await
                .unwrap_err();

            match err {
                Error::Api { status, message } => {
                    assert_eq!(status, 422);
                    assert_eq!(message, "Validation Failed");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
