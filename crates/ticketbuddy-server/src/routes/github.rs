//! GitHub repository routes.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use ticketbuddy_core::{now_timestamp, IssueMirror, PullRequestMirror, RepoLink};
use ticketbuddy_github::{
    CreateIssueRequest, GitHubClient, MergeMethod, MergePullRequestRequest, RepoRef,
    UpdateIssueRequest,
};
use ticketbuddy_storage::OpenCounts;
use tracing::{info, warn};

use crate::error::{parse_body, parse_optional_body, ApiError, ApiResult};
use crate::state::AppState;
use crate::sync::spawn_auto_tickets;

/// Events shown in the summary.
const SUMMARY_EVENTS: i64 = 10;
const DEFAULT_EVENTS: i64 = 20;
const MAX_EVENTS: i64 = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/github/link", post(link_repository).delete(unlink_repository))
        .route("/github/summary", get(summary))
        .route("/github/test", get(test_connection))
        .route("/github/{owner}/{name}/prs", get(list_pull_requests))
        .route(
            "/github/{owner}/{name}/issues",
            get(list_issues).post(create_issue),
        )
        .route("/github/{owner}/{name}/events", get(list_events))
        .route(
            "/github/{owner}/{name}/pr/{number}/merge",
            post(merge_pull_request),
        )
        .route("/github/{owner}/{name}/issues/{number}", patch(update_issue))
        .route(
            "/github/{owner}/{name}/issues/{number}/comment",
            post(add_comment),
        )
}

fn repo_ref(owner: &str, name: &str) -> ApiResult<RepoRef> {
    Ok(RepoRef::new(owner, name)?)
}

fn parse_number(raw: &str) -> ApiResult<u64> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid number: {}", raw)))
}

fn state_param<'a>(params: &'a HashMap<String, String>) -> ApiResult<&'a str> {
    match params.get("state").map(String::as_str) {
        None | Some("") => Ok("open"),
        Some(state @ ("open" | "closed" | "all")) => Ok(state),
        Some(other) => Err(ApiError::BadRequest(format!(
            "state must be open, closed or all (got '{}')",
            other
        ))),
    }
}

// =============================================================================
// Link
// =============================================================================

#[derive(Deserialize)]
struct LinkBody {
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    repo_url: Option<String>,
}

/// POST /github/link
async fn link_repository(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body: LinkBody = parse_body(&body)?;
    let input = [body.repo, body.url, body.repo_url]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("repo or url is required".to_string()))?;

    let repo = RepoRef::parse(&input)?;
    let upstream = state.github()?.get_repository(&repo).await?;

    let link = RepoLink {
        id: if upstream.full_name.is_empty() {
            repo.full_name()
        } else {
            upstream.full_name
        },
        url: if upstream.html_url.is_empty() {
            repo.html_url()
        } else {
            upstream.html_url
        },
        default_branch: upstream.default_branch,
        connected_at: now_timestamp(),
    };
    state.store.repo_link().replace(&link).await?;
    info!(repo = %link.id, "Repository linked");

    Ok(Json(json!({ "success": true, "repo": link })))
}

/// DELETE /github/link
async fn unlink_repository(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let removed = state.store.repo_link().clear().await?;
    if removed {
        info!("Repository unlinked");
    }
    Ok(Json(json!({ "success": true, "removed": removed })))
}

// =============================================================================
// Summary / test
// =============================================================================

/// Open counts straight from GitHub.
async fn live_counts(github: &GitHubClient, repo: &RepoRef) -> ticketbuddy_core::Result<OpenCounts> {
    let pull_requests = github.list_pull_requests(repo, "open").await?;
    let issues = github.list_issues(repo, "open", None).await?;
    Ok(OpenCounts {
        pull_requests: pull_requests.len() as i64,
        issues: issues.len() as i64,
    })
}

/// GET /github/summary
async fn summary(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let Some(link) = state.store.repo_link().get().await? else {
        return Ok(Json(json!({
            "connected": false,
            "repo": null,
            "counts": OpenCounts::default(),
            "recentEvents": [],
        })));
    };

    let live = match (state.github.as_deref(), RepoRef::parse(&link.id)) {
        (Some(github), Ok(repo)) => match live_counts(github, &repo).await {
            Ok(counts) => Some(counts),
            Err(e) => {
                warn!(repo = %link.id, error = %e, "Live counts failed, using mirror counts");
                None
            }
        },
        _ => None,
    };
    let counts = match live {
        Some(counts) => counts,
        None => state.store.mirrors().count_open(&link.id).await?,
    };

    let events = state.store.events().for_repo(&link.id, SUMMARY_EVENTS).await?;

    Ok(Json(json!({
        "connected": true,
        "repo": link,
        "counts": counts,
        "recentEvents": events,
    })))
}

/// GET /github/test
async fn test_connection(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let user = state.github()?.get_authenticated_user().await?;
    Ok(Json(json!({ "ok": true, "login": user.login, "name": user.name })))
}

// =============================================================================
// Pull requests
// =============================================================================

/// GET /github/{owner}/{name}/prs?state=
async fn list_pull_requests(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let repo = repo_ref(&owner, &name)?;
    let pr_state = state_param(&params)?;
    let pull_requests = state.github()?.list_pull_requests(&repo, pr_state).await?;

    let repo_id = repo.full_name();
    let mirrors = state.store.mirrors();
    let mut prs: Vec<PullRequestMirror> = Vec::with_capacity(pull_requests.len());
    for pr in &pull_requests {
        let mirror = pr.to_mirror(&repo_id);
        mirrors.upsert_pull_request(&mirror).await?;
        prs.push(mirror);
    }

    Ok(Json(json!({ "prs": prs })))
}

#[derive(Deserialize, Default)]
struct MergeBody {
    #[serde(default)]
    method: Option<MergeMethod>,
    #[serde(default)]
    merge_method: Option<MergeMethod>,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    commit_title: Option<String>,
    #[serde(default)]
    ticket_id: Option<String>,
}

/// POST /github/{owner}/{name}/pr/{number}/merge
///
/// The local mirror and the optional ticket are only touched after GitHub
/// confirms the merge.
async fn merge_pull_request(
    State(state): State<AppState>,
    Path((owner, name, number)): Path<(String, String, String)>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let repo = repo_ref(&owner, &name)?;
    let number = parse_number(&number)?;
    let body: MergeBody = parse_optional_body(&body)?;
    let ticket_id = body.ticket_id.filter(|t| !t.trim().is_empty());

    let request = MergePullRequestRequest {
        merge_method: body.merge_method.or(body.method).unwrap_or_default(),
        sha: body.sha,
        commit_title: body.commit_title,
    };
    let result = state
        .github()?
        .merge_pull_request(&repo, number, &request)
        .await?;

    let ticket = state
        .store
        .merge_resolution(&repo.full_name(), number, ticket_id.as_deref())
        .await?;
    info!(repo = %repo, number, ticket = ?ticket_id, "Pull request merged");

    Ok(Json(json!({
        "success": true,
        "merged": true,
        "sha": result.sha,
        "message": result.message,
        "ticket": ticket,
    })))
}

// =============================================================================
// Issues
// =============================================================================

/// GET /github/{owner}/{name}/issues?state=&labels=
///
/// Listing open issues also files tickets for issues that have none, in the
/// background.
async fn list_issues(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let repo = repo_ref(&owner, &name)?;
    let issue_state = state_param(&params)?;
    let labels = params.get("labels").map(String::as_str);

    let upstream = state
        .github()?
        .list_issues(&repo, issue_state, labels)
        .await?;

    let repo_id = repo.full_name();
    let mirrors = state.store.mirrors();
    let mut issues: Vec<IssueMirror> = Vec::with_capacity(upstream.len());
    for issue in &upstream {
        let mirror = issue.to_mirror(&repo_id);
        mirrors.upsert_issue(&mirror).await?;
        issues.push(mirror);
    }

    if issue_state == "open" && !upstream.is_empty() {
        spawn_auto_tickets(state.store.clone(), repo, upstream);
    }

    Ok(Json(json!({ "issues": issues })))
}

#[derive(Deserialize)]
struct CreateIssueBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
}

/// POST /github/{owner}/{name}/issues
async fn create_issue(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let repo = repo_ref(&owner, &name)?;
    let body: CreateIssueBody = parse_body(&body)?;
    let title = body
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("title is required".to_string()))?;

    let request = CreateIssueRequest {
        title,
        body: body.body.filter(|b| !b.trim().is_empty()),
        labels: body.labels,
    };
    let issue = state.github()?.create_issue(&repo, &request).await?;

    let mirror = issue.to_mirror(&repo.full_name());
    state.store.mirrors().upsert_issue(&mirror).await?;
    info!(repo = %repo, number = issue.number, "Issue created");

    Ok(Json(json!({ "success": true, "issue": mirror })))
}

#[derive(Deserialize)]
struct UpdateIssueBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

/// PATCH /github/{owner}/{name}/issues/{number}
async fn update_issue(
    State(state): State<AppState>,
    Path((owner, name, number)): Path<(String, String, String)>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let repo = repo_ref(&owner, &name)?;
    let number = parse_number(&number)?;
    let body: UpdateIssueBody = parse_body(&body)?;

    if let Some(issue_state) = body.state.as_deref() {
        if !matches!(issue_state, "open" | "closed") {
            return Err(ApiError::BadRequest(format!(
                "state must be open or closed (got '{}')",
                issue_state
            )));
        }
    }
    if body.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("title cannot be empty".to_string()));
    }

    let request = UpdateIssueRequest {
        title: body.title,
        body: body.body,
        state: body.state,
    };
    if request.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let issue = state.github()?.update_issue(&repo, number, &request).await?;

    let mirror = issue.to_mirror(&repo.full_name());
    state.store.mirrors().upsert_issue(&mirror).await?;
    info!(repo = %repo, number, state = %mirror.state, "Issue updated");

    Ok(Json(json!({ "success": true, "issue": mirror })))
}

#[derive(Deserialize)]
struct CommentBody {
    #[serde(default)]
    body: Option<String>,
}

/// POST /github/{owner}/{name}/issues/{number}/comment
async fn add_comment(
    State(state): State<AppState>,
    Path((owner, name, number)): Path<(String, String, String)>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let repo = repo_ref(&owner, &name)?;
    let number = parse_number(&number)?;
    let body: CommentBody = parse_body(&body)?;
    let text = body
        .body
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("body is required".to_string()))?;

    let comment = state.github()?.add_comment(&repo, number, &text).await?;
    Ok(Json(json!({ "success": true, "comment": comment })))
}

// =============================================================================
// Events
// =============================================================================

/// GET /github/{owner}/{name}/events?limit=
async fn list_events(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let repo = repo_ref(&owner, &name)?;
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<i64>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_EVENTS)
        .min(MAX_EVENTS);

    let events = state.store.events().for_repo(&repo.full_name(), limit).await?;
    Ok(Json(json!({ "events": events })))
}
