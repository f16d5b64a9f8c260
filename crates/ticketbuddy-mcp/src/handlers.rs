//! Tool handlers for the MCP server.
//!
//! Every tool is a single call against the TicketBuddy HTTP API. Failures of
//! any kind come back as `isError` text results prefixed with `Error: `.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::api::ApiClient;
use crate::error::{Result, ToolError};
use crate::protocol::{ToolCallResult, ToolDefinition};

const REPO_DESCRIPTION: &str = "Repository full_name (owner/name)";

/// Tool handler that forwards tool calls to the HTTP API.
pub struct ToolHandler {
    api: ApiClient,
}

impl ToolHandler {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Get available tool definitions.
    pub fn available_tools(&self) -> Vec<ToolDefinition> {
        vec![
            tool(
                "list_tickets",
                "List all tickets in the system",
                json!({"type": "object", "properties": {}}),
            ),
            tool(
                "create_ticket",
                "Create one or more tickets from a free-text description; the server classifies it",
                json!({
                    "type": "object",
                    "properties": {
                        "description": {
                            "type": "string",
                            "description": "Description of the functionality or issue"
                        }
                    },
                    "required": ["description"]
                }),
            ),
            tool(
                "update_ticket_status",
                "Update the status of a ticket",
                json!({
                    "type": "object",
                    "properties": {
                        "ticket_id": {"type": "string", "description": "Ticket ID"},
                        "status": {
                            "type": "string",
                            "enum": ["open", "in-progress", "qa", "resolved"],
                            "description": "New status"
                        }
                    },
                    "required": ["ticket_id", "status"]
                }),
            ),
            tool(
                "update_ticket_priority",
                "Update the priority/importance of a ticket",
                json!({
                    "type": "object",
                    "properties": {
                        "ticket_id": {"type": "string", "description": "Ticket ID"},
                        "priority": {
                            "type": "number",
                            "enum": [1, 2, 3],
                            "description": "Priority level (1=Low, 2=Medium, 3=High)"
                        }
                    },
                    "required": ["ticket_id", "priority"]
                }),
            ),
            tool(
                "assign_ticket",
                "Assign a ticket to a team member",
                json!({
                    "type": "object",
                    "properties": {
                        "ticket_id": {"type": "string", "description": "Ticket ID"},
                        "assignee": {"type": "string", "description": "Team member name"}
                    },
                    "required": ["ticket_id", "assignee"]
                }),
            ),
            tool(
                "github_link_repo",
                "Link a GitHub repository (format: owner/name)",
                json!({
                    "type": "object",
                    "properties": {
                        "repo_url": {
                            "type": "string",
                            "description": "GitHub repository URL or full_name (owner/name)"
                        }
                    },
                    "required": ["repo_url"]
                }),
            ),
            tool(
                "github_summary",
                "Get GitHub integration summary",
                json!({"type": "object", "properties": {}}),
            ),
            tool(
                "github_list_issues",
                "List issues from the linked GitHub repository",
                json!({
                    "type": "object",
                    "properties": {
                        "repo": {"type": "string", "description": REPO_DESCRIPTION},
                        "state": {
                            "type": "string",
                            "enum": ["open", "closed", "all"],
                            "description": "Issue state filter (default: open)"
                        }
                    },
                    "required": ["repo"]
                }),
            ),
            tool(
                "github_list_prs",
                "List pull requests from the linked GitHub repository",
                json!({
                    "type": "object",
                    "properties": {
                        "repo": {"type": "string", "description": REPO_DESCRIPTION},
                        "state": {
                            "type": "string",
                            "enum": ["open", "closed", "all"],
                            "description": "PR state filter (default: open)"
                        }
                    },
                    "required": ["repo"]
                }),
            ),
            tool(
                "github_create_issue",
                "Create a new GitHub issue",
                json!({
                    "type": "object",
                    "properties": {
                        "repo": {"type": "string", "description": REPO_DESCRIPTION},
                        "title": {"type": "string", "description": "Issue title"},
                        "body": {"type": "string", "description": "Issue description"}
                    },
                    "required": ["repo", "title", "body"]
                }),
            ),
            tool(
                "github_close_issue",
                "Close a GitHub issue",
                json!({
                    "type": "object",
                    "properties": {
                        "repo": {"type": "string", "description": REPO_DESCRIPTION},
                        "issue_number": {"type": "number", "description": "Issue number"}
                    },
                    "required": ["repo", "issue_number"]
                }),
            ),
            tool(
                "github_merge_pr",
                "Merge a pull request",
                json!({
                    "type": "object",
                    "properties": {
                        "repo": {"type": "string", "description": REPO_DESCRIPTION},
                        "pr_number": {"type": "number", "description": "PR number"},
                        "merge_method": {
                            "type": "string",
                            "enum": ["merge", "squash", "rebase"],
                            "description": "Merge method (default: merge)"
                        }
                    },
                    "required": ["repo", "pr_number"]
                }),
            ),
            tool(
                "summarize_checkout_health",
                "Summarize recent service logs and file an incident",
                json!({
                    "type": "object",
                    "properties": {
                        "service": {
                            "type": "string",
                            "description": "Service name (default: checkout)"
                        }
                    }
                }),
            ),
        ]
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, arguments: Option<Value>) -> ToolCallResult {
        match self.dispatch(name, arguments.unwrap_or_else(|| json!({}))).await {
            Ok(text) => ToolCallResult::text(text),
            Err(e) => {
                warn!(tool = name, error = %e, "Tool call failed");
                ToolCallResult::error(format!("Error: {}", e))
            }
        }
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<String> {
        match name {
            "list_tickets" => {
                let data = self.api.get("/tickets").await?;
                pretty(&data["tickets"])
            }
            "create_ticket" => {
                let args: CreateTicketArgs = parse_args(args)?;
                let data = self
                    .api
                    .post("/tickets", &json!({"description": args.description}))
                    .await?;
                Ok(format!(
                    "Created {} ticket(s):\n{}",
                    data["count"],
                    pretty(&data["tickets"])?
                ))
            }
            "update_ticket_status" => {
                let args: TicketStatusArgs = parse_args(args)?;
                self.patch_ticket(&args.ticket_id, json!({"status": args.status}))
                    .await?;
                Ok(format!(
                    "Updated ticket {} status to {}",
                    args.ticket_id, args.status
                ))
            }
            "update_ticket_priority" => {
                let args: TicketPriorityArgs = parse_args(args)?;
                self.patch_ticket(&args.ticket_id, json!({"importance": args.priority}))
                    .await?;
                Ok(format!(
                    "Updated ticket {} priority to {}",
                    args.ticket_id, args.priority
                ))
            }
            "assign_ticket" => {
                let args: AssignTicketArgs = parse_args(args)?;
                self.patch_ticket(&args.ticket_id, json!({"assignee": args.assignee}))
                    .await?;
                Ok(format!(
                    "Assigned ticket {} to {}",
                    args.ticket_id, args.assignee
                ))
            }
            "github_link_repo" => {
                let args: LinkRepoArgs = parse_args(args)?;
                let data = self
                    .api
                    .post("/github/link", &json!({"repo_url": args.repo_url}))
                    .await?;
                let repo = &data["repo"];
                Ok(format!(
                    "Linked repository: {}\n{}",
                    repo["id"].as_str().unwrap_or_default(),
                    pretty(repo)?
                ))
            }
            "github_summary" => {
                let data = self.api.get("/github/summary").await?;
                pretty(&data)
            }
            "github_list_issues" => {
                let args: ListArgs = parse_args(args)?;
                let path = format!("{}/issues?state={}", repo_path(&args.repo)?, args.state());
                let data = self.api.get(&path).await?;
                list_text(&data["issues"], "issues")
            }
            "github_list_prs" => {
                let args: ListArgs = parse_args(args)?;
                let path = format!("{}/prs?state={}", repo_path(&args.repo)?, args.state());
                let data = self.api.get(&path).await?;
                list_text(&data["prs"], "pull requests")
            }
            "github_create_issue" => {
                let args: CreateIssueArgs = parse_args(args)?;
                let path = format!("{}/issues", repo_path(&args.repo)?);
                let data = self
                    .api
                    .post(&path, &json!({"title": args.title, "body": args.body}))
                    .await?;
                // Issue mirrors carry the number under `id`.
                let issue = &data["issue"];
                Ok(format!(
                    "Created issue #{}:\n{}",
                    issue["id"],
                    pretty(issue)?
                ))
            }
            "github_close_issue" => {
                let args: CloseIssueArgs = parse_args(args)?;
                let path = format!("{}/issues/{}", repo_path(&args.repo)?, args.issue_number);
                let data = self.api.patch(&path, &json!({"state": "closed"})).await?;
                Ok(format!(
                    "Closed issue #{}:\n{}",
                    args.issue_number,
                    pretty(&data["issue"])?
                ))
            }
            "github_merge_pr" => {
                let args: MergePrArgs = parse_args(args)?;
                let path = format!("{}/pr/{}/merge", repo_path(&args.repo)?, args.pr_number);
                let method = args.merge_method.as_deref().unwrap_or("merge");
                let data = self.api.post(&path, &json!({"merge_method": method})).await?;
                Ok(format!("Merged PR #{}:\n{}", args.pr_number, pretty(&data)?))
            }
            "summarize_checkout_health" => {
                let args: HealthArgs = parse_args(args)?;
                let mut tool_args = json!({});
                if let Some(service) = args.service {
                    tool_args["service"] = json!(service);
                }
                let data = self
                    .api
                    .post(
                        "/mcp/call-tool",
                        &json!({"tool": "summarize_checkout_health", "args": tool_args}),
                    )
                    .await?;
                pretty(&data)
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    async fn patch_ticket(&self, ticket_id: &str, body: Value) -> Result<Value> {
        self.api.patch(&format!("/tickets/{}", ticket_id), &body).await
    }
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn pretty(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| ToolError::InvalidResponse(e.to_string()))
}

fn list_text(items: &Value, noun: &str) -> Result<String> {
    let count = items.as_array().map(Vec::len).unwrap_or_default();
    Ok(format!("Found {} {}:\n{}", count, noun, pretty(items)?))
}

/// `owner/name` to the `/github/{owner}/{name}` path prefix.
fn repo_path(repo: &str) -> Result<String> {
    match repo.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name] if !owner.is_empty() && !name.is_empty() => {
            Ok(format!("/github/{}/{}", owner, name))
        }
        _ => Err(ToolError::InvalidRepo(repo.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct CreateTicketArgs {
    description: String,
}

#[derive(Debug, Deserialize)]
struct TicketStatusArgs {
    ticket_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct TicketPriorityArgs {
    ticket_id: String,
    priority: u8,
}

#[derive(Debug, Deserialize)]
struct AssignTicketArgs {
    ticket_id: String,
    assignee: String,
}

#[derive(Debug, Deserialize)]
struct LinkRepoArgs {
    repo_url: String,
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    repo: String,
    state: Option<String>,
}

impl ListArgs {
    fn state(&self) -> &str {
        self.state.as_deref().unwrap_or("open")
    }
}

#[derive(Debug, Deserialize)]
struct CreateIssueArgs {
    repo: String,
    title: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct CloseIssueArgs {
    repo: String,
    issue_number: u64,
}

#[derive(Debug, Deserialize)]
struct MergePrArgs {
    repo: String,
    pr_number: u64,
    merge_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HealthArgs {
    service: Option<String>,
}
