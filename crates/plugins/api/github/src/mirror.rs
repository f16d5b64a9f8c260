//! Mapping functions: GitHub types -> mirror rows.
//!
//! The webhook, list and poll paths all go through these, so a pull request
//! or issue looks the same locally no matter how it arrived.

use ticketbuddy_core::{IssueMirror, PullRequestMirror};

use crate::types::{GitHubIssue, GitHubPullRequest, GitHubUser};

fn author(user: Option<&GitHubUser>) -> String {
    user.map(|u| u.login.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

impl GitHubPullRequest {
    /// Whether the pull request was merged. List responses omit `merged`,
    /// so `merged_at` is consulted too.
    pub fn is_merged(&self) -> bool {
        self.merged.unwrap_or(false) || self.merged_at.is_some()
    }

    pub fn to_mirror(&self, repo_id: &str) -> PullRequestMirror {
        PullRequestMirror {
            number: self.number,
            repo_id: repo_id.to_string(),
            title: self.title.clone(),
            author: author(self.user.as_ref()),
            state: self.state.clone(),
            merged: self.is_merged(),
            html_url: self.html_url.clone(),
            head_sha: self.head.as_ref().map(|h| h.sha.clone()),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

impl GitHubIssue {
    pub fn to_mirror(&self, repo_id: &str) -> IssueMirror {
        IssueMirror {
            number: self.number,
            repo_id: repo_id.to_string(),
            title: self.title.clone(),
            author: author(self.user.as_ref()),
            state: self.state.clone(),
            html_url: self.html_url.clone(),
            labels: self.labels.iter().map(|l| l.name.clone()).collect(),
            body: self.body.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_mirror_from_list_entry() {
        let pr: GitHubPullRequest = serde_json::from_value(serde_json::json!({
            "number": 7,
            "title": "Guard billing address",
            "state": "closed",
            "html_url": "https://github.com/octo/shop/pull/7",
            "merged_at": "2024-05-02T09:00:00Z",
            "user": {"id": 1, "login": "octocat"},
            "head": {"ref": "fix/billing", "sha": "a12f9c"},
            "created_at": "2024-05-01T09:00:00Z",
            "updated_at": "2024-05-02T09:00:00Z"
        }))
        .unwrap();

        let mirror = pr.to_mirror("octo/shop");
        assert_eq!(mirror.number, 7);
        assert!(mirror.merged);
        assert_eq!(mirror.author, "octocat");
        assert_eq!(mirror.head_sha.as_deref(), Some("a12f9c"));
    }

    #[test]
    fn test_issue_mirror_without_user() {
        let issue: GitHubIssue = serde_json::from_value(serde_json::json!({
            "number": 3,
            "title": "Pay button disabled",
            "state": "open",
            "html_url": "https://github.com/octo/shop/issues/3",
            "labels": [{"name": "bug"}, {"name": "checkout"}],
            "created_at": "2024-05-01T09:00:00Z",
            "updated_at": "2024-05-01T09:00:00Z"
        }))
        .unwrap();

        let mirror = issue.to_mirror("octo/shop");
        assert_eq!(mirror.author, "unknown");
        assert_eq!(mirror.labels, vec!["bug", "checkout"]);
    }
}
