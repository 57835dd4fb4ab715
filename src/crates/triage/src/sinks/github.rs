//! GitHub Issues client.
//!
//! REST v3 implementation of [`TrackingApi`]: `POST
//! /repos/{owner}/{repo}/issues` for creation, `POST
//! /repos/{owner}/{repo}/issues/{number}/labels` for labeling.

use crate::sinks::issue::{CreatedIssue, TrackingApi};
use crate::{Result, TriageError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// GitHub repository and authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Repository owner (user or organization).
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// Personal access token with `repo` scope.
    pub token: String,

    /// Default assignee for created issues.
    #[serde(default)]
    pub assignee: Option<String>,

    /// API base URL; override for GitHub Enterprise.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl GithubConfig {
    /// Create a configuration for a repository.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
            assignee: None,
            api_base: default_api_base(),
            timeout: default_timeout(),
        }
    }
}

/// GitHub Issues [`TrackingApi`] implementation.
#[derive(Clone)]
pub struct GithubIssues {
    config: GithubConfig,
    client: Client,
}

impl GithubIssues {
    /// Create a client with the given configuration.
    pub fn new(config: GithubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent("triaged")
            .build()
            .map_err(|e| TriageError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn issues_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/issues",
            self.config.api_base, self.config.owner, self.config.repo
        )
    }
}

#[derive(Debug, Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    assignees: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    number: i64,
    html_url: String,
}

#[derive(Debug, Serialize)]
struct AddLabelsRequest<'a> {
    labels: &'a [String],
}

#[async_trait]
impl TrackingApi for GithubIssues {
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        assignee: Option<&str>,
    ) -> Result<CreatedIssue> {
        let req = CreateIssueRequest {
            title,
            body,
            assignees: assignee.into_iter().collect(),
        };

        debug!(owner = %self.config.owner, repo = %self.config.repo, "Creating GitHub issue");

        let response = self
            .client
            .post(self.issues_url())
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .json(&req)
            .send()
            .await
            .map_err(|e| TriageError::IssueCreation(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TriageError::IssueCreation(format!(
                "GitHub API error {status}: {text}"
            )));
        }

        let issue: IssueResponse = response
            .json()
            .await
            .map_err(|e| TriageError::IssueCreation(e.to_string()))?;

        Ok(CreatedIssue {
            number: issue.number,
            url: issue.html_url,
        })
    }

    async fn add_labels(&self, issue_number: i64, labels: &[String]) -> Result<()> {
        let url = format!("{}/{}/labels", self.issues_url(), issue_number);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .json(&AddLabelsRequest { labels })
            .send()
            .await
            .map_err(|e| TriageError::LabelApplication(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TriageError::LabelApplication(format!(
                "GitHub API error {status}: {text}"
            )));
        }

        Ok(())
    }
}
