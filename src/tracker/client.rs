//! Jira Cloud REST v3 client.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::fields::IssueFields;
use crate::error::TrackerError;
use crate::pipeline::types::TrackerIssueRef;

/// Where and as whom issues are created. Supplied per request.
#[derive(Debug, Clone)]
pub struct Destination {
    pub base_url: Url,
    pub project_key: String,
    /// Account email.
    pub principal: String,
    /// API token.
    pub credential: SecretString,
}

/// Issue-store operations the publisher needs.
#[async_trait]
pub trait TrackerApi: Send + Sync {
    async fn create_issue(&self, fields: &IssueFields) -> Result<TrackerIssueRef, TrackerError>;

    async fn link_issues(
        &self,
        link_type: &str,
        inward_key: &str,
        outward_key: &str,
    ) -> Result<(), TrackerError>;
}

#[derive(Serialize)]
struct CreateIssueRequest<'a> {
    fields: &'a IssueFields,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueLinkRequest<'a> {
    #[serde(rename = "type")]
    link_type: NameRef<'a>,
    inward_issue: KeyRef<'a>,
    outward_issue: KeyRef<'a>,
}

#[derive(Serialize)]
struct NameRef<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct KeyRef<'a> {
    key: &'a str,
}

/// Jira client bound to one destination. The auth header is computed once.
pub struct JiraClient {
    http: reqwest::Client,
    base_url: Url,
    auth_header: SecretString,
}

impl JiraClient {
    pub fn new(http: reqwest::Client, destination: &Destination) -> Self {
        let token = STANDARD.encode(format!(
            "{}:{}",
            destination.principal,
            destination.credential.expose_secret()
        ));
        Self {
            http,
            base_url: destination.base_url.clone(),
            auth_header: SecretString::from(format!("Basic {token}")),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, TrackerError> {
        self.base_url
            .join(path)
            .map_err(|e| TrackerError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, TrackerError> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.auth_header.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| TrackerError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(path, status = status.as_u16(), body = %body, "Jira request failed");
        Err(TrackerError::rejected(status.as_u16(), body))
    }
}

#[async_trait]
impl TrackerApi for JiraClient {
    async fn create_issue(&self, fields: &IssueFields) -> Result<TrackerIssueRef, TrackerError> {
        let response = self
            .post("/rest/api/3/issue", &CreateIssueRequest { fields })
            .await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| TrackerError::InvalidResponse(e.to_string()))?;
        let issue = parse_created_issue(&body)?;
        debug!(key = %issue.key, id = %issue.id, "Jira issue created");
        Ok(issue)
    }

    async fn link_issues(
        &self,
        link_type: &str,
        inward_key: &str,
        outward_key: &str,
    ) -> Result<(), TrackerError> {
        let body = IssueLinkRequest {
            link_type: NameRef { name: link_type },
            inward_issue: KeyRef { key: inward_key },
            outward_issue: KeyRef { key: outward_key },
        };
        self.post("/rest/api/3/issueLink", &body).await?;
        Ok(())
    }
}

/// Jira answers `{id, key, self}`; `id` is a string in v3 but tolerate numbers.
fn parse_created_issue(body: &Value) -> Result<TrackerIssueRef, TrackerError> {
    let key = body
        .get("key")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| TrackerError::InvalidResponse(format!("missing issue key in {body}")))?;
    let id = match body.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    Ok(TrackerIssueRef {
        key: key.to_string(),
        id,
    })
}
