//! Multipart upload parsing and validation.
//!
//! Everything here runs before any remote call is made.

use std::sync::LazyLock;

use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use regex::Regex;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};

use crate::error::ValidationError;
use crate::pipeline::UploadRequest;
use crate::tracker::Destination;

pub const FILE_FIELD: &str = "requirementsFile";

/// Content type assumed when neither the part nor its filename says otherwise.
const FALLBACK_MIME: &str = "text/plain";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});

/// The uploaded requirements document.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Declared content type, or one guessed from the filename.
    pub fn mime_type(&self) -> String {
        if let Some(ct) = self.content_type.as_deref().filter(|ct| !ct.trim().is_empty()) {
            return ct.to_string();
        }
        self.file_name
            .as_deref()
            .and_then(|name| mime_guess::from_path(name).first_raw())
            .unwrap_or(FALLBACK_MIME)
            .to_string()
    }
}

/// Form fields as received, before validation.
#[derive(Debug, Default)]
pub struct RawUpload {
    pub file: Option<UploadedFile>,
    pub jira_url: Option<String>,
    pub project_key: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<SecretString>,
}

impl RawUpload {
    /// Drain a multipart body. Unknown fields are ignored.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ValidationError> {
        let mut raw = RawUpload::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(multipart_error)?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                FILE_FIELD => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(multipart_error)?;
                    raw.file = Some(UploadedFile {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                "jiraUrl" => raw.jira_url = Some(read_text(field).await?),
                "projectKey" => raw.project_key = Some(read_text(field).await?),
                "email" => raw.email = Some(read_text(field).await?),
                "apiToken" => raw.api_token = Some(SecretString::from(read_text(field).await?)),
                _ => {}
            }
        }
        Ok(raw)
    }

    /// Check every field and build the pipeline request.
    pub fn validate(self) -> Result<UploadRequest, ValidationError> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let token_present = self
            .api_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().trim().is_empty());

        let missing: Vec<String> = [
            ("jiraUrl", present(&self.jira_url)),
            ("projectKey", present(&self.project_key)),
            ("email", present(&self.email)),
            ("apiToken", token_present),
        ]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name.to_string())
        .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        // Presence was checked above.
        let (Some(jira_url), Some(project_key), Some(email), Some(api_token)) =
            (self.jira_url, self.project_key, self.email, self.api_token)
        else {
            return Err(ValidationError::MissingFields(vec![]));
        };

        let base_url = normalize_jira_url(&jira_url)?;

        let project_key = project_key.trim().to_string();
        let key_len = project_key.chars().count();
        if !(2..=10).contains(&key_len) {
            return Err(ValidationError::InvalidField {
                field: "projectKey".into(),
                reason: "must be between 2 and 10 characters".into(),
            });
        }

        let email = email.trim().to_string();
        if !EMAIL_RE.is_match(&email) {
            return Err(ValidationError::InvalidField {
                field: "email".into(),
                reason: "must be a valid email address".into(),
            });
        }

        let file = self.file.ok_or(ValidationError::MissingFile)?;
        let mime_type = file.mime_type();

        Ok(UploadRequest {
            payload: file.bytes,
            mime_type,
            destination: Destination {
                base_url,
                project_key,
                principal: email,
                credential: api_token,
            },
        })
    }
}

fn multipart_error(err: MultipartError) -> ValidationError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::PayloadTooLarge
    } else {
        ValidationError::Multipart(err.body_text())
    }
}

async fn read_text(field: Field<'_>) -> Result<String, ValidationError> {
    field
        .text()
        .await
        .map_err(multipart_error)
}

/// Prefix `https://` when no scheme is given, then require an http(s) URL with a host.
pub fn normalize_jira_url(input: &str) -> Result<Url, ValidationError> {
    let trimmed = input.trim();
    let invalid = |reason: String| ValidationError::InvalidUrl {
        input: input.to_string(),
        reason,
    };

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}
