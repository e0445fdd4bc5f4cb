//! Error types for Ticketsmith.

use std::time::Duration;

/// Top-level error type for one pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("AI service error: {0}")]
    AiService(#[from] AiServiceError),

    #[error("AI format error: {0}")]
    AiFormat(#[from] AiFormatError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

impl From<StructuringError> for Error {
    fn from(err: StructuringError) -> Self {
        match err {
            StructuringError::Service(e) => Error::AiService(e),
            StructuringError::Format(e) => Error::AiFormat(e),
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Malformed or missing request fields. Raised before any remote call.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Missing requirements file.")]
    MissingFile,

    #[error("Invalid Jira URL {input:?}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("Upload exceeds the size limit.")]
    PayloadTooLarge,
}

/// Failures turning the uploaded payload into text.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no text recognized in image")]
    NoTextRecognized,

    #[error("requirements document is empty")]
    EmptyDocument,

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR processing failed: {0}")]
    OcrFailed(String),
}

/// The generation endpoint could not be reached or answered with a failure.
#[derive(Debug, thiserror::Error)]
pub enum AiServiceError {
    #[error("Generation request failed after {attempts} attempt(s): {reason}")]
    Transport { attempts: u32, reason: String },

    #[error("Generation request timed out after {attempts} attempt(s) ({timeout:?} each)")]
    Timeout { attempts: u32, timeout: Duration },

    #[error("Generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Generation response missing content")]
    MissingContent,

    #[error("Generation response body unreadable: {0}")]
    InvalidBody(String),
}

/// The generation response could not be decoded into the epic/story tree.
#[derive(Debug, thiserror::Error)]
#[error("AI response was not valid epic/story JSON: {reason}")]
pub struct AiFormatError {
    pub reason: String,
    /// Unmodified model output, kept for diagnosis.
    pub raw: String,
}

/// Either failure mode of the structuring call.
#[derive(Debug, thiserror::Error)]
pub enum StructuringError {
    #[error(transparent)]
    Service(#[from] AiServiceError),

    #[error(transparent)]
    Format(#[from] AiFormatError),
}

/// Jira REST call failures.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Jira request failed: {0}")]
    Transport(String),

    #[error("{message}")]
    Rejected {
        status: u16,
        message: String,
        detail: String,
    },

    #[error("Invalid response from Jira: {0}")]
    InvalidResponse(String),
}

impl TrackerError {
    /// Build a rejection with a human-readable message for the given status and body.
    pub fn rejected(status: u16, body: String) -> Self {
        TrackerError::Rejected {
            status,
            message: rejection_message(status, &body),
            detail: body,
        }
    }

    /// Raw upstream detail, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            TrackerError::Rejected { detail, .. } if !detail.is_empty() => Some(detail),
            _ => None,
        }
    }
}

fn rejection_message(status: u16, body: &str) -> String {
    let lower = body.to_lowercase();
    match status {
        401 => "Invalid Jira credentials. Please check your email and API token.".into(),
        403 => "Access denied. Your API token may not have permission to create issues in this project.".into(),
        404 if lower.contains("site temporarily unavailable") || lower.contains("site not found") => {
            "Jira site not found. Please verify your Jira URL (e.g., yourcompany.atlassian.net).".into()
        }
        404 if lower.contains("project") => {
            "Project not found. Please verify your Project Key is correct.".into()
        }
        404 => "Jira resource not found. Please check your Jira URL and Project Key.".into(),
        400 if lower.contains("issuetype") => {
            "Invalid issue type. Your Jira project may use different issue type names.".into()
        }
        400 => "Invalid request to Jira. Please check your project settings.".into(),
        s if s >= 500 => "Jira server error. The Jira service may be temporarily unavailable. Please try again later.".into(),
        s => format!("Jira API error ({s}). Please verify your credentials and try again."),
    }
}
