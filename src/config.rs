//! Configuration types, loaded once from the environment at startup.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::ingest::TesseractFactory;
use crate::llm::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::llm::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT, LlmConfig, RetryPolicy};
use crate::tracker::{DestinationSchema, FieldId};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5001;

/// Default multipart body limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Whole-service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub llm: LlmConfig,
    pub schema: DestinationSchema,
    pub ocr: TesseractFactory,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|k| var(k));

        let api_key = first(&["LLM_API_KEY", "PERPLEXITY_API_KEY"])
            .ok_or_else(|| ConfigError::MissingEnvVar("LLM_API_KEY (or PERPLEXITY_API_KEY)".into()))?;

        let timeout_ms: Option<u64> = parse_opt(
            "LLM_TIMEOUT_MS",
            first(&["LLM_TIMEOUT_MS", "PERPLEXITY_TIMEOUT_MS"]),
        )?;
        let retry_defaults = RetryPolicy::default();
        let max_retries: Option<u32> = parse_opt("LLM_MAX_RETRIES", var("LLM_MAX_RETRIES"))?;
        let backoff_ms: Option<u64> = parse_opt("LLM_RETRY_BACKOFF_MS", var("LLM_RETRY_BACKOFF_MS"))?;

        let llm = LlmConfig {
            endpoint: var("LLM_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key: secrecy::SecretString::from(api_key),
            model: first(&["LLM_MODEL", "PERPLEXITY_MODEL"])
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_prompt: var("SYSTEM_PROMPT").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            timeout: timeout_ms.map(Duration::from_millis).unwrap_or(DEFAULT_TIMEOUT),
            retry: RetryPolicy {
                max_retries: max_retries.unwrap_or(retry_defaults.max_retries),
                base_delay: backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(retry_defaults.base_delay),
            },
        };
        if llm.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "LLM_TIMEOUT_MS".into(),
                message: "must be greater than zero".into(),
            });
        }

        let defaults = DestinationSchema::default();
        // Field ids are read raw: an explicitly empty value disables the field.
        let field = |key: &str, default: FieldId| match lookup(key) {
            Some(raw) => FieldId::parse(&raw),
            None => default,
        };
        let schema = DestinationSchema {
            epic_name_field: field("JIRA_EPIC_NAME_FIELD_ID", defaults.epic_name_field),
            epic_link_field: field("JIRA_EPIC_LINK_FIELD_ID", defaults.epic_link_field),
            epic_issue_type: var("JIRA_EPIC_ISSUETYPE_NAME").unwrap_or(defaults.epic_issue_type),
            story_issue_type: var("JIRA_STORY_ISSUETYPE_NAME").unwrap_or(defaults.story_issue_type),
            link_type: var("JIRA_LINK_TYPE").unwrap_or(defaults.link_type),
        };

        Ok(Self {
            port: parse_opt("PORT", var("PORT"))?.unwrap_or(DEFAULT_PORT),
            max_upload_bytes: parse_opt("MAX_UPLOAD_BYTES", var("MAX_UPLOAD_BYTES"))?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            llm,
            schema,
            ocr: TesseractFactory {
                datapath: var("TESSDATA_PREFIX"),
                language: var("OCR_LANGUAGE").unwrap_or_else(|| "eng".to_string()),
            },
        })
    }
}

fn parse_opt<T>(key: &str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|v| {
        v.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{v:?}: {e}"),
        })
    })
    .transpose()
}
