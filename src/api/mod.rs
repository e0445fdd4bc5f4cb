//! Inbound HTTP surface.

pub mod request;
pub mod routes;

pub use request::{RawUpload, UploadedFile, normalize_jira_url};
pub use routes::{AppState, router};
