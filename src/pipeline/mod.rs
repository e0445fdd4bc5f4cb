//! Synthesis-and-publish pipeline.
//!
//! Every upload flows through:
//! 1. `InputNormalizer::normalize()`: bytes to text, OCR for images
//! 2. `Analyzer::analyze()`: LLM-structured epic/story tree
//! 3. `tracker::publish()`: ordered Jira creation
//! 4. `aggregate()`: response body with every created key

pub mod aggregate;
pub mod processor;
pub mod types;

pub use aggregate::{ResponsePayload, aggregate};
pub use processor::{ProcessingFailure, UploadProcessor, UploadRequest};
