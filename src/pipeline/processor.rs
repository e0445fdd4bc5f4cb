//! Upload processor: runs one document through the whole pipeline.
//!
//! Flow:
//! 1. Normalize the upload to text (OCR for images)
//! 2. Ask the LLM for an epic/story tree
//! 3. Publish the tree to Jira
//! 4. Aggregate the created keys into the response body
//!
//! Each step awaits the previous one; nothing runs in parallel within a request.

use std::sync::Arc;

use tracing::{info, warn};

use super::aggregate::{ResponsePayload, aggregate};
use super::types::UploadLabel;
use crate::error::{Error, ExtractionError, StructuringError};
use crate::ingest::InputNormalizer;
use crate::llm::Analyzer;
use crate::tracker::{Destination, DestinationSchema, JiraClient, TrackerApi, publish};

/// A validated upload, ready to process.
#[derive(Debug)]
pub struct UploadRequest {
    pub payload: Vec<u8>,
    pub mime_type: String,
    pub destination: Destination,
}

/// A failed run. `partial` is set when Jira issues were created before the failure.
#[derive(Debug)]
pub struct ProcessingFailure {
    pub error: Error,
    pub partial: Option<ResponsePayload>,
}

impl From<ExtractionError> for ProcessingFailure {
    fn from(err: ExtractionError) -> Self {
        Self {
            error: err.into(),
            partial: None,
        }
    }
}

impl From<StructuringError> for ProcessingFailure {
    fn from(err: StructuringError) -> Self {
        Self {
            error: err.into(),
            partial: None,
        }
    }
}

/// Shared, stateless-per-request pipeline.
pub struct UploadProcessor {
    normalizer: Arc<InputNormalizer>,
    analyzer: Arc<dyn Analyzer>,
    http: reqwest::Client,
    schema: Arc<DestinationSchema>,
}

impl UploadProcessor {
    pub fn new(
        normalizer: Arc<InputNormalizer>,
        analyzer: Arc<dyn Analyzer>,
        http: reqwest::Client,
        schema: Arc<DestinationSchema>,
    ) -> Self {
        Self {
            normalizer,
            analyzer,
            http,
            schema,
        }
    }

    /// Process one upload against the Jira destination it names.
    pub async fn process(&self, request: UploadRequest) -> Result<ResponsePayload, ProcessingFailure> {
        let api = JiraClient::new(self.http.clone(), &request.destination);
        self.process_with(
            &api,
            &request.payload,
            &request.mime_type,
            &request.destination.project_key,
            UploadLabel::now(),
        )
        .await
    }

    /// Same as [`process`](Self::process) with an explicit tracker and label.
    pub async fn process_with(
        &self,
        api: &dyn TrackerApi,
        payload: &[u8],
        mime_type: &str,
        project_key: &str,
        label: UploadLabel,
    ) -> Result<ResponsePayload, ProcessingFailure> {
        let text = self.normalizer.normalize(payload, mime_type).await?;
        info!(chars = text.len(), "Requirements text ready");

        let tree = self.analyzer.analyze(&text).await?;
        if tree.epics.is_empty() {
            warn!("AI analysis produced no epics");
        }

        let mut report = publish(api, &tree, project_key, &self.schema, label).await;
        let payload = aggregate(&tree, &report);

        match report.failure.take() {
            None => Ok(payload),
            Some(failure) => Err(ProcessingFailure {
                error: Error::Tracker(failure.error),
                partial: Some(payload),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::error::{AiFormatError, AiServiceError};
    use crate::ingest::OcrCell;
    use crate::ingest::ocr::tests::CountingFactory;
    use crate::llm::decode_analysis;
    use crate::pipeline::types::AnalysisResult;
    use crate::tracker::publisher::tests::StubTracker;

    /// Analyzer that decodes a canned model reply and records its input.
    struct CannedAnalyzer {
        reply: Result<&'static str, u16>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl CannedAnalyzer {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Ok(reply),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                ..Self::replying("")
            }
        }
    }

    #[async_trait]
    impl Analyzer for CannedAnalyzer {
        async fn analyze(&self, text: &str) -> Result<AnalysisResult, StructuringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(text.to_string());
            match self.reply {
                Ok(raw) => Ok(decode_analysis(raw)?),
                Err(status) => Err(AiServiceError::Status {
                    status,
                    body: "upstream down".into(),
                }
                .into()),
            }
        }
    }

    fn processor(analyzer: Arc<CannedAnalyzer>) -> UploadProcessor {
        let normalizer = InputNormalizer::new(OcrCell::new(Arc::new(CountingFactory::new(
            "Build a login page.",
        ))));
        UploadProcessor::new(
            Arc::new(normalizer),
            analyzer,
            reqwest::Client::new(),
            Arc::new(DestinationSchema::default()),
        )
    }

    fn label() -> UploadLabel {
        UploadLabel::from_timestamp(chrono::Utc.with_ymd_and_hms(2025, 2, 2, 2, 2, 2).unwrap())
    }

    const AUTH_TREE: &str = r#"{"epics":[{"summary":"Auth","stories":[{"summary":"Login page"},{"summary":"Password reset"}]}]}"#;

    #[tokio::test]
    async fn end_to_end_with_incrementing_keys() {
        let analyzer = Arc::new(CannedAnalyzer::replying(AUTH_TREE));
        let p = processor(analyzer.clone());
        let api = StubTracker::default();

        let payload = p
            .process_with(
                &api,
                b"Build a login page.\nAdd password reset.",
                "text/plain",
                "PROJ",
                label(),
            )
            .await
            .unwrap();

        assert_eq!(payload.stats.epics, 1);
        assert_eq!(payload.stats.parent_epic.as_deref(), Some("PROJ-1"));
        assert_eq!(payload.jira.child_epics.len(), 1);
        assert_eq!(payload.jira.child_epics[0].epic_key, "PROJ-2");
        assert_eq!(payload.jira.child_epics[0].stories, vec!["PROJ-3", "PROJ-4"]);
        assert_eq!(
            analyzer.seen.lock().unwrap().as_slice(),
            ["Build a login page.\nAdd password reset."]
        );
    }

    #[tokio::test]
    async fn image_uploads_are_ocred_before_analysis() {
        let analyzer = Arc::new(CannedAnalyzer::replying(r#"{"epics":[]}"#));
        let p = processor(analyzer.clone());
        let api = StubTracker::default();

        p.process_with(&api, &[0xFF, 0xD8], "image/jpeg", "PROJ", label())
            .await
            .unwrap();
        assert_eq!(analyzer.seen.lock().unwrap()[0], "Build a login page.");
    }

    #[tokio::test]
    async fn empty_document_never_reaches_llm_or_tracker() {
        let analyzer = Arc::new(CannedAnalyzer::replying(AUTH_TREE));
        let p = processor(analyzer.clone());
        let api = StubTracker::default();

        let failure = p
            .process_with(&api, b"   ", "text/plain", "PROJ", label())
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error,
            Error::Extraction(ExtractionError::EmptyDocument)
        ));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn llm_failure_never_reaches_tracker() {
        let analyzer = Arc::new(CannedAnalyzer::failing(503));
        let p = processor(analyzer);
        let api = StubTracker::default();

        let failure = p
            .process_with(&api, b"reqs", "text/plain", "PROJ", label())
            .await
            .unwrap_err();
        assert!(matches!(failure.error, Error::AiService(AiServiceError::Status { status: 503, .. })));
        assert!(failure.partial.is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn unparseable_reply_is_format_error() {
        let analyzer = Arc::new(CannedAnalyzer::replying("no json here"));
        let p = processor(analyzer);
        let api = StubTracker::default();

        let failure = p
            .process_with(&api, b"reqs", "text/plain", "PROJ", label())
            .await
            .unwrap_err();
        match failure.error {
            Error::AiFormat(AiFormatError { raw, .. }) => assert_eq!(raw, "no json here"),
            other => panic!("expected format error, got {other:?}"),
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn tracker_abort_returns_partial_hierarchy() {
        let analyzer = Arc::new(CannedAnalyzer::replying(
            r#"{"epics":[{"summary":"E1","stories":[{"summary":"S1"}]},{"summary":"E2"},{"summary":"E3"}]}"#,
        ));
        let p = processor(analyzer);
        // grouping, E1, S1 succeed; E2 is create #4.
        let api = StubTracker::failing_creates(vec![4]);

        let failure = p
            .process_with(&api, b"reqs", "text/plain", "PROJ", label())
            .await
            .unwrap_err();
        assert!(matches!(failure.error, Error::Tracker(_)));
        let partial = failure.partial.unwrap();
        assert_eq!(partial.jira.child_epics.len(), 1);
        assert_eq!(partial.jira.child_epics[0].epic_key, "PROJ-2");
        assert_eq!(partial.jira.child_epics[0].stories, vec!["PROJ-3"]);
    }
}
