//! Publisher: creates the grouping issue, epics and stories in order.
//!
//! Calls are strictly sequential so parents always exist before their
//! children. What happens when a call fails depends only on the kind of call,
//! see [`TrackerOp::failure_policy`].

use tracing::{info, warn};

use super::client::TrackerApi;
use super::fields::DestinationSchema;
use crate::error::TrackerError;
use crate::pipeline::types::{AnalysisResult, PublishBatch, PublishedEpic, UploadLabel};

/// Kinds of tracker call made while publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerOp {
    CreateGrouping,
    CreateEpic,
    LinkEpic,
    CreateStory,
}

/// What a failed call does to the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    AbortBatch,
    LogAndContinue,
}

impl TrackerOp {
    pub const fn failure_policy(self) -> FailurePolicy {
        match self {
            TrackerOp::CreateGrouping | TrackerOp::LinkEpic => FailurePolicy::LogAndContinue,
            TrackerOp::CreateEpic | TrackerOp::CreateStory => FailurePolicy::AbortBatch,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            TrackerOp::CreateGrouping => "create grouping issue",
            TrackerOp::CreateEpic => "create epic",
            TrackerOp::LinkEpic => "link epic to grouping issue",
            TrackerOp::CreateStory => "create story",
        }
    }
}

/// A best-effort call that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStep {
    pub op: TrackerOp,
    pub target: String,
    pub error: String,
}

/// The call that stopped the batch.
#[derive(Debug)]
pub struct PublishFailure {
    pub op: TrackerOp,
    /// Summary of the epic or story being created.
    pub target: String,
    pub error: TrackerError,
}

/// Everything one publish produced, including a failure if the batch stopped early.
#[derive(Debug)]
pub struct PublishReport {
    pub label: UploadLabel,
    pub batch: PublishBatch,
    pub skipped: Vec<SkippedStep>,
    pub failure: Option<PublishFailure>,
}

impl PublishReport {
    fn new(label: UploadLabel) -> Self {
        Self {
            label,
            batch: PublishBatch::default(),
            skipped: Vec::new(),
            failure: None,
        }
    }

    /// Apply the op's failure policy. `Ok(None)` means the failure was swallowed.
    fn settle<T>(
        &mut self,
        op: TrackerOp,
        target: &str,
        result: Result<T, TrackerError>,
    ) -> Result<Option<T>, PublishFailure> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) => match op.failure_policy() {
                FailurePolicy::LogAndContinue => {
                    warn!(op = op.label(), issue = target, error = %error, "Best-effort Jira call failed, continuing");
                    self.skipped.push(SkippedStep {
                        op,
                        target: target.to_string(),
                        error: error.to_string(),
                    });
                    Ok(None)
                }
                FailurePolicy::AbortBatch => {
                    warn!(op = op.label(), issue = target, error = %error, "Jira call failed, stopping batch");
                    Err(PublishFailure {
                        op,
                        target: target.to_string(),
                        error,
                    })
                }
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Publish `tree` into `project_key` through `api`.
///
/// Never fails as a whole: the report always holds every issue created, and
/// `failure` is set when an epic or story could not be created.
pub async fn publish(
    api: &dyn TrackerApi,
    tree: &AnalysisResult,
    project_key: &str,
    schema: &DestinationSchema,
    label: UploadLabel,
) -> PublishReport {
    let mut report = PublishReport::new(label);
    if let Err(failure) = publish_into(&mut report, api, tree, project_key, schema).await {
        report.failure = Some(failure);
    }
    info!(
        created = report.batch.issue_count(),
        skipped = report.skipped.len(),
        complete = report.is_complete(),
        "Jira publish finished"
    );
    report
}

async fn publish_into(
    report: &mut PublishReport,
    api: &dyn TrackerApi,
    tree: &AnalysisResult,
    project_key: &str,
    schema: &DestinationSchema,
) -> Result<(), PublishFailure> {
    let label = report.label.clone();

    let grouping_fields = schema.grouping_fields(project_key, &label);
    let grouping = api.create_issue(&grouping_fields).await;
    report.batch.grouping =
        report.settle(TrackerOp::CreateGrouping, grouping_fields.summary(), grouping)?;
    if let Some(ref grouping) = report.batch.grouping {
        info!(key = %grouping.key, "Grouping issue created");
    }

    for epic in &tree.epics {
        let created = api
            .create_issue(&schema.epic_fields(project_key, epic, &label))
            .await;
        let Some(epic_ref) = report.settle(TrackerOp::CreateEpic, &epic.summary, created)? else {
            continue;
        };
        info!(key = %epic_ref.key, summary = %epic.summary, "Epic created");

        if let Some(grouping_key) = report.batch.grouping.as_ref().map(|g| g.key.clone()) {
            let linked = api
                .link_issues(&schema.link_type, &grouping_key, &epic_ref.key)
                .await;
            report.settle(TrackerOp::LinkEpic, &epic_ref.key, linked)?;
        }

        let epic_key = epic_ref.key.clone();
        report.batch.epics.push(PublishedEpic {
            epic: epic_ref,
            stories: Vec::with_capacity(epic.stories.len()),
        });

        for story in &epic.stories {
            let created = api
                .create_issue(&schema.story_fields(project_key, story, &epic_key))
                .await;
            if let Some(story_ref) = report.settle(TrackerOp::CreateStory, &story.summary, created)? {
                info!(key = %story_ref.key, epic = %epic_key, "Story created");
                if let Some(published) = report.batch.epics.last_mut() {
                    published.stories.push(story_ref);
                }
            }
        }
    }

    Ok(())
}
