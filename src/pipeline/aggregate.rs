//! Result aggregator: folds a publish report into the caller's response body.

use serde::Serialize;

use super::types::AnalysisResult;
use crate::tracker::PublishReport;

pub const SUCCESS_MESSAGE: &str = "Requirements analyzed and Jira issues created successfully!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub message: String,
    pub stats: Stats,
    pub jira: JiraHierarchy,
    /// Best-effort calls that failed (grouping issue, links).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Epics in the analyzed tree.
    pub epics: usize,
    pub parent_epic: Option<String>,
    pub upload_label: String,
    /// Stories created.
    pub stories: usize,
    /// Stories created per epic, in epic order.
    pub story_counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraHierarchy {
    pub parent_epic: Option<String>,
    pub child_epics: Vec<ChildEpic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildEpic {
    pub epic_key: String,
    pub stories: Vec<String>,
}

/// Build the response body. Pure; works for complete and interrupted publishes.
pub fn aggregate(tree: &AnalysisResult, report: &PublishReport) -> ResponsePayload {
    let parent_epic = report.batch.grouping.as_ref().map(|g| g.key.clone());

    let child_epics: Vec<ChildEpic> = report
        .batch
        .epics
        .iter()
        .map(|e| ChildEpic {
            epic_key: e.epic.key.clone(),
            stories: e.stories.iter().map(|s| s.key.clone()).collect(),
        })
        .collect();
    let story_counts: Vec<usize> = child_epics.iter().map(|e| e.stories.len()).collect();

    let message = match &report.failure {
        None => SUCCESS_MESSAGE.to_string(),
        Some(failure) => format!(
            "Jira issue creation stopped after {} of {} epics ({} failed for {:?}): {}",
            child_epics.len(),
            tree.epics.len(),
            failure.op.label(),
            failure.target,
            failure.error
        ),
    };

    ResponsePayload {
        message,
        stats: Stats {
            epics: tree.epics.len(),
            parent_epic: parent_epic.clone(),
            upload_label: report.label.as_label(),
            stories: story_counts.iter().sum(),
            story_counts,
        },
        jira: JiraHierarchy {
            parent_epic,
            child_epics,
        },
        warnings: report
            .skipped
            .iter()
            .map(|s| format!("Could not {} ({}): {}", s.op.label(), s.target, s.error))
            .collect(),
    }
}
