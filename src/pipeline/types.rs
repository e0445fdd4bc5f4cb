//! Shared types for the synthesis-and-publish pipeline.

use serde::{Deserialize, Deserializer, Serialize};

// ── Structured tree ─────────────────────────────────────────────────

/// A story under an epic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

/// An epic and its ordered stories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stories: Vec<Story>,
}

/// Output contract of the structuring call.
///
/// A missing or `null` `epics` key decodes as zero epics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub epics: Vec<Epic>,
}

impl AnalysisResult {
    /// Total number of stories across all epics.
    pub fn story_count(&self) -> usize {
        self.epics.iter().map(|e| e.stories.len()).sum()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Tracker references ──────────────────────────────────────────────

/// Identifier the tracker returned for a created issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerIssueRef {
    pub key: String,
    pub id: String,
}

/// One created epic and the stories created under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedEpic {
    pub epic: TrackerIssueRef,
    pub stories: Vec<TrackerIssueRef>,
}

/// Everything created during one publish, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishBatch {
    /// Absent when the grouping issue could not be created.
    pub grouping: Option<TrackerIssueRef>,
    pub epics: Vec<PublishedEpic>,
}

impl PublishBatch {
    /// Number of issues created so far, grouping issue included.
    pub fn issue_count(&self) -> usize {
        self.grouping.iter().count()
            + self
                .epics
                .iter()
                .map(|e| 1 + e.stories.len())
                .sum::<usize>()
    }
}

/// Label attached to every issue created from one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLabel {
    at: chrono::DateTime<chrono::Utc>,
    timestamp: String,
}

impl UploadLabel {
    /// Label derived from the current UTC time, e.g. `upload-2025-01-31T09-15-02`.
    pub fn now() -> Self {
        Self::from_timestamp(chrono::Utc::now())
    }

    pub fn from_timestamp(at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            at,
            timestamp: at.format("%Y-%m-%dT%H-%M-%S").to_string(),
        }
    }

    /// Human-readable upload time for issue descriptions.
    pub fn uploaded_at(&self) -> String {
        self.at.format("%B %-d, %Y at %H:%M:%S UTC").to_string()
    }

    /// Timestamp portion used in the grouping issue summary.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn as_label(&self) -> String {
        format!("upload-{}", self.timestamp)
    }
}
