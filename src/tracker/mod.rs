//! Jira publishing: field mapping, REST client and the ordered publisher.

pub mod client;
pub mod fields;
pub mod publisher;

pub use client::{Destination, JiraClient, TrackerApi};
pub use fields::{AdfDocument, DestinationSchema, FieldId, IssueFields};
pub use publisher::{FailurePolicy, PublishFailure, PublishReport, SkippedStep, TrackerOp, publish};
