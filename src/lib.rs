//! Ticketsmith: requirements documents in, Jira epics and stories out.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod tracker;
