//! Shared scratch space for the steps of one run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Artifacts, pending changes and review comments accumulated during a run.
///
/// Memory only grows or is overwritten entry by entry; there is no way to
/// clear it mid-run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMemory {
    shared_artifacts: BTreeMap<String, String>,
    pending_changes: BTreeMap<String, String>,
    review_comments: Vec<String>,
}

impl WorkflowMemory {
    /// Empty memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or replace a named artifact
    pub fn set_artifact(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.shared_artifacts.insert(name.into(), value.into());
    }

    /// Latest value of an artifact
    pub fn artifact(&self, name: &str) -> Option<&str> {
        self.shared_artifacts.get(name).map(String::as_str)
    }

    /// All artifacts, ordered by name
    pub fn artifacts(&self) -> &BTreeMap<String, String> {
        &self.shared_artifacts
    }

    /// Propose the full content of `path`, replacing any earlier proposal
    pub fn stage_change(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.pending_changes.insert(path.into(), content.into());
    }

    /// Proposed file contents, ordered by path
    pub fn pending_changes(&self) -> &BTreeMap<String, String> {
        &self.pending_changes
    }

    /// Append a review comment
    pub fn add_review_comment(&mut self, comment: impl Into<String>) {
        self.review_comments.push(comment.into());
    }

    /// Review comments in the order they were added
    pub fn review_comments(&self) -> &[String] {
        &self.review_comments
    }

    /// Most recent review comment
    pub fn latest_review_comment(&self) -> Option<&str> {
        self.review_comments.last().map(String::as_str)
    }
}
