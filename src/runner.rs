//! Types for script run results.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::compare::CompareReport;
use crate::snapshot::{SnapshotArtifact, ValueSnapshot};

/// One counted snapshot written during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Index of the step that wrote it
    pub step: usize,

    /// Sequence number (1-based)
    pub seq: u32,

    pub json_path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<PathBuf>,
}

impl SnapshotRecord {
    pub fn new(step: usize, artifact: SnapshotArtifact) -> Self {
        Self {
            step,
            seq: artifact.seq,
            json_path: artifact.json_path,
            screenshot_path: artifact.screenshot_path,
        }
    }
}

/// Values read by a `get_all_values` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeekRecord {
    pub step: usize,
    pub values: ValueSnapshot,
}

/// Result of replaying one script
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// Whether every step completed
    pub success: bool,

    /// First error, if any; later steps were not run
    pub error: Option<String>,

    pub test_name: String,

    /// Counted snapshots in the order they were written
    pub snapshots: Vec<SnapshotRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peeks: Vec<PeekRecord>,

    /// Warnings raised while replaying (unbound inputs and the like)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Comparison against the accepted artifacts, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<CompareReport>,
}

impl RunResult {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            ..Default::default()
        }
    }

    /// Record a failure and mark the run unsuccessful
    pub fn fail(&mut self, error: impl ToString) {
        self.success = false;
        self.error = Some(error.to_string());
    }
}
