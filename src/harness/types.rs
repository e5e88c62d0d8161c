use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

use crate::app::InputAssignment;
use crate::driver::{DriverError, SetInputsOptions};
use crate::snapshot::SnapshotItems;

/// A recorded test: a name, launch settings and the steps to replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestScript {
    /// Test name; artifacts go to `<tests_dir>/<name>-current`
    pub name: String,

    /// Seed for the application's random number generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Screenshot policy for `snapshot_init`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<bool>,

    pub steps: Vec<ScriptStep>,
}

/// One driver call, tagged by `action`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Apply inputs in one response cycle
    SetInputs {
        inputs: Map<String, Value>,
        #[serde(default = "default_wait")]
        wait: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    Click {
        name: String,
    },

    /// Upload a fixture file (bare name) to a file input
    UploadFile {
        name: String,
        file: String,
    },

    Snapshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items: Option<SnapshotItems>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        screenshot: Option<bool>,
    },

    GetAllValues,

    TakeScreenshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
}

fn default_wait() -> bool {
    true
}

impl ScriptStep {
    /// The `action` tag, for messages
    pub fn action(&self) -> &'static str {
        match self {
            ScriptStep::SetInputs { .. } => "set_inputs",
            ScriptStep::Click { .. } => "click",
            ScriptStep::UploadFile { .. } => "upload_file",
            ScriptStep::Snapshot { .. } => "snapshot",
            ScriptStep::GetAllValues => "get_all_values",
            ScriptStep::TakeScreenshot { .. } => "take_screenshot",
        }
    }

    /// Assignments and per-call options of a `set_inputs` step
    pub fn input_batch(inputs: &Map<String, Value>, wait: bool, timeout_ms: Option<u64>) -> (Vec<InputAssignment>, SetInputsOptions) {
        let batch = inputs
            .iter()
            .map(|(name, value)| InputAssignment::new(name.clone(), value.clone()))
            .collect();
        let opts = SetInputsOptions {
            wait,
            timeout: timeout_ms.map(Duration::from_millis),
        };
        (batch, opts)
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Error types for loading and replaying scripts
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Invalid script: {0}")]
    Script(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Step {index} ({action}) failed: {source}")]
    Step {
        index: usize,
        action: &'static str,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),
}
