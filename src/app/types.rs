use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config;
use crate::snapshot::types::ValueSnapshot;

/// One named input value to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAssignment {
    pub name: String,
    pub value: Value,
}

impl InputAssignment {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Settings handed to an application when it is started
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Seed for the application's random number generator
    pub seed: Option<u64>,
    /// Whether the application should run in test mode
    pub test_mode: bool,
    /// How long to wait for the application to report ready
    pub load_timeout: Duration,
    /// Bound for plain requests such as value reads
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            seed: cfg.defaults.seed,
            test_mode: true,
            load_timeout: cfg.timing.load_timeout(),
            request_timeout: cfg.timing.load_timeout(),
        }
    }
}

impl LaunchOptions {
    /// Options as seen from inside a launched process
    pub fn from_env() -> Self {
        Self {
            seed: config::launch_seed(),
            test_mode: config::is_test_mode(),
            ..Default::default()
        }
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// An export whose expression failed to evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFailure {
    pub name: String,
    pub message: String,
}

impl std::fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Values as reported by an application, with per-export failures kept apart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueReport {
    #[serde(flatten)]
    pub values: ValueSnapshot,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_errors: Vec<ExportFailure>,
}

impl ValueReport {
    /// The values, or every export that failed
    pub fn into_result(self) -> Result<ValueSnapshot, Vec<ExportFailure>> {
        if self.export_errors.is_empty() {
            Ok(self.values)
        } else {
            Err(self.export_errors)
        }
    }
}

/// Outcome of one input application round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Post-update values; `None` when the caller chose not to wait
    pub values: Option<ValueReport>,
    /// Names that have no input binding and were not applied
    pub unbound: Vec<String>,
}

/// Reply to a batch nobody waited for, held until the driver collects it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LateReply {
    /// Names in the batch that have no input binding
    Unbound(Vec<String>),
    /// The application rejected the batch
    Failed(String),
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;

/// Error types for talking to an application
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to launch application: {0}")]
    Launch(String),

    #[error("Application has not been started")]
    NotStarted,

    #[error("Application connection is closed")]
    Closed,

    /// No reply within the wait bound
    #[error("No response from application after {waited:?}")]
    Timeout { waited: Duration },

    /// The application reported a failure for a request
    #[error("Application rejected request: {0}")]
    Rejected(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Protocol(err.to_string())
    }
}
