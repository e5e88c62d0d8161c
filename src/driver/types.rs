use std::path::PathBuf;
use std::time::Duration;

use crate::app::{AppError, ExportFailure};
use crate::config;
use crate::snapshot::SnapshotError;

/// Lifecycle of a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Application running, no test namespace yet
    Uninitialized,
    /// `snapshot_init` done; counted snapshots allowed
    Initialized,
    Closed,
}

/// What to do when a script sets an input that has no binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnboundInputPolicy {
    /// Log and keep a warning line; playback continues
    #[default]
    Warn,
    /// Fail the call with [`DriverError::UnknownInputBinding`]
    Error,
}

/// Settings for one driver instance
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Seed for the application's random number generator
    pub seed: Option<u64>,
    /// Response-cycle wait for `set_inputs`
    pub input_timeout: Duration,
    /// Startup wait for the application
    pub load_timeout: Duration,
    /// Root of the `<test>-current` directories
    pub tests_dir: PathBuf,
    /// Where upload file names are resolved
    pub fixtures_dir: PathBuf,
    pub unbound_policy: UnboundInputPolicy,
    /// Screenshot policy used when `snapshot_init` is not given one
    pub screenshot_default: bool,
}

impl DriverOptions {
    pub fn from_config() -> Self {
        let cfg = config::get();
        Self {
            seed: cfg.defaults.seed,
            input_timeout: cfg.timing.input_timeout(),
            load_timeout: cfg.timing.load_timeout(),
            tests_dir: cfg.paths.tests_dir.clone(),
            fixtures_dir: cfg.paths.fixtures_dir.clone(),
            unbound_policy: UnboundInputPolicy::default(),
            screenshot_default: cfg.defaults.screenshot,
        }
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn tests_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tests_dir = dir.into();
        self
    }

    pub fn fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = dir.into();
        self
    }

    pub fn input_timeout(mut self, timeout: Duration) -> Self {
        self.input_timeout = timeout;
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn unbound_policy(mut self, policy: UnboundInputPolicy) -> Self {
        self.unbound_policy = policy;
        self
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self::from_config()
    }
}

/// Per-call options for `set_inputs_with`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetInputsOptions {
    /// Block until the application finished the response cycle
    pub wait: bool,
    /// Override for the driver's input timeout
    pub timeout: Option<Duration>,
}

impl Default for SetInputsOptions {
    fn default() -> Self {
        Self {
            wait: true,
            timeout: None,
        }
    }
}

impl SetInputsOptions {
    pub fn no_wait() -> Self {
        Self {
            wait: false,
            timeout: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

fn join_failures(failures: &[ExportFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Errors surfaced to a test script
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("snapshot_init must be called before taking snapshots")]
    Uninitialized,

    #[error("snapshot_init was already called for test '{test_name}'")]
    AlreadyInitialized { test_name: String },

    #[error("Driver is closed")]
    Closed,

    /// Inputs without a binding, under [`UnboundInputPolicy::Error`]
    #[error("No input binding for: {}", names.join(", "))]
    UnknownInputBinding { names: Vec<String> },

    #[error("Application did not finish processing inputs within {timeout:?}")]
    InputApplyTimeout { timeout: Duration },

    /// Batches sent without waiting that the application later rejected
    #[error("Inputs sent without waiting failed: {}", messages.join("; "))]
    LateInputFailure { messages: Vec<String> },

    /// Every export that failed, by name
    #[error("Export evaluation failed: {}", join_failures(failures))]
    ExportEvaluation { failures: Vec<ExportFailure> },

    /// Artifact persistence failed; the sequence number was not consumed
    #[error("Failed to write snapshot {seq:03} at {}: {source}", path.display())]
    ArtifactWrite {
        seq: u32,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot upload '{}': {source}", path.display())]
    UploadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Snapshot(SnapshotError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SnapshotError> for DriverError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::ArtifactWrite { seq, path, source } => DriverError::ArtifactWrite { seq, path, source },
            other => DriverError::Snapshot(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_write_is_lifted() {
        let err: DriverError = SnapshotError::ArtifactWrite {
            seq: 3,
            path: PathBuf::from("003.json"),
            source: std::io::Error::other("disk full"),
        }
        .into();
        assert!(matches!(err, DriverError::ArtifactWrite { seq: 3, .. }));
        assert!(err.to_string().contains("003"));
    }

    #[test]
    fn test_late_failure_lists_every_message() {
        let err = DriverError::LateInputFailure {
            messages: vec!["n is not a number".into(), "unlucky".into()],
        };
        assert_eq!(err.to_string(), "Inputs sent without waiting failed: n is not a number; unlucky");
    }

    #[test]
    fn test_export_error_names_every_failure() {
        let err = DriverError::ExportEvaluation {
            failures: vec![
                ExportFailure {
                    name: "a".into(),
                    message: "boom".into(),
                },
                ExportFailure {
                    name: "b".into(),
                    message: "bang".into(),
                },
            ],
        };
        assert_eq!(err.to_string(), "Export evaluation failed: a: boom; b: bang");
    }

    #[test]
    fn test_set_inputs_defaults_to_wait() {
        let opts = SetInputsOptions::default();
        assert!(opts.wait);
        assert!(opts.timeout.is_none());
        assert!(!SetInputsOptions::no_wait().wait);
    }
}
