//! snapdriver - snapshot-driven interaction testing for reactive applications.
//!
//! This crate provides:
//! - A `Driver` that applies inputs and waits for the response cycle
//! - Numbered snapshot artifacts (`001.json`, `001.png`, ...) per test
//! - Deferred exports evaluated fresh on every read
//! - In-process (`LocalApp`) and child-process (`ProcessApp`) applications
//! - JSON test scripts, replay and comparison against accepted artifacts
//!
//! # Example
//!
//! ```rust,no_run
//! use snapdriver::demo::counter_app;
//! use snapdriver::{Driver, InputAssignment};
//!
//! let mut app = Driver::new(counter_app(), Some(100)).unwrap();
//! app.snapshot_init("mytest", None).unwrap();
//! app.set_inputs(&[InputAssignment::new("n", 4)]).unwrap();
//! app.click("add").unwrap();
//! app.snapshot(None, None).unwrap();
//! ```

pub mod app;
pub mod compare;
pub mod config;
pub mod demo;
pub mod driver;
pub mod harness;
pub mod runner;
pub mod session;
pub mod snapshot;

// Re-export runner types
pub use runner::{PeekRecord, RunResult, SnapshotRecord};

// Re-export harness types
pub use harness::{HarnessError, HarnessResult, ScriptStep, TestScript, load_script, run_script};

// Re-export the driver
pub use driver::{Driver, DriverError, DriverOptions, DriverResult, DriverState, SetInputsOptions, UnboundInputPolicy};

// Re-export application connections
pub use app::{
    AppConnection, AppContext, AppError, ExportFailure, ExportRegistry, InputAssignment, LateReply, LaunchOptions,
    LocalApp, ProcessApp, ProcessConfig, ValueReport,
};

// Re-export snapshot types and backends
pub use snapshot::{
    CaptureBackend, CaptureResult, FieldSelector, Framebuffer, SnapshotArtifact, SnapshotError, SnapshotItems,
    SnapshotRecorder, SnapshotResult, ValueRenderer, ValueSnapshot,
};

// Re-export session and comparison helpers
pub use compare::{ChangeKind, CompareReport, FileChange, accept, compare_dirs, compare_test};
pub use session::{SessionMetadata, TestSession};
