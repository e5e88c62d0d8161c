//! Connections to the application under test.
//!
//! The driver only ever talks to an application through [`AppConnection`]:
//! - `LocalApp` runs a reactive application in-process
//! - `ProcessApp` drives a child process over the line protocol in [`protocol`]

use std::time::Duration;

pub mod exports;
pub mod local;
pub mod process;
pub mod protocol;
pub mod types;

pub use exports::ExportRegistry;
pub use local::{AppContext, BindingKind, LocalApp};
pub use process::{ProcessApp, ProcessConfig};
pub use types::{
    AppError, AppResult, ApplyReport, ExportFailure, InputAssignment, LateReply, LaunchOptions, ValueReport,
};

/// A live session with one application instance
pub trait AppConnection: Send {
    /// Start (or attach to) the application
    fn start(&mut self, options: &LaunchOptions) -> AppResult<()>;

    /// Dispatch a batch of inputs through their bindings in one response cycle.
    ///
    /// With `wait = Some(bound)` the call returns only once the application
    /// has finished processing the update, or fails with
    /// [`AppError::Timeout`]. With `wait = None` the batch is sent and the
    /// call returns immediately without values.
    fn apply_inputs(&mut self, inputs: &[InputAssignment], wait: Option<Duration>) -> AppResult<ApplyReport>;

    /// Current inputs, outputs and freshly evaluated exports
    fn values(&mut self) -> AppResult<ValueReport>;

    /// Replies to batches sent without waiting that arrived since the last call
    fn take_late_replies(&mut self) -> Vec<LateReply> {
        Vec::new()
    }

    /// Identifier recorded in session metadata
    fn source_type(&self) -> &str;

    /// Tear the session down. Calling it twice is harmless.
    fn close(&mut self) -> AppResult<()>;
}
