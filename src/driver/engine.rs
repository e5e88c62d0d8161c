//! The driver façade.
//!
//! A `Driver` owns one live application connection and walks it through
//! `Uninitialized → Initialized → Closed`. Input application waits for
//! the response cycle before returning; counted snapshots go through the
//! recorder, peeks never do.

use std::path::Path;

use super::inputs::{upload_payload, validate_batch};
use super::types::{DriverError, DriverOptions, DriverResult, DriverState, SetInputsOptions, UnboundInputPolicy};
use crate::app::local::CLICK;
use crate::app::{
    AppConnection, AppError, InputAssignment, LateReply, LaunchOptions, ProcessApp, ProcessConfig, ValueReport,
};
use crate::session::{SessionMetadata, TestSession};
use crate::snapshot::{
    CaptureBackend, CaptureResult, SnapshotArtifact, SnapshotItems, SnapshotRecorder, ValueRenderer, ValueSnapshot,
};

pub struct Driver {
    app: Box<dyn AppConnection>,
    options: DriverOptions,
    state: DriverState,
    recorder: Option<SnapshotRecorder>,
    /// Capture backend until `snapshot_init` hands it to the recorder
    backend: Option<Box<dyn CaptureBackend>>,
    warnings: Vec<String>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Start `app` with options from the environment and the given seed
    pub fn new<A: AppConnection + 'static>(app: A, seed: Option<u64>) -> DriverResult<Self> {
        Self::with_options(app, DriverOptions::from_config().seed(seed))
    }

    pub fn with_options<A: AppConnection + 'static>(app: A, options: DriverOptions) -> DriverResult<Self> {
        Self::start(Box::new(app), options)
    }

    /// Spawn an application process and connect to it
    pub fn launch(config: ProcessConfig, seed: Option<u64>) -> DriverResult<Self> {
        Self::launch_with(config, DriverOptions::from_config().seed(seed))
    }

    pub fn launch_with(config: ProcessConfig, options: DriverOptions) -> DriverResult<Self> {
        Self::start(Box::new(ProcessApp::new(config)), options)
    }

    fn start(mut app: Box<dyn AppConnection>, options: DriverOptions) -> DriverResult<Self> {
        let launch = LaunchOptions {
            seed: options.seed,
            test_mode: true,
            load_timeout: options.load_timeout,
            request_timeout: options.load_timeout,
        };
        app.start(&launch)?;
        tracing::info!(source = app.source_type(), seed = ?options.seed, "application started");

        Ok(Self {
            app,
            options,
            state: DriverState::Uninitialized,
            recorder: None,
            backend: None,
            warnings: Vec::new(),
        })
    }

    /// Use a different capture backend. Takes effect for the next `snapshot_init`.
    pub fn with_backend(mut self, backend: Box<dyn CaptureBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    pub fn test_name(&self) -> Option<&str> {
        self.recorder.as_ref().map(|r| r.session().name.as_str())
    }

    /// Counted snapshots written since `snapshot_init`
    pub fn snapshot_count(&self) -> u32 {
        self.recorder.as_ref().map_or(0, SnapshotRecorder::count)
    }

    /// Warnings collected while replaying, oldest first
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.state == DriverState::Closed {
            return Err(DriverError::Closed);
        }
        Ok(())
    }

    /// Set up the artifact directory for `test_name` and reset the counter.
    ///
    /// `screenshot = None` uses the configured default. May only be called once.
    pub fn snapshot_init(&mut self, test_name: &str, screenshot: Option<bool>) -> DriverResult<()> {
        self.ensure_open()?;
        if let Some(existing) = self.test_name() {
            return Err(DriverError::AlreadyInitialized {
                test_name: existing.to_string(),
            });
        }
        if test_name.trim().is_empty() {
            return Err(DriverError::InvalidInput("test name must not be empty".to_string()));
        }

        let screenshot = screenshot.unwrap_or(self.options.screenshot_default);
        let backend = self
            .backend
            .take()
            .unwrap_or_else(|| Box::new(ValueRenderer::default()));

        let session = TestSession::new(&self.options.tests_dir, test_name);
        let metadata = SessionMetadata::new(test_name, self.options.seed, screenshot, backend.source_type());
        let removed = session.init(&metadata)?;
        if removed > 0 {
            tracing::debug!(dir = %session.dir.display(), removed, "cleared artifacts from an earlier run");
        }
        tracing::info!(test = test_name, dir = %session.dir.display(), screenshot, "snapshot session initialized");

        self.recorder = Some(SnapshotRecorder::new(session, screenshot, backend));
        self.state = DriverState::Initialized;
        Ok(())
    }

    /// Apply a batch of inputs and wait for the response cycle.
    ///
    /// Returns the values after the update.
    pub fn set_inputs(&mut self, inputs: &[InputAssignment]) -> DriverResult<ValueSnapshot> {
        match self.set_inputs_with(inputs, SetInputsOptions::default())? {
            Some(values) => Ok(values),
            None => self.get_all_values(),
        }
    }

    /// Apply a batch of inputs. Without `wait`, returns `Ok(None)` as soon as the batch is sent.
    ///
    /// Problems with earlier batches sent without waiting are reported by
    /// the first call that hears about them.
    pub fn set_inputs_with(
        &mut self,
        inputs: &[InputAssignment],
        opts: SetInputsOptions,
    ) -> DriverResult<Option<ValueSnapshot>> {
        self.ensure_open()?;
        validate_batch(inputs)?;

        let timeout = opts.timeout.unwrap_or(self.options.input_timeout);
        let wait = opts.wait.then_some(timeout);
        let report = self.app.apply_inputs(inputs, wait).map_err(|err| match err {
            AppError::Timeout { .. } => DriverError::InputApplyTimeout { timeout },
            other => DriverError::App(other),
        })?;

        self.collect_late_replies()?;
        self.handle_unbound(report.unbound)?;

        if !opts.wait {
            return Ok(None);
        }
        report.values.map(into_snapshot).transpose()
    }

    fn handle_unbound(&mut self, names: Vec<String>) -> DriverResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        match self.options.unbound_policy {
            UnboundInputPolicy::Error => Err(DriverError::UnknownInputBinding { names }),
            UnboundInputPolicy::Warn => {
                for name in names {
                    tracing::warn!(input = %name, "input has no binding; value was not applied");
                    self.warnings
                        .push(format!("Input '{}' has no input binding and cannot be replayed", name));
                }
                Ok(())
            }
        }
    }

    /// Unbound names go through the usual policy; rejected batches fail this call
    fn collect_late_replies(&mut self) -> DriverResult<()> {
        let mut unbound = Vec::new();
        let mut messages = Vec::new();
        for reply in self.app.take_late_replies() {
            match reply {
                LateReply::Unbound(names) => unbound.extend(names),
                LateReply::Failed(message) => messages.push(message),
            }
        }
        self.handle_unbound(unbound)?;
        if messages.is_empty() {
            Ok(())
        } else {
            Err(DriverError::LateInputFailure { messages })
        }
    }

    /// Press a button input once
    pub fn click(&mut self, name: &str) -> DriverResult<ValueSnapshot> {
        self.set_inputs(&[InputAssignment::new(name, CLICK)])
    }

    /// Send a fixture file, named without any directory, to a file input
    pub fn upload_file(&mut self, name: &str, filename: &str) -> DriverResult<ValueSnapshot> {
        self.ensure_open()?;
        let payload = upload_payload(&self.options.fixtures_dir, filename)?;
        tracing::debug!(input = name, file = filename, "uploading fixture");
        self.set_inputs(&[InputAssignment::new(name, payload)])
    }

    /// Read every input, output and export. Does not count as a snapshot.
    pub fn get_all_values(&mut self) -> DriverResult<ValueSnapshot> {
        self.ensure_open()?;
        let report = self.app.values()?;
        self.collect_late_replies()?;
        into_snapshot(report)
    }

    /// Render the current values without counting a snapshot.
    ///
    /// The PNG is written to `path` when one is given.
    pub fn take_screenshot(&mut self, path: Option<&Path>) -> DriverResult<CaptureResult> {
        let values = self.get_all_values()?;
        let capture = match (self.recorder.as_mut(), self.backend.as_mut()) {
            (Some(recorder), _) => recorder.capture(&values)?,
            (None, Some(backend)) => backend.capture(&values)?,
            (None, None) => ValueRenderer::default().capture(&values)?,
        };
        if let Some(path) = path {
            std::fs::write(path, &capture.image_data)?;
            tracing::debug!(path = %path.display(), "screenshot written");
        }
        Ok(capture)
    }

    /// Record the next numbered artifact.
    ///
    /// `items = None` keeps every field; `screenshot = None` follows the
    /// policy from `snapshot_init`.
    pub fn snapshot(
        &mut self,
        items: Option<&SnapshotItems>,
        screenshot: Option<bool>,
    ) -> DriverResult<SnapshotArtifact> {
        self.ensure_open()?;
        if self.recorder.is_none() {
            return Err(DriverError::Uninitialized);
        }
        let values = self.get_all_values()?;
        let recorder = self.recorder.as_mut().ok_or(DriverError::Uninitialized)?;
        Ok(recorder.record(&values, items, screenshot)?)
    }

    /// Shut the application down. Later calls are no-ops.
    pub fn close(&mut self) -> DriverResult<()> {
        if self.state == DriverState::Closed {
            return Ok(());
        }
        self.state = DriverState::Closed;
        self.app.close()?;
        tracing::info!(snapshots = self.snapshot_count(), "driver closed");
        Ok(())
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close application");
        }
    }
}

fn into_snapshot(report: ValueReport) -> DriverResult<ValueSnapshot> {
    report
        .into_result()
        .map_err(|failures| DriverError::ExportEvaluation { failures })
}
