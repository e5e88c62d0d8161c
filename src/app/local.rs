//! In-process reactive application.
//!
//! A `LocalApp` is assembled from named inputs (each with a binding kind),
//! observers that react to input changes, output renderers and exports.
//! One call to `apply_inputs` is one response cycle: all assignments land,
//! the observers of every changed input run, and every output is
//! re-rendered before the call returns. A failing observer does not cut
//! the cycle short; its error is returned once the cycle has finished.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Duration;

use super::exports::ExportRegistry;
use super::types::{AppError, AppResult, ApplyReport, InputAssignment, LaunchOptions, ValueReport};
use super::AppConnection;
use crate::snapshot::types::{ValueMap, ValueSnapshot};

/// Value a button binding interprets as one press
pub const CLICK: &str = "click";

/// How an input's widget accepts programmatic values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Plain value widget (text, numeric, select, checkbox group...)
    Value,
    /// Action button; the value counts presses
    Button,
    /// File upload; the value is the uploaded file description
    File,
    /// State exists but the widget sets it without a binding, so it cannot be replayed
    Unbound,
}

type Observer = Box<dyn FnMut(&mut AppContext) -> Result<(), String> + Send>;
type Renderer = Box<dyn Fn(&mut AppContext) -> Result<Value, String> + Send>;

/// State visible to observers and output renderers
pub struct AppContext {
    inputs: ValueMap,
    rng: StdRng,
    test_mode: bool,
}

impl AppContext {
    fn new() -> Self {
        Self {
            inputs: ValueMap::new(),
            rng: StdRng::seed_from_u64(0),
            test_mode: false,
        }
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    /// Numeric input, accepting numbers or numeric strings
    pub fn input_i64(&self, name: &str) -> Option<i64> {
        match self.inputs.get(name)? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn input_str(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).and_then(Value::as_str)
    }

    pub fn inputs(&self) -> &ValueMap {
        &self.inputs
    }

    /// The application's random number generator, seeded at launch
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Whether the application was launched by a test driver
    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }
}

pub struct LocalApp {
    name: String,
    bindings: BTreeMap<String, BindingKind>,
    initial: ValueMap,
    observers: Vec<(String, Observer)>,
    outputs: BTreeMap<String, Renderer>,
    exports: ExportRegistry,
    ctx: AppContext,
    rendered: ValueMap,
    started: bool,
    closed: bool,
}

impl LocalApp {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: BTreeMap::new(),
            initial: ValueMap::new(),
            observers: Vec::new(),
            outputs: BTreeMap::new(),
            exports: ExportRegistry::new(),
            ctx: AppContext::new(),
            rendered: ValueMap::new(),
            started: false,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn define(mut self, name: impl Into<String>, kind: BindingKind, initial: Value) -> Self {
        let name = name.into();
        self.bindings.insert(name.clone(), kind);
        self.initial.insert(name, initial);
        self
    }

    /// Add a value input with its initial value
    pub fn input(self, name: impl Into<String>, initial: impl Into<Value>) -> Self {
        self.define(name, BindingKind::Value, initial.into())
    }

    /// Add an action button, starting at zero presses
    pub fn button(self, name: impl Into<String>) -> Self {
        self.define(name, BindingKind::Button, json!(0))
    }

    /// Add a file upload input, initially empty
    pub fn file_input(self, name: impl Into<String>) -> Self {
        self.define(name, BindingKind::File, Value::Null)
    }

    /// Add input state that has no binding and cannot be set from a script
    pub fn unbound_input(self, name: impl Into<String>, initial: impl Into<Value>) -> Self {
        self.define(name, BindingKind::Unbound, initial.into())
    }

    /// Run `f` whenever `input` changes
    pub fn observe<F>(mut self, input: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&mut AppContext) -> Result<(), String> + Send + 'static,
    {
        self.observers.push((input.into(), Box::new(f)));
        self
    }

    /// Add an output, re-rendered after every response cycle
    pub fn output<T, E, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        T: Serialize,
        E: Display,
        F: Fn(&mut AppContext) -> Result<T, E> + Send + 'static,
    {
        self.outputs.insert(
            name.into(),
            Box::new(move |ctx| {
                let value = f(ctx).map_err(|e| e.to_string())?;
                serde_json::to_value(value).map_err(|e| e.to_string())
            }),
        );
        self
    }

    /// Add an export evaluated on every value request
    pub fn export<T, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        T: Serialize,
        F: Fn() -> T + Send + 'static,
    {
        self.exports.register(name, f);
        self
    }

    /// Add an export whose evaluation may fail
    pub fn export_fallible<T, E, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        T: Serialize,
        E: Display,
        F: Fn() -> Result<T, E> + Send + 'static,
    {
        self.exports.register_fallible(name, f);
        self
    }

    pub fn exports_mut(&mut self) -> &mut ExportRegistry {
        &mut self.exports
    }

    fn ensure_running(&self) -> AppResult<()> {
        if self.closed {
            return Err(AppError::Closed);
        }
        if !self.started {
            return Err(AppError::NotStarted);
        }
        Ok(())
    }

    fn render_outputs(&mut self) {
        let mut rendered = ValueMap::new();
        for (name, render) in &self.outputs {
            let value = match render(&mut self.ctx) {
                Ok(value) => value,
                Err(message) => {
                    tracing::warn!(output = %name, error = %message, "output failed to render");
                    json!({ "error": message })
                }
            };
            rendered.insert(name.clone(), value);
        }
        self.rendered = rendered;
    }

    /// Run every observer of the changed inputs, then report the first failure
    fn run_observers(&mut self, changed: &[&str]) -> AppResult<()> {
        let mut first_failure = None;
        for input in changed {
            for (name, observer) in self.observers.iter_mut() {
                if name.as_str() != *input {
                    continue;
                }
                if let Err(e) = observer(&mut self.ctx) {
                    tracing::warn!(input = %input, error = %e, "observer failed");
                    first_failure
                        .get_or_insert_with(|| AppError::Rejected(format!("observer of '{}' failed: {}", input, e)));
                }
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    fn report(&self) -> ValueReport {
        let (export, export_errors) = self.exports.evaluate();
        ValueReport {
            values: ValueSnapshot {
                input: self.ctx.inputs.clone(),
                output: self.rendered.clone(),
                export,
            },
            export_errors,
        }
    }
}

/// New value for a binding, or `None` if the binding cannot take it
fn next_value(kind: BindingKind, current: Option<&Value>, assigned: &Value) -> Option<Value> {
    match kind {
        BindingKind::Unbound => None,
        BindingKind::Button if assigned.as_str() == Some(CLICK) => {
            let presses = current.and_then(Value::as_i64).unwrap_or(0);
            Some(json!(presses + 1))
        }
        BindingKind::Button | BindingKind::Value | BindingKind::File => Some(assigned.clone()),
    }
}

impl AppConnection for LocalApp {
    fn start(&mut self, options: &LaunchOptions) -> AppResult<()> {
        if self.closed {
            return Err(AppError::Closed);
        }
        self.ctx.rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.ctx.test_mode = options.test_mode;
        self.ctx.inputs = self.initial.clone();
        self.render_outputs();
        self.started = true;
        tracing::debug!(app = %self.name, seed = ?options.seed, "local application started");
        Ok(())
    }

    fn apply_inputs(&mut self, inputs: &[InputAssignment], _wait: Option<Duration>) -> AppResult<ApplyReport> {
        self.ensure_running()?;

        let mut unbound = Vec::new();
        let mut changed: Vec<&str> = Vec::new();
        for assignment in inputs {
            let name = assignment.name.as_str();
            let kind = self.bindings.get(name).copied().unwrap_or(BindingKind::Unbound);
            match next_value(kind, self.ctx.inputs.get(name), &assignment.value) {
                Some(value) => {
                    self.ctx.inputs.insert(name.to_string(), value);
                    changed.push(name);
                }
                None => unbound.push(name.to_string()),
            }
        }

        // The cycle always completes so outputs never lag behind inputs
        let observed = self.run_observers(&changed);
        self.render_outputs();
        observed?;

        Ok(ApplyReport {
            values: Some(self.report()),
            unbound,
        })
    }

    fn values(&mut self) -> AppResult<ValueReport> {
        self.ensure_running()?;
        Ok(self.report())
    }

    fn source_type(&self) -> &str {
        "local"
    }

    fn close(&mut self) -> AppResult<()> {
        self.closed = true;
        Ok(())
    }
}
