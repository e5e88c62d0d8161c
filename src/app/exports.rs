//! Deferred export expressions.
//!
//! An export is a closure registered under a name. Registration stores the
//! closure only; every call to [`ExportRegistry::evaluate`] runs it again,
//! so the value always reflects whatever state the closure captured by
//! reference at that moment.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;

use super::types::ExportFailure;
use crate::snapshot::types::ValueMap;

type ExportFn = Box<dyn Fn() -> Result<Value, String> + Send>;

#[derive(Default)]
pub struct ExportRegistry {
    bindings: BTreeMap<String, ExportFn>,
}

impl ExportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an export that cannot fail. Replaces an existing binding of the same name.
    pub fn register<T, F>(&mut self, name: impl Into<String>, f: F)
    where
        T: Serialize,
        F: Fn() -> T + Send + 'static,
    {
        self.bindings.insert(
            name.into(),
            Box::new(move || serde_json::to_value(f()).map_err(|e| e.to_string())),
        );
    }

    /// Register an export whose evaluation may fail
    pub fn register_fallible<T, E, F>(&mut self, name: impl Into<String>, f: F)
    where
        T: Serialize,
        E: Display,
        F: Fn() -> Result<T, E> + Send + 'static,
    {
        self.bindings.insert(
            name.into(),
            Box::new(move || {
                let value = f().map_err(|e| e.to_string())?;
                serde_json::to_value(value).map_err(|e| e.to_string())
            }),
        );
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Evaluate every export, in name order.
    ///
    /// A failing export is reported by name and does not stop the others.
    pub fn evaluate(&self) -> (ValueMap, Vec<ExportFailure>) {
        let mut values = ValueMap::new();
        let mut failures = Vec::new();
        for (name, f) in &self.bindings {
            match f() {
                Ok(value) => {
                    values.insert(name.clone(), value);
                }
                Err(message) => {
                    tracing::warn!(export = %name, error = %message, "export evaluation failed");
                    failures.push(ExportFailure {
                        name: name.clone(),
                        message,
                    });
                }
            }
        }
        (values, failures)
    }
}

impl std::fmt::Debug for ExportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportRegistry")
            .field("names", &self.bindings.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_exports_are_not_evaluated_at_registration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ExportRegistry::new();
        assert!(registry.is_empty());
        let counter = Arc::clone(&calls);
        registry.register("calls", move || counter.fetch_add(1, Ordering::SeqCst) + 1);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.evaluate().0["calls"], json!(1));
        assert_eq!(registry.evaluate().0["calls"], json!(2));
    }

    #[test]
    fn test_exports_read_current_state() {
        let nums = Arc::new(Mutex::new(vec![4]));
        let mut registry = ExportRegistry::new();
        let captured = Arc::clone(&nums);
        registry.register("nums", move || captured.lock().map(|n| n.clone()).unwrap_or_default());

        nums.lock().unwrap().push(7);
        let (values, failures) = registry.evaluate();
        assert!(failures.is_empty());
        assert_eq!(values["nums"], json!([4, 7]));
    }

    #[test]
    fn test_failure_is_named_and_others_still_evaluate() {
        let mut registry = ExportRegistry::new();
        registry.register("a", || 1);
        registry.register_fallible("b", || Err::<i32, _>("boom"));
        registry.register("c", || "three");

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        let (values, failures) = registry.evaluate();
        assert_eq!(values.len(), 2);
        assert_eq!(values["c"], json!("three"));
        assert_eq!(
            failures,
            vec![ExportFailure {
                name: "b".to_string(),
                message: "boom".to_string()
            }]
        );
    }
}
