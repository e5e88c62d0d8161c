//! The counter application used in the documentation and tests.
//!
//! Inputs: `n` (a number), `add` and `roll` (buttons), `data` (file).
//! Outputs: `sum` of everything added so far (as a string), the last
//! `dice` roll, the line count of the uploaded `data` as `rows`, and the
//! data `source` (`fixture` under test mode).
//! Export: `nums`, the accumulated numbers in order.

use base64::Engine;
use rand::Rng;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::app::LocalApp;

/// Lines in an uploaded file, `None` before any upload
fn uploaded_rows(upload: Option<&Value>) -> Result<Option<usize>, String> {
    let Some(content) = upload.and_then(|u| u.get("content")).and_then(Value::as_str) else {
        return Ok(None);
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(content)
        .map_err(|e| e.to_string())?;
    Ok(Some(String::from_utf8_lossy(&bytes).lines().count()))
}

#[derive(Debug, Default)]
struct Counter {
    nums: Vec<i64>,
    rolls: Vec<u32>,
}

pub fn counter_app() -> LocalApp {
    let state = Arc::new(Mutex::new(Counter::default()));
    let on_add = Arc::clone(&state);
    let on_roll = Arc::clone(&state);
    let sum = Arc::clone(&state);
    let dice = Arc::clone(&state);
    let nums = Arc::clone(&state);

    LocalApp::new("counter")
        .input("n", 0)
        .button("add")
        .button("roll")
        .file_input("data")
        .observe("add", move |ctx| {
            let n = ctx
                .input_i64("n")
                .ok_or_else(|| "n is not a number".to_string())?;
            on_add.lock().map_err(|e| e.to_string())?.nums.push(n);
            Ok(())
        })
        .observe("roll", move |ctx| {
            let roll = ctx.rng().gen_range(1..=6);
            on_roll.lock().map_err(|e| e.to_string())?.rolls.push(roll);
            Ok(())
        })
        .output("sum", move |_| {
            let state = sum.lock().map_err(|e| e.to_string())?;
            Ok::<_, String>(state.nums.iter().sum::<i64>().to_string())
        })
        .output("dice", move |_| {
            let state = dice.lock().map_err(|e| e.to_string())?;
            Ok::<_, String>(state.rolls.last().copied())
        })
        .output("rows", |ctx| uploaded_rows(ctx.input("data")))
        .output("source", |ctx| {
            Ok::<_, String>(if ctx.is_test_mode() { "fixture" } else { "live" })
        })
        .export_fallible("nums", move || nums.lock().map(|s| s.nums.clone()).map_err(|e| e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::local::CLICK;
    use crate::app::{AppConnection, InputAssignment, LaunchOptions};
    use serde_json::json;

    #[test]
    fn test_counter_accumulates() {
        let mut app = counter_app();
        app.start(&LaunchOptions::default().seed(Some(7))).unwrap();
        app.apply_inputs(&[InputAssignment::new("n", 4)], None).unwrap();
        app.apply_inputs(&[InputAssignment::new("add", CLICK)], None).unwrap();
        app.apply_inputs(&[InputAssignment::new("add", CLICK)], None).unwrap();
        let values = app.values().unwrap().values;

        assert_eq!(values.output["sum"], json!("8"));
        assert_eq!(values.output["dice"], json!(null));
        assert_eq!(values.output["source"], json!("fixture"));
        assert_eq!(values.output["rows"], json!(null));
        assert_eq!(values.export["nums"], json!([4, 4]));
    }

    #[test]
    fn test_uploaded_rows() {
        let upload = json!({ "name": "a.csv", "content": "YQpiCmMK" });
        assert_eq!(uploaded_rows(Some(&upload)), Ok(Some(3)));
        assert_eq!(uploaded_rows(None), Ok(None));
        assert!(uploaded_rows(Some(&json!({ "content": "***" }))).is_err());
    }
}
