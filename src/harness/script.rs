use std::path::Path;

use crate::driver::Driver;
use crate::harness::types::{HarnessError, HarnessResult, ScriptStep, TestScript};
use crate::runner::{PeekRecord, RunResult, SnapshotRecord};

/// Read a script from a JSON file
pub fn load_script(path: &Path) -> HarnessResult<TestScript> {
    let text = std::fs::read_to_string(path)?;
    let script = serde_json::from_str(&text)?;
    Ok(script)
}

/// Replay a script against a driver.
///
/// Calls `snapshot_init` with the script's name, then runs the steps in
/// order and stops at the first failure. The driver is left open so the
/// caller can inspect it.
pub fn run_script(driver: &mut Driver, script: &TestScript) -> RunResult {
    let mut result = RunResult::new(&script.name);

    if let Err(err) = driver.snapshot_init(&script.name, script.screenshot) {
        result.fail(err);
        result.warnings = driver.warnings().to_vec();
        return result;
    }

    for (index, step) in script.steps.iter().enumerate() {
        tracing::debug!(step = index, action = step.action(), "running step");
        if let Err(err) = run_step(driver, index, step, &mut result) {
            tracing::warn!(error = %err, "script stopped");
            result.fail(err);
            result.warnings = driver.warnings().to_vec();
            return result;
        }
    }

    result.success = true;
    result.warnings = driver.warnings().to_vec();
    tracing::info!(test = %script.name, snapshots = result.snapshots.len(), "script finished");
    result
}

fn run_step(driver: &mut Driver, index: usize, step: &ScriptStep, result: &mut RunResult) -> HarnessResult<()> {
    let wrap = |source| HarnessError::Step {
        index,
        action: step.action(),
        source,
    };

    match step {
        ScriptStep::SetInputs {
            inputs,
            wait,
            timeout_ms,
        } => {
            let (batch, opts) = ScriptStep::input_batch(inputs, *wait, *timeout_ms);
            driver.set_inputs_with(&batch, opts).map_err(wrap)?;
        }
        ScriptStep::Click { name } => {
            driver.click(name).map_err(wrap)?;
        }
        ScriptStep::UploadFile { name, file } => {
            driver.upload_file(name, file).map_err(wrap)?;
        }
        ScriptStep::Snapshot { items, screenshot } => {
            let artifact = driver.snapshot(items.as_ref(), *screenshot).map_err(wrap)?;
            result.snapshots.push(SnapshotRecord::new(index, artifact));
        }
        ScriptStep::GetAllValues => {
            let values = driver.get_all_values().map_err(wrap)?;
            result.peeks.push(PeekRecord { step: index, values });
        }
        ScriptStep::TakeScreenshot { path } => {
            driver.take_screenshot(path.as_deref()).map_err(wrap)?;
        }
    }
    Ok(())
}
