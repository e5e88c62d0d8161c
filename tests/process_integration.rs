//! Driving the demo application as a child process over the line protocol

use std::fs;
use std::path::Path;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use snapdriver::harness::{TestScript, run_script};
use snapdriver::{Driver, DriverError, DriverOptions, InputAssignment, ProcessConfig, SetInputsOptions};

const DEMO_APP: &str = env!("CARGO_BIN_EXE_demo_app");

fn launch(tests_dir: &Path, seed: Option<u64>) -> Driver {
    let options = DriverOptions::from_config()
        .tests_dir(tests_dir)
        .fixtures_dir(tests_dir.join("fixtures"))
        .seed(seed)
        .load_timeout(Duration::from_secs(10));
    Driver::launch_with(ProcessConfig::new(DEMO_APP), options).unwrap()
}

#[test]
fn test_process_accumulates_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let mut driver = launch(tmp.path(), Some(1));
    driver.snapshot_init("process", Some(false)).unwrap();

    driver.set_inputs(&[InputAssignment::new("n", 4)]).unwrap();
    driver.click("add").unwrap();
    driver.click("add").unwrap();
    driver.set_inputs(&[InputAssignment::new("n", 7)]).unwrap();
    driver.click("add").unwrap();
    let artifact = driver.snapshot(None, None).unwrap();

    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&artifact.json_path).unwrap()).unwrap();
    assert_eq!(written["export"], json!({ "nums": [4, 4, 7] }));
    assert_eq!(written["output"]["sum"], json!("15"));
    assert_eq!(written["output"]["source"], json!("fixture"));
    driver.close().unwrap();
}

#[test]
fn test_values_read_waits_for_unacknowledged_inputs() {
    let tmp = tempfile::tempdir().unwrap();
    let mut driver = launch(tmp.path(), None);

    let no_wait = SetInputsOptions::no_wait();
    driver
        .set_inputs_with(&[InputAssignment::new("n", 5)], no_wait)
        .unwrap();
    driver
        .set_inputs_with(&[InputAssignment::new("add", "click")], no_wait)
        .unwrap();

    let values = driver.get_all_values().unwrap();
    assert_eq!(values.export["nums"], json!([5]));

    // Late acknowledgements were drained; the next reply still matches
    let values = driver.click("add").unwrap();
    assert_eq!(values.export["nums"], json!([5, 5]));
}

#[test]
fn test_rejected_unawaited_batch_fails_next_read() {
    let tmp = tempfile::tempdir().unwrap();
    let mut driver = launch(tmp.path(), None);

    let no_wait = SetInputsOptions::no_wait();
    driver
        .set_inputs_with(&[InputAssignment::new("n", "abc")], no_wait)
        .unwrap();
    driver
        .set_inputs_with(&[InputAssignment::new("add", "click")], no_wait)
        .unwrap();

    let err = driver.get_all_values().unwrap_err();
    assert!(matches!(&err, DriverError::LateInputFailure { messages } if messages.len() == 1));
    assert!(err.to_string().contains("n is not a number"), "{}", err);

    // Reported once; the cycle itself completed
    let values = driver.get_all_values().unwrap();
    assert_eq!(values.input["add"], json!(1));
    assert_eq!(values.export["nums"], json!([]));
}

#[test]
fn test_unawaited_unbound_inputs_reach_warnings() {
    let tmp = tempfile::tempdir().unwrap();
    let mut driver = launch(tmp.path(), None);

    driver
        .set_inputs_with(&[InputAssignment::new("nope", 1)], SetInputsOptions::no_wait())
        .unwrap();
    assert!(driver.warnings().is_empty());

    driver.get_all_values().unwrap();
    assert_eq!(driver.warnings().len(), 1);
    assert!(driver.warnings()[0].contains("nope"));
}

#[test]
fn test_seeded_process_runs_are_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let script: TestScript = serde_json::from_value(json!({
        "name": "dice",
        "screenshot": false,
        "steps": [
            { "action": "click", "name": "roll" },
            { "action": "click", "name": "roll" },
            { "action": "snapshot", "items": { "output": ["dice"] } },
            { "action": "click", "name": "roll" },
            { "action": "snapshot" }
        ]
    }))
    .unwrap();

    let run = |dir: &Path| {
        let mut driver = launch(dir, Some(42));
        let result = run_script(&mut driver, &script);
        assert!(result.success, "{:?}", result.error);
        result
            .snapshots
            .iter()
            .map(|s| fs::read(&s.json_path).unwrap())
            .collect::<Vec<_>>()
    };

    assert_eq!(run(&tmp.path().join("a")), run(&tmp.path().join("b")));
}

#[test]
fn test_unbound_process_inputs_are_warnings() {
    let tmp = tempfile::tempdir().unwrap();
    let mut driver = launch(tmp.path(), None);

    driver.set_inputs(&[InputAssignment::new("nope", 1)]).unwrap();
    assert_eq!(driver.warnings().len(), 1);
}

#[test]
fn test_missing_binary() {
    let tmp = tempfile::tempdir().unwrap();
    let options = DriverOptions::from_config().tests_dir(tmp.path());
    let err = Driver::launch_with(ProcessConfig::new(tmp.path().join("no-such-app")), options).unwrap_err();
    assert!(matches!(err, DriverError::App(_)));
}
