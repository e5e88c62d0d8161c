use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;

use snapdriver::session::{SessionMetadata, TestSession};
use snapdriver::snapshot::{CaptureBackend, SnapshotItems, SnapshotRecorder, ValueRenderer, ValueSnapshot};

fn sample_values() -> ValueSnapshot {
    let mut values = ValueSnapshot::default();
    for i in 0..20 {
        values.input.insert(format!("input_{:02}", i), json!(i));
        values.output.insert(format!("output_{:02}", i), json!(format!("value {}", i * 3)));
    }
    values.export.insert("nums".into(), json!((0..100).collect::<Vec<_>>()));
    values
}

fn benchmark_record(c: &mut Criterion) {
    let tmp = tempfile::tempdir().unwrap();
    let values = sample_values();

    let session = TestSession::new(tmp.path(), "bench");
    session
        .init(&SessionMetadata::new("bench", None, false, "value_panel"))
        .unwrap();
    let mut recorder = SnapshotRecorder::new(session, false, Box::new(ValueRenderer::default()));

    c.bench_function("snapshot_record_json", |b| {
        b.iter(|| recorder.record(black_box(&values), None, None).unwrap())
    });

    let items = SnapshotItems::default().with_output(snapdriver::FieldSelector::All);
    c.bench_function("snapshot_record_with_png", |b| {
        b.iter(|| recorder.record(black_box(&values), Some(&items), Some(true)).unwrap())
    });
}

fn benchmark_render(c: &mut Criterion) {
    let values = sample_values();
    let mut renderer = ValueRenderer::default();

    c.bench_function("value_panel_render", |b| {
        b.iter(|| renderer.capture(black_box(&values)).unwrap())
    });
}

criterion_group!(benches, benchmark_record, benchmark_render);
criterion_main!(benches);
