//! Numbered snapshot artifacts.
//!
//! The recorder owns the sequence counter. A counted snapshot stages its
//! files under `.partial` names, renames them into place, and only then
//! advances the counter. Any failure removes what was staged and leaves
//! the counter untouched, so the next attempt reuses the same number.

use std::fs;
use std::path::{Path, PathBuf};

use super::backend::{CaptureBackend, CaptureResult};
use super::types::{SnapshotArtifact, SnapshotError, SnapshotItems, SnapshotResult, ValueSnapshot};
use super::utils::{to_pretty_json, write_staged};
use crate::session::TestSession;

pub struct SnapshotRecorder {
    session: TestSession,
    seq: u32,
    screenshot_default: bool,
    backend: Box<dyn CaptureBackend>,
}

impl SnapshotRecorder {
    pub fn new(session: TestSession, screenshot_default: bool, backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            session,
            seq: 0,
            screenshot_default,
            backend,
        }
    }

    /// Number of counted snapshots written so far
    pub fn count(&self) -> u32 {
        self.seq
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    pub fn screenshot_default(&self) -> bool {
        self.screenshot_default
    }

    pub fn source_type(&self) -> &str {
        self.backend.source_type()
    }

    /// Write the next numbered artifact.
    ///
    /// `items = None` persists every field; `screenshot = None` uses the
    /// policy the recorder was created with.
    pub fn record(
        &mut self,
        values: &ValueSnapshot,
        items: Option<&SnapshotItems>,
        screenshot: Option<bool>,
    ) -> SnapshotResult<SnapshotArtifact> {
        let next = self.seq + 1;
        let selected = match items {
            Some(items) => values.select(items),
            None => values.select_all(),
        };
        let json_bytes = to_pretty_json(&selected)?;

        let take_screenshot = screenshot.unwrap_or(self.screenshot_default);
        let capture = if take_screenshot {
            Some(self.backend.capture(values)?)
        } else {
            None
        };

        let json_path = self.session.artifact_path(next, "json");
        let png_path = capture.as_ref().map(|_| self.session.artifact_path(next, "png"));

        let mut files: Vec<(PathBuf, &[u8])> = Vec::with_capacity(2);
        if let (Some(path), Some(capture)) = (png_path.as_ref(), capture.as_ref()) {
            files.push((path.clone(), capture.image_data.as_slice()));
        }
        files.push((json_path.clone(), json_bytes.as_slice()));

        commit_files(next, &files)?;
        self.seq = next;

        tracing::debug!(seq = next, path = %json_path.display(), screenshot = take_screenshot, "snapshot recorded");

        Ok(SnapshotArtifact {
            seq: next,
            json_path,
            screenshot_path: png_path,
        })
    }

    /// Render a capture without touching the counter or the artifact directory
    pub fn capture(&mut self, values: &ValueSnapshot) -> SnapshotResult<CaptureResult> {
        self.backend.capture(values)
    }
}

/// Stage every file, then rename them into place. All or nothing.
fn commit_files(seq: u32, files: &[(PathBuf, &[u8])]) -> SnapshotResult<()> {
    let write_error = |path: &Path, source: std::io::Error| SnapshotError::ArtifactWrite {
        seq,
        path: path.to_path_buf(),
        source,
    };

    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        match write_staged(path, bytes) {
            Ok(tmp) => staged.push((tmp, path.as_path())),
            Err(source) => {
                for (tmp, _) in &staged {
                    let _ = fs::remove_file(tmp);
                }
                return Err(write_error(path.as_path(), source));
            }
        }
    }

    let mut committed: Vec<&Path> = Vec::with_capacity(staged.len());
    for (idx, (tmp, path)) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(tmp, path) {
            for done in &committed {
                let _ = fs::remove_file(done);
            }
            for (rest, _) in &staged[idx..] {
                let _ = fs::remove_file(rest);
            }
            return Err(write_error(*path, source));
        }
        committed.push(*path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionMetadata;
    use crate::snapshot::backend::ValueRenderer;
    use crate::snapshot::types::FieldSelector;
    use serde_json::json;

    fn recorder(dir: &Path, screenshot: bool) -> SnapshotRecorder {
        let session = TestSession::new(dir, "rec");
        session
            .init(&SessionMetadata::new("rec", None, screenshot, "value_panel"))
            .unwrap();
        SnapshotRecorder::new(session, screenshot, Box::new(ValueRenderer::default()))
    }

    fn values() -> ValueSnapshot {
        let mut values = ValueSnapshot::default();
        values.input.insert("n".into(), json!(1));
        values.output.insert("sum".into(), json!("1"));
        values
    }

    #[test]
    fn test_sequence_is_consecutive() {
        let tmp = tempfile::tempdir().unwrap();
        let mut rec = recorder(tmp.path(), false);

        let first = rec.record(&values(), None, None).unwrap();
        let items = SnapshotItems::default().with_input(FieldSelector::All);
        let second = rec.record(&values(), Some(&items), Some(true)).unwrap();

        assert_eq!(first.seq, 1);
        assert!(first.json_path.ends_with("001.json"));
        assert!(first.screenshot_path.is_none());
        assert_eq!(second.seq, 2);
        assert!(second.screenshot_path.as_ref().unwrap().ends_with("002.png"));
        assert_eq!(rec.count(), 2);
    }

    #[test]
    fn test_capture_does_not_count() {
        let tmp = tempfile::tempdir().unwrap();
        let mut rec = recorder(tmp.path(), true);

        rec.capture(&values()).unwrap();
        rec.capture(&values()).unwrap();

        assert_eq!(rec.count(), 0);
        assert!(rec.session().list_artifacts().unwrap().is_empty());
    }

    #[test]
    fn test_failed_write_keeps_counter() {
        let tmp = tempfile::tempdir().unwrap();
        let mut rec = recorder(tmp.path(), false);
        rec.record(&values(), None, None).unwrap();

        // A directory squatting on the next artifact name blocks the rename
        fs::create_dir_all(rec.session().artifact_path(2, "json")).unwrap();
        let err = rec.record(&values(), None, None).unwrap_err();
        assert!(matches!(err, SnapshotError::ArtifactWrite { seq: 2, .. }));
        assert_eq!(rec.count(), 1);
        assert!(!rec.session().dir.join("002.json.partial").exists());

        fs::remove_dir(rec.session().artifact_path(2, "json")).unwrap();
        let retry = rec.record(&values(), None, None).unwrap();
        assert_eq!(retry.seq, 2);
    }

    #[test]
    fn test_failed_json_rename_removes_committed_png() {
        let tmp = tempfile::tempdir().unwrap();
        let mut rec = recorder(tmp.path(), true);
        rec.record(&values(), None, None).unwrap();

        // The PNG is renamed first; the JSON rename then hits the directory
        fs::create_dir_all(rec.session().artifact_path(2, "json")).unwrap();
        let err = rec.record(&values(), None, None).unwrap_err();

        assert!(matches!(err, SnapshotError::ArtifactWrite { seq: 2, .. }));
        assert_eq!(rec.count(), 1);
        assert!(!rec.session().artifact_path(2, "png").exists());
        assert!(!rec.session().dir.join("002.png.partial").exists());
        assert!(!rec.session().dir.join("002.json.partial").exists());
        assert!(rec.session().artifact_path(1, "png").is_file());

        fs::remove_dir(rec.session().artifact_path(2, "json")).unwrap();
        let retry = rec.record(&values(), None, None).unwrap();
        assert_eq!(retry.seq, 2);
        assert!(retry.screenshot_path.unwrap().is_file());
    }
}
