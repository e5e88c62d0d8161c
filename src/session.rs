//! Artifact namespace for one recorded test.
//!
//! Snapshots of a test named `mytest` go to `<tests_dir>/mytest-current/`.
//! A previously accepted run lives next to it in `mytest-expected/`.
//! Initializing a session clears numbered artifacts left over from an
//! earlier run so the directory only ever reflects the current script.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::snapshot::utils::{artifact_filename, parse_artifact_seq, sanitize_name};

/// Suffix of the directory written by the running script
pub const CURRENT_SUFFIX: &str = "-current";

/// Suffix of the directory holding accepted artifacts
pub const EXPECTED_SUFFIX: &str = "-expected";

/// Name of the metadata file inside a session directory
pub const METADATA_FILE: &str = ".session.json";

/// Metadata recorded alongside the artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub test_name: String,
    pub created: String,
    pub host: Option<String>,
    pub seed: Option<u64>,
    pub screenshot: bool,
    pub capture_source: String,
}

impl SessionMetadata {
    pub fn new(test_name: &str, seed: Option<u64>, screenshot: bool, capture_source: &str) -> Self {
        Self {
            test_name: test_name.to_string(),
            created: chrono::Utc::now().to_rfc3339(),
            host: hostname::get().ok().map(|h| h.to_string_lossy().into_owned()),
            seed,
            screenshot,
            capture_source: capture_source.to_string(),
        }
    }
}

/// Directory layout for one test's artifacts
#[derive(Debug, Clone)]
pub struct TestSession {
    /// Test name as given by the script
    pub name: String,
    /// Root holding every test's directories
    pub tests_dir: PathBuf,
    /// `<tests_dir>/<name>-current`
    pub dir: PathBuf,
}

impl TestSession {
    pub fn new(tests_dir: impl Into<PathBuf>, name: &str) -> Self {
        let tests_dir = tests_dir.into();
        let dir = current_dir(&tests_dir, name);
        Self {
            name: name.to_string(),
            tests_dir,
            dir,
        }
    }

    /// Directory of the accepted artifacts for this test
    pub fn expected_dir(&self) -> PathBuf {
        expected_dir(&self.tests_dir, &self.name)
    }

    /// Create the directory, drop stale artifacts and write metadata
    pub fn init(&self, metadata: &SessionMetadata) -> std::io::Result<usize> {
        fs::create_dir_all(&self.dir)?;

        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_artifact = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_artifact_seq)
                .is_some();
            if is_artifact && path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }

        let metadata_path = self.dir.join(METADATA_FILE);
        fs::write(metadata_path, serde_json::to_string_pretty(metadata)?)?;

        Ok(removed)
    }

    /// Path for an artifact with the given sequence number and extension
    pub fn artifact_path(&self, seq: u32, extension: &str) -> PathBuf {
        self.dir.join(artifact_filename(seq, extension))
    }

    /// List all numbered artifacts, sorted by name
    pub fn list_artifacts(&self) -> std::io::Result<Vec<PathBuf>> {
        list_artifacts(&self.dir)
    }
}

pub fn current_dir(tests_dir: &Path, name: &str) -> PathBuf {
    tests_dir.join(format!("{}{}", sanitize_name(name), CURRENT_SUFFIX))
}

pub fn expected_dir(tests_dir: &Path, name: &str) -> PathBuf {
    tests_dir.join(format!("{}{}", sanitize_name(name), EXPECTED_SUFFIX))
}

/// Numbered artifacts (`NNN.json`, `NNN.png`) in a directory, sorted
pub fn list_artifacts(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if path.is_file() && parse_artifact_seq(name).is_some() && !name.ends_with(".partial") {
                artifacts.push(path);
            }
        }
    }
    artifacts.sort();
    Ok(artifacts)
}
