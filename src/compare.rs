//! Comparing a run's artifacts with the accepted ones.
//!
//! JSON artifacts are compared as parsed values so formatting changes do
//! not count as differences. Everything else is compared byte for byte.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::session::{current_dir, expected_dir, list_artifacts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Only in the current run
    Added,
    /// Only in the accepted artifacts
    Missing,
    /// In both, with different content
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub file: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareReport {
    pub expected_dir: PathBuf,
    pub current_dir: PathBuf,
    /// Number of artifacts that matched exactly
    pub unchanged: usize,
    pub changes: Vec<FileChange>,
}

impl CompareReport {
    pub fn is_match(&self) -> bool {
        self.changes.is_empty()
    }
}

fn file_names(dir: &Path) -> std::io::Result<Vec<String>> {
    Ok(list_artifacts(dir)?
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect())
}

fn same_content(expected: &Path, current: &Path) -> std::io::Result<bool> {
    let a = fs::read(expected)?;
    let b = fs::read(current)?;
    let is_json = expected.extension().and_then(|e| e.to_str()) == Some("json");
    if is_json {
        let parsed = (
            serde_json::from_slice::<serde_json::Value>(&a),
            serde_json::from_slice::<serde_json::Value>(&b),
        );
        if let (Ok(va), Ok(vb)) = parsed {
            return Ok(va == vb);
        }
    }
    Ok(a == b)
}

/// Compare the numbered artifacts of two directories
pub fn compare_dirs(expected: &Path, current: &Path) -> std::io::Result<CompareReport> {
    let expected_files = file_names(expected)?;
    let current_files = file_names(current)?;

    let mut report = CompareReport {
        expected_dir: expected.to_path_buf(),
        current_dir: current.to_path_buf(),
        ..Default::default()
    };

    for file in &expected_files {
        if !current_files.contains(file) {
            report.changes.push(FileChange {
                file: file.clone(),
                kind: ChangeKind::Missing,
            });
        } else if same_content(&expected.join(file), &current.join(file))? {
            report.unchanged += 1;
        } else {
            report.changes.push(FileChange {
                file: file.clone(),
                kind: ChangeKind::Changed,
            });
        }
    }
    for file in current_files.iter().filter(|f| !expected_files.contains(f)) {
        report.changes.push(FileChange {
            file: file.clone(),
            kind: ChangeKind::Added,
        });
    }
    report.changes.sort_by(|a, b| a.file.cmp(&b.file));

    Ok(report)
}

/// Compare `<name>-current` against `<name>-expected` under `tests_dir`
pub fn compare_test(tests_dir: &Path, name: &str) -> std::io::Result<CompareReport> {
    compare_dirs(&expected_dir(tests_dir, name), &current_dir(tests_dir, name))
}

/// Make the current run the accepted one. Returns the new expected directory.
pub fn accept(tests_dir: &Path, name: &str) -> std::io::Result<PathBuf> {
    let current = current_dir(tests_dir, name);
    let expected = expected_dir(tests_dir, name);
    if !current.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no current run at {}", current.display()),
        ));
    }

    if expected.exists() {
        fs::remove_dir_all(&expected)?;
    }
    fs::create_dir_all(&expected)?;
    for path in list_artifacts(&current)? {
        if let Some(file) = path.file_name() {
            fs::copy(&path, expected.join(file))?;
        }
    }

    tracing::info!(test = name, dir = %expected.display(), "accepted current snapshots");
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, file: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_compare_reports_each_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let expected = tmp.path().join("t-expected");
        let current = tmp.path().join("t-current");

        write(&expected, "001.json", "{\"output\": {\"a\": 1}}");
        write(&current, "001.json", "{\n  \"output\": {\n    \"a\": 1\n  }\n}\n");
        write(&expected, "002.json", "{\"output\": {\"a\": 1}}");
        write(&current, "002.json", "{\"output\": {\"a\": 2}}");
        write(&expected, "003.json", "{}");
        write(&current, "004.json", "{}");

        let report = compare_dirs(&expected, &current).unwrap();
        assert_eq!(report.unchanged, 1);
        assert_eq!(
            report.changes,
            vec![
                FileChange {
                    file: "002.json".into(),
                    kind: ChangeKind::Changed
                },
                FileChange {
                    file: "003.json".into(),
                    kind: ChangeKind::Missing
                },
                FileChange {
                    file: "004.json".into(),
                    kind: ChangeKind::Added
                },
            ]
        );
        assert!(!report.is_match());
    }

    #[test]
    fn test_accept_replaces_expected() {
        let tmp = tempfile::tempdir().unwrap();
        write(&current_dir(tmp.path(), "t"), "001.json", "{}");
        write(&expected_dir(tmp.path(), "t"), "009.json", "{}");

        let expected = accept(tmp.path(), "t").unwrap();
        assert!(expected.join("001.json").exists());
        assert!(!expected.join("009.json").exists());
        assert!(compare_test(tmp.path(), "t").unwrap().is_match());
    }

    #[test]
    fn test_accept_without_current_run() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(accept(tmp.path(), "nothing").is_err());
    }
}
