// Core types for value snapshots and their artifacts

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Name → value mapping for one field of a snapshot. Sorted for stable output.
pub type ValueMap = BTreeMap<String, Value>;

/// Current inputs, outputs and exports of a live application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    #[serde(default)]
    pub input: ValueMap,
    #[serde(default)]
    pub output: ValueMap,
    #[serde(default)]
    pub export: ValueMap,
}

impl ValueSnapshot {
    /// Keep only the parts of the snapshot the selection asks for
    pub fn select(&self, items: &SnapshotItems) -> SelectedValues {
        SelectedValues {
            input: items.input.apply(&self.input),
            output: items.output.apply(&self.output),
            export: items.export.apply(&self.export),
        }
    }

    /// Everything, as written by a snapshot without `items`
    pub fn select_all(&self) -> SelectedValues {
        self.select(&SnapshotItems::all())
    }
}

/// The structured content of one artifact. Excluded fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<ValueMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ValueMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ValueMap>,
}

/// Per-field selection: everything, nothing, or a fixed set of names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSelector", into = "RawSelector")]
pub enum FieldSelector {
    All,
    #[default]
    None,
    Names(BTreeSet<String>),
}

impl FieldSelector {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSelector::Names(names.into_iter().map(Into::into).collect())
    }

    fn apply(&self, values: &ValueMap) -> Option<ValueMap> {
        match self {
            FieldSelector::All => Some(values.clone()),
            FieldSelector::None => None,
            FieldSelector::Names(names) => {
                for missing in names.iter().filter(|n| !values.contains_key(*n)) {
                    tracing::debug!(name = %missing, "selected name is not defined by the application");
                }
                Some(
                    values
                        .iter()
                        .filter(|(k, _)| names.contains(*k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                )
            }
        }
    }
}

/// Script-facing shape: `true`, `false`, `"name"` or `["a", "b"]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Flag(bool),
    One(String),
    Many(Vec<String>),
}

impl From<RawSelector> for FieldSelector {
    fn from(raw: RawSelector) -> Self {
        match raw {
            RawSelector::Flag(true) => FieldSelector::All,
            RawSelector::Flag(false) => FieldSelector::None,
            RawSelector::One(name) => FieldSelector::names([name]),
            RawSelector::Many(names) => FieldSelector::names(names),
        }
    }
}

impl From<FieldSelector> for RawSelector {
    fn from(selector: FieldSelector) -> Self {
        match selector {
            FieldSelector::All => RawSelector::Flag(true),
            FieldSelector::None => RawSelector::Flag(false),
            FieldSelector::Names(names) => RawSelector::Many(names.into_iter().collect()),
        }
    }
}

/// Which portion of the values a snapshot persists.
///
/// An explicitly supplied selection starts with every field excluded;
/// fields are switched on one at a time. Passing no selection at all to
/// `Driver::snapshot` is the same as [`SnapshotItems::all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItems {
    #[serde(default)]
    pub input: FieldSelector,
    #[serde(default)]
    pub output: FieldSelector,
    #[serde(default)]
    pub export: FieldSelector,
}

impl SnapshotItems {
    pub fn all() -> Self {
        Self {
            input: FieldSelector::All,
            output: FieldSelector::All,
            export: FieldSelector::All,
        }
    }

    pub fn with_input(mut self, selector: FieldSelector) -> Self {
        self.input = selector;
        self
    }

    pub fn with_output(mut self, selector: FieldSelector) -> Self {
        self.output = selector;
        self
    }

    pub fn with_export(mut self, selector: FieldSelector) -> Self {
        self.export = selector;
        self
    }
}

/// Files written by one counted snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotArtifact {
    /// Sequence number (1-based)
    pub seq: u32,
    /// Path to the structured JSON file
    pub json_path: PathBuf,
    /// Path to the PNG capture, when one was taken
    pub screenshot_path: Option<PathBuf>,
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Error types for snapshot operations
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Error during visual capture
    #[error("Capture error: {0}")]
    Capture(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisting a numbered artifact failed; the sequence did not advance
    #[error("Failed to write artifact {seq:03} at {}: {source}", path.display())]
    ArtifactWrite {
        seq: u32,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<image::ImageError> for SnapshotError {
    fn from(err: image::ImageError) -> Self {
        SnapshotError::Capture(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ValueSnapshot {
        let mut values = ValueSnapshot::default();
        values.input.insert("n".into(), json!(0));
        values.input.insert("add".into(), json!(4));
        values.output.insert("a".into(), json!("1"));
        values.output.insert("b".into(), json!("2"));
        values.output.insert("c".into(), json!("3"));
        values.export.insert("nums".into(), json!([4, 7, 3, 0]));
        values
    }

    #[test]
    fn explicit_names_keep_only_those_outputs() {
        let items = SnapshotItems::default().with_output(FieldSelector::names(["a", "b"]));
        let selected = sample().select(&items);
        assert!(selected.input.is_none());
        assert!(selected.export.is_none());
        let output = selected.output.unwrap();
        assert_eq!(output.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn excluded_fields_are_not_serialized() {
        let items = SnapshotItems::default().with_output(FieldSelector::All);
        let json = serde_json::to_value(sample().select(&items)).unwrap();
        assert_eq!(json, json!({ "output": { "a": "1", "b": "2", "c": "3" } }));
    }

    #[test]
    fn selector_script_grammar() {
        let items: SnapshotItems =
            serde_json::from_value(json!({ "input": true, "output": ["a", "b"], "export": false }))
                .unwrap();
        assert_eq!(items.input, FieldSelector::All);
        assert_eq!(items.output, FieldSelector::names(["a", "b"]));
        assert_eq!(items.export, FieldSelector::None);

        let single: SnapshotItems = serde_json::from_value(json!({ "export": "nums" })).unwrap();
        assert_eq!(single.export, FieldSelector::names(["nums"]));
        assert_eq!(single.input, FieldSelector::None);
    }
}
