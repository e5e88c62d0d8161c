pub mod backend;
pub mod recorder;
pub mod types;
pub mod utils;

pub use backend::{CaptureBackend, CaptureResult, Framebuffer, ValueRenderer};
pub use recorder::SnapshotRecorder;
pub use types::{
    FieldSelector, SelectedValues, SnapshotArtifact, SnapshotError, SnapshotItems, SnapshotResult, ValueMap,
    ValueSnapshot,
};
pub use utils::{artifact_filename, artifact_stem, sanitize_name};
