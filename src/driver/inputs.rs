//! Input batch validation and upload payloads.

use base64::Engine;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::path::{Component, Path};

use super::types::{DriverError, DriverResult};
use crate::app::InputAssignment;

/// Reject empty names and names assigned twice in one batch
pub fn validate_batch(inputs: &[InputAssignment]) -> DriverResult<()> {
    let mut seen = BTreeSet::new();
    for assignment in inputs {
        if assignment.name.trim().is_empty() {
            return Err(DriverError::InvalidInput("input name must not be empty".to_string()));
        }
        if !seen.insert(assignment.name.as_str()) {
            return Err(DriverError::InvalidInput(format!(
                "input '{}' is assigned more than once in one call",
                assignment.name
            )));
        }
    }
    Ok(())
}

/// Check that an upload name refers to a file directly inside the fixtures directory
pub fn validate_upload_name(filename: &str) -> DriverResult<()> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !filename.contains(['/', '\\']) => Ok(()),
        _ => Err(DriverError::InvalidInput(format!(
            "upload file must be a bare file name, got '{}'",
            filename
        ))),
    }
}

/// MIME type from a file extension, `application/octet-stream` when unknown
pub fn guess_mime(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Read a fixture and build the value sent to a file input
pub fn upload_payload(fixtures_dir: &Path, filename: &str) -> DriverResult<Value> {
    validate_upload_name(filename)?;
    let path = fixtures_dir.join(filename);
    let bytes = std::fs::read(&path).map_err(|source| DriverError::UploadFile { path, source })?;

    Ok(json!({
        "name": filename,
        "size": bytes.len(),
        "type": guess_mime(filename),
        "content": base64::engine::general_purpose::STANDARD.encode(&bytes),
    }))
}
