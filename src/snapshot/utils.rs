use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::snapshot::types::SnapshotResult;

/// Width of the zero-padded sequence number in artifact names
pub const SEQ_WIDTH: usize = 3;

/// File stem for a sequence number: 1 -> "001"
pub fn artifact_stem(seq: u32) -> String {
    format!("{:0width$}", seq, width = SEQ_WIDTH)
}

/// Full artifact file name: (1, "json") -> "001.json"
pub fn artifact_filename(seq: u32, extension: &str) -> String {
    format!("{}.{}", artifact_stem(seq), extension)
}

/// Parse the sequence number back out of an artifact file name
pub fn parse_artifact_seq(filename: &str) -> Option<u32> {
    let (stem, _ext) = filename.split_once('.')?;
    if stem.len() < SEQ_WIDTH || !stem.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Pretty JSON with a trailing newline, as written to artifacts
pub fn to_pretty_json<T: Serialize>(value: &T) -> SnapshotResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Sibling path used while a file is being written
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Write bytes to the staging path of `path` and return the staging path
pub fn write_staged(path: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let staged = staging_path(path);
    fs::write(&staged, bytes)?;
    Ok(staged)
}

/// Hex digits of the name hash appended when sanitizing changed a name
const NAME_HASH_LEN: usize = 8;

/// Sanitize a name for use in directory and file names.
///
/// Names that needed rewriting get a short hash of the original appended,
/// so `"my test"` and `"my_test"` never share a directory.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();
    if cleaned == name {
        return cleaned;
    }
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    format!("{}-{}", cleaned, &digest[..NAME_HASH_LEN])
}
