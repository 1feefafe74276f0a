use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingSummary;

/// Sidecar path for a recording: `capture.wav` → `capture.summary.json`.
pub fn summary_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("summary.json")
}

/// Write a recording summary as a JSON sidecar file.
pub fn write_summary(summary: &RecordingSummary, recording_path: &Path) -> Result<PathBuf, CaptureError> {
    let path = summary_path(recording_path);
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize summary: {}", e)))?;
    fs::write(&path, json).map_err(|e| CaptureError::StorageError(format!("failed to write summary: {}", e)))?;
    Ok(path)
}
