use serde::{Deserialize, Serialize};

use super::diagnostics::CaptureDiagnostics;
use super::format::AudioFormat;

/// Output container written by a recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingContainer {
    /// 32-bit float WAV (format code 3).
    Wav,
    /// Headerless interleaved f32le, as produced by the raw capture buffers.
    Raw,
}

/// Summary of a finished recording, stored as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub container: RecordingContainer,
    pub format: AudioFormat,
    pub frames_written: u64,
    pub duration_secs: f64,
    pub diagnostics: CaptureDiagnostics,
}

impl RecordingSummary {
    pub fn new(
        file_path: &str,
        container: RecordingContainer,
        format: AudioFormat,
        frames_written: u64,
        diagnostics: CaptureDiagnostics,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: file_path.to_string(),
            container,
            format,
            frames_written,
            duration_secs: format.frames_to_secs(frames_written),
            diagnostics,
        }
    }
}
