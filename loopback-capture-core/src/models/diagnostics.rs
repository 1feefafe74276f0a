use serde::{Deserialize, Serialize};

/// Counters kept by a capture session for debugging the buffer handoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDiagnostics {
    pub packets_acquired: u64,
    pub packets_released: u64,
    /// Frames reported by the platform at acquisition time.
    pub frames_captured: u64,
    /// Frames copied into caller buffers.
    pub frames_delivered: u64,
    /// Frames discarded because the caller's buffer was too small.
    pub frames_dropped: u64,
    pub silent_packets: u64,
    pub discontinuities: u64,
    /// Acquisitions whose frame count differed from the caller's expectation.
    pub frame_count_mismatches: u64,
}

impl CaptureDiagnostics {
    /// Whether any captured audio was thrown away by truncation.
    pub fn has_overrun(&self) -> bool {
        self.frames_dropped > 0
    }
}
