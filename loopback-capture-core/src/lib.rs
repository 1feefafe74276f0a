//! # loopback-capture-core
//!
//! Platform-agnostic core of the loopback capture addon.
//!
//! Holds the capture session state machine and the buffer handoff protocol.
//! The platform backend (Windows WASAPI) implements the `LoopbackEndpoint`
//! trait and plugs into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! loopback-capture-core (this crate)
//! ├── traits/       ← LoopbackEndpoint, CapturedPacket
//! ├── models/       ← CaptureError, SessionState, SessionConfig, AudioFormat, diagnostics
//! ├── session/      ← CaptureSession (state machine), drain pump, host argument checks
//! ├── processing/   ← WAV header generation
//! └── storage/      ← RecordingWriter, JSON summary sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{FaultPolicy, SessionConfig, DEFAULT_BUFFER_DURATION_HNS};
pub use models::diagnostics::CaptureDiagnostics;
pub use models::error::CaptureError;
pub use models::format::{AudioFormat, MixFormat, SampleEncoding};
pub use models::recording_result::{RecordingContainer, RecordingSummary};
pub use models::state::SessionState;
pub use session::capture_session::CaptureSession;
pub use session::host_args::frame_count_from_number;
pub use session::pump::{drain_pending, DEFAULT_HEADROOM};
pub use storage::recording_writer::RecordingWriter;
pub use traits::loopback_endpoint::{CapturedPacket, LoopbackEndpoint};
