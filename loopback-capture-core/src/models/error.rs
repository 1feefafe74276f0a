use thiserror::Error;

use super::state::SessionState;

/// Errors raised by a loopback capture session or its endpoint.
///
/// Platform faults (`is_platform_fault`) come from COM, device negotiation
/// or stream control and leave the session dead. Everything else is a usage
/// error reported at the call site with the session left untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("platform threading initialization failed: {0}")]
    ThreadingInitFailed(String),

    #[error("default render device not available: {0}")]
    DeviceNotAvailable(String),

    #[error("stream configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("stream control failed: {0}")]
    StreamFailed(String),

    #[error("{operation} is not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("destination holds {capacity} bytes but {required} are required")]
    BufferTooSmall { required: usize, capacity: usize },

    #[error("loopback capture is not supported on this platform")]
    UnsupportedPlatform,

    #[error("storage error: {0}")]
    StorageError(String),
}

impl CaptureError {
    /// Whether this error came from the platform audio stack rather than
    /// from the caller.
    pub fn is_platform_fault(&self) -> bool {
        matches!(
            self,
            Self::ThreadingInitFailed(_)
                | Self::DeviceNotAvailable(_)
                | Self::ConfigurationFailed(_)
                | Self::StreamFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_faults_are_classified() {
        assert!(CaptureError::StreamFailed("GetBuffer".into()).is_platform_fault());
        assert!(CaptureError::DeviceNotAvailable("none".into()).is_platform_fault());
        assert!(!CaptureError::InvalidArgument("max".into()).is_platform_fault());
        assert!(!CaptureError::BufferTooSmall { required: 8, capacity: 4 }.is_platform_fault());
        assert!(!CaptureError::UnsupportedPlatform.is_platform_fault());
    }

    #[test]
    fn invalid_state_message_names_operation_and_state() {
        let err = CaptureError::InvalidState {
            operation: "query_next_packet_frames",
            state: SessionState::Stopped,
        };
        assert_eq!(
            err.to_string(),
            "query_next_packet_frames is not allowed in state stopped"
        );
    }
}
