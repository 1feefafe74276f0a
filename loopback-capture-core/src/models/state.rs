use std::fmt;

use serde::Serialize;

/// Capture session lifecycle.
///
/// State transitions:
/// ```text
/// uninitialized → com_ready → started → stopped
///        └──────────────────────┘  ↓
///                               faulted → stopped
/// ```
///
/// `uninitialized → started` is taken directly when the embedding host
/// already initialized COM. Any state can reach `faulted` on a platform
/// error; `stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    ComReady,
    Started,
    Faulted,
    Stopped,
}

impl SessionState {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Whether a start is still possible from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::ComReady)
    }

    /// Whether stop has platform resources to tear down from this state.
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::Started | Self::Faulted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::ComReady => "com_ready",
            Self::Started => "started",
            Self::Faulted => "faulted",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
