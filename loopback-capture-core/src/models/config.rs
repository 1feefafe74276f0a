use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Shared-mode loopback buffer duration: one second in 100ns units.
pub const DEFAULT_BUFFER_DURATION_HNS: i64 = 10_000_000;

/// What a session does when the platform audio stack fails underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Log and abort the process. Hosts must supervise and restart.
    #[default]
    Abort,
    /// Return the error and leave the session faulted.
    Propagate,
}

impl FromStr for FaultPolicy {
    type Err = String;

    /// Accepts `abort`, and `propagate` or its host-facing alias `throw`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "propagate" | "throw" => Ok(Self::Propagate),
            other => Err(format!("unknown fault policy '{}' (expected abort or throw)", other)),
        }
    }
}

/// Configuration for a loopback capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Whether this session owns COM initialization on its thread.
    ///
    /// Must be false inside hosts that initialize COM themselves (Electron
    /// does); initializing twice there is undefined upstream.
    pub owns_platform_threading_init: bool,

    /// Requested shared-mode buffer duration in 100ns units (default: 1s).
    pub buffer_duration_hns: i64,

    /// Handling of platform faults (default: abort).
    pub fault_policy: FaultPolicy,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_duration_hns <= 0 {
            return Err(format!(
                "buffer duration must be positive, got {}",
                self.buffer_duration_hns
            ));
        }
        Ok(())
    }

    pub fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    /// Converts a duration in milliseconds to 100ns units.
    pub fn hns_from_millis(millis: u32) -> i64 {
        millis as i64 * 10_000
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            owns_platform_threading_init: true,
            buffer_duration_hns: DEFAULT_BUFFER_DURATION_HNS,
            fault_policy: FaultPolicy::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_one_second_buffer() {
        let config = SessionConfig::default();
        assert_eq!(config.buffer_duration_hns, 10_000_000);
        assert!(config.owns_platform_threading_init);
        assert_eq!(config.fault_policy, FaultPolicy::Abort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_buffer_duration() {
        let config = SessionConfig {
            buffer_duration_hns: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "owns_platform_threading_init": false, "fault_policy": "propagate" }"#)
                .unwrap();
        assert!(!config.owns_platform_threading_init);
        assert_eq!(config.fault_policy, FaultPolicy::Propagate);
        assert_eq!(config.buffer_duration_hns, DEFAULT_BUFFER_DURATION_HNS);
    }

    #[test]
    fn fault_policy_parses_host_names() {
        assert_eq!("abort".parse::<FaultPolicy>(), Ok(FaultPolicy::Abort));
        assert_eq!("throw".parse::<FaultPolicy>(), Ok(FaultPolicy::Propagate));
        assert_eq!(" Propagate ".parse::<FaultPolicy>(), Ok(FaultPolicy::Propagate));
        assert!("retry".parse::<FaultPolicy>().is_err());
    }

    #[test]
    fn millis_convert_to_hns() {
        assert_eq!(SessionConfig::hns_from_millis(1000), DEFAULT_BUFFER_DURATION_HNS);
    }
}
