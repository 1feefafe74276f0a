//! # loopback-capture-windows
//!
//! Windows WASAPI backend for loopback-capture.
//!
//! Provides:
//! - `WasapiLoopbackEndpoint`: `LoopbackEndpoint` over the default render endpoint in loopback mode
//! - `ComApartment`: RAII multithreaded COM initialization
//! - `device`: default render device lookup and friendly name
//! - `MmcssRegistration`: "Pro Audio" thread priority for dedicated capture threads
//!
//! ## Usage
//! ```ignore
//! use loopback_capture_core::{CaptureSession, SessionConfig};
//! use loopback_capture_windows::WasapiLoopbackEndpoint;
//!
//! let mut session = CaptureSession::new(WasapiLoopbackEndpoint::new(), SessionConfig::default())?;
//! let format = session.start_capture()?;
//! ```

#[cfg(target_os = "windows")]
pub mod com;
#[cfg(target_os = "windows")]
pub mod device;
#[cfg(target_os = "windows")]
pub mod mmcss;
#[cfg(target_os = "windows")]
pub mod wasapi_loopback;

#[cfg(target_os = "windows")]
pub use com::ComApartment;
#[cfg(target_os = "windows")]
pub use mmcss::MmcssRegistration;
#[cfg(target_os = "windows")]
pub use wasapi_loopback::WasapiLoopbackEndpoint;
