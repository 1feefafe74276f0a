//! # loopback-capture-node
//!
//! N-API surface over `CaptureSession`. Each session lives in a napi
//! `External`; when the JS object is collected the finalizer drops the
//! session, and `CaptureSession`'s `Drop` stops a still-running stream.
//!
//! Arguments arrive untyped and are checked here, so usage errors (wrong
//! state, a bad handle, wrong argument types) are logged and surface as
//! `null`. Platform faults surface as thrown errors when the session was
//! created with `faultPolicy: "throw"`; under the default `"abort"` policy
//! they terminate the process.

use napi::bindgen_prelude::*;
use napi::{Env, JsArrayBuffer, JsArrayBufferValue, JsNumber, JsUnknown, NapiRaw, ValueType};
use napi_derive::napi;

use loopback_capture_core::{
    frame_count_from_number, AudioFormat, CaptureDiagnostics, CaptureError, CaptureSession, FaultPolicy,
    LoopbackEndpoint, SessionConfig,
};

mod logging;

/// Options accepted by `createSession`. Every field is optional.
#[napi(object)]
pub struct SessionOptions {
    /// False when the host already initialized COM on this thread (Electron).
    pub owns_platform_threading_init: Option<bool>,
    pub buffer_duration_ms: Option<u32>,
    /// `"abort"` (default) or `"throw"`.
    pub fault_policy: Option<String>,
}

#[napi(object)]
pub struct AudioFormatInfo {
    pub is_valid: bool,
    pub frame_size_bytes: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    pub sample_rate: u32,
}

impl From<AudioFormat> for AudioFormatInfo {
    fn from(format: AudioFormat) -> Self {
        Self {
            is_valid: format.is_valid,
            frame_size_bytes: format.frame_size_bytes,
            channels: format.channels,
            bits_per_sample: format.bits_per_sample,
            sample_rate: format.sample_rate,
        }
    }
}

/// Session counters. Numbers are JS doubles.
#[napi(object)]
pub struct DiagnosticsInfo {
    pub session_id: String,
    pub state: String,
    pub packets_acquired: f64,
    pub packets_released: f64,
    pub frames_captured: f64,
    pub frames_delivered: f64,
    pub frames_dropped: f64,
    pub silent_packets: f64,
    pub discontinuities: f64,
    pub frame_count_mismatches: f64,
}

impl DiagnosticsInfo {
    fn new(session: &CaptureSession<Box<dyn LoopbackEndpoint>>) -> Self {
        let CaptureDiagnostics {
            packets_acquired,
            packets_released,
            frames_captured,
            frames_delivered,
            frames_dropped,
            silent_packets,
            discontinuities,
            frame_count_mismatches,
        } = session.diagnostics();

        Self {
            session_id: session.id().to_string(),
            state: session.state().to_string(),
            packets_acquired: packets_acquired as f64,
            packets_released: packets_released as f64,
            frames_captured: frames_captured as f64,
            frames_delivered: frames_delivered as f64,
            frames_dropped: frames_dropped as f64,
            silent_packets: silent_packets as f64,
            discontinuities: discontinuities as f64,
            frame_count_mismatches: frame_count_mismatches as f64,
        }
    }
}

/// Opaque per-stream state held by the JS `External`.
pub struct SessionHandle {
    session: CaptureSession<Box<dyn LoopbackEndpoint>>,
}

#[cfg(target_os = "windows")]
fn platform_endpoint() -> std::result::Result<Box<dyn LoopbackEndpoint>, CaptureError> {
    Ok(Box::new(loopback_capture_windows::WasapiLoopbackEndpoint::new()))
}

#[cfg(not(target_os = "windows"))]
fn platform_endpoint() -> std::result::Result<Box<dyn LoopbackEndpoint>, CaptureError> {
    Err(CaptureError::UnsupportedPlatform)
}

fn session_config(options: Option<SessionOptions>) -> std::result::Result<SessionConfig, CaptureError> {
    let mut config = SessionConfig::default();
    let Some(options) = options else {
        return Ok(config);
    };

    if let Some(owns) = options.owns_platform_threading_init {
        config.owns_platform_threading_init = owns;
    }
    if let Some(millis) = options.buffer_duration_ms {
        config.buffer_duration_hns = SessionConfig::hns_from_millis(millis);
    }
    if let Some(policy) = options.fault_policy.as_deref() {
        config.fault_policy = policy.parse::<FaultPolicy>().map_err(CaptureError::InvalidArgument)?;
    }
    Ok(config)
}

/// Map a core result onto the boundary convention: usage errors become
/// `null`, platform faults become thrown errors.
fn settle<T>(operation: &str, result: std::result::Result<T, CaptureError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_platform_fault() => {
            tracing::error!(operation, error = %e, "platform fault");
            Err(Error::from_reason(format!("{}: {}", operation, e)))
        }
        Err(e) => {
            tracing::error!(operation, error = %e, "rejected");
            Ok(None)
        }
    }
}

/// Borrow the session behind a handle passed from JS. Anything other than
/// an `External` created by `createSession` is a usage error.
fn session_handle(env: &Env, value: &JsUnknown) -> std::result::Result<&'static mut SessionHandle, CaptureError> {
    let mut external = unsafe { External::<SessionHandle>::from_napi_value(env.raw(), value.raw()) }
        .map_err(|_| CaptureError::InvalidArgument("handle is not a capture session".into()))?;
    // The session lives in the JS-owned external; reborrow it past the local wrapper.
    Ok(unsafe { &mut *(&mut *external as *mut SessionHandle) })
}

fn frame_count(name: &str, value: &JsUnknown) -> std::result::Result<u32, CaptureError> {
    let not_a_number = || CaptureError::InvalidArgument(format!("{} must be a number", name));
    if value.get_type().map_err(|_| not_a_number())? != ValueType::Number {
        return Err(not_a_number());
    }
    let number = unsafe { value.cast::<JsNumber>() }
        .get_double()
        .map_err(|_| not_a_number())?;
    frame_count_from_number(name, number)
}

/// Writable bytes handed in by the caller: an `ArrayBuffer`, or a
/// `Uint8Array`/`Buffer` view.
enum Destination {
    Buffer(JsArrayBufferValue),
    View(Uint8Array),
}

impl Destination {
    fn from_js(env: &Env, value: &JsUnknown) -> std::result::Result<Self, CaptureError> {
        let invalid = || CaptureError::InvalidArgument("destination must be an ArrayBuffer or Uint8Array".into());

        let mut is_arraybuffer = false;
        let status = unsafe { napi::sys::napi_is_arraybuffer(env.raw(), value.raw(), &mut is_arraybuffer) };
        if status == napi::sys::Status::napi_ok && is_arraybuffer {
            let buffer = unsafe { value.cast::<JsArrayBuffer>() }
                .into_value()
                .map_err(|_| invalid())?;
            return Ok(Self::Buffer(buffer));
        }
        if value.is_typedarray().unwrap_or(false) {
            let view = unsafe { Uint8Array::from_napi_value(env.raw(), value.raw()) }.map_err(|_| invalid())?;
            return Ok(Self::View(view));
        }
        Err(invalid())
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Buffer(buffer) => &mut buffer[..],
            Self::View(view) => &mut view[..],
        }
    }
}

/// Install a `tracing` subscriber for the addon's logs. `filter` uses
/// `RUST_LOG` syntax; without it `RUST_LOG` is read, falling back to `info`.
#[napi]
pub fn init_logging(filter: Option<String>) {
    logging::init(filter.as_deref());
}

/// Create a session for the default render endpoint. Nothing is opened
/// until `startCapture`.
#[napi]
pub fn create_session(options: Option<SessionOptions>) -> Option<External<SessionHandle>> {
    let created = session_config(options)
        .and_then(|config| platform_endpoint().and_then(|endpoint| CaptureSession::new(endpoint, config)));

    match created {
        Ok(session) => {
            tracing::debug!(session_id = session.id(), "session created");
            Some(External::new(SessionHandle { session }))
        }
        Err(e) => {
            tracing::error!(error = %e, "createSession rejected");
            None
        }
    }
}

#[napi]
pub fn initialize_platform_threading(env: Env, handle: JsUnknown) -> Result<Option<bool>> {
    let result = session_handle(&env, &handle)
        .and_then(|h| h.session.initialize_platform_threading())
        .map(|_| true);
    settle("initializePlatformThreading", result)
}

#[napi]
pub fn start_capture(env: Env, handle: JsUnknown) -> Result<Option<bool>> {
    let result = session_handle(&env, &handle)
        .and_then(|h| h.session.start_capture())
        .map(|_| true);
    settle("startCapture", result)
}

#[napi]
pub fn get_audio_format(env: Env, handle: JsUnknown) -> Result<Option<AudioFormatInfo>> {
    let result = session_handle(&env, &handle)
        .and_then(|h| h.session.audio_format())
        .map(AudioFormatInfo::from);
    settle("getAudioFormat", result)
}

/// Frames in the next pending packet; 0 when nothing is ready.
#[napi]
pub fn query_next_packet_frames(env: Env, handle: JsUnknown) -> Result<Option<u32>> {
    let result = session_handle(&env, &handle).and_then(|h| h.session.query_next_packet_frames());
    settle("queryNextPacketFrames", result)
}

/// Copy the next packet into `destination` and release it. Returns frames
/// written; `destination` (an `ArrayBuffer` or `Uint8Array`) must hold
/// `maxFrameCount * frameSizeBytes` bytes.
#[napi]
pub fn acquire_and_copy_buffer(
    env: Env,
    handle: JsUnknown,
    expected_frame_count: JsUnknown,
    max_frame_count: JsUnknown,
    destination: JsUnknown,
) -> Result<Option<u32>> {
    let result = session_handle(&env, &handle).and_then(|h| {
        let expected = frame_count("expectedFrameCount", &expected_frame_count)?;
        let max = frame_count("maxFrameCount", &max_frame_count)?;
        let mut destination = Destination::from_js(&env, &destination)?;
        h.session.acquire_and_copy_buffer(expected, max, destination.bytes_mut())
    });
    settle("acquireAndCopyBuffer", result)
}

#[napi]
pub fn stop_capture(env: Env, handle: JsUnknown) -> Result<Option<bool>> {
    let result = session_handle(&env, &handle)
        .and_then(|h| h.session.stop_capture())
        .map(|_| true);
    settle("stopCapture", result)
}

#[napi]
pub fn get_diagnostics(env: Env, handle: JsUnknown) -> Result<Option<DiagnosticsInfo>> {
    let result = session_handle(&env, &handle).map(|h| DiagnosticsInfo::new(&h.session));
    settle("getDiagnostics", result)
}
