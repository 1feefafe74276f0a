use crate::models::config::{FaultPolicy, SessionConfig};
use crate::models::diagnostics::CaptureDiagnostics;
use crate::models::error::CaptureError;
use crate::models::format::AudioFormat;
use crate::models::state::SessionState;
use crate::traits::loopback_endpoint::{CapturedPacket, LoopbackEndpoint};

/// Outcome of copying one acquired packet into the caller's buffer.
struct PacketCopy {
    frames: u32,
    written: u32,
    silent: bool,
    discontinuity: bool,
}

/// Pull-based loopback capture session over a `LoopbackEndpoint`.
///
/// Owns every platform resource of one capture stream. The caller runs its
/// own poll loop: `query_next_packet_frames` until non-zero, then
/// `acquire_and_copy_buffer`, which acquires, copies and releases the packet
/// in one step so acquire/release can never interleave.
///
/// Not `Clone`, no internal locking: drive it from one thread. Dropping the
/// session runs the stop sequence if the caller has not, so hosts that
/// reclaim handles through a finalizer release resources exactly once.
pub struct CaptureSession<E: LoopbackEndpoint> {
    id: String,
    endpoint: E,
    config: SessionConfig,
    state: SessionState,
    format: Option<AudioFormat>,
    threading_initialized: bool,
    stream_open: bool,
    diagnostics: CaptureDiagnostics,
}

impl<E: LoopbackEndpoint> CaptureSession<E> {
    pub fn new(endpoint: E, config: SessionConfig) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::InvalidArgument)?;

        let id = uuid::Uuid::new_v4().to_string();
        log::debug!(
            "capture session {} created for {} (owns COM init: {})",
            id,
            endpoint.describe(),
            config.owns_platform_threading_init
        );

        Ok(Self {
            id,
            endpoint,
            config,
            state: SessionState::Uninitialized,
            format: None,
            threading_initialized: false,
            stream_open: false,
            diagnostics: CaptureDiagnostics::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.diagnostics
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Initialize COM for this session. Transitions: uninitialized → com_ready.
    ///
    /// Only valid when the session owns platform threading init, and at most
    /// once. `start_capture` calls it implicitly when the caller did not.
    pub fn initialize_platform_threading(&mut self) -> Result<(), CaptureError> {
        if !self.config.owns_platform_threading_init {
            return Err(CaptureError::InvalidArgument(
                "platform threading is initialized by the host for this session".into(),
            ));
        }
        if self.state != SessionState::Uninitialized {
            return Err(self.invalid_state("initialize_platform_threading"));
        }

        if let Err(e) = self.endpoint.initialize_threading() {
            return Err(self.fault(e));
        }

        self.threading_initialized = true;
        self.state = SessionState::ComReady;
        log::debug!("capture session {}: platform threading initialized", self.id);
        Ok(())
    }

    /// Open the default render endpoint in loopback mode and start the
    /// stream. Transitions: com_ready (or uninitialized) → started.
    ///
    /// Returns the negotiated format snapshot. Atomic: on failure nothing
    /// is left running and the session is faulted.
    pub fn start_capture(&mut self) -> Result<AudioFormat, CaptureError> {
        if !self.state.can_start() {
            return Err(self.invalid_state("start_capture"));
        }

        if self.state == SessionState::Uninitialized && self.config.owns_platform_threading_init {
            self.initialize_platform_threading()?;
        }

        let mix = match self.endpoint.open(self.config.buffer_duration_hns) {
            Ok(mix) => mix,
            Err(e) => return Err(self.fault(e)),
        };
        self.stream_open = true;

        let format = AudioFormat::from_mix_format(&mix);
        if !format.is_valid {
            log::warn!(
                "capture session {}: mix format is not 32-bit float (tag {:#06x}, {} bits)",
                self.id,
                mix.format_tag,
                mix.bits_per_sample
            );
        }
        log::info!(
            "capture session {} started on {}: {} Hz, {} ch, {} bits, {} bytes/frame",
            self.id,
            self.endpoint.describe(),
            format.sample_rate,
            format.channels,
            format.bits_per_sample,
            format.frame_size_bytes
        );

        self.format = Some(format);
        self.state = SessionState::Started;
        Ok(format)
    }

    /// The format snapshot captured at start.
    pub fn audio_format(&self) -> Result<AudioFormat, CaptureError> {
        match (self.state, self.format) {
            (SessionState::Stopped, _) | (_, None) => Err(self.invalid_state("audio_format")),
            (_, Some(format)) => Ok(format),
        }
    }

    /// Frames in the next pending packet, 0 when nothing is ready.
    pub fn query_next_packet_frames(&mut self) -> Result<u32, CaptureError> {
        self.require_started("query_next_packet_frames")?;

        match self.endpoint.next_packet_frames() {
            Ok(frames) => Ok(frames),
            Err(e) => Err(self.fault(e)),
        }
    }

    /// Acquire the next packet, copy it into `destination`, release it.
    ///
    /// `expected_frames` is the value from the preceding
    /// `query_next_packet_frames` and is advisory only. At most
    /// `max_frames` frames are copied; any excess is discarded and counted
    /// in `frames_dropped`. `destination` must hold at least
    /// `max_frames * frame_size_bytes` bytes and nothing beyond that prefix
    /// is written. Returns the number of frames written, possibly 0.
    pub fn acquire_and_copy_buffer(
        &mut self,
        expected_frames: u32,
        max_frames: u32,
        destination: &mut [u8],
    ) -> Result<u32, CaptureError> {
        self.require_started("acquire_and_copy_buffer")?;
        let frame_bytes = self.audio_format()?.frame_bytes();

        let required = frames_to_bytes(max_frames, frame_bytes)?;
        if destination.len() < required {
            return Err(CaptureError::BufferTooSmall {
                required,
                capacity: destination.len(),
            });
        }

        let copied = self
            .endpoint
            .acquire_packet()
            .map(|packet| copy_packet(&packet, max_frames, frame_bytes, destination));
        let copy = match copied {
            Ok(copy) => copy,
            Err(e) => return Err(self.fault(e)),
        };
        self.diagnostics.packets_acquired += 1;
        // The bytes are in `destination` whether or not the release succeeds.
        self.record_packet(expected_frames, &copy);

        // The full packet goes back to the pool, including discarded frames.
        if let Err(e) = self.endpoint.release_packet(copy.frames) {
            return Err(self.fault(e));
        }
        self.diagnostics.packets_released += 1;

        Ok(copy.written)
    }

    /// Stop the stream and release platform resources in reverse order of
    /// acquisition. Transitions: started/faulted → stopped.
    pub fn stop_capture(&mut self) -> Result<(), CaptureError> {
        if !self.state.can_stop() {
            return Err(self.invalid_state("stop_capture"));
        }

        self.teardown();
        self.state = SessionState::Stopped;
        log::info!(
            "capture session {} stopped ({} packets, {} frames delivered, {} dropped)",
            self.id,
            self.diagnostics.packets_released,
            self.diagnostics.frames_delivered,
            self.diagnostics.frames_dropped
        );
        Ok(())
    }

    // --- Internal helpers ---

    fn record_packet(&mut self, expected_frames: u32, copy: &PacketCopy) {
        let d = &mut self.diagnostics;
        d.frames_captured += copy.frames as u64;
        d.frames_delivered += copy.written as u64;
        d.frames_dropped += (copy.frames - copy.written) as u64;
        if copy.silent {
            d.silent_packets += 1;
        }
        if copy.discontinuity {
            d.discontinuities += 1;
        }
        if expected_frames != copy.frames {
            d.frame_count_mismatches += 1;
            log::trace!(
                "capture session {}: expected {} frames, platform reported {}",
                self.id,
                expected_frames,
                copy.frames
            );
        }
        if copy.written < copy.frames {
            log::debug!(
                "capture session {}: packet of {} frames truncated to {}, discarding {}",
                self.id,
                copy.frames,
                copy.written,
                copy.frames - copy.written
            );
        }
    }

    fn teardown(&mut self) {
        if self.stream_open {
            if let Err(e) = self.endpoint.close() {
                log::warn!("capture session {}: closing endpoint failed: {}", self.id, e);
            }
            self.stream_open = false;
        }
        if self.threading_initialized {
            self.endpoint.uninitialize_threading();
            self.threading_initialized = false;
        }
    }

    fn require_started(&self, operation: &'static str) -> Result<(), CaptureError> {
        if self.state.is_started() {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &'static str) -> CaptureError {
        CaptureError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Mark the session dead after a platform error and apply the fault policy.
    fn fault(&mut self, error: CaptureError) -> CaptureError {
        if !error.is_platform_fault() {
            return error;
        }

        log::error!("capture session {}: platform fault: {}", self.id, error);
        self.state = SessionState::Faulted;
        if self.config.fault_policy == FaultPolicy::Abort {
            std::process::abort();
        }
        error
    }
}

impl<E: LoopbackEndpoint> Drop for CaptureSession<E> {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if self.state.can_stop() {
            log::debug!("capture session {} released without stop_capture", self.id);
        }
        self.teardown();
        self.state = SessionState::Stopped;
    }
}

/// Byte length of `frames` frames, rejecting sizes that do not fit `usize`.
pub(crate) fn frames_to_bytes(frames: u32, frame_bytes: usize) -> Result<usize, CaptureError> {
    (frames as usize).checked_mul(frame_bytes).ok_or_else(|| {
        CaptureError::InvalidArgument(format!(
            "{} frames of {} bytes exceed the addressable buffer size",
            frames, frame_bytes
        ))
    })
}

fn copy_packet(
    packet: &CapturedPacket<'_>,
    max_frames: u32,
    frame_bytes: usize,
    destination: &mut [u8],
) -> PacketCopy {
    let mut written = packet.frames.min(max_frames);
    if !packet.silent && frame_bytes > 0 {
        // Never read past what the platform actually handed over.
        written = written.min((packet.data.len() / frame_bytes) as u32);
    }

    let bytes = written as usize * frame_bytes;
    if packet.silent {
        destination[..bytes].fill(0);
    } else {
        destination[..bytes].copy_from_slice(&packet.data[..bytes]);
    }

    PacketCopy {
        frames: packet.frames,
        written,
        silent: packet.silent,
        discontinuity: packet.discontinuity,
    }
}
