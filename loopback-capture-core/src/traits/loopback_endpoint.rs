use crate::models::error::CaptureError;
use crate::models::format::MixFormat;

/// One pending hardware buffer, borrowed from the endpoint between
/// `acquire_packet` and `release_packet`.
#[derive(Debug)]
pub struct CapturedPacket<'a> {
    /// Authoritative frame count reported by the platform.
    pub frames: u32,
    /// Raw interleaved sample bytes, `frames * block_align` long.
    pub data: &'a [u8],
    /// The platform marked the packet as silence; `data` must be ignored.
    pub silent: bool,
    /// The platform reported a gap before this packet.
    pub discontinuity: bool,
}

/// Platform seam for loopback capture on the default render endpoint.
///
/// Mirrors the vendor capture protocol one call per step. Implemented by
/// `WasapiLoopbackEndpoint` on Windows and by scripted fakes in tests.
/// Implementations are driven from a single thread and never block beyond
/// the underlying platform call.
pub trait LoopbackEndpoint {
    /// Initialize the platform threading model (COM, multithreaded) on the
    /// calling thread.
    fn initialize_threading(&mut self) -> Result<(), CaptureError>;

    /// Undo `initialize_threading`. Called at most once, after `close`.
    fn uninitialize_threading(&mut self);

    /// Open the default render endpoint in shared loopback mode with the
    /// given buffer duration (100ns units) and start the stream.
    ///
    /// Atomic: on error every interface acquired so far is released.
    fn open(&mut self, buffer_duration_hns: i64) -> Result<MixFormat, CaptureError>;

    /// Frames in the next pending packet, 0 if none is ready.
    fn next_packet_frames(&mut self) -> Result<u32, CaptureError>;

    /// Acquire the next pending packet. Must be followed by exactly one
    /// `release_packet` before any further acquisition.
    fn acquire_packet(&mut self) -> Result<CapturedPacket<'_>, CaptureError>;

    /// Return the most recently acquired packet to the platform pool.
    fn release_packet(&mut self, frames: u32) -> Result<(), CaptureError>;

    /// Stop the stream and release capture client, audio client and device,
    /// in that order.
    fn close(&mut self) -> Result<(), CaptureError>;

    /// Human-readable endpoint name for logs.
    fn describe(&self) -> String {
        "default render endpoint".into()
    }
}

impl<E: LoopbackEndpoint + ?Sized> LoopbackEndpoint for Box<E> {
    fn initialize_threading(&mut self) -> Result<(), CaptureError> {
        (**self).initialize_threading()
    }

    fn uninitialize_threading(&mut self) {
        (**self).uninitialize_threading()
    }

    fn open(&mut self, buffer_duration_hns: i64) -> Result<MixFormat, CaptureError> {
        (**self).open(buffer_duration_hns)
    }

    fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
        (**self).next_packet_frames()
    }

    fn acquire_packet(&mut self) -> Result<CapturedPacket<'_>, CaptureError> {
        (**self).acquire_packet()
    }

    fn release_packet(&mut self, frames: u32) -> Result<(), CaptureError> {
        (**self).release_packet(frames)
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
