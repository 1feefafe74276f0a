//! WASAPI loopback endpoint for system audio.
//!
//! Captures the mix going to the default render endpoint using
//! `AUDCLNT_STREAMFLAGS_LOOPBACK` in shared mode. No permissions needed.
//!
//! ## Notes
//! - Loopback follows the default device at open time only
//! - DRM-protected audio is silenced in loopback
//! - Packets are polled; there is no event handle

use windows::core::GUID;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use loopback_capture_core::models::format::WAVE_FORMAT_EXTENSIBLE;
use loopback_capture_core::{CaptureError, CapturedPacket, LoopbackEndpoint, MixFormat};

use crate::com::ComApartment;
use crate::device;

/// Bytes of `WAVEFORMATEXTENSIBLE` that follow the `WAVEFORMATEX` prefix.
const EXTENSIBLE_EXTRA_BYTES: u16 = 22;

/// Interfaces of an open loopback stream.
///
/// Field order is drop order: capture client, audio client, device.
struct LoopbackStream {
    capture_client: IAudioCaptureClient,
    audio_client: IAudioClient,
    device: IMMDevice,
    block_align: usize,
}

/// `LoopbackEndpoint` over the default render device.
///
/// COM objects live on the thread that opened the stream; drive the
/// endpoint (through `CaptureSession`) from that thread only.
pub struct WasapiLoopbackEndpoint {
    stream: Option<LoopbackStream>,
    com: Option<ComApartment>,
    device_name: String,
}

impl WasapiLoopbackEndpoint {
    pub fn new() -> Self {
        Self {
            stream: None,
            com: None,
            device_name: "default render endpoint".into(),
        }
    }

    fn stream(&self) -> Result<&LoopbackStream, CaptureError> {
        self.stream
            .as_ref()
            .ok_or_else(|| CaptureError::StreamFailed("loopback stream is not open".into()))
    }
}

impl Default for WasapiLoopbackEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackEndpoint for WasapiLoopbackEndpoint {
    fn initialize_threading(&mut self) -> Result<(), CaptureError> {
        if self.com.is_none() {
            self.com = Some(ComApartment::initialize()?);
        }
        Ok(())
    }

    fn uninitialize_threading(&mut self) {
        self.com = None;
    }

    fn open(&mut self, buffer_duration_hns: i64) -> Result<MixFormat, CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::ConfigurationFailed("loopback stream already open".into()));
        }

        let (stream, mix) = unsafe { open_loopback_stream(buffer_duration_hns)? };

        if let Some(name) = device::friendly_name(&stream.device) {
            self.device_name = name;
        }
        log::info!(
            "loopback stream open on {} [{}], buffer {} hns",
            self.device_name,
            device::device_id(&stream.device).unwrap_or_default(),
            buffer_duration_hns
        );

        self.stream = Some(stream);
        Ok(mix)
    }

    fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
        let stream = self.stream()?;
        unsafe { stream.capture_client.GetNextPacketSize() }
            .map_err(|e| CaptureError::StreamFailed(format!("GetNextPacketSize failed: {}", e)))
    }

    fn acquire_packet(&mut self) -> Result<CapturedPacket<'_>, CaptureError> {
        let stream = self.stream()?;

        let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
        let mut num_frames: u32 = 0;
        let mut flags: u32 = 0;

        unsafe {
            stream
                .capture_client
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                .map_err(|e| CaptureError::StreamFailed(format!("GetBuffer failed: {}", e)))?;
        }

        let data: &[u8] = if num_frames == 0 || buffer_ptr.is_null() {
            &[]
        } else {
            // SAFETY: WASAPI keeps the buffer valid until ReleaseBuffer, which
            // needs `&mut self` and therefore ends this borrow first.
            unsafe { std::slice::from_raw_parts(buffer_ptr, num_frames as usize * stream.block_align) }
        };

        Ok(CapturedPacket {
            frames: num_frames,
            data,
            silent: flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0,
            discontinuity: flags & (AUDCLNT_BUFFERFLAGS_DATA_DISCONTINUITY.0 as u32) != 0,
        })
    }

    fn release_packet(&mut self, frames: u32) -> Result<(), CaptureError> {
        let stream = self.stream()?;
        unsafe { stream.capture_client.ReleaseBuffer(frames) }
            .map_err(|e| CaptureError::StreamFailed(format!("ReleaseBuffer failed: {}", e)))
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        let stopped = unsafe { stream.audio_client.Stop() }
            .map_err(|e| CaptureError::StreamFailed(format!("IAudioClient::Stop failed: {}", e)));
        drop(stream);
        log::debug!("loopback stream on {} closed", self.device_name);
        stopped
    }

    fn describe(&self) -> String {
        self.device_name.clone()
    }
}

/// Open sequence, all-or-nothing:
/// 1. Get default render endpoint
/// 2. Activate IAudioClient
/// 3. Read the mix format
/// 4. Initialize shared mode with the LOOPBACK flag
/// 5. Get IAudioCaptureClient
/// 6. Start
///
/// Interfaces acquired before a failing step are released as the locals
/// drop.
unsafe fn open_loopback_stream(buffer_duration_hns: i64) -> Result<(LoopbackStream, MixFormat), CaptureError> {
    let device = device::default_render_device()?;

    let audio_client: IAudioClient = device
        .Activate(CLSCTX_ALL, None)
        .map_err(|e| CaptureError::ConfigurationFailed(format!("Activate failed: {}", e)))?;

    let mix_format_ptr = audio_client
        .GetMixFormat()
        .map_err(|e| CaptureError::ConfigurationFailed(format!("GetMixFormat failed: {}", e)))?;
    let mix_format_mem = CoTaskMemGuard(mix_format_ptr);
    let mix = read_mix_format(mix_format_ptr);

    audio_client
        .Initialize(
            AUDCLNT_SHAREMODE_SHARED,
            AUDCLNT_STREAMFLAGS_LOOPBACK,
            buffer_duration_hns,
            0,
            mix_format_ptr,
            None,
        )
        .map_err(|e| CaptureError::ConfigurationFailed(format!("IAudioClient::Initialize (loopback) failed: {}", e)))?;
    drop(mix_format_mem);

    let capture_client: IAudioCaptureClient = audio_client
        .GetService()
        .map_err(|e| CaptureError::ConfigurationFailed(format!("GetService failed: {}", e)))?;

    audio_client
        .Start()
        .map_err(|e| CaptureError::StreamFailed(format!("IAudioClient::Start failed: {}", e)))?;

    let stream = LoopbackStream {
        capture_client,
        audio_client,
        device,
        block_align: mix.block_align as usize,
    };
    Ok((stream, mix))
}

/// Copy the fields we need out of a `WAVEFORMATEX`, following into
/// `WAVEFORMATEXTENSIBLE` for the sub-format when the tag says so.
///
/// # Safety
/// `ptr` must point to a valid `WAVEFORMATEX` followed by `cbSize` bytes.
unsafe fn read_mix_format(ptr: *const WAVEFORMATEX) -> MixFormat {
    let format = ptr.read_unaligned();

    let sub_format = if format.wFormatTag == WAVE_FORMAT_EXTENSIBLE && format.cbSize >= EXTENSIBLE_EXTRA_BYTES {
        let extensible = ptr as *const WAVEFORMATEXTENSIBLE;
        let guid: GUID = std::ptr::addr_of!((*extensible).SubFormat).read_unaligned();
        Some(guid.to_u128())
    } else {
        None
    };

    MixFormat {
        format_tag: format.wFormatTag,
        sub_format,
        channels: format.nChannels,
        samples_per_sec: format.nSamplesPerSec,
        bits_per_sample: format.wBitsPerSample,
        block_align: format.nBlockAlign,
    }
}

/// Frees a `CoTaskMemAlloc` allocation returned by the audio engine.
struct CoTaskMemGuard(*mut WAVEFORMATEX);

impl Drop for CoTaskMemGuard {
    fn drop(&mut self) {
        unsafe {
            CoTaskMemFree(Some(self.0 as *const _));
        }
    }
}
