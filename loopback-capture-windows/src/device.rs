//! Default render endpoint lookup via the MMDevice API.

use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use loopback_capture_core::CaptureError;

/// The default console render endpoint, the device loopback reads from.
///
/// Requires COM to be initialized on the calling thread. The enumerator is
/// released as soon as the device is resolved.
pub fn default_render_device() -> Result<IMMDevice, CaptureError> {
    unsafe {
        let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
            .map_err(|e| CaptureError::DeviceNotAvailable(format!("failed to create enumerator: {}", e)))?;

        enumerator
            .GetDefaultAudioEndpoint(eRender, eConsole)
            .map_err(|e| CaptureError::DeviceNotAvailable(format!("GetDefaultAudioEndpoint failed: {}", e)))
    }
}

/// Read `PKEY_Device_FriendlyName` from a device's property store.
pub fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
        let name = value.to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// Endpoint ID string of a device, for logs.
pub fn device_id(device: &IMMDevice) -> Option<String> {
    unsafe {
        let id = device.GetId().ok()?;
        let text = id.to_string().ok();
        CoTaskMemFree(Some(id.0 as *const _));
        text
    }
}
