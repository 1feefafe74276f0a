use windows::Win32::System::Com::*;

use loopback_capture_core::CaptureError;

/// Multithreaded COM apartment for the current thread.
///
/// `CoUninitialize` runs when the value is dropped, so it must be dropped on
/// the thread that created it, after every COM interface it served.
pub struct ComApartment {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ComApartment {
    pub fn initialize() -> Result<Self, CaptureError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| CaptureError::ThreadingInitFailed(format!("CoInitializeEx failed: {}", e)))?;
        }
        log::debug!("COM initialized (multithreaded)");
        Ok(Self {
            _not_send: std::marker::PhantomData,
        })
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
        log::debug!("COM uninitialized");
    }
}
