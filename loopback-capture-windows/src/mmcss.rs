use windows::core::w;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::Threading::{AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW};

/// MMCSS "Pro Audio" registration of the current thread, reverted on drop.
///
/// Only for threads dedicated to polling capture buffers, never for a
/// host's main thread.
pub struct MmcssRegistration {
    handle: HANDLE,
}

impl MmcssRegistration {
    pub fn pro_audio() -> Option<Self> {
        let mut task_index: u32 = 0;
        match unsafe { AvSetMmThreadCharacteristicsW(w!("Pro Audio"), &mut task_index) } {
            Ok(handle) => {
                log::debug!("registered capture thread with MMCSS (task index {})", task_index);
                Some(Self { handle })
            }
            Err(e) => {
                log::warn!("MMCSS registration failed: {}", e);
                None
            }
        }
    }
}

impl Drop for MmcssRegistration {
    fn drop(&mut self) {
        if let Err(e) = unsafe { AvRevertMmThreadCharacteristics(self.handle) } {
            log::warn!("reverting MMCSS registration failed: {}", e);
        }
    }
}
