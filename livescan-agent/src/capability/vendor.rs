//! Vendor SDK backend
//!
//! Safe wrapper around the scanner vendor's libraries:
//! - `GALSXXYY`: live-scan device (init, raw frame capture)
//! - `Gamc`: mosaic algorithm (init, frame quality)
//! - `FpSplit`: slap segmentation
//! - `ZAZ_FpStdLib`: ISO template creation and comparison
//!
//! The libraries use the platform system calling convention and are linked
//! by name; `LIVESCAN_VENDOR_LIB_DIR` adds a search path at build time.
//!
//! # Safety
//! Every FFI call receives buffers sized exactly as the SDK documents them;
//! no pointer handed to the SDK outlives the call.

use super::{
    CapabilityError, FrameSize, Scanner, SplitFinger, MAX_SEGMENTS, SLAP_FRAME, SPLIT_HEIGHT,
    SPLIT_WIDTH, TEMPLATE_SIZE,
};
use std::os::raw::c_int;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;
use tracing::{debug, error, info};

#[allow(non_snake_case)]
mod ffi {
    use std::os::raw::c_int;

    /// Per-finger output record filled by `FPSPLIT_DoSplit`
    #[repr(C, packed)]
    pub struct FpSplitInfo {
        pub x: c_int,
        pub y: c_int,
        pub top: c_int,
        pub left: c_int,
        pub angle: c_int,
        pub quality: c_int,
        pub out_buf: *mut u8,
    }

    #[link(name = "GALSXXYY")]
    extern "system" {
        pub fn LIVESCAN_Init() -> c_int;
        pub fn LIVESCAN_GetFPRawData(channel: c_int, raw: *mut u8) -> c_int;
    }

    #[link(name = "Gamc")]
    extern "system" {
        pub fn MOSAIC_Init() -> c_int;
        pub fn MOSAIC_FingerQuality(raw: *const u8, width: c_int, height: c_int) -> c_int;
    }

    #[link(name = "FpSplit")]
    extern "system" {
        pub fn FPSPLIT_DoSplit(
            raw: *const u8,
            width: c_int,
            height: c_int,
            flags: c_int,
            split_width: c_int,
            split_height: c_int,
            finger_count: *mut c_int,
            info: *mut FpSplitInfo,
        ) -> c_int;
    }

    #[link(name = "ZAZ_FpStdLib")]
    extern "system" {
        pub fn ZAZ_FpStdLib_OpenDevice() -> c_int;
        pub fn ZAZ_FpStdLib_CreateISOTemplate(
            handle: c_int,
            image: *const u8,
            template: *mut u8,
        ) -> c_int;
        pub fn ZAZ_FpStdLib_CompareTemplates(
            handle: c_int,
            first: *const u8,
            second: *const u8,
        ) -> c_int;
    }
}

const LIVESCAN_OK: c_int = 1;
const SPLIT_OK: c_int = 0;

/// Scanner bound to the vendor SDK
pub struct VendorScanner {
    /// Template algorithm handle, 0 while closed
    handle: AtomicI32,
    /// The SDK is not re-entrant; serialize every call
    sdk: Mutex<()>,
}

impl VendorScanner {
    pub fn new() -> Self {
        Self {
            handle: AtomicI32::new(0),
            sdk: Mutex::new(()),
        }
    }

    fn sdk_lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.sdk.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for VendorScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for VendorScanner {
    fn open(&self) -> Result<(), CapabilityError> {
        let _sdk = self.sdk_lock();
        if self.handle.load(Ordering::SeqCst) != 0 {
            return Ok(());
        }

        if unsafe { ffi::LIVESCAN_Init() } != LIVESCAN_OK {
            error!("LIVESCAN_Init failed");
            return Err(CapabilityError::HardwareInit);
        }
        if unsafe { ffi::MOSAIC_Init() } != LIVESCAN_OK {
            error!("MOSAIC_Init failed");
            return Err(CapabilityError::MosaicInit);
        }
        let handle = unsafe { ffi::ZAZ_FpStdLib_OpenDevice() };
        if handle == 0 {
            error!("ZAZ_FpStdLib_OpenDevice returned a null handle");
            return Err(CapabilityError::AlgorithmInit);
        }

        self.handle.store(handle, Ordering::SeqCst);
        info!(handle, "Vendor SDK opened");
        Ok(())
    }

    fn frame_size(&self) -> FrameSize {
        SLAP_FRAME
    }

    fn acquire_frame(&self) -> Option<Vec<u8>> {
        let mut raw = vec![0u8; SLAP_FRAME.pixel_count()];
        let _sdk = self.sdk_lock();
        let status = unsafe { ffi::LIVESCAN_GetFPRawData(0, raw.as_mut_ptr()) };
        (status == LIVESCAN_OK).then_some(raw)
    }

    fn frame_quality(&self, pixels: &[u8], size: FrameSize) -> i32 {
        if pixels.len() < size.pixel_count() {
            return 0;
        }
        let _sdk = self.sdk_lock();
        unsafe {
            ffi::MOSAIC_FingerQuality(pixels.as_ptr(), size.width as c_int, size.height as c_int)
        }
    }

    fn segment(&self, pixels: &[u8], size: FrameSize) -> Result<Vec<SplitFinger>, CapabilityError> {
        let split_len = (SPLIT_WIDTH * SPLIT_HEIGHT) as usize;
        let mut buffers: Vec<Vec<u8>> = (0..MAX_SEGMENTS).map(|_| vec![0u8; split_len]).collect();
        let mut infos: Vec<ffi::FpSplitInfo> = buffers
            .iter_mut()
            .map(|buf| ffi::FpSplitInfo {
                x: 0,
                y: 0,
                top: 0,
                left: 0,
                angle: 0,
                quality: 0,
                out_buf: buf.as_mut_ptr(),
            })
            .collect();
        let mut finger_count: c_int = 0;

        let status = {
            let _sdk = self.sdk_lock();
            unsafe {
                ffi::FPSPLIT_DoSplit(
                    pixels.as_ptr(),
                    size.width as c_int,
                    size.height as c_int,
                    1,
                    SPLIT_WIDTH as c_int,
                    SPLIT_HEIGHT as c_int,
                    &mut finger_count,
                    infos.as_mut_ptr(),
                )
            }
        };
        if status != SPLIT_OK {
            return Err(CapabilityError::Segmentation(status));
        }

        let count = (finger_count.max(0) as usize).min(MAX_SEGMENTS);
        debug!(count, "FPSPLIT_DoSplit succeeded");
        let qualities: Vec<i32> = infos.iter().take(count).map(|info| info.quality).collect();

        Ok(buffers
            .into_iter()
            .take(count)
            .zip(qualities)
            .map(|(image, quality)| SplitFinger { image, quality })
            .collect())
    }

    fn create_template(&self, finger_image: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        let handle = self.handle.load(Ordering::SeqCst);
        if handle == 0 {
            return Err(CapabilityError::NotOpen);
        }
        if finger_image.len() < (SPLIT_WIDTH * SPLIT_HEIGHT) as usize {
            return Err(CapabilityError::TemplateCreation);
        }

        let mut template = vec![0u8; TEMPLATE_SIZE];
        let _sdk = self.sdk_lock();
        let status = unsafe {
            ffi::ZAZ_FpStdLib_CreateISOTemplate(handle, finger_image.as_ptr(), template.as_mut_ptr())
        };
        if status == 0 {
            return Err(CapabilityError::TemplateCreation);
        }
        Ok(template)
    }

    fn compare_templates(&self, first: &[u8], second: &[u8]) -> i32 {
        let handle = self.handle.load(Ordering::SeqCst);
        if handle == 0 || first.len() < TEMPLATE_SIZE || second.len() < TEMPLATE_SIZE {
            return 0;
        }
        let _sdk = self.sdk_lock();
        unsafe { ffi::ZAZ_FpStdLib_CompareTemplates(handle, first.as_ptr(), second.as_ptr()) }
    }
}
