//! Scanner capability interface
//!
//! Everything the agent needs from the fingerprint hardware and the vendor
//! algorithm libraries, behind one trait:
//! - device/algorithm bring-up
//! - raw frame acquisition and quality scoring
//! - slap segmentation into single-finger images
//! - ISO template creation and comparison
//!
//! Backends:
//! - [`simulated::SimulatedScanner`]: scripted, used by tests and `--simulate`
//! - `vendor::VendorScanner`: FFI to the vendor libraries (feature `vendor-sdk`)
//!
//! All methods are synchronous. Callers run them inline; none of them is a
//! suspension point of a capture flow.

pub mod simulated;
#[cfg(feature = "vendor-sdk")]
pub mod vendor;

use thiserror::Error;

/// Size of one ISO/FMR template in bytes
pub const TEMPLATE_SIZE: usize = 1024;

/// Width of one segmented finger image
pub const SPLIT_WIDTH: u32 = 256;

/// Height of one segmented finger image
pub const SPLIT_HEIGHT: u32 = 360;

/// Upper bound on fingers returned by one segmentation
pub const MAX_SEGMENTS: usize = 10;

/// Raw frame dimensions of the four-finger slap scanner
pub const SLAP_FRAME: FrameSize = FrameSize {
    width: 1600,
    height: 1500,
};

/// Frame dimensions in pixels (8-bit grayscale, row-major)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    /// Number of bytes in one frame
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One finger image produced by segmentation
#[derive(Debug, Clone)]
pub struct SplitFinger {
    /// Cropped grayscale image (`SPLIT_WIDTH` x `SPLIT_HEIGHT` on real hardware)
    pub image: Vec<u8>,
    /// Per-finger quality reported by the segmenter
    pub quality: i32,
}

/// Errors reported by a scanner backend
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// Scanner hardware did not initialize
    #[error("Hardware initialization failed")]
    HardwareInit,

    /// Mosaic (quality/segmentation) algorithm did not initialize
    #[error("Mosaic algorithm initialization failed")]
    MosaicInit,

    /// Template algorithm could not open the device
    #[error("Template algorithm initialization failed")]
    AlgorithmInit,

    /// Operation attempted before `open`
    #[error("Device not open")]
    NotOpen,

    /// Segmenter returned a non-zero status
    #[error("Fingerprint segmentation failed (code {0})")]
    Segmentation(i32),

    /// Template creation failed for one finger image
    #[error("Template creation failed")]
    TemplateCreation,
}

/// Polymorphic capability provider
pub trait Scanner: Send + Sync {
    /// Bring up hardware and algorithms
    ///
    /// Calling it again after success must be harmless.
    fn open(&self) -> Result<(), CapabilityError>;

    /// Dimensions of the frames returned by [`Scanner::acquire_frame`]
    fn frame_size(&self) -> FrameSize;

    /// Acquire one raw frame; `None` when the device produced nothing this time
    fn acquire_frame(&self) -> Option<Vec<u8>>;

    /// Quality score of a raw frame (higher is better, 0 means unusable)
    fn frame_quality(&self, pixels: &[u8], size: FrameSize) -> i32;

    /// Split a slap frame into single-finger images
    fn segment(&self, pixels: &[u8], size: FrameSize) -> Result<Vec<SplitFinger>, CapabilityError>;

    /// Create a `TEMPLATE_SIZE`-byte template from one finger image
    fn create_template(&self, finger_image: &[u8]) -> Result<Vec<u8>, CapabilityError>;

    /// Similarity score between two templates (or two combined templates)
    fn compare_templates(&self, first: &[u8], second: &[u8]) -> i32;
}
