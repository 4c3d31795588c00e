//! Scripted scanner backend
//!
//! Frames are self-describing: every pixel of a simulated frame holds the
//! scripted quality value, so `frame_quality` simply reads it back. Split
//! finger images are filled with their 1-based segment index, and templates
//! carry that index in their first byte. Tests use these markers to see which
//! segment ended up under which position label.

use super::{CapabilityError, FrameSize, Scanner, SplitFinger, TEMPLATE_SIZE};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Comparator = dyn Fn(&[u8], &[u8]) -> i32 + Send + Sync;

/// Small frames keep test memory low
const DEFAULT_FRAME: FrameSize = FrameSize {
    width: 40,
    height: 30,
};

const DEFAULT_SPLIT_LEN: usize = 64;

struct SimState {
    fail_open: bool,
    open: bool,
    qualities: VecDeque<i32>,
    steady_quality: Option<i32>,
    finger_counts: Vec<usize>,
    template_failures: Vec<usize>,
}

/// Deterministic [`Scanner`] driven by a script
pub struct SimulatedScanner {
    frame_size: FrameSize,
    split_len: usize,
    state: Mutex<SimState>,
    comparator: Box<Comparator>,
    frames_served: AtomicUsize,
    segment_calls: AtomicUsize,
    compare_calls: AtomicUsize,
}

impl SimulatedScanner {
    /// Scanner with no frames scripted, four fingers per slap and an
    /// equality comparator (100 for identical templates, 0 otherwise)
    pub fn new() -> Self {
        Self {
            frame_size: DEFAULT_FRAME,
            split_len: DEFAULT_SPLIT_LEN,
            state: Mutex::new(SimState {
                fail_open: false,
                open: false,
                qualities: VecDeque::new(),
                steady_quality: None,
                finger_counts: vec![4],
                template_failures: Vec::new(),
            }),
            comparator: Box::new(|a, b| if a == b { 100 } else { 0 }),
            frames_served: AtomicUsize::new(0),
            segment_calls: AtomicUsize::new(0),
            compare_calls: AtomicUsize::new(0),
        }
    }

    /// Walkthrough script for running the agent without hardware
    ///
    /// Quality ramps up past the default threshold, and slap segmentation
    /// cycles through 4, 4, 2 fingers to match the enrollment phases.
    pub fn demo() -> Self {
        Self::new()
            .with_frame_size(super::SLAP_FRAME)
            .with_qualities([5, 15, 25, 35, 45, 55, 65])
            .then_steady(70)
            .with_finger_counts([4, 4, 2])
    }

    pub fn with_frame_size(mut self, size: FrameSize) -> Self {
        self.frame_size = size;
        self
    }

    /// Qualities of the next frames, in order
    pub fn with_qualities(self, qualities: impl IntoIterator<Item = i32>) -> Self {
        self.lock().qualities.extend(qualities);
        self
    }

    /// Quality of every frame once the scripted ones are used up
    ///
    /// Without it the device yields no frames after the script.
    pub fn then_steady(self, quality: i32) -> Self {
        self.lock().steady_quality = Some(quality);
        self
    }

    /// Finger counts returned by successive segmentations (cycled)
    pub fn with_finger_counts(self, counts: impl IntoIterator<Item = usize>) -> Self {
        let counts: Vec<usize> = counts.into_iter().collect();
        if !counts.is_empty() {
            self.lock().finger_counts = counts;
        }
        self
    }

    /// Segment indices (0-based) whose template creation fails
    pub fn failing_templates(self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.lock().template_failures.extend(indices);
        self
    }

    /// Make `open` fail with a hardware error
    pub fn failing_open(self) -> Self {
        self.lock().fail_open = true;
        self
    }

    /// Replace the template comparator
    pub fn with_comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&[u8], &[u8]) -> i32 + Send + Sync + 'static,
    {
        self.comparator = Box::new(comparator);
        self
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn frames_served(&self) -> usize {
        self.frames_served.load(Ordering::SeqCst)
    }

    pub fn segment_calls(&self) -> usize {
        self.segment_calls.load(Ordering::SeqCst)
    }

    pub fn compare_calls(&self) -> usize {
        self.compare_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // A panic while holding this lock can only come from a test assertion
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SimulatedScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for SimulatedScanner {
    fn open(&self) -> Result<(), CapabilityError> {
        let mut state = self.lock();
        if state.fail_open {
            return Err(CapabilityError::HardwareInit);
        }
        state.open = true;
        Ok(())
    }

    fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    fn acquire_frame(&self) -> Option<Vec<u8>> {
        let quality = {
            let mut state = self.lock();
            state.qualities.pop_front().or(state.steady_quality)?
        };
        self.frames_served.fetch_add(1, Ordering::SeqCst);
        Some(vec![quality.clamp(0, 255) as u8; self.frame_size.pixel_count()])
    }

    fn frame_quality(&self, pixels: &[u8], _size: FrameSize) -> i32 {
        pixels.first().copied().map(i32::from).unwrap_or(0)
    }

    fn segment(&self, pixels: &[u8], _size: FrameSize) -> Result<Vec<SplitFinger>, CapabilityError> {
        let call = self.segment_calls.fetch_add(1, Ordering::SeqCst);
        let count = {
            let state = self.lock();
            state.finger_counts[call % state.finger_counts.len()]
        };
        let quality = self.frame_quality(pixels, self.frame_size);

        Ok((0..count)
            .map(|index| SplitFinger {
                image: vec![(index + 1) as u8; self.split_len],
                quality,
            })
            .collect())
    }

    fn create_template(&self, finger_image: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        let marker = finger_image.first().copied().unwrap_or(0);
        let index = (marker as usize).saturating_sub(1);
        if self.lock().template_failures.contains(&index) {
            return Err(CapabilityError::TemplateCreation);
        }

        let mut template = vec![0x46; TEMPLATE_SIZE];
        template[0] = marker;
        Ok(template)
    }

    fn compare_templates(&self, first: &[u8], second: &[u8]) -> i32 {
        self.compare_calls.fetch_add(1, Ordering::SeqCst);
        (self.comparator)(first, second)
    }
}
