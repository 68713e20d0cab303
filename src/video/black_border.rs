use image::Rgb;

use crate::video::frame::{CropRect, Frame};

// Channel values at or below this count as black. Slightly above zero because
// encoders leave noise in letterbox bars.
const DEFAULT_LUMA_THRESHOLD: u8 = 24;
// A frame needs at least this share of content pixels to count as non-black.
const DEFAULT_MIN_CONTENT_RATIO: f32 = 0.002;

/// Detects letterboxing (uniform black padding) in decoded frames.
///
/// The thresholds are owned here as tunable constants; callers only see the
/// two predicates.
#[derive(Debug, Clone, Copy)]
pub struct BlackBorderDetector {
    luma_threshold: u8,
    min_content_ratio: f32,
}

impl Default for BlackBorderDetector {
    fn default() -> Self {
        Self {
            luma_threshold: DEFAULT_LUMA_THRESHOLD,
            min_content_ratio: DEFAULT_MIN_CONTENT_RATIO,
        }
    }
}

impl BlackBorderDetector {
    pub fn new(luma_threshold: u8, min_content_ratio: f32) -> Self {
        Self {
            luma_threshold,
            min_content_ratio,
        }
    }

    fn has_content(&self, pixel: &Rgb<u8>) -> bool {
        pixel.0.iter().any(|&channel| channel > self.luma_threshold)
    }

    /// Whether the frame is effectively black. Deterministic: the same buffer
    /// always yields the same answer.
    pub fn is_black(&self, frame: &Frame) -> bool {
        let total = (frame.width() as u64) * (frame.height() as u64);
        if total == 0 {
            return true;
        }

        let needed = ((total as f32 * self.min_content_ratio).ceil() as u64).max(1);
        let mut content = 0u64;
        for pixel in frame.pixels() {
            if self.has_content(pixel) {
                content += 1;
                if content >= needed {
                    return false;
                }
            }
        }
        true
    }

    /// Bounding rectangle of non-black content, with exclusive right/bottom.
    ///
    /// An entirely black frame yields the full-frame rectangle so downstream
    /// cropping never produces a zero-area image.
    pub fn find_content_bounds(&self, frame: &Frame) -> CropRect {
        let (width, height) = frame.dimensions();

        let mut min_x = width;
        let mut min_y = height;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        let mut found = false;

        for (x, y, pixel) in frame.enumerate_pixels() {
            if self.has_content(pixel) {
                found = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        if !found {
            return CropRect::full(width, height);
        }

        CropRect {
            left: min_x,
            top: min_y,
            right: max_x + 1,
            bottom: max_y + 1,
        }
    }
}
