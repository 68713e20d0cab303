use image::imageops::{self, FilterType};
use image::RgbImage;

/// A decoded video frame: height x width x 3, 8-bit channels, row-major.
/// Every transform stage produces a new frame rather than mutating in place.
pub type Frame = RgbImage;

/// Bounding rectangle of frame content in pixel coordinates.
///
/// Invariant: `0 <= left < right <= width` and `0 <= top < bottom <= height`
/// of the frame it was computed from. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    /// The no-op rectangle covering an entire frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn is_full_frame(&self, width: u32, height: u32) -> bool {
        *self == Self::full(width, height)
    }
}

/// Cut `frame` down to `rect`. The rectangle must have been computed from a
/// frame of the same dimensions; anything else is a programming error.
pub fn crop_frame(frame: &Frame, rect: CropRect) -> Frame {
    assert!(
        rect.left < rect.right && rect.top < rect.bottom,
        "degenerate crop rect {:?}",
        rect
    );
    assert!(
        rect.right <= frame.width() && rect.bottom <= frame.height(),
        "crop rect {:?} does not fit a {}x{} frame",
        rect,
        frame.width(),
        frame.height()
    );
    imageops::crop_imm(frame, rect.left, rect.top, rect.width(), rect.height()).to_image()
}

/// Accumulated preview rotation, normalized to [0, 360) degrees.
///
/// Mutated only by user rotate actions on the interactive thread; reset when
/// the previewed frame is replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationState {
    degrees: u16,
}

impl RotationState {
    pub fn degrees(&self) -> u16 {
        self.degrees
    }

    pub fn rotate_clockwise(&mut self) {
        self.degrees = (self.degrees + 90) % 360;
    }

    pub fn rotate_counterclockwise(&mut self) {
        self.degrees = (self.degrees + 270) % 360;
    }

    pub fn flip_upside_down(&mut self) {
        self.degrees = (self.degrees + 180) % 360;
    }

    pub fn reset(&mut self) {
        self.degrees = 0;
    }

    /// Apply the accumulated angle as a pure transform of `frame`.
    pub fn apply(&self, frame: &Frame) -> Frame {
        match self.degrees {
            90 => imageops::rotate90(frame),
            180 => imageops::rotate180(frame),
            270 => imageops::rotate270(frame),
            _ => frame.clone(),
        }
    }
}

/// Scale `frame` to fit inside `max_width` x `max_height` while preserving
/// its aspect ratio. Upscales small frames the same way the display label
/// would; degenerate bounds collapse to a 1x1 result rather than zero.
pub fn scale_to_fit(frame: &Frame, max_width: u32, max_height: u32) -> Frame {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        return frame.clone();
    }

    let scale = f64::min(
        max_width.max(1) as f64 / w as f64,
        max_height.max(1) as f64 / h as f64,
    );
    let target_w = ((w as f64 * scale).round() as u32).max(1);
    let target_h = ((h as f64 * scale).round() as u32).max(1);

    if (target_w, target_h) == (w, h) {
        return frame.clone();
    }
    imageops::resize(frame, target_w, target_h, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::from_pixel(width, height, image::Rgb([value, value, value]))
    }

    #[test]
    fn test_rotation_accumulates_modulo_360() {
        let mut rotation = RotationState::default();
        assert_eq!(rotation.degrees(), 0);

        rotation.rotate_clockwise();
        assert_eq!(rotation.degrees(), 90);
        rotation.rotate_clockwise();
        rotation.rotate_clockwise();
        rotation.rotate_clockwise();
        // Four quarter turns land back where we started
        assert_eq!(rotation.degrees(), 0);

        rotation.rotate_counterclockwise();
        assert_eq!(rotation.degrees(), 270);
        rotation.flip_upside_down();
        assert_eq!(rotation.degrees(), 90);
    }

    #[test]
    fn test_rotation_apply_swaps_dimensions_for_quarter_turns() {
        let frame = solid_frame(40, 20, 128);
        let mut rotation = RotationState::default();

        rotation.rotate_clockwise();
        let rotated = rotation.apply(&frame);
        assert_eq!(rotated.dimensions(), (20, 40));

        rotation.flip_upside_down(); // now 270
        let rotated = rotation.apply(&frame);
        assert_eq!(rotated.dimensions(), (20, 40));

        rotation.rotate_clockwise(); // now 0
        let rotated = rotation.apply(&frame);
        assert_eq!(rotated.dimensions(), (40, 20));
    }

    #[test]
    fn test_rotation_apply_does_not_mutate_input() {
        let frame = solid_frame(8, 4, 200);
        let mut rotation = RotationState::default();
        rotation.rotate_clockwise();

        let _ = rotation.apply(&frame);
        assert_eq!(frame.dimensions(), (8, 4));
    }

    #[test]
    fn test_crop_rect_full_frame() {
        let rect = CropRect::full(640, 480);
        assert_eq!(rect.width(), 640);
        assert_eq!(rect.height(), 480);
        assert!(rect.is_full_frame(640, 480));
        assert!(!rect.is_full_frame(640, 360));
    }

    #[test]
    fn test_crop_frame_extracts_region() {
        let mut frame = solid_frame(100, 100, 0);
        frame.put_pixel(10, 10, image::Rgb([255, 255, 255]));

        let cropped = crop_frame(
            &frame,
            CropRect {
                left: 10,
                top: 10,
                right: 90,
                bottom: 90,
            },
        );
        assert_eq!(cropped.dimensions(), (80, 80));
        assert_eq!(cropped.get_pixel(0, 0), &image::Rgb([255, 255, 255]));
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_crop_frame_rejects_mismatched_rect() {
        let frame = solid_frame(50, 50, 0);
        let _ = crop_frame(&frame, CropRect::full(100, 100));
    }

    #[test]
    fn test_scale_to_fit_preserves_aspect_ratio() {
        let frame = solid_frame(1920, 1080, 90);
        let scaled = scale_to_fit(&frame, 480, 480);
        assert_eq!(scaled.dimensions(), (480, 270));

        // Upscaling also fits the bounds
        let small = solid_frame(100, 50, 90);
        let scaled = scale_to_fit(&small, 400, 400);
        assert_eq!(scaled.dimensions(), (400, 200));
    }

    #[test]
    fn test_scale_to_fit_noop_when_already_fitting_exactly() {
        let frame = solid_frame(320, 240, 90);
        let scaled = scale_to_fit(&frame, 320, 240);
        assert_eq!(scaled.dimensions(), (320, 240));
    }
}
