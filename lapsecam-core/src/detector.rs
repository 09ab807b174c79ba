//! Grid-based motion detector.
//!
//! Every frame goes through the same pipeline before it is compared with the
//! previous one:
//!
//! ```text
//!  Frame (any size, RGB)
//!    │ resize to 160x120 (triangle filter)
//!    ▼
//!  green channel only
//!    │ 21x21 gaussian, sigma 3.5, reflect-101 borders
//!    ▼
//!  processed frame ──absdiff── previous processed frame
//!                         │ > motion_threshold ? 255 : 0
//!                         ▼
//!                    active map ──► global sum  (empty grid mask)
//!                               └─► per-cell sums (grid mask)
//! ```
//!
//! The detector keeps a single previous frame, not a background model: each
//! call compares against the frame of the call before it.

use image::{imageops, GrayImage, Luma, RgbImage};
use log::{trace, warn};
use std::borrow::Cow;

use crate::frame::Frame;
use crate::grid::{CellRect, GridGeometry};
use crate::settings::Settings;

/// Width of the internal processing frame, independent of the camera.
pub const PROCESSING_WIDTH: u32 = 160;
/// Height of the internal processing frame.
pub const PROCESSING_HEIGHT: u32 = 120;

/// Gaussian kernel size (taps per axis).
pub const BLUR_KERNEL_SIZE: usize = 21;
/// Sigma matching a 21-tap kernel with automatic sigma: 0.3 * ((21 - 1) / 2 - 1) + 0.8
pub const BLUR_SIGMA: f32 = 3.5;

/// Sum of active values over the whole frame that counts as motion
/// when no grid cells are selected.
pub const GLOBAL_AREA_FLOOR: u64 = 100;
/// Sum of active values inside one selected cell that counts as motion.
pub const CELL_AREA_FLOOR: u64 = 10;

const ACTIVE: u8 = 255;

/// Stateful pixel-difference motion detector.
#[derive(Debug, Clone)]
pub struct MotionDetector {
    /// Previous processed frame, `None` until the first frame is seen
    previous: Option<GrayImage>,
    kernel: [f32; BLUR_KERNEL_SIZE],
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionDetector {
    pub fn new() -> Self {
        MotionDetector {
            previous: None,
            kernel: gaussian_kernel(BLUR_SIGMA),
        }
    }

    /// Whether a baseline frame is stored.
    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Forget the baseline; the next frame becomes the new one.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Feed one frame, returns true if motion is detected relative to the
    /// previous frame.
    ///
    /// The first frame after construction or [`reset`](Self::reset) only
    /// establishes the baseline and never reports motion.
    pub fn detect(&mut self, frame: &Frame, settings: &Settings) -> bool {
        if frame.width() == 0 || frame.height() == 0 {
            warn!("Ignoring empty frame");
            return false;
        }

        let current = self.preprocess(frame.image());
        let motion = match &self.previous {
            Some(previous) => {
                let active = binarize(previous, &current, settings.motion_threshold);
                evaluate(&active, settings)
            }
            None => false,
        };
        self.previous = Some(current);
        motion
    }

    fn preprocess(&self, image: &RgbImage) -> GrayImage {
        let small: Cow<RgbImage> = if image.dimensions() == (PROCESSING_WIDTH, PROCESSING_HEIGHT) {
            Cow::Borrowed(image)
        } else {
            Cow::Owned(imageops::resize(
                image,
                PROCESSING_WIDTH,
                PROCESSING_HEIGHT,
                imageops::FilterType::Triangle,
            ))
        };

        let green = GrayImage::from_fn(PROCESSING_WIDTH, PROCESSING_HEIGHT, |x, y| {
            Luma([small.get_pixel(x, y)[1]])
        });

        gaussian_blur(&green, &self.kernel)
    }
}

/// Normalized 1-D gaussian weights.
fn gaussian_kernel(sigma: f32) -> [f32; BLUR_KERNEL_SIZE] {
    let mut kernel = [0f32; BLUR_KERNEL_SIZE];
    let center = (BLUR_KERNEL_SIZE / 2) as f32;
    let scale = -0.5 / (sigma * sigma);
    for (i, weight) in kernel.iter_mut().enumerate() {
        let d = i as f32 - center;
        *weight = (scale * d * d).exp();
    }
    let sum: f32 = kernel.iter().sum();
    for weight in kernel.iter_mut() {
        *weight /= sum;
    }
    kernel
}

/// Mirror an out-of-range coordinate back into `0..len` without repeating
/// the edge pixel (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(mut i: isize, len: isize) -> usize {
    if len <= 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * (len - 1) - i;
        } else {
            return i as usize;
        }
    }
}

/// Separable gaussian blur of a single-channel image.
fn gaussian_blur(src: &GrayImage, kernel: &[f32]) -> GrayImage {
    let (width, height) = src.dimensions();
    let (w, h) = (width as isize, height as isize);
    let radius = (kernel.len() / 2) as isize;
    let pixels = src.as_raw();

    let mut horizontal = vec![0f32; pixels.len()];
    for y in 0..h {
        let row = (y * w) as usize;
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect_101(x + k as isize - radius, w);
                acc += weight * pixels[row + sx] as f32;
            }
            horizontal[row + x as usize] = acc;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0f32;
        for (k, weight) in kernel.iter().enumerate() {
            let sy = reflect_101(y as isize + k as isize - radius, h);
            acc += weight * horizontal[sy * width as usize + x as usize];
        }
        Luma([(acc + 0.5).clamp(0.0, 255.0) as u8])
    })
}

/// Absolute difference thresholded to 0 / 255.
fn binarize(previous: &GrayImage, current: &GrayImage, threshold: u32) -> GrayImage {
    let (width, height) = current.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let delta = previous.get_pixel(x, y)[0].abs_diff(current.get_pixel(x, y)[0]);
        Luma([if delta as u32 > threshold { ACTIVE } else { 0 }])
    })
}

fn region_area(active: &GrayImage, cell: CellRect) -> u64 {
    let x_end = (cell.x + cell.width).min(active.width());
    let y_end = (cell.y + cell.height).min(active.height());
    let mut area = 0u64;
    for y in cell.y..y_end {
        for x in cell.x..x_end {
            area += active.get_pixel(x, y)[0] as u64;
        }
    }
    area
}

fn evaluate(active: &GrayImage, settings: &Settings) -> bool {
    if settings.grid_mask.is_empty() {
        // Nothing selected: whole frame is sensitive, with the coarser floor
        let area: u64 = active.as_raw().iter().map(|&v| v as u64).sum();
        trace!("global active area {}", area);
        return area > GLOBAL_AREA_FLOOR;
    }

    let grid = GridGeometry::new(
        settings.grid_rows,
        settings.grid_cols,
        active.width(),
        active.height(),
    );
    settings
        .grid_mask
        .iter()
        .filter_map(|&index| grid.cell(index))
        .any(|cell| region_area(active, cell) > CELL_AREA_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 480;

    fn gray_frame(level: u8) -> Frame {
        Frame::filled(WIDTH, HEIGHT, [level, level, level])
    }

    /// Frame of `level` with a block of `block_level` over the camera-space
    /// area that maps onto grid cell `index` of a 12x16 grid.
    fn frame_with_cell(level: u8, block_level: u8, index: u32) -> Frame {
        let (cell_w, cell_h) = (WIDTH / 16, HEIGHT / 12);
        let (row, col) = (index / 16, index % 16);
        let mut frame = gray_frame(level);
        for y in row * cell_h..(row + 1) * cell_h {
            for x in col * cell_w..(col + 1) * cell_w {
                frame
                    .image_mut()
                    .put_pixel(x, y, Rgb([block_level, block_level, block_level]));
            }
        }
        frame
    }

    fn settings_with_mask(mask: &[u32]) -> Settings {
        Settings {
            grid_mask: mask.to_vec(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_first_frame_only_sets_baseline() {
        let mut detector = MotionDetector::new();
        assert!(!detector.has_baseline());

        assert!(!detector.detect(&gray_frame(200), &Settings::default()));
        assert!(detector.has_baseline());
    }

    #[test]
    fn test_identical_frames_never_trigger() {
        let mut detector = MotionDetector::new();
        let settings = Settings {
            motion_threshold: 0,
            ..Settings::default()
        };
        let frame = frame_with_cell(40, 220, 37);
        for _ in 0..5 {
            assert!(!detector.detect(&frame, &settings));
        }
    }

    #[test]
    fn test_change_in_selected_cell_triggers() {
        let settings = settings_with_mask(&[17]);
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(0), &settings);
        assert!(detector.detect(&frame_with_cell(0, 255, 17), &settings));
    }

    #[test]
    fn test_change_outside_selected_cell_ignored() {
        let settings = settings_with_mask(&[191]);
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(0), &settings);
        assert!(!detector.detect(&frame_with_cell(0, 255, 17), &settings));
    }

    #[test]
    fn test_any_selected_cell_is_enough() {
        let settings = settings_with_mask(&[0, 100, 17]);
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(0), &settings);
        assert!(detector.detect(&frame_with_cell(0, 255, 17), &settings));
    }

    #[test]
    fn test_empty_mask_uses_whole_frame() {
        let settings = Settings::default();
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(10), &settings);
        assert!(detector.detect(&gray_frame(200), &settings));
    }

    #[test]
    fn test_sub_threshold_change_ignored() {
        // Default threshold is 20, the change is 10
        let settings = Settings::default();
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(100), &settings);
        assert!(!detector.detect(&gray_frame(110), &settings));
    }

    #[test]
    fn test_threshold_above_range_never_triggers() {
        let settings = Settings {
            motion_threshold: 300,
            ..Settings::default()
        };
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(0), &settings);
        assert!(!detector.detect(&gray_frame(255), &settings));
    }

    #[test]
    fn test_only_green_channel_counts() {
        let settings = Settings::default();
        let mut detector = MotionDetector::new();
        detector.detect(&Frame::filled(WIDTH, HEIGHT, [0, 50, 0]), &settings);
        assert!(!detector.detect(&Frame::filled(WIDTH, HEIGHT, [255, 50, 255]), &settings));
        assert!(detector.detect(&Frame::filled(WIDTH, HEIGHT, [255, 250, 255]), &settings));
    }

    #[test]
    fn test_baseline_slides_every_frame() {
        let settings = Settings::default();
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(0), &settings);
        assert!(detector.detect(&gray_frame(200), &settings));
        // Compared with the 200 frame now, not the first 0 frame
        assert!(!detector.detect(&gray_frame(200), &settings));
    }

    #[test]
    fn test_baseline_is_replaced_after_each_comparison() {
        let settings = Settings::default();
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(0), &settings);
        assert!(!detector.detect(&gray_frame(5), &settings));
        assert!(!detector.detect(&gray_frame(10), &settings));
        assert!(!detector.detect(&gray_frame(15), &settings));
        // Small steps never add up against a stale baseline
        assert!(!detector.detect(&gray_frame(20), &settings));
        assert!(detector.detect(&gray_frame(60), &settings));
    }

    #[test]
    fn test_empty_frame_keeps_baseline() {
        let settings = Settings::default();
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(0), &settings);
        assert!(!detector.detect(&Frame::filled(0, 0, [0, 0, 0]), &settings));
        assert!(detector.detect(&gray_frame(200), &settings));
    }

    #[test]
    fn test_out_of_range_cells_are_skipped() {
        let settings = settings_with_mask(&[500]);
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(0), &settings);
        assert!(!detector.detect(&gray_frame(255), &settings));
    }

    #[test]
    fn test_reset_forgets_baseline() {
        let settings = Settings::default();
        let mut detector = MotionDetector::new();
        detector.detect(&gray_frame(0), &settings);
        detector.reset();
        assert!(!detector.has_baseline());
        assert!(!detector.detect(&gray_frame(255), &settings));
    }

    #[test]
    fn test_processing_size_frames_skip_resize() {
        let settings = Settings::default();
        let mut detector = MotionDetector::new();
        detector.detect(
            &Frame::filled(PROCESSING_WIDTH, PROCESSING_HEIGHT, [0, 0, 0]),
            &settings,
        );
        assert!(detector.detect(
            &Frame::filled(PROCESSING_WIDTH, PROCESSING_HEIGHT, [0, 255, 0]),
            &settings
        ));
    }

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(BLUR_SIGMA);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        for i in 0..BLUR_KERNEL_SIZE / 2 {
            assert_eq!(kernel[i], kernel[BLUR_KERNEL_SIZE - 1 - i]);
        }
        assert!(kernel[10] > kernel[9]);
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 10), 1);
        assert_eq!(reflect_101(-3, 10), 3);
        assert_eq!(reflect_101(10, 10), 8);
        assert_eq!(reflect_101(12, 10), 6);
        assert_eq!(reflect_101(5, 10), 5);
        assert_eq!(reflect_101(-7, 1), 0);
    }

    #[test]
    fn test_blur_keeps_flat_image_flat() {
        let flat = GrayImage::from_pixel(20, 15, Luma([77]));
        let blurred = gaussian_blur(&flat, &gaussian_kernel(BLUR_SIGMA));
        assert!(blurred.pixels().all(|p| p[0] == 77));
    }
}
