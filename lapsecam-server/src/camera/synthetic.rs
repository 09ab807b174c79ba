//! Generated test pattern, selected with `--synthetic`.
//!
//! A dark background with a bright square that jumps to the next column of
//! the frame every few seconds, so motion detection has something to see.

use lapsecam_core::Frame;
use log::info;

use super::{Camera, CameraError};

pub const SYNTHETIC_WIDTH: u32 = 640;
pub const SYNTHETIC_HEIGHT: u32 = 480;

const BACKGROUND: [u8; 3] = [24, 24, 24];
const SQUARE: [u8; 3] = [230, 230, 230];
const SQUARE_SIZE: u32 = 80;
/// Frames between jumps; about five seconds at the capture cadence
const FRAMES_PER_POSITION: u64 = 50;

#[derive(Debug, Default)]
pub struct SyntheticCamera {
    started: bool,
    frame_count: u64,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::default()
    }

    fn square_origin(&self) -> (u32, u32) {
        let columns = (SYNTHETIC_WIDTH / SQUARE_SIZE) as u64;
        let position = (self.frame_count / FRAMES_PER_POSITION) % columns;
        (
            position as u32 * SQUARE_SIZE,
            (SYNTHETIC_HEIGHT - SQUARE_SIZE) / 2,
        )
    }
}

impl Camera for SyntheticCamera {
    fn name(&self) -> String {
        "synthetic test pattern".to_string()
    }

    fn start(&mut self) -> Result<(), CameraError> {
        info!("Using {}", self.name());
        self.started = true;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.started {
            return Err(CameraError::NotStarted);
        }

        let mut frame = Frame::filled(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, BACKGROUND);
        let (x0, y0) = self.square_origin();
        for y in y0..y0 + SQUARE_SIZE {
            for x in x0..x0 + SQUARE_SIZE {
                frame.image_mut().put_pixel(x, y, image::Rgb(SQUARE));
            }
        }
        self.frame_count += 1;
        Ok(frame)
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn is_synthetic(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_start() {
        let mut camera = SyntheticCamera::new();
        assert!(matches!(camera.capture_frame(), Err(CameraError::NotStarted)));
        camera.start().unwrap();
        let frame = camera.capture_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT));
    }

    #[test]
    fn test_square_moves() {
        let mut camera = SyntheticCamera::new();
        camera.start().unwrap();
        let first = camera.capture_frame().unwrap();
        for _ in 1..FRAMES_PER_POSITION {
            assert_eq!(camera.capture_frame().unwrap(), first);
        }
        assert_ne!(camera.capture_frame().unwrap(), first);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut camera = SyntheticCamera::new();
        camera.start().unwrap();
        camera.stop();
        camera.stop();
        assert!(camera.capture_frame().is_err());
    }
}
