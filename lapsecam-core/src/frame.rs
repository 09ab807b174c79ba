//! Frames and the single-slot frame buffer.
//!
//! A [`Frame`] is one 3-channel, byte-per-channel picture as delivered by the
//! camera. The [`FrameBuffer`] holds at most one of them: the most recent.
//!
//! ```text
//!   capture loop ──publish()──►  ┌──────────────┐  ◄──latest()── preview consumer 1
//!                                │ ArcSwapOption │  ◄──latest()── preview consumer 2
//!                                └──────────────┘  ◄──latest()── ...
//! ```
//!
//! Publishing swaps an `Arc` pointer, so a reader sees either the previous or
//! the new frame, never a mix, and a slow reader cannot hold up the writer.

use arc_swap::ArcSwapOption;
use image::{Rgb, RgbImage};
use std::fmt;
use std::sync::Arc;

/// One captured picture.
#[derive(Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Frame { image }
    }

    /// Build a frame from packed RGB bytes, `None` if the length is wrong.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Frame::new)
    }

    /// A frame where every pixel has the same color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Frame::new(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame {{ {}x{} }}", self.width(), self.height())
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Frame::new(image)
    }
}

/// Holder of the most recently captured frame.
///
/// Single writer (the capture loop), any number of readers.
#[derive(Default)]
pub struct FrameBuffer {
    slot: ArcSwapOption<Frame>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame unconditionally.
    pub fn publish(&self, frame: Frame) {
        self.slot.store(Some(Arc::new(frame)));
    }

    /// Replace the current frame with one that is already shared.
    pub fn publish_shared(&self, frame: Arc<Frame>) {
        self.slot.store(Some(frame));
    }

    /// Current frame, `None` until the first publish.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load().is_none()
    }

    pub fn clear(&self) {
        self.slot.store(None);
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot.load().as_ref() {
            Some(frame) => write!(f, "FrameBuffer {{ {:?} }}", frame),
            None => write!(f, "FrameBuffer {{ empty }}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_until_first_publish() {
        let buffer = FrameBuffer::new();
        assert!(buffer.is_empty());
        assert!(buffer.latest().is_none());

        buffer.publish(Frame::filled(4, 4, [1, 2, 3]));
        assert!(!buffer.is_empty());
        assert_eq!(buffer.latest().unwrap().image().get_pixel(0, 0), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_publish_overwrites() {
        let buffer = FrameBuffer::new();
        buffer.publish(Frame::filled(4, 4, [0, 0, 0]));
        let held = buffer.latest().unwrap();

        buffer.publish(Frame::filled(4, 4, [9, 9, 9]));

        // A reader keeps the frame it loaded; new readers see the new one
        assert_eq!(held.image().get_pixel(1, 1), &Rgb([0, 0, 0]));
        assert_eq!(buffer.latest().unwrap().image().get_pixel(1, 1), &Rgb([9, 9, 9]));
    }

    #[test]
    fn test_from_raw_rejects_wrong_length() {
        assert!(Frame::from_raw(2, 2, vec![0; 12]).is_some());
        assert!(Frame::from_raw(2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn test_concurrent_readers_never_see_mixed_frames() {
        let buffer = Arc::new(FrameBuffer::new());
        buffer.publish(Frame::filled(32, 32, [0, 0, 0]));

        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for i in 0..200u32 {
                    let v = (i % 2) as u8 * 255;
                    buffer.publish(Frame::filled(32, 32, [v, v, v]));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let frame = buffer.latest().unwrap();
                        let first = *frame.image().get_pixel(0, 0);
                        assert!(frame.image().pixels().all(|p| *p == first));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
