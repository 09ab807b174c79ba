//! Physical camera through nokhwa.

use image::RgbImage;
use lapsecam_core::Frame;
use log::{debug, info, warn};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};

use super::{Camera, CameraError};

const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;
const REQUESTED_FPS: u32 = 30;

pub struct DeviceCamera {
    index: u32,
    camera: Option<nokhwa::Camera>,
    frame_count: u64,
}

impl DeviceCamera {
    pub fn new(index: u32) -> Self {
        DeviceCamera {
            index,
            camera: None,
            frame_count: 0,
        }
    }

    fn open_error(&self, e: impl std::fmt::Display) -> CameraError {
        CameraError::Open {
            device: self.name(),
            reason: e.to_string(),
        }
    }
}

impl Camera for DeviceCamera {
    fn name(&self) -> String {
        format!("camera {}", self.index)
    }

    fn start(&mut self) -> Result<(), CameraError> {
        if self.camera.is_some() {
            return Ok(());
        }
        info!("Opening {}", self.name());

        // Closest match; the detector rescales whatever the device delivers
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(REQUESTED_WIDTH, REQUESTED_HEIGHT),
                FrameFormat::MJPEG,
                REQUESTED_FPS,
            ),
        ));
        let mut camera = nokhwa::Camera::new(CameraIndex::Index(self.index), requested)
            .map_err(|e| self.open_error(e))?;
        camera.open_stream().map_err(|e| self.open_error(e))?;

        let resolution = camera.resolution();
        info!(
            "{} opened: {}x{} @ {} fps",
            self.name(),
            resolution.width(),
            resolution.height(),
            camera.frame_rate()
        );
        self.camera = Some(camera);
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let camera = self.camera.as_mut().ok_or(CameraError::NotStarted)?;

        let buffer = camera
            .frame()
            .map_err(|e| CameraError::Capture(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Capture(e.to_string()))?;

        // nokhwa builds against its own `image` version, so move the raw bytes
        let (width, height) = (decoded.width(), decoded.height());
        let image = RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| CameraError::Capture("frame size mismatch".to_string()))?;

        self.frame_count += 1;
        debug!("Captured frame {} ({}x{})", self.frame_count, width, height);
        Ok(Frame::new(image))
    }

    fn stop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                warn!("Error while releasing {}: {}", self.name(), e);
            }
            info!("{} released after {} frames", self.name(), self.frame_count);
        }
    }
}

impl Drop for DeviceCamera {
    fn drop(&mut self) {
        self.stop();
    }
}
