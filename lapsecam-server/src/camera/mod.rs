//! Camera abstraction.
//!
//! The only hardware facing part of the server. Everything downstream works
//! on [`Frame`]s and can be driven by any [`Camera`] implementation,
//! including the synthetic ones used in tests.
//!
//! Device selection is strict: if the requested device cannot be opened the
//! server does not start. There is no fallback to another device or to the
//! synthetic camera; the synthetic camera is only used when asked for
//! explicitly on the command line.

use lapsecam_core::Frame;
use thiserror::Error;

#[cfg(feature = "webcam")]
mod device;
mod synthetic;

#[cfg(feature = "webcam")]
pub use device::DeviceCamera;
pub use synthetic::SyntheticCamera;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera support not compiled in (enable the `webcam` feature)")]
    Unsupported,
    #[error("Cannot open camera {device}: {reason}")]
    Open { device: String, reason: String },
    #[error("Frame capture failed: {0}")]
    Capture(String),
    #[error("Camera is not started")]
    NotStarted,
}

/// A frame source.
///
/// `start()` must be called before `capture_frame()`. `stop()` is idempotent
/// and never fails: teardown problems are logged by the implementation.
pub trait Camera {
    /// Human readable device name for logs and status.
    fn name(&self) -> String;

    /// Acquire the device.
    fn start(&mut self) -> Result<(), CameraError>;

    /// Read one frame, blocking until it is available.
    fn capture_frame(&mut self) -> Result<Frame, CameraError>;

    /// Release the device.
    fn stop(&mut self);

    /// True for generated frames rather than a real device.
    fn is_synthetic(&self) -> bool {
        false
    }
}

/// Builds the camera on the capture thread, so the camera itself does not
/// need to be `Send`.
pub type CameraFactory = Box<dyn FnOnce() -> Result<Box<dyn Camera>, CameraError> + Send>;

/// Which camera the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSelection {
    Device(u32),
    Synthetic,
}

/// Factory for the selected camera.
pub fn factory(selection: CameraSelection) -> CameraFactory {
    match selection {
        CameraSelection::Synthetic => Box::new(|| -> Result<Box<dyn Camera>, CameraError> {
            Ok(Box::new(SyntheticCamera::new()))
        }),
        #[cfg(feature = "webcam")]
        CameraSelection::Device(index) => {
            Box::new(move || -> Result<Box<dyn Camera>, CameraError> {
                Ok(Box::new(DeviceCamera::new(index)))
            })
        }
        #[cfg(not(feature = "webcam"))]
        CameraSelection::Device(index) => {
            Box::new(move || -> Result<Box<dyn Camera>, CameraError> {
                log::error!("Camera {} requested but this build has no camera backend", index);
                Err(CameraError::Unsupported)
            })
        }
    }
}
