//! # Lapsecam Core
//!
//! Platform-independent motion detection and time-lapse logic.
//!
//! This crate contains the pure parts of the camera engine with **zero I/O
//! dependencies**: no camera access, no filesystem, no async runtime. Time is
//! passed in by the caller as milliseconds, so every state machine here can
//! be driven step by step from a test.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  lapsecam-core (no tokio, no camera backend, no files)      │
//! │  ├── settings/   (operator settings schema + validation)    │
//! │  ├── grid/       (detection grid geometry)                  │
//! │  ├── detector/   (frame differencing motion detector)       │
//! │  ├── recording/  (time-lapse session state machine)         │
//! │  ├── frame/      (frames + single slot frame buffer)        │
//! │  └── log_ring/   (bounded operator event log)               │
//! └─────────────────────────────────────────────────────────────┘
//!                           ▲
//!              ┌────────────┴────────────┐
//!              │  lapsecam-server        │
//!              │  (camera, files, HTTP)  │
//!              └─────────────────────────┘
//! ```
//!
//! ## Example: Detector and recording machine
//!
//! ```rust
//! use lapsecam_core::{Frame, MotionDetector, RecordingMachine, Settings};
//!
//! let settings = Settings::default();
//! let mut detector = MotionDetector::new();
//! let mut recording = RecordingMachine::new();
//!
//! // First frame only sets the baseline
//! assert!(!detector.detect(&Frame::filled(640, 480, [0, 0, 0]), &settings));
//!
//! if detector.detect(&Frame::filled(640, 480, [0, 255, 0]), &settings) {
//!     recording.motion_detected(0);
//! }
//! assert!(recording.is_recording());
//! ```

pub mod detector;
pub mod error;
pub mod frame;
pub mod grid;
pub mod log_ring;
pub mod recording;
pub mod settings;

pub use detector::MotionDetector;
pub use error::SettingsError;
pub use frame::{Frame, FrameBuffer};
pub use grid::{CellRect, GridGeometry};
pub use log_ring::{LogEntry, LogRing, LOG_CAPACITY};
pub use recording::{RecordingEvent, RecordingMachine, RecordingSession, RecordingState};
pub use settings::Settings;
