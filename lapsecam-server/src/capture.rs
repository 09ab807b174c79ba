//! The capture loop.
//!
//! ```text
//!   ┌──────────── every ~100 ms ─────────────────────────────────┐
//!   │ camera.capture_frame()  ── error ──► log, sleep 1 s, retry │
//!   │        │                                                   │
//!   │        ▼                                                   │
//!   │ FrameBuffer::publish()                                     │
//!   │        │                                                   │
//!   │        ├─ monitoring && Idle ─► MotionDetector::detect()   │
//!   │        │                          └─ motion ─► Started     │
//!   │        └─ Recording ─────────► RecordingMachine::tick()    │
//!   │                                   ├─ Snap     ─► persist   │
//!   │                                   └─ Finished              │
//!   └────────────────────────────────────────────────────────────┘
//! ```
//!
//! One iteration is [`CaptureLoop::iterate`], which takes the current time
//! as an argument so it can be stepped deterministically. [`CaptureLoop::run`]
//! wraps it with the wall clock, the throttling sleeps and the stop flag.

use lapsecam_core::{Frame, MotionDetector, RecordingEvent};
use log::{debug, warn};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::camera::Camera;
use crate::engine::EngineState;
use crate::settings_store::SettingsStore;
use crate::storage::CaptureSink;

/// Pause between iterations.
pub const LOOP_INTERVAL: Duration = Duration::from_millis(100);
/// Pause after a failed frame read.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// How an iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    /// A frame was read and processed
    Processed(Option<RecordingEvent>),
    /// The camera did not deliver a frame
    CaptureFailed,
}

pub struct CaptureLoop {
    camera: Box<dyn Camera>,
    detector: MotionDetector,
    state: Arc<EngineState>,
    settings: Arc<SettingsStore>,
    sink: Arc<dyn CaptureSink>,
    arm_generation: u64,
}

impl CaptureLoop {
    pub(crate) fn new(
        camera: Box<dyn Camera>,
        state: Arc<EngineState>,
        settings: Arc<SettingsStore>,
        sink: Arc<dyn CaptureSink>,
    ) -> Self {
        CaptureLoop {
            camera,
            detector: MotionDetector::new(),
            state,
            settings,
            sink,
            arm_generation: 0,
        }
    }

    /// Run one iteration at `now_ms` (monotonic milliseconds).
    pub fn iterate(&mut self, now_ms: u64) -> Iteration {
        let frame = match self.camera.capture_frame() {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                self.state.set_camera_error(Some(e.to_string()));
                self.state.log.log(format!("Error capturing frame: {}", e));
                return Iteration::CaptureFailed;
            }
        };
        self.state.set_camera_error(None);
        self.state.frames.publish_shared(frame.clone());

        // Fresh snapshot every iteration
        let settings = self.settings.settings();

        let (monitoring, idle) = {
            let control = self.state.control();
            if control.arm_generation != self.arm_generation {
                // Monitoring was (re-)armed: don't compare against a stale frame
                self.arm_generation = control.arm_generation;
                self.detector.reset();
            }
            (control.monitoring, !control.recording.is_recording())
        };

        // Detection runs without holding the control lock
        let motion = monitoring && idle && self.detector.detect(&frame, &settings);

        let event = {
            let mut control = self.state.control();
            let started = if motion && control.monitoring {
                control.recording.motion_detected(now_ms)
            } else {
                None
            };
            let ticked = control.recording.tick(
                now_ms,
                settings.time_lapse_duration_ms(),
                settings.time_between_snaps_ms(),
            );
            started.or(ticked)
        };

        match event {
            Some(RecordingEvent::Started) => {
                self.state.log.log("Motion detected! Starting time-lapse.");
                self.persist(&frame, &settings);
            }
            Some(RecordingEvent::Snap) => self.persist(&frame, &settings),
            Some(RecordingEvent::Finished) => {
                self.state
                    .log
                    .log("Time-lapse ended. Returning to surveillance.");
                self.detector.reset();
            }
            None => {}
        }

        Iteration::Processed(event)
    }

    fn persist(&self, frame: &Frame, settings: &lapsecam_core::Settings) {
        match self.sink.persist(frame, settings) {
            Ok(path) => debug!("Captured {}", path.display()),
            Err(e) => self.state.log.log(format!("Failed to save capture: {}", e)),
        }
    }

    /// Loop until the engine's running flag is cleared, then release the camera.
    pub fn run(mut self) {
        let origin = Instant::now();
        while self.state.running.load(Ordering::Acquire) {
            let now_ms = origin.elapsed().as_millis() as u64;
            match self.iterate(now_ms) {
                Iteration::Processed(_) => thread::sleep(LOOP_INTERVAL),
                Iteration::CaptureFailed => thread::sleep(ERROR_BACKOFF),
            }
        }
        self.shutdown();
    }

    /// Release the camera.
    pub fn shutdown(mut self) {
        self.camera.stop();
        self.state.log.log("Camera stopped");
        if self.state.control().recording.force_idle() {
            warn!("Shutdown interrupted a running time-lapse");
        }
    }
}
