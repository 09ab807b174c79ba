//! Engine handle.
//!
//! The [`Engine`] owns everything the capture thread and the HTTP handlers
//! share. It is constructed once in `main` and passed to the web layer; there
//! is no global instance.
//!
//! ```text
//!             ┌──────────────────── Arc<EngineState> ───────────────────┐
//!             │ running: AtomicBool      frames: FrameBuffer (arc-swap) │
//!             │ control: Mutex<Control>  log:    LogRing                │
//!             │ camera:  RwLock<CameraStatus>                           │
//!             └─────────────────────────────────────────────────────────┘
//!                 ▲ writes frames, log, recording       ▲ reads, toggles monitoring
//!          capture thread (CaptureLoop)           HTTP handlers (Engine)
//! ```

use lapsecam_core::{FrameBuffer, LogRing, RecordingMachine};
use log::{error, info};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::camera::{Camera, CameraError, CameraFactory};
use crate::capture::CaptureLoop;
use crate::settings_store::SettingsStore;
use crate::storage::CaptureSink;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Capture loop is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("Cannot spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Capture thread exited during startup")]
    WorkerGone,
}

/// Monitoring gate and recording state, changed together under one lock.
#[derive(Debug, Default)]
pub struct Control {
    pub monitoring: bool,
    pub recording: RecordingMachine,
    /// Bumped every time monitoring is switched on
    pub arm_generation: u64,
}

#[derive(Debug, Default, Clone)]
struct CameraStatus {
    available: bool,
    synthetic: bool,
    name: Option<String>,
    last_error: Option<String>,
}

/// State shared between the capture thread and the request handlers.
#[derive(Debug, Default)]
pub struct EngineState {
    pub running: AtomicBool,
    pub frames: FrameBuffer,
    pub log: LogRing,
    control: Mutex<Control>,
    camera: RwLock<CameraStatus>,
}

impl EngineState {
    pub fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_camera_error(&self, message: Option<String>) {
        self.camera
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .last_error = message;
    }

    fn set_camera(&self, camera: &dyn Camera) {
        let mut status = self.camera.write().unwrap_or_else(PoisonError::into_inner);
        status.available = true;
        status.synthetic = camera.is_synthetic();
        status.name = Some(camera.name());
    }

    fn camera_status(&self) -> CameraStatus {
        self.camera
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Snapshot returned by `/api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub monitoring_enabled: bool,
    pub recording: bool,
    /// True unless frames come from a real camera
    pub mock_mode: bool,
    pub camera_error: Option<String>,
}

pub struct Engine {
    state: Arc<EngineState>,
    settings: Arc<SettingsStore>,
    sink: Arc<dyn CaptureSink>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(settings: Arc<SettingsStore>, sink: Arc<dyn CaptureSink>) -> Self {
        Engine {
            state: Arc::new(EngineState::default()),
            settings,
            sink,
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// A capture loop bound to this engine, without a thread.
    ///
    /// The camera must already be started.
    pub fn capture_loop(&self, camera: Box<dyn Camera>) -> CaptureLoop {
        self.state.set_camera(camera.as_ref());
        CaptureLoop::new(
            camera,
            self.state.clone(),
            self.settings.clone(),
            self.sink.clone(),
        )
    }

    /// Open the camera and start the capture thread.
    ///
    /// The camera is built and started on the capture thread; this call waits
    /// for the outcome and fails if the camera cannot be opened.
    pub fn start(&self, factory: CameraFactory) -> Result<(), EngineError> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        self.state.log.log("Initializing camera engine");
        let state = self.state.clone();
        let settings = self.settings.clone();
        let sink = self.sink.clone();
        let (tx_outcome, rx_outcome) = mpsc::channel::<Result<(), CameraError>>();

        // Set before the loop can check it for the first time
        self.state.running.store(true, Ordering::Release);

        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let opened = factory().and_then(|mut camera| {
                    camera.start()?;
                    state.set_camera(camera.as_ref());
                    Ok(camera)
                });
                match opened {
                    Ok(camera) => {
                        let _ = tx_outcome.send(Ok(()));
                        CaptureLoop::new(camera, state, settings, sink).run();
                    }
                    Err(e) => {
                        let _ = tx_outcome.send(Err(e));
                    }
                }
            })
            .map_err(|e| {
                self.state.running.store(false, Ordering::Release);
                EngineError::Spawn(e)
            })?;

        match rx_outcome.recv() {
            Ok(Ok(())) => {
                let camera = self.state.camera_status();
                self.state.log.log(format!(
                    "Camera started: {}",
                    camera.name.unwrap_or_default()
                ));
                *worker = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                self.state.running.store(false, Ordering::Release);
                let _ = handle.join();
                self.state.set_camera_error(Some(e.to_string()));
                self.state.log.log(format!("CRITICAL: {}", e));
                error!("Camera initialization failed: {}", e);
                Err(EngineError::Camera(e))
            }
            Err(_) => {
                self.state.running.store(false, Ordering::Release);
                let _ = handle.join();
                Err(EngineError::WorkerGone)
            }
        }
    }

    /// Stop the capture loop and wait for the camera to be released.
    ///
    /// Blocks for up to one loop period.
    pub fn stop(&self) {
        self.state.running.store(false, Ordering::Release);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Capture thread panicked");
            }
            info!("Capture loop stopped");
        }
    }

    /// Subsystem body: wait for shutdown, then stop the capture thread.
    pub async fn run(self: Arc<Self>, subsys: SubsystemHandle) -> Result<(), EngineError> {
        subsys.on_shutdown_requested().await;
        info!("Stopping capture loop");
        tokio::task::spawn_blocking(move || self.stop())
            .await
            .map_err(|_| EngineError::WorkerGone)
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    pub fn start_monitoring(&self) {
        let mut control = self.state.control();
        if !control.monitoring {
            control.monitoring = true;
            control.arm_generation += 1;
        }
        drop(control);
        self.state.log.log("Monitoring started");
    }

    /// Disable motion detection. A running time-lapse is abandoned at once.
    pub fn stop_monitoring(&self) {
        let interrupted = {
            let mut control = self.state.control();
            control.monitoring = false;
            control.recording.force_idle()
        };
        if interrupted {
            self.state.log.log("Monitoring stopped, time-lapse cancelled");
        } else {
            self.state.log.log("Monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.control().monitoring
    }

    pub fn is_recording(&self) -> bool {
        self.state.control().recording.is_recording()
    }

    pub fn status(&self) -> EngineStatus {
        let (monitoring_enabled, recording) = {
            let control = self.state.control();
            (control.monitoring, control.recording.is_recording())
        };
        let camera = self.state.camera_status();
        EngineStatus {
            running: self.is_running(),
            monitoring_enabled,
            recording,
            mock_mode: !camera.available || camera.synthetic,
            camera_error: camera.last_error,
        }
    }

    /// Operator log lines, newest first.
    pub fn log_lines(&self) -> Vec<String> {
        self.state.log.lines()
    }

    pub fn frames(&self) -> &FrameBuffer {
        &self.state.frames
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
