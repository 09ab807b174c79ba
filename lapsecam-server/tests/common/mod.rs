#![allow(dead_code)]

use lapsecam_core::{Frame, Settings};
use lapsecam_server::camera::{Camera, CameraError};
use lapsecam_server::storage::{CaptureSink, StorageError};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;

pub fn dark() -> Frame {
    Frame::filled(WIDTH, HEIGHT, [10, 10, 10])
}

pub fn bright() -> Frame {
    Frame::filled(WIDTH, HEIGHT, [10, 220, 10])
}

/// What the scripted camera returns next, plus what happened to it.
#[derive(Debug)]
pub struct Script {
    pub frame: Frame,
    pub fail: bool,
    pub started: bool,
    pub stopped: usize,
}

/// Camera returning whatever frame the test put in the shared script.
pub struct ScriptedCamera {
    script: Arc<Mutex<Script>>,
}

impl ScriptedCamera {
    pub fn new(frame: Frame) -> (Self, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script {
            frame,
            fail: false,
            started: false,
            stopped: 0,
        }));
        (
            ScriptedCamera {
                script: script.clone(),
            },
            script,
        )
    }

    /// A camera that is already started, for stepping a capture loop by hand.
    pub fn started(frame: Frame) -> (Box<dyn Camera>, Arc<Mutex<Script>>) {
        let (mut camera, script) = ScriptedCamera::new(frame);
        camera.start().unwrap();
        (Box::new(camera), script)
    }
}

impl Camera for ScriptedCamera {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    fn start(&mut self) -> Result<(), CameraError> {
        self.script.lock().unwrap().started = true;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let script = self.script.lock().unwrap();
        if script.fail {
            return Err(CameraError::Capture("sensor timeout".to_string()));
        }
        Ok(script.frame.clone())
    }

    fn stop(&mut self) {
        self.script.lock().unwrap().stopped += 1;
    }
}

/// Sink that counts captures instead of writing files.
#[derive(Default)]
pub struct MemorySink {
    pub captures: Mutex<Vec<(u32, u32)>>,
    pub fail: Mutex<bool>,
}

impl MemorySink {
    pub fn count(&self) -> usize {
        self.captures.lock().unwrap().len()
    }
}

impl CaptureSink for MemorySink {
    fn persist(&self, frame: &Frame, _settings: &Settings) -> Result<PathBuf, StorageError> {
        if *self.fail.lock().unwrap() {
            return Err(StorageError::Io {
                path: PathBuf::from("/full-disk"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "no space left"),
            });
        }
        let mut captures = self.captures.lock().unwrap();
        captures.push((frame.width(), frame.height()));
        Ok(PathBuf::from(format!("capture-{}.jpg", captures.len())))
    }
}
