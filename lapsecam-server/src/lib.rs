//! # Lapsecam Server
//!
//! Motion triggered time-lapse camera with a REST API and MJPEG preview.
//!
//! The server:
//! - Reads frames from one camera on a dedicated capture thread
//! - Runs the [`lapsecam_core`] motion detector on the selected grid cells
//! - Records a burst of JPEG captures when motion is seen
//! - Serves status, settings, captures and a live preview over HTTP
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    lapsecam-server                      │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐ │
//! │  │ REST API    │  │ MJPEG       │  │ /captures        │ │
//! │  │ (axum)      │  │ preview     │  │ (ServeDir)       │ │
//! │  └──────┬──────┘  └──────┬──────┘  └──────────────────┘ │
//! │         │                │                              │
//! │         ▼                ▼                              │
//! │  ┌─────────────────────────────────────────────────────┐│
//! │  │              Engine (Arc<EngineState>)              ││
//! │  │  - Monitoring flag + recording state                ││
//! │  │  - Latest frame (arc-swap)                          ││
//! │  │  - Operator log                                     ││
//! │  └─────────────────────────────────────────────────────┘│
//! │         ▲                                               │
//! │  ┌──────┴──────────────────────────────────────────────┐│
//! │  │              CaptureLoop (own thread)               ││
//! │  │  - Camera -> MotionDetector -> RecordingMachine     ││
//! │  │  - CaptureStore (JPEG files)                        ││
//! │  └─────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example: Starting the Server
//!
//! ```rust,no_run
//! use clap::Parser;
//! use lapsecam_server::{camera, engine::Engine, settings_store::SettingsStore};
//! use lapsecam_server::{storage::CaptureStore, web::Web, Cli};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};
//!
//! #[tokio::main]
//! async fn main() {
//!     let args = Cli::parse_from(["lapsecam-server", "--synthetic", "-p", "8080"]);
//!
//!     let settings = Arc::new(SettingsStore::load(args.config_path()));
//!     let captures = Arc::new(CaptureStore::new(args.captures_dir()).unwrap());
//!     let engine = Arc::new(Engine::new(settings, captures.clone()));
//!     engine.start(camera::factory(args.camera())).unwrap();
//!
//!     let web = Web::new(engine, captures, args.port);
//!     Toplevel::new(|s| async move {
//!         s.start(SubsystemBuilder::new("Web", |s| web.run(s)));
//!     })
//!     .catch_signals()
//!     .handle_shutdown_requests(Duration::from_secs(5))
//!     .await
//!     .unwrap();
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `webcam` - Camera device support through nokhwa. Without it only
//!   `--synthetic` can be used.

use clap::Parser;
use std::path::PathBuf;

pub mod camera;
pub mod capture;
pub mod config;
pub mod engine;
pub mod preview;
pub mod settings_store;
pub mod storage;
pub mod web;

use camera::CameraSelection;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Port for webserver
    #[arg(short, long, default_value_t = 8888)]
    pub port: u16,

    /// Camera device index
    #[arg(short, long, default_value_t = 0)]
    pub device: u32,

    /// Use a generated test pattern instead of a camera
    #[arg(long, default_value_t = false, conflicts_with = "device")]
    pub synthetic: bool,

    /// Directory for time-lapse captures
    #[arg(long)]
    pub captures: Option<PathBuf>,

    /// Settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn camera(&self) -> CameraSelection {
        if self.synthetic {
            CameraSelection::Synthetic
        } else {
            CameraSelection::Device(self.device)
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config::default_config_path)
    }

    pub fn captures_dir(&self) -> PathBuf {
        self.captures
            .clone()
            .unwrap_or_else(config::default_captures_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = Cli::parse_from(["lapsecam-server"]);
        assert_eq!(args.port, 8888);
        assert_eq!(args.camera(), CameraSelection::Device(0));
        assert!(args.config_path().ends_with("config.json"));
        assert!(args.captures_dir().ends_with("captures"));
    }

    #[test]
    fn test_cli_options() {
        let args = Cli::parse_from([
            "lapsecam-server",
            "-p",
            "9000",
            "--synthetic",
            "--captures",
            "/tmp/shots",
            "--config",
            "/tmp/lapsecam.json",
        ]);
        assert_eq!(args.port, 9000);
        assert_eq!(args.camera(), CameraSelection::Synthetic);
        assert_eq!(args.captures_dir(), PathBuf::from("/tmp/shots"));
        assert_eq!(args.config_path(), PathBuf::from("/tmp/lapsecam.json"));
    }

    #[test]
    fn test_cli_device_and_synthetic_conflict() {
        assert!(Cli::try_parse_from(["lapsecam-server", "--synthetic", "-d", "1"]).is_err());
    }
}
