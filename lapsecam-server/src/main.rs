use clap::Parser;
use log::info;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

use lapsecam_server::{
    camera, engine::Engine, settings_store::SettingsStore, storage::CaptureStore, web::Web, Cli,
    VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .parse_default_env()
        .init();

    info!("lapsecam-server {} starting", VERSION);

    let settings = Arc::new(SettingsStore::load(args.config_path()));
    let captures = Arc::new(
        CaptureStore::new(args.captures_dir())
            .into_diagnostic()
            .wrap_err("Cannot prepare capture directory")?,
    );
    let engine = Arc::new(Engine::new(settings, captures.clone()));

    // No fallback: a camera that cannot be opened ends the process
    engine
        .start(camera::factory(args.camera()))
        .into_diagnostic()
        .wrap_err("Camera initialization failed")?;

    let web = Web::new(engine.clone(), captures, args.port);

    Toplevel::new(|s| async move {
        s.start(SubsystemBuilder::new("Capture", |s| engine.run(s)));
        s.start(SubsystemBuilder::new("Web", |s| web.run(s)));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .map_err(Into::into)
}
