//! HTTP API.
//!
//! | Endpoint                     | Description                          |
//! |------------------------------|--------------------------------------|
//! | `GET  /api/config`           | Settings document                    |
//! | `POST /api/config`           | Merge, validate and persist settings |
//! | `GET  /api/status`           | Engine flags                         |
//! | `POST /api/start`            | Enable monitoring                    |
//! | `POST /api/stop`             | Disable monitoring                   |
//! | `GET  /api/logs`             | Operator log, newest first           |
//! | `GET  /api/images`           | Captures, newest first               |
//! | `POST /api/images/delete_all`| Remove all captures                  |
//! | `GET  /captures/{file}`      | One capture                          |
//! | `GET  /video_feed`           | MJPEG live preview                   |

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lapsecam_core::SettingsError;
use log::{debug, info};
use serde_json::{json, Value};
use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_graceful_shutdown::SubsystemHandle;
use tower_http::services::ServeDir;

use crate::engine::Engine;
use crate::preview::{preview_stream, PREVIEW_CONTENT_TYPE, PREVIEW_INTERVAL};
use crate::storage::{CaptureStore, StorageError, CAPTURES_URL};

const CONFIG_URI: &str = "/api/config";
const STATUS_URI: &str = "/api/status";
const START_URI: &str = "/api/start";
const STOP_URI: &str = "/api/stop";
const LOGS_URI: &str = "/api/logs";
const IMAGES_URI: &str = "/api/images";
const IMAGES_DELETE_ALL_URI: &str = "/api/images/delete_all";
const VIDEO_FEED_URI: &str = "/video_feed";

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Socket operation failed")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Settings must be a JSON object")]
    NotAnObject,
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebError::Settings(_) | WebError::NotAnObject => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
pub struct Web {
    engine: Arc<Engine>,
    captures: Arc<CaptureStore>,
    port: u16,
}

impl Web {
    pub fn new(engine: Arc<Engine>, captures: Arc<CaptureStore>, port: u16) -> Self {
        Web {
            engine,
            captures,
            port,
        }
    }

    /// All routes, with state applied.
    pub fn router(self) -> Router {
        let serve_captures = ServeDir::new(self.captures.dir());

        Router::new()
            .route(CONFIG_URI, get(get_config).post(update_config))
            .route(STATUS_URI, get(get_status))
            .route(START_URI, post(start_monitoring))
            .route(STOP_URI, post(stop_monitoring))
            .route(LOGS_URI, get(get_logs))
            .route(IMAGES_URI, get(list_images))
            .route(IMAGES_DELETE_ALL_URI, post(delete_all_images))
            .route(VIDEO_FEED_URI, get(video_feed))
            .layer(middleware::from_fn(no_cache_middleware))
            // Captures are served without the no-cache header
            .nest_service(CAPTURES_URL, serve_captures)
            .with_state(self)
    }

    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), WebError> {
        let port = self.port;
        let listener =
            TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).await?;
        let app = self.router();

        info!("Starting HTTP web server on port {}", port);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { subsys.on_shutdown_requested().await })
            .await?;
        info!("HTTP web server stopped");
        Ok(())
    }
}

/// Middleware to add no-cache headers to API responses
async fn no_cache_middleware(request: axum::http::Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    response
}

async fn get_config(State(state): State<Web>) -> Json<Value> {
    Json(Value::Object(state.engine.settings().document()))
}

async fn update_config(
    State(state): State<Web>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, WebError> {
    let Value::Object(changes) = body else {
        return Err(WebError::NotAnObject);
    };
    // Saving writes the settings file
    let settings = state.engine.settings().clone();
    let config = tokio::task::spawn_blocking(move || settings.update(&changes)).await??;
    debug!("Settings changed through API");
    Ok(Json(json!({ "status": "success", "config": config })))
}

async fn get_status(State(state): State<Web>) -> impl IntoResponse {
    Json(state.engine.status())
}

async fn start_monitoring(State(state): State<Web>) -> Json<Value> {
    state.engine.start_monitoring();
    Json(json!({ "status": "started" }))
}

async fn stop_monitoring(State(state): State<Web>) -> Json<Value> {
    state.engine.stop_monitoring();
    Json(json!({ "status": "stopped" }))
}

async fn get_logs(State(state): State<Web>) -> Json<Value> {
    Json(json!({ "logs": state.engine.log_lines() }))
}

async fn list_images(State(state): State<Web>) -> Result<impl IntoResponse, WebError> {
    let captures = state.captures.clone();
    let list = tokio::task::spawn_blocking(move || captures.list()).await??;
    Ok(Json(list))
}

async fn delete_all_images(State(state): State<Web>) -> Result<Json<Value>, WebError> {
    let captures = state.captures.clone();
    let deleted = tokio::task::spawn_blocking(move || captures.delete_all()).await??;
    Ok(Json(json!({ "status": "deleted", "count": deleted })))
}

async fn video_feed(State(state): State<Web>) -> Response {
    let stream = preview_stream(state.engine.state().clone(), PREVIEW_INTERVAL);
    (
        [(header::CONTENT_TYPE, PREVIEW_CONTENT_TYPE)],
        Body::from_stream(stream),
    )
        .into_response()
}
