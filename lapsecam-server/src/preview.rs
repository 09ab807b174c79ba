//! Live MJPEG preview.
//!
//! Every viewer gets its own [`Stream`] that samples the shared
//! [`FrameBuffer`] on a fixed ticker and encodes whatever frame is current.
//! There is no queue: a viewer that falls behind simply sees fewer frames,
//! and dropping the stream (client disconnect) stops its ticker without
//! touching anyone else.

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use lapsecam_core::FrameBuffer;
use log::trace;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::engine::EngineState;
use crate::storage::encode_jpeg;

/// Preview rate cap, ~20 frames per second.
pub const PREVIEW_INTERVAL: Duration = Duration::from_millis(50);

pub const PREVIEW_BOUNDARY: &str = "frame";
pub const PREVIEW_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// JPEG quality of preview frames; independent of the capture quality.
const PREVIEW_QUALITY: u32 = 75;

/// Wrap one JPEG in a multipart chunk.
pub fn multipart_chunk(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\n\r\n",
        PREVIEW_BOUNDARY
    );
    let mut chunk = Vec::with_capacity(header.len() + jpeg.len() + 2);
    chunk.extend_from_slice(header.as_bytes());
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(b"\r\n");
    Bytes::from(chunk)
}

/// Encode the current frame, `None` if there is none or encoding failed.
fn current_chunk(frames: &FrameBuffer) -> Option<Bytes> {
    let frame = frames.latest()?;
    match encode_jpeg(&frame, PREVIEW_QUALITY) {
        Ok(jpeg) => Some(multipart_chunk(&jpeg)),
        Err(e) => {
            trace!("Skipping preview frame: {}", e);
            None
        }
    }
}

/// Endless preview stream for one viewer.
pub fn preview_stream(
    state: Arc<EngineState>,
    period: Duration,
) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> {
    stream! {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Some(chunk) = current_chunk(&state.frames) {
                yield Ok(chunk);
            }
        }
    }
}
