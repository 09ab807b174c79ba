//! Capture directory.
//!
//! Time-lapse captures are plain JPEG files in one flat directory, named by
//! the capture wall-clock time in the configured timezone with a fixed
//! `EST` suffix:
//!
//! `2024-03-01_07-05-09_123456_EST.jpg`
//!
//! Wall-clock names repeat during the daylight saving fall-back hour, so
//! listing orders by modification time and uses the name only as a
//! tie-break.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use image::codecs::jpeg::JpegEncoder;
use lapsecam_core::{Frame, Settings};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// URL prefix under which the web server exposes the capture directory.
pub const CAPTURES_URL: &str = "/captures";

const FILENAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S_%6f";
/// Same suffix in every zone and all year round
pub const FILENAME_SUFFIX: &str = "EST";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl StorageError {
    fn io(path: &Path, source: io::Error) -> Self {
        StorageError::Io {
            path: path.to_owned(),
            source,
        }
    }
}

/// Destination for time-lapse captures.
pub trait CaptureSink: Send + Sync {
    /// Store one capture, returning where it went.
    fn persist(&self, frame: &Frame, settings: &Settings) -> Result<PathBuf, StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureInfo {
    pub filename: String,
    pub url: String,
}

/// Encode a frame as JPEG. Quality is clamped to 1..=100.
pub fn encode_jpeg(frame: &Frame, quality: u32) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100) as u8)
        .encode_image(frame.image())?;
    Ok(out)
}

/// File name for a capture taken at `time`.
pub fn capture_filename(time: DateTime<Utc>, tz: Tz) -> String {
    format!(
        "{}_{}.jpg",
        time.with_timezone(&tz).format(FILENAME_FORMAT),
        FILENAME_SUFFIX
    )
}

fn is_capture(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct CaptureStore {
    dir: PathBuf,
}

impl CaptureStore {
    /// Open the capture directory, creating it if needed.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        debug!("Capture directory: {}", dir.display());
        Ok(CaptureStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one capture taken at `time`.
    ///
    /// An unknown timezone names the file in UTC rather than losing the
    /// capture.
    pub fn write(
        &self,
        frame: &Frame,
        settings: &Settings,
        time: DateTime<Utc>,
    ) -> Result<PathBuf, StorageError> {
        let tz = settings.tz().unwrap_or_else(|e| {
            warn!("{}, naming capture in UTC", e);
            Tz::UTC
        });
        let path = self.dir.join(capture_filename(time, tz));
        let jpeg = encode_jpeg(frame, settings.image_quality)?;
        fs::write(&path, jpeg).map_err(|e| StorageError::io(&path, e))?;
        debug!("Wrote capture {}", path.display());
        Ok(path)
    }

    /// All captures, newest first.
    pub fn list(&self) -> Result<Vec<CaptureInfo>, StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let mut captures: Vec<(SystemTime, String)> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_capture(path))
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_owned();
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                Some((modified, name))
            })
            .collect();
        captures.sort_by(|a, b| b.cmp(a));

        Ok(captures
            .into_iter()
            .map(|(_, filename)| CaptureInfo {
                url: format!("{}/{}", CAPTURES_URL, filename),
                filename,
            })
            .collect())
    }

    /// Delete every file in the capture directory. Returns how many went.
    ///
    /// A file that cannot be removed is logged and skipped.
    pub fn delete_all(&self) -> Result<usize, StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let mut deleted = 0;
        for path in entries.flatten().map(|entry| entry.path()) {
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
            }
        }
        info!("Deleted {} captures from {}", deleted, self.dir.display());
        Ok(deleted)
    }
}

impl CaptureSink for CaptureStore {
    fn persist(&self, frame: &Frame, settings: &Settings) -> Result<PathBuf, StorageError> {
        self.write(frame, settings, Utc::now()).inspect_err(|e| {
            error!("Failed to write capture: {}", e);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_store() -> (CaptureStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = CaptureStore::new(temp_dir.path().join("captures")).unwrap();
        (store, temp_dir)
    }

    fn set_modified(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_filename_uses_settings_timezone() {
        let time = Utc.with_ymd_and_hms(2024, 1, 15, 17, 30, 5).unwrap()
            + chrono::Duration::microseconds(42);
        assert_eq!(
            capture_filename(time, chrono_tz::US::Eastern),
            "2024-01-15_12-30-05_000042_EST.jpg"
        );
        // Wall clock follows daylight saving, the suffix does not
        let summer = Utc.with_ymd_and_hms(2024, 7, 15, 17, 30, 5).unwrap();
        assert_eq!(
            capture_filename(summer, chrono_tz::US::Eastern),
            "2024-07-15_13-30-05_000000_EST.jpg"
        );
        assert_eq!(
            capture_filename(summer, chrono_tz::Europe::Moscow),
            "2024-07-15_20-30-05_000000_EST.jpg"
        );
    }

    #[test]
    fn test_list_orders_fall_back_hour_by_write_time() {
        let (store, _temp) = create_test_store();
        let settings = Settings::default();
        let frame = Frame::filled(8, 8, [0, 0, 0]);

        // 01:30 EDT, then 01:10 EST half an hour later
        let first = Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 11, 3, 6, 10, 0).unwrap();
        let first_path = store.write(&frame, &settings, first).unwrap();
        let second_path = store.write(&frame, &settings, second).unwrap();
        set_modified(&first_path, 1_730_611_800);
        set_modified(&second_path, 1_730_614_200);

        let list = store.list().unwrap();
        assert_eq!(list[0].filename, "2024-11-03_01-10-00_000000_EST.jpg");
        assert_eq!(list[1].filename, "2024-11-03_01-30-00_000000_EST.jpg");
    }

    #[test]
    fn test_write_and_list_newest_first() {
        let (store, _temp) = create_test_store();
        let settings = Settings::default();
        let frame = Frame::filled(64, 48, [10, 200, 30]);

        let older = Utc.with_ymd_and_hms(2024, 1, 15, 17, 30, 5).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 1, 15, 17, 30, 6).unwrap();
        store.write(&frame, &settings, older).unwrap();
        let path = store.write(&frame, &settings, newer).unwrap();
        fs::write(store.dir().join("notes.txt"), "not a capture").unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].filename, "2024-01-15_12-30-06_000000_EST.jpg");
        assert_eq!(list[0].url, "/captures/2024-01-15_12-30-06_000000_EST.jpg");
        assert_eq!(list[1].filename, "2024-01-15_12-30-05_000000_EST.jpg");

        let decoded = image::open(path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_unknown_timezone_names_capture_in_utc() {
        let (store, _temp) = create_test_store();
        let settings = Settings {
            timezone: "Nowhere/Special".to_string(),
            ..Settings::default()
        };
        let time = Utc.with_ymd_and_hms(2024, 1, 15, 17, 30, 5).unwrap();
        store
            .write(&Frame::filled(8, 8, [0, 0, 0]), &settings, time)
            .unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].filename, "2024-01-15_17-30-05_000000_EST.jpg");
    }

    #[test]
    fn test_quality_is_clamped() {
        let frame = Frame::filled(16, 16, [128, 128, 128]);
        assert!(encode_jpeg(&frame, 0).is_ok());
        assert!(encode_jpeg(&frame, 500).is_ok());
        let low = encode_jpeg(&Frame::filled(64, 64, [1, 2, 3]), 1).unwrap();
        assert_eq!(&low[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_delete_all() {
        let (store, _temp) = create_test_store();
        let settings = Settings::default();
        let frame = Frame::filled(8, 8, [0, 0, 0]);
        for s in 0..3 {
            let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, s).unwrap();
            store.write(&frame, &settings, t).unwrap();
        }
        fs::create_dir(store.dir().join("keep")).unwrap();

        assert_eq!(store.delete_all().unwrap(), 3);
        assert!(store.list().unwrap().is_empty());
        assert!(store.dir().join("keep").is_dir());
    }
}
