//! Operator settings schema.
//!
//! Settings travel as a flat JSON document (the persisted form) and as the
//! typed [`Settings`] struct (what the capture loop reads). Conversion from a
//! document is pure: missing keys are filled from [`Settings::default`], keys
//! the schema does not know are left in the document untouched.
//!
//! Range validation is a separate, explicit step ([`Settings::validate`]) that
//! the settings API runs on updates. The capture engine itself accepts any
//! snapshot it is given.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SettingsError;

pub const MAX_MOTION_THRESHOLD: u32 = 255;
pub const MAX_IMAGE_QUALITY: u32 = 100;

/// Typed snapshot of the operator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Per-pixel intensity delta (0-255) above which a pixel counts as changed
    pub motion_threshold: u32,
    /// Row-major indices of the grid cells that are motion sensitive
    pub grid_mask: Vec<u32>,
    /// Length of a time-lapse session in seconds
    pub time_lapse_duration: f64,
    /// Seconds between captures within a session
    pub time_between_snaps: f64,
    /// IANA timezone used for capture file names
    pub timezone: String,
    pub grid_rows: u32,
    pub grid_cols: u32,
    /// JPEG quality (0-100)
    pub image_quality: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            motion_threshold: 20,
            grid_mask: Vec::new(),
            time_lapse_duration: 10.0,
            time_between_snaps: 0.5,
            timezone: "US/Eastern".to_string(),
            grid_rows: 12,
            grid_cols: 16,
            image_quality: 80,
        }
    }
}

impl Settings {
    /// Fill every key missing from `document` with its default value.
    ///
    /// Keys already present (including ones unknown to the schema) are kept
    /// as they are.
    pub fn with_defaults(document: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = document.clone();
        for (key, value) in Settings::default().to_document() {
            merged.entry(key).or_insert(value);
        }
        merged
    }

    /// Fill missing keys and reset every known key whose value does not fit
    /// the schema to its default.
    ///
    /// Returns the repaired document and the keys that were reset. Unknown
    /// keys and every well-typed value are kept, so
    /// [`from_document`](Self::from_document) always succeeds on the result.
    pub fn repair(document: &Map<String, Value>) -> (Map<String, Value>, Vec<String>) {
        let defaults = Settings::default().to_document();
        let mut repaired = Settings::with_defaults(document);
        let mut reset = Vec::new();

        for (key, default) in &defaults {
            let Some(value) = repaired.get(key) else {
                continue;
            };
            let mut single = defaults.clone();
            single.insert(key.clone(), value.clone());
            if serde_json::from_value::<Settings>(Value::Object(single)).is_err() {
                repaired.insert(key.clone(), default.clone());
                reset.push(key.clone());
            }
        }
        (repaired, reset)
    }

    /// Read a typed snapshot from a settings document, defaulting missing keys.
    pub fn from_document(document: &Map<String, Value>) -> Result<Settings, SettingsError> {
        let merged = Settings::with_defaults(document);
        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    /// The settings as a flat document.
    pub fn to_document(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.motion_threshold > MAX_MOTION_THRESHOLD {
            return Err(SettingsError::TooHigh(
                "motion_threshold",
                self.motion_threshold as f64,
                MAX_MOTION_THRESHOLD as f64,
            ));
        }
        if self.image_quality > MAX_IMAGE_QUALITY {
            return Err(SettingsError::TooHigh(
                "image_quality",
                self.image_quality as f64,
                MAX_IMAGE_QUALITY as f64,
            ));
        }
        // NaN fails these comparisons too
        if !(self.time_lapse_duration > 0.0) {
            return Err(SettingsError::NotPositive(
                "time_lapse_duration",
                self.time_lapse_duration,
            ));
        }
        if !(self.time_between_snaps > 0.0) {
            return Err(SettingsError::NotPositive(
                "time_between_snaps",
                self.time_between_snaps,
            ));
        }
        if self.grid_rows == 0 {
            return Err(SettingsError::NotPositive("grid_rows", 0.0));
        }
        if self.grid_cols == 0 {
            return Err(SettingsError::NotPositive("grid_cols", 0.0));
        }
        if let Some(&index) = self
            .grid_mask
            .iter()
            .find(|&&i| i as u64 >= self.cell_count())
        {
            return Err(SettingsError::CellOutOfRange {
                index,
                rows: self.grid_rows,
                cols: self.grid_cols,
            });
        }
        self.tz()?;
        Ok(())
    }

    /// Number of cells in the detection grid.
    pub fn cell_count(&self) -> u64 {
        self.grid_rows as u64 * self.grid_cols as u64
    }

    pub fn tz(&self) -> Result<Tz, SettingsError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| SettingsError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn time_lapse_duration_ms(&self) -> u64 {
        seconds_to_ms(self.time_lapse_duration)
    }

    pub fn time_between_snaps_ms(&self) -> u64 {
        seconds_to_ms(self.time_between_snaps)
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    // `as` saturates: negative and NaN become 0
    (seconds * 1000.0).round() as u64
}
