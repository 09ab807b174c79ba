//! Error types for settings handling

use thiserror::Error;

/// Errors raised when a settings document is parsed or validated.
///
/// The capture engine never validates; it runs with whatever snapshot it is
/// handed. These errors surface at the settings API boundary only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    /// Numeric setting above its allowed maximum
    #[error("Setting {0} value {1} is higher than maximum value {2}")]
    TooHigh(&'static str, f64, f64),

    /// Duration or grid dimension that must be strictly positive
    #[error("Setting {0} value {1} must be greater than zero")]
    NotPositive(&'static str, f64),

    /// Grid mask refers to a cell the grid does not have
    #[error("Grid cell {index} is outside the {rows}x{cols} grid")]
    CellOutOfRange { index: u32, rows: u32, cols: u32 },

    /// Timezone is not a known IANA identifier
    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    /// Document could not be mapped onto the settings schema
    #[error("Invalid settings document: {0}")]
    InvalidDocument(String),
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::InvalidDocument(e.to_string())
    }
}
