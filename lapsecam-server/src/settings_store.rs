//! Persistent settings document.
//!
//! The settings live in a flat JSON object on disk. Loading never fails:
//! a missing file is created with the defaults, an unreadable one is logged
//! and replaced in memory by the defaults. A known key holding a value of the
//! wrong type falls back to its default on its own; the rest of the file is
//! kept. Keys the schema does not know are carried along untouched and
//! written back on the next save.
//!
//! Updates are validated before they are accepted; a save that fails is
//! logged and the in-memory document stays authoritative.

use lapsecam_core::{Settings, SettingsError};
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

struct Loaded {
    document: Map<String, Value>,
    settings: Settings,
}

impl Loaded {
    fn defaults() -> Self {
        let settings = Settings::default();
        Loaded {
            document: settings.to_document(),
            settings,
        }
    }
}

pub struct SettingsStore {
    path: Option<PathBuf>,
    inner: RwLock<Loaded>,
    /// Serializes file writes; each save reads the document under it
    save_lock: Mutex<()>,
}

impl SettingsStore {
    /// Load the settings file at `path`, creating it if it does not exist.
    pub fn load<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let loaded = read_document(&path).and_then(|document| {
            let (document, reset) = Settings::repair(&document);
            if !reset.is_empty() {
                warn!(
                    "Settings {}: invalid value for {}, using defaults",
                    path.display(),
                    reset.join(", ")
                );
            }
            match Settings::from_document(&document) {
                Ok(settings) => {
                    if let Err(e) = settings.tz() {
                        warn!("Settings {}: {}", path.display(), e);
                    }
                    info!("Loaded settings from {}", path.display());
                    Some(Loaded { document, settings })
                }
                Err(e) => {
                    warn!("Ignoring settings in {}: {}", path.display(), e);
                    None
                }
            }
        });

        let store = SettingsStore {
            path: Some(path.clone()),
            inner: RwLock::new(loaded.unwrap_or_else(Loaded::defaults)),
            save_lock: Mutex::new(()),
        };
        if !path.exists() {
            store.save();
        }
        store
    }

    /// A store that is never written to disk.
    pub fn in_memory(settings: Settings) -> Self {
        SettingsStore {
            path: None,
            inner: RwLock::new(Loaded {
                document: settings.to_document(),
                settings,
            }),
            save_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Typed snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .settings
            .clone()
    }

    /// The full settings document, including unknown keys.
    pub fn document(&self) -> Map<String, Value> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .document
            .clone()
    }

    /// Merge `changes` into the document, validate, then persist.
    ///
    /// Returns the new document. On a validation error nothing changes.
    pub fn update(&self, changes: &Map<String, Value>) -> Result<Map<String, Value>, SettingsError> {
        let document = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

            let mut document = inner.document.clone();
            for (key, value) in changes {
                document.insert(key.clone(), value.clone());
            }
            let settings = Settings::from_document(&document)?;
            settings.validate()?;

            inner.document = document.clone();
            inner.settings = settings;
            document
        };
        debug!("Settings updated: {:?}", changes.keys().collect::<Vec<_>>());

        self.save();
        Ok(document)
    }

    /// Rewrite the settings file from the in-memory document.
    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let document = self.document();
        if let Err(e) = write_document(path, &document) {
            error!("Failed to save settings to {}: {}", path.display(), e);
        } else {
            debug!("Saved settings to {}", path.display());
        }
    }
}

fn read_document(path: &Path) -> Option<Map<String, Value>> {
    if !path.exists() {
        info!("No settings file at {}, using defaults", path.display());
        return None;
    }
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Failed to open settings {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_reader(BufReader::new(file)) {
        Ok(Value::Object(document)) => Some(document),
        Ok(_) => {
            warn!("Settings {} is not a JSON object", path.display());
            None
        }
        Err(e) => {
            warn!("Failed to parse settings {}: {}", path.display(), e);
            None
        }
    }
}

fn write_document(path: &Path, document: &Map<String, Value>) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
