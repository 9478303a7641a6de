//! Simple user preferences

use crate::exceptions::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Persisted user settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// App hash of the poster app's container
    #[serde(rename = "pbHash", default)]
    pub poster_board_hash: String,

    /// App hash of the CarPlay app's container
    #[serde(rename = "cpHash", default)]
    pub carplay_hash: String,

    /// CarPlay wallpapers that have been replaced, in the order applied
    #[serde(rename = "ActiveCarPlayWallpapers", default)]
    pub active_carplay_wallpapers: Vec<String>,

    /// Accept videos longer than the duration limit
    #[serde(rename = "ignoreDurationLimit", default)]
    pub ignore_duration_limit: bool,
}

impl Preferences {
    /// Record a CarPlay wallpaper as active, keeping first-seen order
    pub fn activate_carplay_wallpaper(&mut self, name: &str) {
        if !self.active_carplay_wallpapers.iter().any(|n| n == name) {
            self.active_carplay_wallpapers.push(name.to_string());
        }
    }
}

/// JSON-backed preference storage
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read preferences; a missing file gives the defaults
    pub fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write preferences via a temp file and rename
    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(prefs)?.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!("💾 Saved preferences to {:?}", self.path);
        Ok(())
    }

    /// Load, apply `f`, and save
    pub fn update<F: FnOnce(&mut Preferences)>(&self, f: F) -> Result<Preferences> {
        let mut prefs = self.load()?;
        f(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }
}
