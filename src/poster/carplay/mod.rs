//! CarPlay wallpaper replacement
//!
//! Override images are encoded as bitmaps named the way the CarPlay app's
//! image cache expects, relocated into that cache through a tunnel, and the
//! replaced names are remembered in preferences.

pub mod bitmap;

pub use bitmap::{BitmapEncoder, BitmapSize, CommandBitmapEncoder};

use super::filesystem::remove_best_effort;
use super::paths::{StagingPaths, carplay_subpath};
use super::platform::PlatformCapabilityProvider;
use super::prefs::PreferenceStore;
use super::symlink::SymlinkSession;
use crate::exceptions::{Result, TendiesError};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Light or dark variant of a wallpaper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appearance {
    Light,
    Dark,
}

impl Appearance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Appearance::Light => "Light",
            Appearance::Dark => "Dark",
        }
    }
}

/// A stock CarPlay wallpaper and any replacement images for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarPlayWallpaperSlot {
    pub name: String,
    pub light_image: PathBuf,
    pub dark_image: Option<PathBuf>,
    pub light_override: Option<Vec<u8>>,
    pub dark_override: Option<Vec<u8>>,
}

impl CarPlayWallpaperSlot {
    pub fn new(name: impl Into<String>, light_image: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            light_image: light_image.into(),
            dark_image: None,
            light_override: None,
            dark_override: None,
        }
    }

    fn overrides(&self) -> impl Iterator<Item = (Appearance, &[u8])> {
        [
            (Appearance::Light, self.light_override.as_deref()),
            (Appearance::Dark, self.dark_override.as_deref()),
        ]
        .into_iter()
        .filter_map(|(appearance, data)| data.map(|d| (appearance, d)))
    }
}

/// Name of the cache bitmap for a wallpaper variant
pub fn bitmap_file_name(name: &str, appearance: Appearance, cache_version: &str) -> String {
    format!(
        "CAR{name}Dynamic-{}{cache_version}.cpbitmap",
        appearance.as_str()
    )
}

/// Name of the persisted copy of an override image
pub fn override_file_name(name: &str, appearance: Appearance) -> String {
    format!("{name}-{}", appearance.as_str())
}

/// Find stock wallpapers in `framework_dir`, attach persisted overrides
/// from `photos_dir`, and order them like `order` (unknown names last)
pub fn discover_slots(
    framework_dir: &Path,
    photos_dir: &Path,
    order: Option<&[String]>,
) -> Result<Vec<CarPlayWallpaperSlot>> {
    let pattern = format!(
        "{}/*-Light.heic",
        glob::Pattern::escape(&framework_dir.to_string_lossy())
    );
    let entries = glob::glob(&pattern)
        .map_err(|e| TendiesError::Generic(format!("bad wallpaper pattern: {e}")))?;

    let mut slots = Vec::new();
    for entry in entries {
        let light = match entry {
            Ok(path) => path,
            Err(e) => {
                debug!("⚠️ Skipping unreadable wallpaper: {e}");
                continue;
            }
        };
        let Some(name) = light
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix("-Light.heic"))
            .map(str::to_string)
        else {
            continue;
        };

        let dark = framework_dir.join(format!("{name}-Dark.heic"));
        let mut slot = CarPlayWallpaperSlot::new(&name, &light);
        slot.dark_image = dark.is_file().then_some(dark);
        slot.light_override = fs::read(photos_dir.join(override_file_name(&name, Appearance::Light))).ok();
        slot.dark_override = fs::read(photos_dir.join(override_file_name(&name, Appearance::Dark))).ok();
        slots.push(slot);
    }

    if let Some(order) = order {
        reorder(&mut slots, order);
    }
    debug!("🚗 Found {} CarPlay wallpaper(s)", slots.len());
    Ok(slots)
}

/// Stable sort by position in `order`; names not listed go last
pub fn reorder(slots: &mut [CarPlayWallpaperSlot], order: &[String]) {
    slots.sort_by_key(|slot| {
        order
            .iter()
            .position(|name| *name == slot.name)
            .unwrap_or(usize::MAX)
    });
}

/// What a CarPlay apply did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarPlayReport {
    /// Bitmap file names relocated into the cache
    pub written: Vec<String>,
    /// Active wallpaper names after the apply
    pub active: Vec<String>,
}

/// Staged bitmaps that must not outlive the operation
struct StagedFiles(Vec<PathBuf>);

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            remove_best_effort(path);
        }
    }
}

/// Replaces CarPlay wallpapers in the CarPlay app's image cache
#[derive(Debug, Clone)]
pub struct CarPlayDeployer {
    paths: StagingPaths,
    container_root: PathBuf,
    encoder: Arc<dyn BitmapEncoder>,
    platform: Arc<dyn PlatformCapabilityProvider>,
    prefs: PreferenceStore,
}

impl CarPlayDeployer {
    pub fn new(
        paths: StagingPaths,
        container_root: impl Into<PathBuf>,
        encoder: Arc<dyn BitmapEncoder>,
        platform: Arc<dyn PlatformCapabilityProvider>,
        prefs: PreferenceStore,
    ) -> Self {
        Self {
            paths,
            container_root: container_root.into(),
            encoder,
            platform,
            prefs,
        }
    }

    pub fn apply(&self, app_hash: &str, slots: &[CarPlayWallpaperSlot]) -> Result<CarPlayReport> {
        if !self.platform.supports_carplay() {
            return Err(TendiesError::Capability(
                "CarPlay wallpapers are not supported on this device".to_string(),
            ));
        }

        let cache_version = self.platform.carplay_cache_version();
        let size = self.platform.carplay_bitmap_size();
        let photos = self.paths.carplay_photos();
        fs::create_dir_all(&photos)?;

        let mut prefs = self.prefs.load()?;
        let mut staged = StagedFiles(Vec::new());

        for slot in slots {
            for (appearance, image) in slot.overrides() {
                let staging = self
                    .paths
                    .documents()
                    .join(bitmap_file_name(&slot.name, appearance, cache_version));
                remove_best_effort(&staging);
                staged.0.push(staging.clone());
                self.encoder.encode(image, size, &staging)?;

                let copy = photos.join(override_file_name(&slot.name, appearance));
                if let Err(e) = fs::write(&copy, image) {
                    debug!("⚠️ Failed to keep override copy {copy:?}: {e}");
                }
                prefs.activate_carplay_wallpaper(&slot.name);
            }
        }

        let mut report = CarPlayReport::default();
        let mut session = SymlinkSession::new(
            &self.container_root,
            app_hash,
            self.paths.tunnel_mount(),
        );
        session.with_link(&carplay_subpath(), |tunnel| {
            for file in &staged.0 {
                let dest = tunnel.replace(file)?;
                if let Some(name) = dest.file_name() {
                    report.written.push(name.to_string_lossy().into_owned());
                }
            }
            Ok(())
        })?;

        self.prefs.save(&prefs)?;
        report.active = prefs.active_carplay_wallpapers;

        let marker = self.paths.cache_marker();
        remove_best_effort(&marker);
        fs::write(&marker, b"")?;

        info!("🚗 Applied {} CarPlay bitmap(s)", report.written.len());
        Ok(report)
    }

    /// Forget an override: drop its persisted copies and its active entry
    pub fn reset(&self, name: &str) -> Result<()> {
        reset_override(&self.paths, &self.prefs, name)
    }
}

/// Drop the persisted copies of an override and its active entry
pub fn reset_override(paths: &StagingPaths, prefs: &PreferenceStore, name: &str) -> Result<()> {
    let photos = paths.carplay_photos();
    for appearance in [Appearance::Light, Appearance::Dark] {
        remove_best_effort(&photos.join(override_file_name(name, appearance)));
    }
    prefs.update(|p| p.active_carplay_wallpapers.retain(|n| n != name))?;
    debug!("🚗 Reset CarPlay wallpaper {name}");
    Ok(())
}
