//! OS-dependent capabilities
//!
//! Private runtime lookups sit behind [`CapabilityProbe`]. The
//! [`PlatformCapabilityProvider`] for the running OS generation is resolved
//! once with [`resolve_platform`] and passed to whatever needs it.

use super::carplay::BitmapSize;
use super::defaults::{
    CARPLAY_BETA_BUILDS, CARPLAY_BITMAP_SIZE, CARPLAY_LEGACY_BITMAP_SIZE, POSTER_BOARD_BUNDLE_ID,
};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Answers questions about private runtime classes
pub trait CapabilityProbe: Send + Sync + fmt::Debug {
    /// Whether a class can be looked up
    fn has_class(&self, class: &str) -> bool;

    /// Call a class-level selector returning a list, then `item_selector` on
    /// each element, collecting the strings
    fn string_list(&self, class: &str, selector: &str, item_selector: &str) -> Option<Vec<String>>;

    /// Call a selector with an optional string argument; true on success
    fn invoke(&self, class: &str, selector: &str, argument: Option<&str>) -> bool;
}

/// Probe for hosts without the private runtime: nothing is available
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProbe;

impl CapabilityProbe for NullProbe {
    fn has_class(&self, _class: &str) -> bool {
        false
    }

    fn string_list(&self, _class: &str, _selector: &str, _item: &str) -> Option<Vec<String>> {
        None
    }

    fn invoke(&self, _class: &str, _selector: &str, _argument: Option<&str>) -> bool {
        false
    }
}

/// OS generations with different private API layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OsGeneration {
    /// 17 and older
    Legacy,
    /// 18
    Ios18,
    /// 26 and newer
    Ios26,
}

impl OsGeneration {
    pub fn from_major(major: u32) -> Self {
        match major {
            0..=17 => OsGeneration::Legacy,
            18 => OsGeneration::Ios18,
            _ => OsGeneration::Ios26,
        }
    }
}

/// Device form factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceIdiom {
    Phone,
    Pad,
    Other,
}

impl DeviceIdiom {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "phone" | "iphone" => DeviceIdiom::Phone,
            "pad" | "ipad" => DeviceIdiom::Pad,
            _ => DeviceIdiom::Other,
        }
    }
}

/// What is known about the running device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub generation: OsGeneration,
    pub idiom: DeviceIdiom,
    pub build: String,
}

/// OS-version specific behaviour
pub trait PlatformCapabilityProvider: Send + Sync + fmt::Debug {
    fn generation(&self) -> OsGeneration;

    /// Whether CarPlay wallpapers can be replaced on this device
    fn supports_carplay(&self) -> bool;

    /// Suffix appended to CarPlay bitmap cache names
    fn carplay_cache_version(&self) -> &'static str;

    /// Resolution override images are resized to before encoding
    fn carplay_bitmap_size(&self) -> BitmapSize;

    /// Stock CarPlay wallpaper names in the system's display order
    fn carplay_wallpaper_names(&self) -> Option<Vec<String>>;

    /// Re-set the system language so the poster app rebuilds its collections
    fn reset_collections(&self, language: &str) -> bool;

    /// Launch the poster app
    fn open_poster_board(&self) -> bool;
}

const WALLPAPER_NAME_SELECTOR: &str = "wallpaperAssetCatalogName";
const SET_LANGUAGE_SELECTOR: &str = "setLanguage:";

fn open_app(probe: &dyn CapabilityProbe, bundle_id: &str) -> bool {
    probe.invoke(
        "LSApplicationWorkspace",
        "openApplicationWithBundleID:",
        Some(bundle_id),
    )
}

/// OS 17 and older
#[derive(Debug)]
pub struct LegacyPlatform {
    device: DeviceInfo,
    probe: Arc<dyn CapabilityProbe>,
}

impl PlatformCapabilityProvider for LegacyPlatform {
    fn generation(&self) -> OsGeneration {
        OsGeneration::Legacy
    }

    fn supports_carplay(&self) -> bool {
        self.device.idiom == DeviceIdiom::Phone
    }

    fn carplay_cache_version(&self) -> &'static str {
        ""
    }

    fn carplay_bitmap_size(&self) -> BitmapSize {
        CARPLAY_LEGACY_BITMAP_SIZE.into()
    }

    fn carplay_wallpaper_names(&self) -> Option<Vec<String>> {
        self.probe.string_list(
            "CRSUIWallpaperPreferences",
            "availableWallpapers",
            WALLPAPER_NAME_SELECTOR,
        )
    }

    fn reset_collections(&self, language: &str) -> bool {
        if !self.probe.has_class("PSLanguageSelector") {
            warn!("⚠️ Language selector unavailable");
            return false;
        }
        self.probe
            .invoke("PSLanguageSelector", SET_LANGUAGE_SELECTOR, Some(language))
    }

    fn open_poster_board(&self) -> bool {
        open_app(self.probe.as_ref(), POSTER_BOARD_BUNDLE_ID)
    }
}

/// OS 18 and newer
#[derive(Debug)]
pub struct ModernPlatform {
    device: DeviceInfo,
    probe: Arc<dyn CapabilityProbe>,
}

impl PlatformCapabilityProvider for ModernPlatform {
    fn generation(&self) -> OsGeneration {
        self.device.generation
    }

    fn supports_carplay(&self) -> bool {
        if self.device.idiom != DeviceIdiom::Phone {
            return false;
        }
        match self.device.generation {
            OsGeneration::Ios26 => CARPLAY_BETA_BUILDS.contains(&self.device.build.as_str()),
            _ => true,
        }
    }

    fn carplay_cache_version(&self) -> &'static str {
        match self.device.generation {
            OsGeneration::Ios26 => "-12",
            _ => "-11",
        }
    }

    fn carplay_bitmap_size(&self) -> BitmapSize {
        CARPLAY_BITMAP_SIZE.into()
    }

    fn carplay_wallpaper_names(&self) -> Option<Vec<String>> {
        self.probe
            .string_list("CRSUISystemWallpaper", "wallpapers", WALLPAPER_NAME_SELECTOR)
    }

    fn reset_collections(&self, language: &str) -> bool {
        if !self.probe.has_class("IPSettingsUtilities") {
            warn!("⚠️ Settings utilities unavailable");
            return false;
        }
        self.probe
            .invoke("IPSettingsUtilities", SET_LANGUAGE_SELECTOR, Some(language))
    }

    fn open_poster_board(&self) -> bool {
        open_app(self.probe.as_ref(), POSTER_BOARD_BUNDLE_ID)
    }
}

/// Pick the provider for `device`
pub fn resolve_platform(
    device: DeviceInfo,
    probe: Arc<dyn CapabilityProbe>,
) -> Arc<dyn PlatformCapabilityProvider> {
    debug!(
        "📱 Platform {:?} on {:?} (build {})",
        device.generation, device.idiom, device.build
    );
    match device.generation {
        OsGeneration::Legacy => Arc::new(LegacyPlatform { device, probe }),
        OsGeneration::Ios18 | OsGeneration::Ios26 => Arc::new(ModernPlatform { device, probe }),
    }
}
