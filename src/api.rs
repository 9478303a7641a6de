//! High-level API for tendies operations

use crate::config::Config;
use crate::exceptions::{Result, TendiesError};
use crate::poster::carplay::{BitmapEncoder, CarPlayReport};
use crate::poster::catalog::CatalogSource;
use crate::poster::deploy::DeployReport;
use crate::poster::hash_watch::{AppHashes, CancellationToken, HashWatcher};
use crate::poster::links::DeepLink;
use crate::poster::platform::{CapabilityProbe, resolve_platform};
use crate::poster::state::AppState;
use crate::poster::video::{FfmpegFrameExtractor, FrameExtractor};
use crate::poster::worker::DeployWorker;
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Replacement images for one CarPlay wallpaper
#[derive(Debug, Clone, Default)]
pub struct CarPlayOverride {
    pub name: String,
    pub light: Option<PathBuf>,
    pub dark: Option<PathBuf>,
}

/// Build the application state for `config`.
///
/// Video support depends on `ffprobe`/`ffmpeg` being installed; without them
/// bundles still work and video imports are refused.
pub fn open_state(config: Config, probe: Arc<dyn CapabilityProbe>) -> Result<AppState> {
    let platform = resolve_platform(config.device.clone(), probe);
    let frames: Option<Arc<dyn FrameExtractor>> = match FfmpegFrameExtractor::locate() {
        Ok(extractor) => Some(Arc::new(extractor)),
        Err(e) => {
            debug!("🎞️ Video support unavailable: {e}");
            None
        }
    };
    AppState::init(config, frames, platform)
}

/// Deploy every queued bundle and loaded video, then clear the queues
pub fn apply_tendies(state: &mut AppState, worker: &DeployWorker) -> Result<DeployReport> {
    let request = state.deploy_request()?;
    let report = worker.apply_tendies(state.orchestrator(), request)?;
    state.finish_deploy();

    for (bundle, reason) in &report.skipped_bundles {
        warn!("⚠️ Bundle {} was skipped: {reason}", bundle.display());
    }
    Ok(report)
}

/// Replace the named CarPlay wallpapers
pub fn apply_carplay(
    state: &AppState,
    worker: &DeployWorker,
    encoder: Arc<dyn BitmapEncoder>,
    overrides: &[CarPlayOverride],
) -> Result<CarPlayReport> {
    let app_hash = state.carplay_hash()?;
    let mut slots = state.carplay_slots()?;

    let mut chosen = Vec::with_capacity(overrides.len());
    for wanted in overrides {
        let index = slots
            .iter()
            .position(|s| s.name == wanted.name)
            .ok_or_else(|| {
                TendiesError::Generic(format!("no CarPlay wallpaper named '{}'", wanted.name))
            })?;
        let mut slot = slots.swap_remove(index);
        if let Some(light) = &wanted.light {
            slot.light_override = Some(fs::read(light)?);
        }
        if let Some(dark) = &wanted.dark {
            slot.dark_override = Some(fs::read(dark)?);
        }
        chosen.push(slot);
    }

    worker.apply_carplay(state.carplay_deployer(encoder), app_hash, chosen)
}

/// Act on a deep link. Downloads need a catalog source.
pub fn handle_deep_link(
    state: &mut AppState,
    link: &str,
    source: Option<&dyn CatalogSource>,
) -> Result<DeepLink> {
    let parsed = DeepLink::parse(link)?;
    match &parsed {
        DeepLink::Import(path) => {
            state.import_bundle(path)?;
        }
        DeepLink::AppHash(hash) => {
            state.set_app_hashes(Some(hash), None)?;
            info!("🔑 App hash set from link");
        }
        DeepLink::Download(url) => {
            let source = source.ok_or_else(|| {
                TendiesError::Capability("downloads are not available".to_string())
            })?;
            let file = source.download_file(url)?;
            let queued = state.import_bundle(&file)?;
            if queued != file {
                let _ = fs::remove_file(&file);
            }
        }
    }
    Ok(parsed)
}

/// Wait for the helper to hand over app hashes and store them
pub fn wait_for_app_hashes(state: &AppState, token: &CancellationToken) -> Result<AppHashes> {
    let hashes = HashWatcher::new(state.config().hash_file()).wait(token)?;
    state.accept_hashes(&hashes)?;
    Ok(hashes)
}

pub fn clear_cache(state: &mut AppState) -> Result<()> {
    state.clear_cache()
}

/// Make the poster app rebuild its collections by re-setting the language
pub fn reset_collections(state: &AppState, language: &str) -> Result<()> {
    if state.platform().reset_collections(language) {
        info!("🔄 Collections reset requested");
        Ok(())
    } else {
        Err(TendiesError::Capability(
            "resetting collections is not available on this device".to_string(),
        ))
    }
}

pub fn open_poster_board(state: &AppState) -> Result<()> {
    if state.platform().open_poster_board() {
        Ok(())
    } else {
        Err(TendiesError::Capability(
            "the poster app could not be opened".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poster::platform::NullProbe;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct DirSource(PathBuf);

    impl CatalogSource for DirSource {
        fn fetch_catalog(
            &self,
            _kind: crate::poster::catalog::WallpaperType,
        ) -> Result<Vec<crate::poster::catalog::CatalogItem>> {
            Ok(Vec::new())
        }

        fn download_file(&self, url: &str) -> Result<PathBuf> {
            let name = crate::poster::catalog::file_name_from_url(url);
            let path = self.0.join(name);
            fs::write(&path, b"zip")?;
            Ok(path)
        }
    }

    fn state(temp: &TempDir) -> AppState {
        let config = Config::new(temp.path().join("docs")).with_config_dir(temp.path().join("cfg"));
        open_state(config, Arc::new(NullProbe)).unwrap()
    }

    #[test]
    fn test_deep_links() {
        let temp = TempDir::new().unwrap();
        let mut state = state(&temp);

        handle_deep_link(&mut state, "pocketposter://app-hash?uuid=PB", None).unwrap();
        assert_eq!(state.preferences().unwrap().poster_board_hash, "PB");

        let local = temp.path().join("Local.tendies");
        fs::write(&local, b"zip").unwrap();
        handle_deep_link(&mut state, &local.to_string_lossy(), None).unwrap();
        assert_eq!(state.bundles().len(), 1);

        let link = "pocketposter://download?url=https://host/Remote.tendies";
        assert!(matches!(
            handle_deep_link(&mut state, link, None),
            Err(TendiesError::Capability(_))
        ));
        let source = DirSource(temp.path().to_path_buf());
        handle_deep_link(&mut state, link, Some(&source)).unwrap();
        assert_eq!(state.bundles().len(), 2);
        assert!(!temp.path().join("Remote.tendies").exists());
    }

    #[test]
    fn test_platform_actions_without_runtime() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        assert!(matches!(
            reset_collections(&state, "en"),
            Err(TendiesError::Capability(_))
        ));
        assert!(open_poster_board(&state).is_err());
    }

    #[test]
    fn test_wait_for_app_hashes() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        fs::write(state.config().hash_file(), "PB\nCP\n").unwrap();

        let hashes = wait_for_app_hashes(&state, &CancellationToken::new()).unwrap();
        assert_eq!(hashes.poster_board, "PB");
        assert_eq!(state.preferences().unwrap().carplay_hash, "CP");
    }
}
