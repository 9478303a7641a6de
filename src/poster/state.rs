//! Application state shared by every front end
//!
//! Holds the queues, the preference store and the collaborators an apply
//! needs, and owns the bookkeeping that happens around a deployment.

use super::carplay::{
    BitmapEncoder, CarPlayDeployer, CarPlayWallpaperSlot, discover_slots, reset_override,
};
use super::defaults::{CARPLAY_APP_LABEL, POSTER_APP_LABEL, VIDEO_FILE_EXTENSION};
use super::deploy::{DeployOptions, DeployReport, DeployRequest, DeploymentOrchestrator};
use super::filesystem::remove_best_effort;
use super::hash_watch::AppHashes;
use super::paths::StagingPaths;
use super::platform::PlatformCapabilityProvider;
use super::prefs::{PreferenceStore, Preferences};
use super::queue::{BundleQueue, LoadState, VideoQueue};
use super::symlink::remove_stale_mount;
use super::video::{FrameExtractor, VideoDescriptorBuilder};
use crate::config::Config;
use crate::exceptions::{Result, TendiesError};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug)]
pub struct AppState {
    config: Config,
    paths: StagingPaths,
    bundles: BundleQueue,
    videos: VideoQueue,
    prefs: PreferenceStore,
    video_builder: Option<VideoDescriptorBuilder>,
    platform: Arc<dyn PlatformCapabilityProvider>,
}

impl AppState {
    /// Load persisted queue state. Imported videos do not survive a restart,
    /// so their directory is purged.
    pub fn init(
        config: Config,
        frames: Option<Arc<dyn FrameExtractor>>,
        platform: Arc<dyn PlatformCapabilityProvider>,
    ) -> Result<Self> {
        let paths = StagingPaths::new(&config.documents);
        fs::create_dir_all(paths.documents())?;
        remove_best_effort(&paths.videos());

        let bundles = BundleQueue::load(paths.bundle_store())?;
        let prefs = PreferenceStore::new(config.prefs_file());
        let video_builder = frames.map(|extractor| {
            VideoDescriptorBuilder::new(paths.clone(), extractor)
                .with_template(config.video_template.clone())
        });

        debug!("🏠 State ready at {:?}", paths.documents());
        Ok(Self {
            config,
            paths,
            bundles,
            videos: VideoQueue::new(),
            prefs,
            video_builder,
            platform,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &StagingPaths {
        &self.paths
    }

    pub fn bundles(&self) -> &BundleQueue {
        &self.bundles
    }

    pub fn videos(&self) -> &VideoQueue {
        &self.videos
    }

    pub fn videos_mut(&mut self) -> &mut VideoQueue {
        &mut self.videos
    }

    pub fn platform(&self) -> &Arc<dyn PlatformCapabilityProvider> {
        &self.platform
    }

    pub fn preferences(&self) -> Result<Preferences> {
        self.prefs.load()
    }

    pub fn update_preferences<F: FnOnce(&mut Preferences)>(&self, f: F) -> Result<Preferences> {
        self.prefs.update(f)
    }

    pub fn import_bundle(&mut self, source: &Path) -> Result<PathBuf> {
        self.bundles.import(source)
    }

    pub fn remove_bundle(&mut self, index: usize) -> Option<PathBuf> {
        self.bundles.remove(index)
    }

    /// Queue a video: copy it into private storage and check its length.
    ///
    /// A video over the duration limit is dropped from the queue again,
    /// unless the limit is switched off in preferences.
    pub fn import_video(&mut self, source: &Path, auto_reverses: bool) -> Result<Uuid> {
        let Some(builder) = self.video_builder.clone() else {
            return Err(TendiesError::Capability(
                "video import needs a frame extractor".to_string(),
            ));
        };
        let ignore_limit = self.prefs.load()?.ignore_duration_limit;

        let id = self.videos.reserve()?;
        self.videos.begin_load(id)?;

        let dest = self
            .paths
            .videos()
            .join(format!("{id}.{VIDEO_FILE_EXTENSION}"));
        let loaded = fs::create_dir_all(self.paths.videos())
            .and_then(|()| fs::copy(source, &dest))
            .map_err(TendiesError::from)
            .and_then(|_| builder.check_duration(&dest, ignore_limit));

        match loaded {
            Ok(track) => {
                self.videos.finish_load(id, Ok(dest))?;
                if auto_reverses {
                    self.videos.toggle_auto_reverse(id)?;
                }
                info!("🎞️ Queued video {id} ({:.1}s)", track.duration_secs);
                Ok(id)
            }
            Err(e) => {
                remove_best_effort(&dest);
                if matches!(e, TendiesError::VideoTooLong { .. }) {
                    self.videos.remove(id);
                } else {
                    self.videos.finish_load(id, Err(TendiesError::Generic(e.to_string())))?;
                }
                Err(e)
            }
        }
    }

    /// Drop a queued video and its stored copy
    pub fn remove_video(&mut self, id: Uuid) -> bool {
        match self.videos.remove(id) {
            Some(video) => {
                if let LoadState::Loaded(path) = video.state {
                    remove_best_effort(&path);
                }
                true
            }
            None => false,
        }
    }

    /// Persist hashes; `None` leaves a stored value untouched
    pub fn set_app_hashes(
        &self,
        poster_board: Option<&str>,
        carplay: Option<&str>,
    ) -> Result<Preferences> {
        self.prefs.update(|p| {
            if let Some(hash) = poster_board {
                p.poster_board_hash = hash.trim().to_string();
            }
            if let Some(hash) = carplay {
                p.carplay_hash = hash.trim().to_string();
            }
        })
    }

    /// Persist hashes handed over by the helper
    pub fn accept_hashes(&self, hashes: &AppHashes) -> Result<Preferences> {
        self.set_app_hashes(Some(&hashes.poster_board), hashes.carplay.as_deref())
    }

    /// Snapshot of everything the next apply will consume
    pub fn deploy_request(&self) -> Result<DeployRequest> {
        let prefs = self.prefs.load()?;
        if prefs.poster_board_hash.is_empty() {
            return Err(TendiesError::MissingAppHash(POSTER_APP_LABEL.to_string()));
        }
        Ok(DeployRequest {
            app_hash: prefs.poster_board_hash,
            bundles: self.bundles.bundles().to_vec(),
            videos: self.videos.loaded(),
        })
    }

    pub fn orchestrator(&self) -> DeploymentOrchestrator {
        DeploymentOrchestrator::new(self.paths.clone(), &self.config.container_root)
            .with_video_builder(self.video_builder.clone())
            .with_options(DeployOptions {
                policy: self.config.bundle_policy,
                video_extension: self.config.video_extension.clone(),
            })
    }

    /// Apply on the calling thread, then clear what was consumed
    pub fn apply(&mut self) -> Result<DeployReport> {
        let request = self.deploy_request()?;
        let report = self.orchestrator().apply(&request)?;
        self.finish_deploy();
        Ok(report)
    }

    /// Forget queued work after a successful apply
    pub fn finish_deploy(&mut self) {
        self.bundles.clear();
        remove_best_effort(&self.paths.bundle_store());
        for video in self.videos.loaded() {
            remove_best_effort(&video.path);
        }
        self.videos.clear();
        debug!("🧺 Queues cleared");
    }

    pub fn carplay_deployer(&self, encoder: Arc<dyn BitmapEncoder>) -> CarPlayDeployer {
        CarPlayDeployer::new(
            self.paths.clone(),
            &self.config.container_root,
            encoder,
            Arc::clone(&self.platform),
            self.prefs.clone(),
        )
    }

    /// Stock CarPlay wallpapers with their persisted overrides
    pub fn carplay_slots(&self) -> Result<Vec<CarPlayWallpaperSlot>> {
        let Some(framework) = &self.config.carplay_framework else {
            return Err(TendiesError::Capability(
                "no CarPlay wallpaper directory configured".to_string(),
            ));
        };
        let order = self.platform.carplay_wallpaper_names();
        discover_slots(framework, &self.paths.carplay_photos(), order.as_deref())
    }

    /// Forget a CarPlay wallpaper override
    pub fn reset_carplay(&self, name: &str) -> Result<()> {
        reset_override(&self.paths, &self.prefs, name)
    }

    /// The CarPlay app hash, required before a CarPlay apply
    pub fn carplay_hash(&self) -> Result<String> {
        let prefs = self.prefs.load()?;
        if prefs.carplay_hash.is_empty() {
            return Err(TendiesError::MissingAppHash(CARPLAY_APP_LABEL.to_string()));
        }
        Ok(prefs.carplay_hash)
    }

    /// Remove everything in the documents root, starting with any tunnel a
    /// crashed run left behind
    pub fn clear_cache(&mut self) -> Result<()> {
        remove_stale_mount(&self.paths.tunnel_mount());

        // preferences may live in the documents root when no config dir is set
        let prefs_file = self.config.prefs_file();
        let mut removed = 0usize;
        for entry in fs::read_dir(self.paths.documents())? {
            let path = entry?.path();
            if path == prefs_file {
                continue;
            }
            remove_best_effort(&path);
            removed += 1;
        }
        if fs::read_dir(self.paths.documents())?.any(|e| e.is_ok_and(|e| e.path() != prefs_file)) {
            warn!("⚠️ Some cached items could not be removed");
        }

        self.bundles = BundleQueue::new(self.paths.bundle_store());
        self.videos.clear();
        info!("🧹 Cleared {removed} cached item(s)");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::poster::platform::{DeviceIdiom, DeviceInfo, NullProbe, OsGeneration, resolve_platform};
    use crate::poster::video::tests::FakeExtractor;
    use tempfile::TempDir;

    fn platform() -> Arc<dyn PlatformCapabilityProvider> {
        resolve_platform(
            DeviceInfo {
                generation: OsGeneration::Ios18,
                idiom: DeviceIdiom::Phone,
                build: String::new(),
            },
            Arc::new(NullProbe),
        )
    }

    fn state(temp: &TempDir, duration: f64) -> AppState {
        let config = Config::new(temp.path().join("docs")).with_config_dir(temp.path().join("cfg"));
        AppState::init(config, Some(Arc::new(FakeExtractor::new(duration, 2))), platform()).unwrap()
    }

    fn video(temp: &TempDir) -> PathBuf {
        let path = temp.path().join("clip.mp4");
        fs::write(&path, b"not really a video").unwrap();
        path
    }

    #[test]
    fn test_init_purges_videos_and_loads_bundles() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(docs.join("Videos")).unwrap();
        fs::write(docs.join("Videos/old.mp4"), b"x").unwrap();
        fs::create_dir_all(docs.join("KFC Bucket")).unwrap();
        fs::write(docs.join("KFC Bucket/a.tendies"), b"x").unwrap();

        let state = state(&temp, 1.0);
        assert!(!docs.join("Videos").exists());
        assert_eq!(state.bundles().len(), 1);
    }

    #[test]
    fn test_import_video() {
        let temp = TempDir::new().unwrap();
        let mut state = state(&temp, 3.0);

        let id = state.import_video(&video(&temp), true).unwrap();
        let loaded = state.videos().loaded();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].auto_reverses);
        assert_eq!(
            loaded[0].path,
            state.paths().videos().join(format!("{id}.mp4"))
        );
        assert!(loaded[0].path.is_file());

        assert!(state.remove_video(id));
        assert!(state.videos().is_empty());
        assert!(!loaded[0].path.exists());
    }

    #[test]
    fn test_long_video_is_rejected_unless_allowed() {
        let temp = TempDir::new().unwrap();
        let mut state = state(&temp, 20.0);

        let err = state.import_video(&video(&temp), false).unwrap_err();
        assert!(matches!(err, TendiesError::VideoTooLong { .. }));
        assert!(state.videos().is_empty());
        assert_eq!(fs::read_dir(state.paths().videos()).unwrap().count(), 0);

        state
            .update_preferences(|p| p.ignore_duration_limit = true)
            .unwrap();
        assert!(state.import_video(&video(&temp), false).is_ok());
    }

    #[test]
    fn test_missing_source_marks_failed() {
        let temp = TempDir::new().unwrap();
        let mut state = state(&temp, 1.0);

        assert!(state.import_video(&temp.path().join("gone.mp4"), false).is_err());
        assert!(matches!(
            state.videos().videos()[0].state,
            LoadState::Failed(_)
        ));
        assert!(state.videos().loaded().is_empty());
    }

    #[test]
    fn test_video_import_needs_extractor() {
        let temp = TempDir::new().unwrap();
        let config = Config::new(temp.path().join("docs"));
        let mut state = AppState::init(config, None, platform()).unwrap();
        assert!(matches!(
            state.import_video(&video(&temp), false),
            Err(TendiesError::Capability(_))
        ));
    }

    #[test]
    fn test_deploy_request_needs_hash() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp, 1.0);
        let err = state.deploy_request().unwrap_err();
        assert_eq!(err.to_string(), "No app hash set for the poster app");
        assert!(matches!(
            state.carplay_hash(),
            Err(TendiesError::MissingAppHash(app)) if app == "the CarPlay app"
        ));

        state.set_app_hashes(Some(" PB \n"), None).unwrap();
        assert_eq!(state.deploy_request().unwrap().app_hash, "PB");
    }

    #[test]
    fn test_accept_hashes_keeps_carplay_when_absent() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp, 1.0);
        state.set_app_hashes(None, Some("CP")).unwrap();

        let prefs = state
            .accept_hashes(&AppHashes {
                poster_board: "PB".to_string(),
                carplay: None,
            })
            .unwrap();
        assert_eq!(prefs.poster_board_hash, "PB");
        assert_eq!(prefs.carplay_hash, "CP");
        assert_eq!(state.carplay_hash().unwrap(), "CP");
    }

    #[test]
    fn test_clear_cache_keeps_preferences() {
        let temp = TempDir::new().unwrap();
        let mut state = state(&temp, 1.0);
        state.set_app_hashes(Some("PB"), None).unwrap();

        let docs = state.paths().documents().to_path_buf();
        fs::create_dir_all(docs.join("UnzipItems/x")).unwrap();
        std::os::unix::fs::symlink(temp.path(), docs.join(".Trash")).unwrap();

        state.clear_cache().unwrap();
        assert_eq!(fs::read_dir(&docs).unwrap().count(), 0);
        assert!(temp.path().is_dir());
        assert_eq!(state.preferences().unwrap().poster_board_hash, "PB");
    }

    #[test]
    fn test_clear_cache_keeps_preferences_in_documents() {
        let temp = TempDir::new().unwrap();
        let config = Config::new(temp.path().join("docs"));
        let mut state = AppState::init(config, None, platform()).unwrap();
        state.set_app_hashes(Some("PB"), Some("CP")).unwrap();

        let docs = state.paths().documents().to_path_buf();
        fs::create_dir_all(docs.join("Videos")).unwrap();
        fs::write(docs.join("stray"), "x").unwrap();

        state.clear_cache().unwrap();
        let left: Vec<_> = fs::read_dir(&docs)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(left, vec![state.config().prefs_file()]);

        let prefs = state.preferences().unwrap();
        assert_eq!(prefs.poster_board_hash, "PB");
        assert_eq!(prefs.carplay_hash, "CP");
    }
}
