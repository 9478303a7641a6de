//! Pending bundles and videos waiting to be applied

use super::defaults::{BUNDLE_EXTENSION, MAX_QUEUED_BUNDLES, MAX_QUEUED_VIDEOS};
use super::filesystem::{list_visible, remove_best_effort};
use crate::exceptions::{Result, TendiesError};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Ordered list of bundle archives, capped at [`MAX_QUEUED_BUNDLES`]
#[derive(Debug, Clone)]
pub struct BundleQueue {
    store: PathBuf,
    bundles: Vec<PathBuf>,
}

impl BundleQueue {
    /// Empty queue backed by a store directory
    pub fn new(store: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
            bundles: Vec::new(),
        }
    }

    /// Rebuild the queue from bundles already in the store
    pub fn load(store: impl Into<PathBuf>) -> Result<Self> {
        let mut queue = Self::new(store);
        if queue.store.is_dir() {
            queue.bundles = list_visible(&queue.store)?
                .into_iter()
                .filter(|p| p.is_file() && is_bundle(p))
                .collect();
        }
        debug!("📋 Loaded {} queued bundle(s)", queue.bundles.len());
        Ok(queue)
    }

    /// Queued store copies, in apply order
    pub fn bundles(&self) -> &[PathBuf] {
        &self.bundles
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Directory holding the queued copies
    pub fn store(&self) -> &Path {
        &self.store
    }

    /// Copy a `.tendies` file into the store and queue the copy
    pub fn import(&mut self, source: &Path) -> Result<PathBuf> {
        if !is_bundle(source) {
            return Err(TendiesError::InvalidBundle(format!(
                "only .{BUNDLE_EXTENSION} files can be imported: {}",
                source.display()
            )));
        }
        self.ensure_room(1)?;

        let name = source.file_name().ok_or_else(|| {
            TendiesError::InvalidBundle(format!("no file name in {}", source.display()))
        })?;
        fs::create_dir_all(&self.store)?;
        let dest = self.store.join(name);
        if self.bundles.contains(&dest) {
            return Err(TendiesError::InvalidBundle(format!(
                "{} is already queued",
                dest.display()
            )));
        }
        if source != dest {
            fs::copy(source, &dest)?;
        }
        self.bundles.push(dest.clone());
        info!("📥 Imported {}", dest.display());
        Ok(dest)
    }

    /// Queue a bundle already on disk
    pub fn add(&mut self, bundle: PathBuf) -> Result<()> {
        self.ensure_room(1)?;
        self.bundles.push(bundle);
        Ok(())
    }

    /// Queue several bundles, or none if they don't all fit
    pub fn add_all(&mut self, bundles: Vec<PathBuf>) -> Result<()> {
        self.ensure_room(bundles.len())?;
        self.bundles.extend(bundles);
        Ok(())
    }

    /// Drop a bundle from the queue and delete its store copy
    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        if index >= self.bundles.len() {
            return None;
        }
        let bundle = self.bundles.remove(index);
        if bundle.starts_with(&self.store) {
            remove_best_effort(&bundle);
        }
        Some(bundle)
    }

    /// Forget every entry; store copies are left for the caller to remove
    pub fn clear(&mut self) {
        self.bundles.clear();
    }

    fn ensure_room(&self, extra: usize) -> Result<()> {
        if self.bundles.len() + extra > MAX_QUEUED_BUNDLES {
            return Err(TendiesError::QueueFull {
                limit: MAX_QUEUED_BUNDLES,
            });
        }
        Ok(())
    }
}

fn is_bundle(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(BUNDLE_EXTENSION))
}

/// Import progress of a queued video
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unknown,
    Loading,
    Loaded(PathBuf),
    Failed(String),
}

/// A video waiting to become a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedVideo {
    pub id: Uuid,
    pub auto_reverses: bool,
    pub state: LoadState,
}

/// A loaded video ready for the descriptor builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    pub path: PathBuf,
    pub auto_reverses: bool,
}

/// Queued videos, capped at [`MAX_QUEUED_VIDEOS`]
#[derive(Debug, Clone, Default)]
pub struct VideoQueue {
    videos: Vec<QueuedVideo>,
}

impl VideoQueue {
    /// Empty queue; videos are never persisted
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry, whatever its load state
    pub fn videos(&self) -> &[QueuedVideo] {
        &self.videos
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// Reserve a slot for a new import
    pub fn reserve(&mut self) -> Result<Uuid> {
        if self.videos.len() >= MAX_QUEUED_VIDEOS {
            return Err(TendiesError::QueueFull {
                limit: MAX_QUEUED_VIDEOS,
            });
        }
        let id = Uuid::new_v4();
        self.videos.push(QueuedVideo {
            id,
            auto_reverses: false,
            state: LoadState::Unknown,
        });
        Ok(id)
    }

    /// `Unknown -> Loading`
    pub fn begin_load(&mut self, id: Uuid) -> Result<()> {
        let video = self.get_mut(id)?;
        if video.state != LoadState::Unknown {
            return Err(invalid_transition(&video.state, "loading"));
        }
        video.state = LoadState::Loading;
        Ok(())
    }

    /// `Loading -> Loaded | Failed`
    pub fn finish_load(&mut self, id: Uuid, outcome: Result<PathBuf>) -> Result<()> {
        let video = self.get_mut(id)?;
        if video.state != LoadState::Loading {
            return Err(invalid_transition(&video.state, "finished"));
        }
        video.state = match outcome {
            Ok(path) => LoadState::Loaded(path),
            Err(e) => LoadState::Failed(e.to_string()),
        };
        Ok(())
    }

    /// Flip auto-reverse on a loaded video, returning the new value
    pub fn toggle_auto_reverse(&mut self, id: Uuid) -> Result<bool> {
        let video = self.get_mut(id)?;
        if !matches!(video.state, LoadState::Loaded(_)) {
            return Err(TendiesError::Generic(
                "auto-reverse can only be changed on a loaded video".to_string(),
            ));
        }
        video.auto_reverses = !video.auto_reverses;
        Ok(video.auto_reverses)
    }

    /// Drop an entry; its imported file stays on disk
    pub fn remove(&mut self, id: Uuid) -> Option<QueuedVideo> {
        let index = self.videos.iter().position(|v| v.id == id)?;
        Some(self.videos.remove(index))
    }

    /// Every video in the `Loaded` state, in queue order
    pub fn loaded(&self) -> Vec<VideoSource> {
        self.videos
            .iter()
            .filter_map(|v| match &v.state {
                LoadState::Loaded(path) => Some(VideoSource {
                    path: path.clone(),
                    auto_reverses: v.auto_reverses,
                }),
                _ => None,
            })
            .collect()
    }

    /// Forget every entry
    pub fn clear(&mut self) {
        self.videos.clear();
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut QueuedVideo> {
        self.videos
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| TendiesError::Generic(format!("no queued video {id}")))
    }
}

fn invalid_transition(from: &LoadState, to: &str) -> TendiesError {
    TendiesError::Generic(format!("video cannot become {to} from {from:?}"))
}
