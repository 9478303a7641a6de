//! Path management for the staging root and target containers

use super::defaults::{
    CARPLAY_CACHE_SUBPATH, DEFAULT_BUNDLE_STORE_DIR, DEFAULT_CACHE_MARKER,
    DEFAULT_CARPLAY_PHOTOS_DIR, DEFAULT_HASH_FILE, DEFAULT_LOCK_FILE, DEFAULT_TUNNEL_MOUNT,
    DEFAULT_UNZIP_DIR, DEFAULT_VIDEOS_DIR, DESCRIPTORS_DIR, EXTENSION_STORE_SUBPATH,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Resolve a path inside another app's container.
///
/// Pure concatenation: nothing is checked against the filesystem, so a wrong
/// app hash only shows up once something is written through the result.
pub fn container_path(container_root: &Path, app_hash: &str, relative: &str) -> PathBuf {
    let hash = app_hash.trim_matches('/');
    let relative = relative.trim_start_matches('/');
    let base = container_root.join(hash);
    if relative.is_empty() {
        base
    } else {
        base.join(relative)
    }
}

/// Container-relative path of an extension's descriptor directory
pub fn descriptors_subpath(extension: &str) -> String {
    format!("{EXTENSION_STORE_SUBPATH}/{extension}/{DESCRIPTORS_DIR}")
}

/// Container-relative path of the CarPlay wallpaper image cache
pub fn carplay_subpath() -> String {
    CARPLAY_CACHE_SUBPATH.to_string()
}

/// Manages all paths under the private documents root
#[derive(Debug, Clone)]
pub struct StagingPaths {
    documents: PathBuf,
}

impl StagingPaths {
    /// Create paths rooted at a documents directory
    pub fn new(documents: impl Into<PathBuf>) -> Self {
        Self {
            documents: documents.into(),
        }
    }

    /// The documents root itself
    pub fn documents(&self) -> &Path {
        &self.documents
    }

    // ==================== Queue Paths ====================

    /// Store for imported bundles
    pub fn bundle_store(&self) -> PathBuf {
        self.documents.join(DEFAULT_BUNDLE_STORE_DIR)
    }

    /// Imported video cache
    pub fn videos(&self) -> PathBuf {
        self.documents.join(DEFAULT_VIDEOS_DIR)
    }

    /// Persisted CarPlay override images
    pub fn carplay_photos(&self) -> PathBuf {
        self.documents.join(DEFAULT_CARPLAY_PHOTOS_DIR)
    }

    // ==================== Scratch Paths ====================

    /// Extraction scratch root
    pub fn unzip_root(&self) -> PathBuf {
        self.documents.join(DEFAULT_UNZIP_DIR)
    }

    /// A specific extraction scratch directory
    pub fn unzip_scratch(&self, id: &Uuid) -> PathBuf {
        self.unzip_root().join(id.to_string())
    }

    /// A fresh uuid-named path directly under the documents root
    pub fn fresh_item(&self) -> PathBuf {
        self.documents.join(Uuid::new_v4().to_string())
    }

    // ==================== Tunnel Paths ====================

    /// Where the tunnel link is mounted
    pub fn tunnel_mount(&self) -> PathBuf {
        self.documents.join(DEFAULT_TUNNEL_MOUNT)
    }

    /// Cache invalidation marker
    pub fn cache_marker(&self) -> PathBuf {
        self.documents.join(DEFAULT_CACHE_MARKER)
    }

    /// Deployment lock file
    pub fn lock_file(&self) -> PathBuf {
        self.documents.join(DEFAULT_LOCK_FILE)
    }

    /// Default location of the app-hash drop file
    pub fn hash_file(&self) -> PathBuf {
        self.documents.join(DEFAULT_HASH_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_path() {
        let root = Path::new("/var/mobile/Containers/Data/Application");
        let path = container_path(root, "ABCD-1234", &descriptors_subpath("com.example.Ext"));
        assert_eq!(
            path,
            PathBuf::from(
                "/var/mobile/Containers/Data/Application/ABCD-1234/Library/Application Support/PRBPosterExtensionDataStore/61/Extensions/com.example.Ext/descriptors"
            )
        );
    }

    #[test]
    fn test_container_path_trims_slashes() {
        let root = Path::new("/containers");
        assert_eq!(
            container_path(root, "/hash/", "/Library/Caches"),
            PathBuf::from("/containers/hash/Library/Caches")
        );
        assert_eq!(container_path(root, "hash", ""), PathBuf::from("/containers/hash"));
    }

    #[test]
    fn test_staging_paths() {
        let paths = StagingPaths::new("/docs");
        assert_eq!(paths.bundle_store(), PathBuf::from("/docs/KFC Bucket"));
        assert_eq!(paths.unzip_root(), PathBuf::from("/docs/UnzipItems"));
        assert_eq!(paths.tunnel_mount(), PathBuf::from("/docs/.Trash"));
        assert_eq!(paths.cache_marker(), PathBuf::from("/docs/Caches"));
        assert_eq!(paths.hash_file(), PathBuf::from("/docs/NuggetAppHash"));

        let fresh = paths.fresh_item();
        assert_eq!(fresh.parent(), Some(Path::new("/docs")));
        assert_ne!(fresh, paths.fresh_item());
    }
}
