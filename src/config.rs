//! Runtime configuration resolved from the environment

use crate::poster::defaults::{DEFAULT_CONTAINER_ROOT, DEFAULT_HASH_FILE, DEFAULT_PREFS_FILE, VIDEO_EXTENSION};
use crate::poster::deploy::BundleFailurePolicy;
use crate::poster::platform::{DeviceIdiom, DeviceInfo, OsGeneration};
use crate::utils::{env_non_empty, get_config_dir, get_documents_dir};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// OS major version assumed when none is configured
pub const DEFAULT_OS_MAJOR: u32 = 18;

#[derive(Debug, Clone)]
pub struct Config {
    /// Private documents root
    pub documents: PathBuf,
    /// Directory holding the preference file
    pub config_dir: PathBuf,
    /// Root of installed-app containers
    pub container_root: PathBuf,
    /// Where the helper drops the app-hash file
    pub hash_dir: PathBuf,
    pub bundle_policy: BundleFailurePolicy,
    pub video_extension: String,
    pub video_template: Option<PathBuf>,
    pub carplay_framework: Option<PathBuf>,
    pub device: DeviceInfo,
}

impl Config {
    /// Defaults rooted at `documents`
    pub fn new(documents: impl Into<PathBuf>) -> Self {
        let documents = documents.into();
        Self {
            config_dir: documents.clone(),
            hash_dir: documents.clone(),
            documents,
            container_root: PathBuf::from(DEFAULT_CONTAINER_ROOT),
            bundle_policy: BundleFailurePolicy::default(),
            video_extension: VIDEO_EXTENSION.to_string(),
            video_template: None,
            carplay_framework: None,
            device: DeviceInfo {
                generation: OsGeneration::from_major(DEFAULT_OS_MAJOR),
                idiom: DeviceIdiom::Phone,
                build: String::new(),
            },
        }
    }

    /// Resolve every `TENDIES_*` setting
    pub fn from_env() -> Self {
        let documents = get_documents_dir();
        let mut config = Self::new(&documents);
        config.config_dir = get_config_dir();

        if let Some(root) = env_non_empty("TENDIES_CONTAINER_ROOT") {
            config.container_root = PathBuf::from(root);
        }
        if let Some(dir) = env_non_empty("TENDIES_HASH_DIR") {
            config.hash_dir = PathBuf::from(dir);
        }
        if let Some(policy) = env_non_empty("TENDIES_BUNDLE_POLICY") {
            match BundleFailurePolicy::parse(&policy) {
                Some(policy) => config.bundle_policy = policy,
                None => warn!("⚠️ Unknown TENDIES_BUNDLE_POLICY '{policy}', using skip"),
            }
        }
        if let Some(extension) = env_non_empty("TENDIES_VIDEO_EXTENSION") {
            config.video_extension = extension;
        }
        config.video_template = env_non_empty("TENDIES_VIDEO_TEMPLATE").map(PathBuf::from);
        config.carplay_framework = env_non_empty("TENDIES_CARPLAY_FRAMEWORK").map(PathBuf::from);

        let major = match env_non_empty("TENDIES_OS_VERSION") {
            Some(v) => parse_major(&v).unwrap_or_else(|| {
                warn!("⚠️ Unparseable TENDIES_OS_VERSION '{v}', assuming {DEFAULT_OS_MAJOR}");
                DEFAULT_OS_MAJOR
            }),
            None => DEFAULT_OS_MAJOR,
        };
        config.device = DeviceInfo {
            generation: OsGeneration::from_major(major),
            idiom: env_non_empty("TENDIES_DEVICE_IDIOM")
                .map(|i| DeviceIdiom::parse(&i))
                .unwrap_or(DeviceIdiom::Phone),
            build: env_non_empty("TENDIES_OS_BUILD").unwrap_or_default(),
        };

        debug!("⚙️ Configuration: {config:?}");
        config
    }

    pub fn with_container_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.container_root = root.into();
        self
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_hash_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.hash_dir = dir.into();
        self
    }

    pub fn with_bundle_policy(mut self, policy: BundleFailurePolicy) -> Self {
        self.bundle_policy = policy;
        self
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    pub fn prefs_file(&self) -> PathBuf {
        self.config_dir.join(DEFAULT_PREFS_FILE)
    }

    pub fn hash_file(&self) -> PathBuf {
        self.hash_dir.join(DEFAULT_HASH_FILE)
    }

    pub fn documents(&self) -> &Path {
        &self.documents
    }
}

/// Major component of a dotted version such as `18.2.1`
fn parse_major(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.parse().ok()
}
