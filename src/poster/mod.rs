//! Poster deployment core
//!
//! Staging, extraction, identifier rewriting and the symlink tunnel that
//! carries descriptors into the poster app's container.

pub mod carplay;
pub mod catalog;
pub mod defaults;
pub mod deploy;
pub mod extraction;
pub mod filesystem;
pub mod hash_watch;
pub mod links;
pub mod locking;
pub mod paths;
pub mod platform;
pub mod prefs;
pub mod queue;
pub mod randomizer;
pub mod state;
pub mod symlink;
pub mod video;
pub mod worker;

pub use carplay::{CarPlayDeployer, CarPlayReport, CarPlayWallpaperSlot};
pub use deploy::{
    BundleFailurePolicy, DeployOptions, DeployReport, DeployRequest, DeployedDescriptor,
    DeploymentOrchestrator,
};
pub use extraction::{ArchiveExtractor, DescriptorSet, classify};
pub use hash_watch::{AppHashes, CancellationToken, HashWatcher};
pub use links::DeepLink;
pub use paths::StagingPaths;
pub use platform::{DeviceInfo, PlatformCapabilityProvider, resolve_platform};
pub use prefs::{PreferenceStore, Preferences};
pub use queue::{BundleQueue, LoadState, VideoQueue, VideoSource};
pub use randomizer::IdentifierRandomizer;
pub use state::AppState;
pub use symlink::SymlinkSession;
pub use worker::DeployWorker;
