//! Full apply pipeline
//!
//! One apply builds any queued videos into descriptors, extracts and
//! classifies every queued bundle, then relocates each descriptor instance
//! through one tunnel per extension. Scratch space is cleared on every exit
//! path.

use super::defaults::{
    DEFAULT_UNZIP_DIR, POSTER_APP_LABEL, RESERVED_STAGING_NAMES, RESOURCE_FORK_DIR,
    VIDEO_EXTENSION,
};
use super::extraction::{ArchiveExtractor, DescriptorSet, ExtensionGroup, classify};
use super::filesystem::{list_visible, move_item, remove_best_effort};
use super::locking::DeployLock;
use super::paths::{StagingPaths, descriptors_subpath};
use super::queue::VideoSource;
use super::randomizer::IdentifierRandomizer;
use super::symlink::SymlinkSession;
use super::video::VideoDescriptorBuilder;
use crate::exceptions::{Result, TendiesError};
use log::{debug, info, warn};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// What to do with a bundle that fails to extract or holds nothing usable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BundleFailurePolicy {
    /// Log it, report it and carry on with the rest
    #[default]
    Skip,
    /// Fail the whole apply
    Abort,
}

impl BundleFailurePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Some(BundleFailurePolicy::Skip),
            "abort" => Some(BundleFailurePolicy::Abort),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub policy: BundleFailurePolicy,
    /// Extension key generated video descriptors are filed under
    pub video_extension: String,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            policy: BundleFailurePolicy::default(),
            video_extension: VIDEO_EXTENSION.to_string(),
        }
    }
}

/// Everything one apply consumes
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    pub app_hash: String,
    pub bundles: Vec<PathBuf>,
    pub videos: Vec<VideoSource>,
}

/// One instance that landed in the target container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedDescriptor {
    pub extension: String,
    /// Name the instance was given inside the target
    pub staged_name: String,
    pub identifier: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DeployReport {
    pub deployed: Vec<DeployedDescriptor>,
    /// Bundles left out, with the reason
    pub skipped_bundles: Vec<(PathBuf, String)>,
    /// Videos left out, with the reason
    pub skipped_videos: Vec<(PathBuf, String)>,
}

/// Scratch paths removed when an apply finishes, however it finishes
struct ScratchGuard {
    paths: Vec<PathBuf>,
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            remove_best_effort(path);
        }
        debug!("🧹 Cleared {} scratch path(s)", self.paths.len());
    }
}

/// Sequences video build, extraction, classification and relocation
#[derive(Debug, Clone)]
pub struct DeploymentOrchestrator {
    paths: StagingPaths,
    container_root: PathBuf,
    extractor: ArchiveExtractor,
    randomizer: IdentifierRandomizer,
    video_builder: Option<VideoDescriptorBuilder>,
    options: DeployOptions,
}

impl DeploymentOrchestrator {
    pub fn new(paths: StagingPaths, container_root: impl Into<PathBuf>) -> Self {
        Self {
            extractor: ArchiveExtractor::new(paths.clone()),
            paths,
            container_root: container_root.into(),
            randomizer: IdentifierRandomizer::new(),
            video_builder: None,
            options: DeployOptions::default(),
        }
    }

    pub fn with_video_builder(mut self, builder: Option<VideoDescriptorBuilder>) -> Self {
        self.video_builder = builder;
        self
    }

    pub fn with_options(mut self, options: DeployOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Run one apply.
    ///
    /// Errors while relocating abort the rest of the batch; the tunnel is
    /// closed and scratch space removed either way.
    pub fn apply(&self, request: &DeployRequest) -> Result<DeployReport> {
        if request.app_hash.trim().is_empty() {
            return Err(TendiesError::MissingAppHash(POSTER_APP_LABEL.to_string()));
        }
        let _lock = DeployLock::acquire(self.paths.lock_file())?;
        info!(
            "🚀 Applying {} bundle(s) and {} video(s)",
            request.bundles.len(),
            request.videos.len()
        );

        let mut scratch = ScratchGuard {
            paths: vec![self.paths.documents().join(DEFAULT_UNZIP_DIR)],
        };
        let mut report = DeployReport::default();
        let mut descriptors = DescriptorSet::new();

        self.build_videos(request, &mut descriptors, &mut scratch, &mut report);
        self.extract_bundles(request, &mut descriptors, &mut scratch, &mut report)?;

        if descriptors.is_empty() {
            info!("🤷 Nothing to deploy");
            return Ok(report);
        }

        let mut session = SymlinkSession::new(
            &self.container_root,
            &request.app_hash,
            self.paths.tunnel_mount(),
        );
        for group in descriptors.groups() {
            let deployed = self.deploy_group(&mut session, group)?;
            report.deployed.extend(deployed);
        }

        info!("✅ Deployed {} descriptor(s)", report.deployed.len());
        Ok(report)
    }

    fn build_videos(
        &self,
        request: &DeployRequest,
        descriptors: &mut DescriptorSet,
        scratch: &mut ScratchGuard,
        report: &mut DeployReport,
    ) {
        if request.videos.is_empty() {
            return;
        }
        let Some(builder) = &self.video_builder else {
            for video in &request.videos {
                warn!("⚠️ No frame extractor available, skipping {:?}", video.path);
                report
                    .skipped_videos
                    .push((video.path.clone(), "no frame extractor available".to_string()));
            }
            return;
        };

        let mut built = Vec::new();
        for video in &request.videos {
            match builder.build(video) {
                Ok(dir) => {
                    scratch.paths.push(dir.clone());
                    built.push(dir);
                }
                Err(e) => {
                    warn!("⚠️ Video build failed for {:?}: {e}", video.path);
                    report.skipped_videos.push((video.path.clone(), e.to_string()));
                }
            }
        }
        if !built.is_empty() {
            descriptors.insert(&self.options.video_extension, built);
        }
    }

    fn extract_bundles(
        &self,
        request: &DeployRequest,
        descriptors: &mut DescriptorSet,
        scratch: &mut ScratchGuard,
        report: &mut DeployReport,
    ) -> Result<()> {
        for bundle in &request.bundles {
            for name in [bundle.file_name(), bundle.file_stem()].into_iter().flatten() {
                if is_reserved_name(name) {
                    debug!("⏭️ Keeping reserved staging entry {name:?}");
                    continue;
                }
                scratch.paths.push(self.paths.documents().join(name));
            }

            let outcome = self
                .extractor
                .extract(bundle)
                .and_then(|root| classify(&root.content));
            let reason = match outcome {
                Ok(set) if !set.is_empty() => {
                    debug!("🗂️ {bundle:?} holds {} extension group(s)", set.groups().len());
                    descriptors.merge(set);
                    continue;
                }
                Ok(_) => TendiesError::InvalidBundle(format!(
                    "no descriptors found in {}",
                    bundle.display()
                )),
                Err(e) => e,
            };

            match self.options.policy {
                BundleFailurePolicy::Abort => return Err(reason),
                BundleFailurePolicy::Skip => {
                    warn!("⚠️ Skipping bundle {bundle:?}: {reason}");
                    report.skipped_bundles.push((bundle.clone(), reason.to_string()));
                }
            }
        }
        Ok(())
    }

    fn deploy_group(
        &self,
        session: &mut SymlinkSession,
        group: &ExtensionGroup,
    ) -> Result<Vec<DeployedDescriptor>> {
        info!("📤 Deploying to {}", group.extension);
        session.with_link(&descriptors_subpath(&group.extension), |tunnel| {
            let mut deployed = Vec::new();
            for dir in &group.directories {
                if !dir.is_dir() {
                    warn!("⚠️ Descriptor directory {dir:?} does not exist, skipping");
                    continue;
                }
                for instance in list_visible(dir)? {
                    if is_resource_fork(&instance) {
                        debug!("⏭️ Skipping {instance:?}");
                        continue;
                    }
                    deployed.push(self.relocate(tunnel, &group.extension, &instance)?);
                }
            }
            Ok(deployed)
        })
    }

    fn relocate(
        &self,
        tunnel: &SymlinkSession,
        extension: &str,
        instance: &Path,
    ) -> Result<DeployedDescriptor> {
        let outcome = self.randomizer.randomize(instance)?;

        let staged = self.paths.fresh_item();
        move_item(instance, &staged)?;
        let landed = tunnel.discard(&staged).inspect_err(|_| {
            remove_best_effort(&staged);
        })?;

        let staged_name = landed
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!("📬 {instance:?} landed as {staged_name}");
        Ok(DeployedDescriptor {
            extension: extension.to_string(),
            staged_name,
            identifier: outcome.identifier,
        })
    }
}

fn is_reserved_name(name: &OsStr) -> bool {
    RESERVED_STAGING_NAMES.iter().any(|reserved| name == *reserved)
}

fn is_resource_fork(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n == RESOURCE_FORK_DIR)
}
