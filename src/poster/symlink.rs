//! Tunnel links into another app's container
//!
//! A session mounts a symbolic link at a fixed place in the documents root
//! whose target is a directory inside the target container. Items are
//! "discarded" by renaming them to `<mount>/<name>`; the rename resolves the
//! link in its parent component, so the item lands inside the container.
//! Every link a session creates is removed again by [`SymlinkSession::cleanup`],
//! which also runs on drop.

use super::filesystem::move_item;
use super::paths::container_path;
use crate::exceptions::{Result, TendiesError};
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One open tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkRecord {
    /// Staging-side link path
    pub link: PathBuf,
    /// Resolved container path it points at
    pub target: PathBuf,
}

/// Tracks the links opened for one operation
#[derive(Debug)]
pub struct SymlinkSession {
    container_root: PathBuf,
    app_hash: String,
    mount: PathBuf,
    active: Vec<SymlinkRecord>,
}

impl SymlinkSession {
    pub fn new(
        container_root: impl Into<PathBuf>,
        app_hash: impl Into<String>,
        mount: impl Into<PathBuf>,
    ) -> Self {
        Self {
            container_root: container_root.into(),
            app_hash: app_hash.into(),
            mount: mount.into(),
            active: Vec::new(),
        }
    }

    /// Links currently open
    pub fn active(&self) -> &[SymlinkRecord] {
        &self.active
    }

    /// The staging mount point
    pub fn mount(&self) -> &Path {
        &self.mount
    }

    /// Open a tunnel to `relative` inside the target container.
    ///
    /// Whatever sits at the mount point is removed first. A link whose target
    /// does not resolve is removed again and reported with a `NotFound` cause.
    pub fn create_link(&mut self, relative: &str) -> Result<SymlinkRecord> {
        let target = container_path(&self.container_root, &self.app_hash, relative);
        clear_mount(&self.mount)?;

        if let Some(parent) = self.mount.parent() {
            fs::create_dir_all(parent)?;
        }

        if let Err(source) = make_symlink(&target, &self.mount) {
            return Err(TendiesError::LinkCreationFailed { target, source });
        }

        if let Err(source) = fs::metadata(&self.mount) {
            warn!("🔗 Link target does not resolve: {target:?}");
            let _ = fs::remove_file(&self.mount);
            return Err(TendiesError::LinkCreationFailed { target, source });
        }

        let record = SymlinkRecord {
            link: self.mount.clone(),
            target,
        };
        self.active.retain(|r| r.link != record.link);
        self.active.push(record.clone());
        info!("🔗 Opened tunnel {:?} -> {:?}", record.link, record.target);
        Ok(record)
    }

    /// Relocate `item` through the open tunnel, returning its new path.
    ///
    /// Fails with `AlreadyExists` if the destination name is taken.
    pub fn discard(&self, item: &Path) -> Result<PathBuf> {
        if self.active.is_empty() {
            return Err(TendiesError::Generic(
                "No tunnel is open to discard into".to_string(),
            ));
        }
        let name = item.file_name().ok_or_else(|| {
            TendiesError::Generic(format!("Cannot discard path without a name: {item:?}"))
        })?;
        let dest = self.mount.join(name);

        if fs::symlink_metadata(&dest).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists in the target", dest.display()),
            )
            .into());
        }

        move_item(item, &dest)?;
        debug!("🚚 Relocated {item:?} through tunnel");
        Ok(dest)
    }

    /// Like [`discard`](Self::discard), but an existing file of the same name
    /// in the target is overwritten
    pub fn replace(&self, item: &Path) -> Result<PathBuf> {
        if let (Some(name), false) = (item.file_name(), self.active.is_empty()) {
            let dest = self.mount.join(name);
            if fs::symlink_metadata(&dest).is_ok_and(|m| m.is_file()) {
                debug!("♻️ Replacing {dest:?}");
                fs::remove_file(&dest)?;
            }
        }
        self.discard(item)
    }

    /// Remove every tracked link. Only staging-side links are touched; the
    /// targets are never deleted. Safe to call any number of times.
    pub fn cleanup(&mut self) {
        for record in self.active.drain(..) {
            match fs::symlink_metadata(&record.link) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    if let Err(e) = fs::remove_file(&record.link) {
                        warn!("⚠️ Failed to remove tunnel {:?}: {e}", record.link);
                    } else {
                        debug!("🔓 Closed tunnel {:?}", record.link);
                    }
                }
                Ok(_) => debug!("⚠️ {:?} is no longer a link, leaving it", record.link),
                Err(_) => {}
            }
        }
    }

    /// Open a tunnel, run `f`, and close the tunnel on every exit path
    pub fn with_link<T>(
        &mut self,
        relative: &str,
        f: impl FnOnce(&Self) -> Result<T>,
    ) -> Result<T> {
        let result = match self.create_link(relative) {
            Ok(_) => f(self),
            Err(e) => Err(e),
        };
        self.cleanup();
        result
    }
}

impl Drop for SymlinkSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Remove a link left at the mount point by an earlier crashed process.
/// Returns true if one was removed.
pub fn remove_stale_mount(mount: &Path) -> bool {
    match fs::symlink_metadata(mount) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::remove_file(mount).is_ok() {
                info!("🧹 Removed stale tunnel {mount:?}");
                true
            } else {
                false
            }
        }
        _ => false,
    }
}

fn clear_mount(mount: &Path) -> Result<()> {
    match fs::symlink_metadata(mount) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(mount)?,
        Ok(_) => fs::remove_file(mount)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are only supported on unix",
    ))
}
