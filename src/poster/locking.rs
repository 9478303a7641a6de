//! Lock file guarding deployments across processes

use crate::exceptions::{Result, TendiesError};
use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Check if a process with given PID is still running
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    let proc_path = format!("/proc/{pid}");
    Path::new(&proc_path).exists()
}

#[cfg(not(unix))]
pub fn is_process_running(_pid: u32) -> bool {
    false
}

/// Held for the duration of one deployment; released on drop
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
}

impl DeployLock {
    /// Take the lock, clearing it first if its owner is gone
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if path.exists() {
            debug!("🔍 Lock file exists, checking if it's stale...");
            match fs::read_to_string(&path)
                .ok()
                .and_then(|c| c.trim().parse::<u32>().ok())
            {
                Some(pid) if pid != std::process::id() && is_process_running(pid) => {
                    debug!("🔒 Lock held by active process (PID: {pid})");
                    return Err(TendiesError::DeployInProgress(pid));
                }
                Some(pid) => {
                    info!("🧹 Removing stale lock (PID: {pid})");
                    fs::remove_file(&path)?;
                }
                None => {
                    info!("🧹 Removing unreadable lock file");
                    fs::remove_file(&path)?;
                }
            }
        }

        let pid = std::process::id();
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                writeln!(file, "{pid}")?;
                debug!("🔒 Acquired deploy lock (PID: {pid})");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .ok()
                    .and_then(|c| c.trim().parse().ok())
                    .unwrap_or(0);
                Err(TendiesError::DeployInProgress(holder))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            debug!("⚠️ Failed to remove lock file: {e}");
        } else {
            debug!("🔓 Released deploy lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deploy.lock");
        {
            let lock = DeployLock::acquire(&path).unwrap();
            assert_eq!(
                fs::read_to_string(lock.path()).unwrap().trim(),
                std::process::id().to_string()
            );
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_lock_is_replaced() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deploy.lock");
        // PIDs this large are never handed out
        fs::write(&path, "4194999\n").unwrap();

        let _lock = DeployLock::acquire(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_garbage_lock_is_replaced() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deploy.lock");
        fs::write(&path, "not a pid").unwrap();
        assert!(DeployLock::acquire(&path).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_live_lock_is_respected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deploy.lock");
        // pid 1 is always alive
        fs::write(&path, "1\n").unwrap();

        assert!(matches!(
            DeployLock::acquire(&path),
            Err(TendiesError::DeployInProgress(1))
        ));
        assert!(path.exists());
    }
}
