//! Serial deployment worker
//!
//! All deployments run on one background thread, one after another, so two
//! applies never share the tunnel mount.

use super::carplay::{CarPlayDeployer, CarPlayReport, CarPlayWallpaperSlot};
use super::deploy::{DeployReport, DeployRequest, DeploymentOrchestrator};
use super::symlink::remove_stale_mount;
use crate::exceptions::{Result, TendiesError};
use log::{debug, error, info};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

enum DeployJob {
    ApplyTendies {
        orchestrator: DeploymentOrchestrator,
        request: DeployRequest,
        reply: Sender<Result<DeployReport>>,
    },
    ApplyCarPlay {
        deployer: CarPlayDeployer,
        app_hash: String,
        slots: Vec<CarPlayWallpaperSlot>,
        reply: Sender<Result<CarPlayReport>>,
    },
    Shutdown,
}

/// Handle to the deployment thread; dropping it stops the thread
#[derive(Debug)]
pub struct DeployWorker {
    jobs: Sender<DeployJob>,
    handle: Option<JoinHandle<()>>,
}

impl DeployWorker {
    /// Start the thread. A tunnel left at `tunnel_mount` by a crashed run is
    /// removed first.
    pub fn spawn(tunnel_mount: PathBuf) -> Result<Self> {
        let (jobs, queue) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("tendies-deploy".to_string())
            .spawn(move || {
                remove_stale_mount(&tunnel_mount);
                run(queue);
            })?;
        debug!("🧵 Deploy worker started");
        Ok(Self {
            jobs,
            handle: Some(handle),
        })
    }

    /// Run an apply on the worker and wait for it
    pub fn apply_tendies(
        &self,
        orchestrator: DeploymentOrchestrator,
        request: DeployRequest,
    ) -> Result<DeployReport> {
        let (reply, result) = mpsc::channel();
        self.submit(DeployJob::ApplyTendies {
            orchestrator,
            request,
            reply,
        })?;
        result.recv().map_err(|_| worker_gone())?
    }

    /// Run a CarPlay apply on the worker and wait for it
    pub fn apply_carplay(
        &self,
        deployer: CarPlayDeployer,
        app_hash: String,
        slots: Vec<CarPlayWallpaperSlot>,
    ) -> Result<CarPlayReport> {
        let (reply, result) = mpsc::channel();
        self.submit(DeployJob::ApplyCarPlay {
            deployer,
            app_hash,
            slots,
            reply,
        })?;
        result.recv().map_err(|_| worker_gone())?
    }

    /// Stop accepting jobs and wait for the thread to finish
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn submit(&self, job: DeployJob) -> Result<()> {
        self.jobs.send(job).map_err(|_| worker_gone())
    }

    fn stop(&mut self) {
        let _ = self.jobs.send(DeployJob::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("❌ Deploy worker panicked");
            }
        }
    }
}

impl Drop for DeployWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(queue: Receiver<DeployJob>) {
    while let Ok(job) = queue.recv() {
        match job {
            DeployJob::ApplyTendies {
                orchestrator,
                request,
                reply,
            } => {
                deliver(&reply, "apply", orchestrator.apply(&request));
            }
            DeployJob::ApplyCarPlay {
                deployer,
                app_hash,
                slots,
                reply,
            } => {
                deliver(&reply, "CarPlay apply", deployer.apply(&app_hash, &slots));
            }
            DeployJob::Shutdown => break,
        }
    }
    info!("🧵 Deploy worker stopped");
}

/// Hand a result back; false if the caller stopped waiting
fn deliver<T>(reply: &Sender<Result<T>>, job: &str, result: Result<T>) -> bool {
    let outcome = match &result {
        Ok(_) => "succeeded".to_string(),
        Err(e) => format!("failed: {e}"),
    };
    if reply.send(result).is_err() {
        debug!("⚠️ Nobody is waiting for the {job} result, which {outcome}");
        return false;
    }
    true
}

fn worker_gone() -> TendiesError {
    TendiesError::Generic("deploy worker is not running".to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::poster::paths::StagingPaths;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_removes_stale_mount_and_runs_jobs() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        let paths = StagingPaths::new(&docs);
        std::os::unix::fs::symlink(temp.path(), paths.tunnel_mount()).unwrap();

        let worker = DeployWorker::spawn(paths.tunnel_mount()).unwrap();
        let orchestrator = DeploymentOrchestrator::new(paths.clone(), temp.path().join("c"));
        let request = DeployRequest {
            app_hash: "HASH".to_string(),
            ..DeployRequest::default()
        };

        // jobs run in order, so the stale link is gone by the time this returns
        let report = worker.apply_tendies(orchestrator.clone(), request.clone()).unwrap();
        assert!(report.deployed.is_empty());
        assert!(fs::symlink_metadata(paths.tunnel_mount()).is_err());

        assert!(worker.apply_tendies(orchestrator, request).is_ok());
        worker.shutdown();
    }

    #[test]
    fn test_errors_come_back_to_the_caller() {
        let temp = TempDir::new().unwrap();
        let paths = StagingPaths::new(temp.path());
        let worker = DeployWorker::spawn(paths.tunnel_mount()).unwrap();

        let err = worker
            .apply_tendies(
                DeploymentOrchestrator::new(paths, temp.path()),
                DeployRequest::default(),
            )
            .unwrap_err();
        assert!(matches!(err, TendiesError::MissingAppHash(_)));
    }

    #[test]
    fn test_abandoned_reply_keeps_worker_running() {
        let temp = TempDir::new().unwrap();
        let paths = StagingPaths::new(temp.path());
        let worker = DeployWorker::spawn(paths.tunnel_mount()).unwrap();
        let orchestrator = DeploymentOrchestrator::new(paths, temp.path());

        let (reply, result) = mpsc::channel();
        drop(result);
        worker
            .submit(DeployJob::ApplyTendies {
                orchestrator: orchestrator.clone(),
                request: DeployRequest::default(),
                reply,
            })
            .unwrap();

        let err = worker
            .apply_tendies(orchestrator, DeployRequest::default())
            .unwrap_err();
        assert!(matches!(err, TendiesError::MissingAppHash(_)));
        worker.shutdown();
    }

    #[test]
    fn test_deliver_reports_missing_receiver() {
        let (reply, result) = mpsc::channel::<Result<()>>();
        assert!(deliver(&reply, "apply", Ok(())));
        assert!(result.recv().unwrap().is_ok());

        drop(result);
        assert!(!deliver(&reply, "apply", Err(TendiesError::Cancelled)));
    }
}
