//! End-to-end apply through the public API

#![cfg(unix)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tendies::poster::defaults::COLLECTIONS_EXTENSION;
use tendies::poster::paths::descriptors_subpath;
use tendies::poster::platform::NullProbe;
use tendies::poster::state::AppState;
use tendies::poster::worker::DeployWorker;
use tendies::{ApplyError, Config};
use zip::write::SimpleFileOptions;

struct Device {
    temp: TempDir,
    container_root: PathBuf,
}

impl Device {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let container_root = temp.path().join("Containers");
        fs::create_dir_all(target_dir(&container_root, "POSTER-HASH")).unwrap();
        Self {
            temp,
            container_root,
        }
    }

    fn state(&self) -> AppState {
        let config = Config::new(self.temp.path().join("Documents"))
            .with_config_dir(self.temp.path().join("Preferences"))
            .with_container_root(&self.container_root);
        tendies::open_state(config, Arc::new(NullProbe)).unwrap()
    }

    fn mount(&self) -> PathBuf {
        self.temp.path().join("Documents/.Trash")
    }
}

fn target_dir(container_root: &Path, hash: &str) -> PathBuf {
    container_root
        .join(hash)
        .join(descriptors_subpath(COLLECTIONS_EXTENSION))
}

fn wallpaper_plist(identifier: i64) -> Vec<u8> {
    let mut dict = plist::Dictionary::new();
    dict.insert("identifier".to_string(), plist::Value::Integer(identifier.into()));
    dict.insert("name".to_string(), plist::Value::String("Sunset".to_string()));
    let mut out = Vec::new();
    plist::Value::Dictionary(dict).to_writer_xml(&mut out).unwrap();
    out
}

fn write_bundle(path: &Path) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    zip.start_file("descriptors/instance-A/Wallpaper.plist", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(&wallpaper_plist(1)).unwrap();
    zip.start_file("__MACOSX/descriptors/._instance-A", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"resource fork").unwrap();
    zip.finish().unwrap();
}

#[test]
fn apply_relocates_with_fresh_identifier() {
    let device = Device::new();
    let bundle = device.temp.path().join("Sunset.tendies");
    write_bundle(&bundle);

    let mut state = device.state();
    state.import_bundle(&bundle).unwrap();
    state.set_app_hashes(Some("POSTER-HASH"), None).unwrap();

    let worker = DeployWorker::spawn(state.paths().tunnel_mount()).unwrap();
    let report = tendies::apply_tendies(&mut state, &worker).unwrap();
    worker.shutdown();

    assert_eq!(report.deployed.len(), 1);
    let landed = target_dir(&device.container_root, "POSTER-HASH")
        .join(&report.deployed[0].staged_name)
        .join("Wallpaper.plist");
    let value = plist::Value::from_file(&landed).unwrap();
    let dict = value.as_dictionary().unwrap();

    let identifier = dict.get("identifier").unwrap().as_signed_integer().unwrap();
    assert_ne!(identifier, 1);
    assert!((9999..=99999).contains(&identifier));
    assert_eq!(identifier, report.deployed[0].identifier);
    assert_eq!(dict.get("name").unwrap().as_string(), Some("Sunset"));

    assert!(fs::symlink_metadata(device.mount()).is_err());
    assert!(state.bundles().is_empty());
    assert!(!state.paths().bundle_store().exists());
    assert!(!state.paths().unzip_root().exists());
}

#[test]
fn wrong_hash_keeps_queue_and_leaves_no_link() {
    let device = Device::new();
    let bundle = device.temp.path().join("Sunset.tendies");
    write_bundle(&bundle);

    let mut state = device.state();
    state.import_bundle(&bundle).unwrap();
    state.set_app_hashes(Some("STALE-HASH"), None).unwrap();

    let worker = DeployWorker::spawn(state.paths().tunnel_mount()).unwrap();
    let err = tendies::apply_tendies(&mut state, &worker).unwrap_err();

    assert_eq!(ApplyError::from(err), ApplyError::WrongAppHash);
    assert!(fs::symlink_metadata(device.mount()).is_err());
    assert_eq!(state.bundles().len(), 1);
    assert!(!state.paths().unzip_root().exists());
}

#[test]
fn second_apply_after_restart_sees_queued_bundles() {
    let device = Device::new();
    let bundle = device.temp.path().join("Sunset.tendies");
    write_bundle(&bundle);

    {
        let mut state = device.state();
        state.import_bundle(&bundle).unwrap();
        state.set_app_hashes(Some("POSTER-HASH"), None).unwrap();
    }

    let mut state = device.state();
    assert_eq!(state.bundles().len(), 1);
    let report = state.apply().unwrap();
    assert_eq!(report.deployed.len(), 1);
}
