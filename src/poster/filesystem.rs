//! Filesystem helpers shared by the pipeline

use crate::exceptions::Result;
use log::{debug, trace};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Recursively copy a directory
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Move a file or directory, copying across devices when rename can't
pub fn move_item(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!("📦 Cross-device move, copying {src:?} -> {dst:?}");
            copy_then_remove(src, dst)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices
}

fn copy_then_remove(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(src)?;
    if meta.is_dir() {
        copy_dir_all(src, dst)?;
        fs::remove_dir_all(src)?;
    } else {
        fs::copy(src, dst)?;
        fs::remove_file(src)?;
    }
    Ok(())
}

/// Remove a file, link or directory tree, ignoring errors
pub fn remove_best_effort(path: &Path) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => trace!("🗑️ Removed {path:?}"),
        Err(e) => debug!("⚠️ Failed to remove {path:?}: {e}"),
    }
}

/// Dot-prefixed names are hidden
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Non-hidden children of a directory, sorted by file name
pub fn list_visible(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_hidden(&path) {
            children.push(path);
        }
    }
    children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir_all() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("nested/b.txt"), "b").unwrap();

        let dst = temp.path().join("dst");
        copy_dir_all(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dst.join("nested/b.txt")).unwrap(), "b");
    }

    #[test]
    fn test_list_visible_sorted_and_skips_hidden() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("zeta")).unwrap();
        fs::create_dir(temp.path().join("alpha")).unwrap();
        fs::write(temp.path().join(".DS_Store"), "").unwrap();

        let names: Vec<_> = list_visible(temp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_remove_best_effort() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("tree");
        fs::create_dir_all(dir.join("inner")).unwrap();
        fs::write(dir.join("inner/file"), "x").unwrap();

        remove_best_effort(&dir);
        assert!(!dir.exists());

        // missing paths are fine
        remove_best_effort(&dir);
    }

    #[test]
    fn test_cross_device_errors_are_recognised() {
        assert!(is_cross_device(&io::Error::from(io::ErrorKind::CrossesDevices)));
        assert!(!is_cross_device(&io::Error::from(io::ErrorKind::NotFound)));

        #[cfg(target_os = "linux")]
        assert!(is_cross_device(&io::Error::from_raw_os_error(18)));
    }

    #[test]
    fn test_copy_then_remove_moves_trees() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("item");
        fs::create_dir_all(src.join("inner")).unwrap();
        fs::write(src.join("inner/f"), "data").unwrap();

        let dst = temp.path().join("copied");
        copy_then_remove(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("inner/f")).unwrap(), "data");
    }

    #[test]
    fn test_move_item() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("item");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("f"), "data").unwrap();

        let dst = temp.path().join("moved");
        move_item(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("f")).unwrap(), "data");
    }
}
