//! Bundle extraction and classification

use super::defaults::{
    COLLECTIONS_EXTENSION, CONTAINER_DIR, DEFAULT_BUNDLE_COPY_FILE, DEFAULT_UNZIP_CONTENT_DIR,
    DESCRIPTORS_DIR,
    DESCRIPTOR_DIR_NAMES, EXTENSION_STORE_SUBPATH, VIDEO_DESCRIPTOR_DIR_NAMES, VIDEO_EXTENSION,
};
use super::filesystem::{list_visible, remove_best_effort};
use super::paths::StagingPaths;
use crate::exceptions::{Result, TendiesError};
use log::{debug, info};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Where a bundle was unpacked
#[derive(Debug, Clone)]
pub struct ExtractedRoot {
    /// The uuid-named scratch directory, removed after deployment
    pub scratch: PathBuf,
    /// The decompressed archive contents
    pub content: PathBuf,
}

/// Descriptor directories owned by one consumer extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionGroup {
    pub extension: String,
    pub directories: Vec<PathBuf>,
}

/// Extension groups in first-discovered order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSet {
    groups: Vec<ExtensionGroup>,
}

impl DescriptorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add directories under an extension, appending if the key exists
    pub fn insert(&mut self, extension: &str, directories: Vec<PathBuf>) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.extension == extension) {
            group.directories.extend(directories);
        } else {
            self.groups.push(ExtensionGroup {
                extension: extension.to_string(),
                directories,
            });
        }
    }

    /// Merge another set, concatenating directory lists on key collision
    pub fn merge(&mut self, other: DescriptorSet) {
        for group in other.groups {
            self.insert(&group.extension, group.directories);
        }
    }

    pub fn groups(&self) -> &[ExtensionGroup] {
        &self.groups
    }

    pub fn get(&self, extension: &str) -> Option<&[PathBuf]> {
        self.groups
            .iter()
            .find(|g| g.extension == extension)
            .map(|g| g.directories.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Unpacks queued bundles into private scratch space
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    paths: StagingPaths,
}

impl ArchiveExtractor {
    pub fn new(paths: StagingPaths) -> Self {
        Self { paths }
    }

    /// Copy `archive` into a fresh scratch directory and decompress it
    pub fn extract(&self, archive: &Path) -> Result<ExtractedRoot> {
        let scratch = self.paths.unzip_scratch(&Uuid::new_v4());
        info!("📦 Extracting {archive:?}");
        self.extract_into(archive, &scratch)
            .map_err(|e| TendiesError::ExtractionFailed(format!("{}: {e}", archive.display())))
    }

    fn extract_into(&self, archive: &Path, scratch: &Path) -> Result<ExtractedRoot> {
        fs::create_dir_all(scratch)?;
        for stale in list_visible(scratch)? {
            remove_best_effort(&stale);
        }

        let copy = scratch.join(DEFAULT_BUNDLE_COPY_FILE);
        fs::copy(archive, &copy)?;

        let content = scratch.join(DEFAULT_UNZIP_CONTENT_DIR);
        unzip(&copy, &content)?;
        debug!("📂 Unpacked into {content:?}");

        Ok(ExtractedRoot {
            scratch: scratch.to_path_buf(),
            content,
        })
    }
}

/// Decompress a ZIP archive into `dest`, skipping entries that would escape it
pub fn unzip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;
    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let entry_path = match entry.enclosed_name() {
            Some(p) => p,
            None => continue,
        };
        let output_path = dest.join(entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&output_path)?;
        } else {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&output_path)?;
            std::io::copy(&mut entry, &mut outfile)?;
        }
    }
    Ok(())
}

/// Classify the top level of an extracted bundle.
///
/// Children are scanned in file-name order and only the first recognised
/// directory is used.
pub fn classify(root: &Path) -> Result<DescriptorSet> {
    let mut set = DescriptorSet::new();

    for child in list_visible(root)? {
        if !child.is_dir() {
            continue;
        }
        let name = child
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name == CONTAINER_DIR {
            let ext_root = child.join(EXTENSION_STORE_SUBPATH);
            for ext in list_visible(&ext_root)? {
                if !ext.is_dir() {
                    continue;
                }
                let ext_name = ext
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                set.insert(&ext_name, vec![ext.join(DESCRIPTORS_DIR)]);
            }
            debug!("🗂️ Container bundle with {} extension(s)", set.groups().len());
            return Ok(set);
        } else if DESCRIPTOR_DIR_NAMES.contains(&name.as_str()) {
            set.insert(COLLECTIONS_EXTENSION, vec![child]);
            return Ok(set);
        } else if VIDEO_DESCRIPTOR_DIR_NAMES.contains(&name.as_str()) {
            set.insert(VIDEO_EXTENSION, vec![child]);
            return Ok(set);
        }
    }

    debug!("🤷 Nothing recognisable in {root:?}");
    Ok(set)
}
