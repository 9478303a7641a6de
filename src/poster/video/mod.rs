//! Video descriptor generation
//!
//! A loaded video becomes a descriptor directory holding a Core Animation
//! bundle: one JPEG per frame, a `main.caml` flip-book over them and an
//! `index.xml` with the player settings.

pub mod caml;
pub mod frames;

pub use caml::{CamlDocument, animation_duration, index_document};
pub use frames::{FfmpegFrameExtractor, FrameExtractor, VideoTrackInfo};

use super::defaults::{
    MAX_VIDEO_DURATION_SECS, VIDEO_ASSETS_DIR, VIDEO_CA_SUBPATH, VIDEO_INDEX_DOCUMENT,
    VIDEO_MAIN_DOCUMENT,
};
use super::filesystem::{copy_dir_all, remove_best_effort};
use super::paths::StagingPaths;
use super::queue::VideoSource;
use crate::exceptions::{Result, TendiesError};
use log::{debug, info};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Top-level directory of the Core Animation bundle inside a descriptor
const CAML_ROOT_DIR: &str = "videoCAML";

/// Builds descriptor directories from videos
#[derive(Debug, Clone)]
pub struct VideoDescriptorBuilder {
    paths: StagingPaths,
    extractor: Arc<dyn FrameExtractor>,
    template: Option<PathBuf>,
}

impl VideoDescriptorBuilder {
    pub fn new(paths: StagingPaths, extractor: Arc<dyn FrameExtractor>) -> Self {
        Self {
            paths,
            extractor,
            template: None,
        }
    }

    /// Copy `template` into every descriptor before generating
    pub fn with_template(mut self, template: Option<PathBuf>) -> Self {
        self.template = template;
        self
    }

    /// Probe a video and reject it if it runs past the duration limit
    pub fn check_duration(&self, video: &Path, ignore_limit: bool) -> Result<VideoTrackInfo> {
        let info = self.extractor.probe(video)?;
        if !ignore_limit && info.duration_secs > MAX_VIDEO_DURATION_SECS {
            return Err(TendiesError::VideoTooLong {
                seconds: info.duration_secs,
                limit: MAX_VIDEO_DURATION_SECS,
            });
        }
        Ok(info)
    }

    /// Build a descriptor directory for `source`. A failed build leaves
    /// nothing behind.
    pub fn build(&self, source: &VideoSource) -> Result<PathBuf> {
        fs::create_dir_all(self.paths.documents())?;
        let descriptor = self.paths.fresh_item();
        fs::create_dir(&descriptor)?;

        match self.build_into(source, &descriptor) {
            Ok(()) => {
                info!("🎬 Built video descriptor {descriptor:?}");
                Ok(descriptor)
            }
            Err(e) => {
                remove_best_effort(&descriptor);
                Err(e)
            }
        }
    }

    fn build_into(&self, source: &VideoSource, descriptor: &Path) -> Result<()> {
        if let Some(template) = &self.template {
            copy_dir_all(template, &descriptor.join(CAML_ROOT_DIR))?;
        }

        let ca_dir = descriptor.join(VIDEO_CA_SUBPATH);
        let assets = ca_dir.join(VIDEO_ASSETS_DIR);
        fs::create_dir_all(&assets)?;

        let track = self.extractor.probe(&source.path)?;
        let frames = self.extractor.extract_frames(&source.path)?;
        if frames.is_empty() {
            return Err(TendiesError::Generic(format!(
                "no frames decoded from {}",
                source.path.display()
            )));
        }

        let mut sources = Vec::with_capacity(frames.len());
        for (index, jpeg) in frames.iter().enumerate() {
            let name = format!("{index}.jpg");
            fs::write(assets.join(&name), jpeg)?;
            sources.push(format!("{VIDEO_ASSETS_DIR}/{name}"));
        }
        debug!("🖼️ Wrote {} frame(s)", sources.len());

        let document = CamlDocument {
            width: track.width,
            height: track.height,
            duration: animation_duration(track.fps, track.duration_secs),
            auto_reverses: source.auto_reverses,
            frames: sources,
        };
        let mut out = BufWriter::new(File::create(ca_dir.join(VIDEO_MAIN_DOCUMENT))?);
        document.write(&mut out)?;
        out.flush()?;

        index_document(track.width, track.height, VIDEO_MAIN_DOCUMENT)
            .to_file_xml(ca_dir.join(VIDEO_INDEX_DOCUMENT))?;
        Ok(())
    }
}
