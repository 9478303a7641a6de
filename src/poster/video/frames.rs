//! Frame extraction collaborator

use crate::exceptions::{Result, TendiesError};
use crate::utils::resolve_tool;
use log::{debug, trace};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Geometry and timing of a video's first video track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoTrackInfo {
    /// Display width, after rotation
    pub width: u32,
    /// Display height, after rotation
    pub height: u32,
    pub fps: f64,
    pub duration_secs: f64,
}

/// Turns a video into ordered JPEG frames
pub trait FrameExtractor: Send + Sync + fmt::Debug {
    fn probe(&self, video: &Path) -> Result<VideoTrackInfo>;

    /// Every frame, in presentation order, as JPEG bytes
    fn extract_frames(&self, video: &Path) -> Result<Vec<Vec<u8>>>;
}

/// Shells out to `ffprobe` and `ffmpeg`
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    side_data_list: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl FfmpegFrameExtractor {
    /// Find both tools on `PATH`
    pub fn locate() -> Result<Self> {
        Ok(Self {
            ffprobe: resolve_tool("ffprobe")?,
            ffmpeg: resolve_tool("ffmpeg")?,
        })
    }
}

impl FrameExtractor for FfmpegFrameExtractor {
    fn probe(&self, video: &Path) -> Result<VideoTrackInfo> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,duration:stream_side_data=rotation:format=duration",
                "-of",
                "json",
            ])
            .arg(video)
            .output()?;
        if !output.status.success() {
            return Err(TendiesError::Generic(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_probe_output(&output.stdout)
    }

    fn extract_frames(&self, video: &Path) -> Result<Vec<Vec<u8>>> {
        let scratch = tempfile::tempdir()?;
        let pattern = scratch.path().join("%d.jpg");
        debug!("🎞️ Extracting frames from {video:?}");

        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-i"])
            .arg(video)
            .args(["-vsync", "passthrough", "-q:v", "4"])
            .arg(&pattern)
            .output()?;
        if !output.status.success() {
            return Err(TendiesError::Generic(format!(
                "ffmpeg failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut numbered: Vec<(u32, PathBuf)> = fs::read_dir(scratch.path())?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                let index = path.file_stem()?.to_str()?.parse().ok()?;
                Some((index, path))
            })
            .collect();
        numbered.sort_by_key(|(index, _)| *index);
        trace!("🎞️ {} frame(s) written", numbered.len());

        numbered
            .into_iter()
            .map(|(_, path)| fs::read(path).map_err(TendiesError::from))
            .collect()
    }
}

fn parse_probe_output(stdout: &[u8]) -> Result<VideoTrackInfo> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| TendiesError::Generic("no video track".to_string()))?;

    let (mut width, mut height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) => (w, h),
        _ => return Err(TendiesError::Generic("video track has no size".to_string())),
    };
    let rotation = stream
        .side_data_list
        .iter()
        .find_map(|d| d.get("rotation").and_then(|r| r.as_f64()))
        .unwrap_or(0.0);
    if (rotation.abs() as i64) % 180 == 90 {
        std::mem::swap(&mut width, &mut height);
    }

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .ok_or_else(|| TendiesError::Generic("video track has no frame rate".to_string()))?;
    let duration_secs = stream
        .duration
        .as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| TendiesError::Generic("video has no duration".to_string()))?;

    Ok(VideoTrackInfo {
        width,
        height,
        fps,
        duration_secs,
    })
}

/// Parse an ffprobe rational such as `30000/1001`
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "streams": [{"width": 1920, "height": 1080, "r_frame_rate": "30/1", "duration": "4.5"}],
            "format": {"duration": "4.6"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.fps, 30.0);
        assert_eq!(info.duration_secs, 4.5);
    }

    #[test]
    fn test_rotated_track_swaps_size() {
        let json = br#"{
            "streams": [{"width": 1920, "height": 1080, "r_frame_rate": "24/1",
                         "side_data_list": [{"rotation": -90}]}],
            "format": {"duration": "2.0"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));
        assert_eq!(info.duration_secs, 2.0);
    }

    #[test]
    fn test_no_stream_is_error() {
        assert!(parse_probe_output(br#"{"streams": []}"#).is_err());
    }
}
