//! CarPlay bitmap encoding collaborator

use crate::exceptions::{Result, TendiesError};
use crate::utils::resolve_tool;
use log::debug;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Pixel dimensions a CarPlay bitmap is drawn at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapSize {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for BitmapSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for BitmapSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Writes image bytes as a fixed-layout CarPlay bitmap
pub trait BitmapEncoder: Send + Sync + fmt::Debug {
    /// Resize `image` to `size` and write it to `output`
    fn encode(&self, image: &[u8], size: BitmapSize, output: &Path) -> Result<()>;
}

/// Runs an external encoder as `<program> [args..] <input> <output>`.
///
/// The target size is passed in `TENDIES_BITMAP_WIDTH` and
/// `TENDIES_BITMAP_HEIGHT`.
#[derive(Debug, Clone)]
pub struct CommandBitmapEncoder {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandBitmapEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Resolve `program` through `PATH` unless it is already a path
    pub fn locate(program: &str) -> Result<Self> {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            return Ok(Self::new(candidate));
        }
        Ok(Self::new(resolve_tool(program)?))
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl BitmapEncoder for CommandBitmapEncoder {
    fn encode(&self, image: &[u8], size: BitmapSize, output: &Path) -> Result<()> {
        let mut input = tempfile::NamedTempFile::new()?;
        input.write_all(image)?;
        input.flush()?;

        debug!("🖌️ Encoding {size} bitmap {output:?} with {:?}", self.program);
        let result = Command::new(&self.program)
            .env("TENDIES_BITMAP_WIDTH", size.width.to_string())
            .env("TENDIES_BITMAP_HEIGHT", size.height.to_string())
            .args(&self.args)
            .arg(input.path())
            .arg(output)
            .output()?;
        if !result.status.success() {
            return Err(TendiesError::Generic(format!(
                "bitmap encoder failed: {}",
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        if !output.is_file() {
            return Err(TendiesError::Generic(format!(
                "bitmap encoder produced no output at {}",
                output.display()
            )));
        }
        Ok(())
    }
}
