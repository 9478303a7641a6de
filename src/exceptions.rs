//! Error types for tendies
//!
//! `TendiesError` is what every library operation returns. `ApplyError` is the
//! small taxonomy a caller shows to the user once an apply finishes.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for tendies operations
#[derive(Debug)]
pub enum TendiesError {
    /// Creating a tunnel link failed, or the link does not resolve
    LinkCreationFailed { target: PathBuf, source: io::Error },

    /// A bundle could not be copied or decompressed
    ExtractionFailed(String),

    /// A queue already holds its maximum number of entries
    QueueFull { limit: usize },

    /// A file was rejected as a bundle
    InvalidBundle(String),

    /// An imported video exceeds the duration limit
    VideoTooLong { seconds: f64, limit: f64 },

    /// No app hash has been configured for the target app
    MissingAppHash(String),

    /// A platform capability or external tool is unavailable
    Capability(String),

    /// A cooperative wait was cancelled
    Cancelled,

    /// Another process holds the deployment lock
    DeployInProgress(u32),

    /// IO error
    IoError(io::Error),

    /// JSON error
    JsonError(serde_json::Error),

    /// Property list error
    PlistError(plist::Error),

    /// ZIP archive error
    ZipError(zip::result::ZipError),

    /// Generic error with message
    Generic(String),
}

impl fmt::Display for TendiesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TendiesError::LinkCreationFailed { target, source } => {
                write!(f, "Link creation failed for {}: {source}", target.display())
            }
            TendiesError::ExtractionFailed(msg) => write!(f, "Extraction failed: {msg}"),
            TendiesError::QueueFull { limit } => {
                write!(f, "Queue is full: at most {limit} entries can be applied")
            }
            TendiesError::InvalidBundle(msg) => write!(f, "Invalid bundle: {msg}"),
            TendiesError::VideoTooLong { seconds, limit } => write!(
                f,
                "Video is too long ({seconds:.1}s): must be {limit:.0} seconds or less"
            ),
            TendiesError::MissingAppHash(app) => write!(f, "No app hash set for {app}"),
            TendiesError::Capability(msg) => write!(f, "Capability unavailable: {msg}"),
            TendiesError::Cancelled => write!(f, "Operation cancelled"),
            TendiesError::DeployInProgress(pid) => {
                write!(f, "Another deployment is running (PID: {pid})")
            }
            TendiesError::IoError(err) => write!(f, "IO error: {err}"),
            TendiesError::JsonError(err) => write!(f, "JSON error: {err}"),
            TendiesError::PlistError(err) => write!(f, "Property list error: {err}"),
            TendiesError::ZipError(err) => write!(f, "ZIP error: {err}"),
            TendiesError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for TendiesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TendiesError::LinkCreationFailed { source, .. } => Some(source),
            TendiesError::IoError(err) => Some(err),
            TendiesError::JsonError(err) => Some(err),
            TendiesError::PlistError(err) => Some(err),
            TendiesError::ZipError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for TendiesError {
    fn from(err: io::Error) -> Self {
        TendiesError::IoError(err)
    }
}

impl From<serde_json::Error> for TendiesError {
    fn from(err: serde_json::Error) -> Self {
        TendiesError::JsonError(err)
    }
}

impl From<plist::Error> for TendiesError {
    fn from(err: plist::Error) -> Self {
        TendiesError::PlistError(err)
    }
}

impl From<zip::result::ZipError> for TendiesError {
    fn from(err: zip::result::ZipError) -> Self {
        TendiesError::ZipError(err)
    }
}

impl TendiesError {
    /// The underlying IO error kind, if this error came from the filesystem
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            TendiesError::LinkCreationFailed { source, .. } => Some(source.kind()),
            TendiesError::IoError(err) => Some(err.kind()),
            TendiesError::ZipError(zip::result::ZipError::Io(err)) => Some(err.kind()),
            _ => None,
        }
    }
}

/// Result type for tendies operations
pub type Result<T> = std::result::Result<T, TendiesError>;

/// User-visible outcome of a failed apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// A path inside the target container does not exist
    WrongAppHash,

    /// The destination already exists in a conflicting state
    CollectionsNeedsReset,

    /// Anything else, with the underlying message
    Unexpected(String),
}

impl ApplyError {
    /// What the user should do about it
    pub fn remedy(&self) -> &'static str {
        match self {
            ApplyError::WrongAppHash => "Re-enter the app hash in settings.",
            ApplyError::CollectionsNeedsReset => {
                "Reset collections, then apply again."
            }
            ApplyError::Unexpected(_) => "Check the log for details.",
        }
    }
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyError::WrongAppHash => {
                write!(f, "Your app hash is incorrect. Please set it again.")
            }
            ApplyError::CollectionsNeedsReset => write!(
                f,
                "The folder is improperly set up. Please reset collections and try again."
            ),
            ApplyError::Unexpected(info) => write!(f, "{info}"),
        }
    }
}

impl std::error::Error for ApplyError {}

impl From<TendiesError> for ApplyError {
    fn from(err: TendiesError) -> Self {
        ApplyError::from_ref(&err)
    }
}

impl ApplyError {
    /// Classify an error without consuming it
    pub fn from_ref(err: &TendiesError) -> Self {
        match err.io_kind() {
            Some(io::ErrorKind::NotFound) => ApplyError::WrongAppHash,
            Some(io::ErrorKind::AlreadyExists) | Some(io::ErrorKind::DirectoryNotEmpty) => {
                ApplyError::CollectionsNeedsReset
            }
            _ => ApplyError::Unexpected(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_target_maps_to_wrong_app_hash() {
        let err = TendiesError::LinkCreationFailed {
            target: PathBuf::from("/containers/bogus/Library"),
            source: io::Error::new(io::ErrorKind::NotFound, "dangling"),
        };
        assert_eq!(ApplyError::from(err), ApplyError::WrongAppHash);
    }

    #[test]
    fn test_existing_destination_maps_to_collections_reset() {
        let err = TendiesError::IoError(io::Error::new(io::ErrorKind::AlreadyExists, "exists"));
        assert_eq!(ApplyError::from(err), ApplyError::CollectionsNeedsReset);
    }

    #[test]
    fn test_missing_app_hash_names_the_app() {
        let err = TendiesError::MissingAppHash("the CarPlay app".to_string());
        assert_eq!(err.to_string(), "No app hash set for the CarPlay app");
    }

    #[test]
    fn test_other_errors_are_unexpected() {
        let err = TendiesError::Generic("boom".to_string());
        assert_eq!(
            ApplyError::from(err),
            ApplyError::Unexpected("boom".to_string())
        );

        let err = TendiesError::IoError(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(matches!(ApplyError::from(err), ApplyError::Unexpected(_)));
    }
}
