//! Standard exit codes for the tendies binary
//!
//! Each failure category a user can act on gets its own code.

use crate::exceptions::{ApplyError, TendiesError};

/// Successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// Generic error (avoid using - be more specific)
pub const EXIT_ERROR: i32 = 1;

/// Panic or unrecoverable error
pub const EXIT_PANIC: i32 = 101;

/// The app hash does not name an existing container
pub const EXIT_WRONG_APP_HASH: i32 = 102;

/// The target folder is in a conflicting state; collections need a reset
pub const EXIT_COLLECTIONS_RESET: i32 = 103;

/// Extraction error (corrupt archive, nothing recognisable inside)
pub const EXIT_EXTRACTION_ERROR: i32 = 104;

/// Invalid command-line arguments
pub const EXIT_INVALID_ARGS: i32 = 105;

/// I/O error (file not found, permission denied, disk error)
pub const EXIT_IO_ERROR: i32 = 106;

/// Interrupted by the user
pub const EXIT_CANCELLED: i32 = 107;

/// Another deployment is running
pub const EXIT_BUSY: i32 = 108;

/// Configuration error (missing app hash, bad settings)
pub const EXIT_CONFIG_ERROR: i32 = 109;

/// Dependency error (missing required tools or platform support)
pub const EXIT_DEPENDENCY_ERROR: i32 = 110;

/// Map a library error to the exit code the binary reports
pub fn exit_code_for(err: &TendiesError) -> i32 {
    match err {
        TendiesError::LinkCreationFailed { .. } | TendiesError::IoError(_) => {
            match ApplyError::from_ref(err) {
                ApplyError::WrongAppHash => EXIT_WRONG_APP_HASH,
                ApplyError::CollectionsNeedsReset => EXIT_COLLECTIONS_RESET,
                ApplyError::Unexpected(_) => EXIT_IO_ERROR,
            }
        }
        TendiesError::ExtractionFailed(_)
        | TendiesError::InvalidBundle(_)
        | TendiesError::ZipError(_) => EXIT_EXTRACTION_ERROR,
        TendiesError::QueueFull { .. } | TendiesError::VideoTooLong { .. } => EXIT_INVALID_ARGS,
        TendiesError::MissingAppHash(_) | TendiesError::JsonError(_) => EXIT_CONFIG_ERROR,
        TendiesError::Capability(_) => EXIT_DEPENDENCY_ERROR,
        TendiesError::Cancelled => EXIT_CANCELLED,
        TendiesError::DeployInProgress(_) => EXIT_BUSY,
        TendiesError::PlistError(_) | TendiesError::Generic(_) => EXIT_ERROR,
    }
}
