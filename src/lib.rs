//! Tendies - poster descriptor deployment through symlink tunnels
//!
//! This crate stages descriptor bundles and generated video descriptors,
//! rewrites their identifiers, and relocates them into another app's
//! container through a temporary symbolic link.

// Enforce strict code quality and reliability
#![deny(
    // Safety
    unsafe_code,

    // Correctness
    missing_debug_implementations,
    unreachable_pub,

    // Future compatibility
    future_incompatible,

    // Rust 2018 idioms
    rust_2018_idioms,

    // All warnings must be fixed
    warnings,
)]
#![warn(
    // Error handling best practices
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,

    // Performance
    clippy::inefficient_to_string,
    clippy::large_enum_variant,

    // Code clarity and maintainability
    clippy::cognitive_complexity,
    clippy::type_complexity,

    // Best practices
    clippy::clone_on_ref_ptr,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod config;
pub mod exceptions;
pub mod exit_codes;
pub mod logger;
pub mod poster;
pub mod utils;

// Re-export main API functions
pub use api::{
    CarPlayOverride, apply_carplay, apply_tendies, clear_cache, handle_deep_link, open_poster_board,
    open_state, reset_collections, wait_for_app_hashes,
};
pub use config::Config;
pub use exceptions::{ApplyError, Result, TendiesError};

/// Crate version, overridable at build time
pub const VERSION: &str = env!("TENDIES_VERSION");
