//! # threads-auth infrastructure
//!
//! Host-side implementations of the `threads-auth-common` seams.
//!
//! This crate contains:
//! - Configuration loading (environment variables, TOML/JSON files)
//! - Durable token stores (JSON file, platform keychain)
//! - A terminal authorization presenter
//!
//! ## Architecture
//! - Implements traits defined in `threads-auth-common`
//! - Contains all "impure" code (file system, keychain, terminal I/O)

#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod presenter;
pub mod storage;

// Re-export commonly used items
pub use config::{load, ConfigError};
pub use presenter::ConsolePresenter;
pub use storage::{FileTokenStore, KeychainTokenStore};
