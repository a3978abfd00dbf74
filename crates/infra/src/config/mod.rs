//! Configuration loading
//!
//! Resolves the Threads client registration and endpoint preset from
//! environment variables and files.

pub mod loader;

// Re-export commonly used items
pub use loader::{
    load, load_from_env, load_from_file, parse_config, probe_config_paths, ConfigError, FileConfig,
};
