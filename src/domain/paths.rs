//! # Default Paths
//!
//! Where the binary looks for its files when the configuration does not say otherwise.

pub const DATA_DIR: &str = "data";
pub const CONFIG_FILE: &str = "data/config.yaml";
pub const STORAGE_FILE: &str = "data/storage.json";
pub const LOG_FILE: &str = "session.log";
