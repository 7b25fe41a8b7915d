//! exbank-api specific configuration

use std::path::PathBuf;

/// Curriculum service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind_addr: String,
}
