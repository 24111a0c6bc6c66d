use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Client configuration for the content read API. Every field is
/// optional; consumers fall back to the defaults below.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    pub follow_redirects: Option<bool>,
    /// Default page size for paged collection views.
    pub page_size: Option<usize>,
}

impl ClientConfig {
    pub const DEFAULT_TIMEOUT: u64 = 10;
    pub const DEFAULT_PAGE_SIZE: usize = 10;

    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE).max(1)
    }
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ClientConfig, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ClientConfig::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

pub fn parse_config(contents: &str) -> Result<ClientConfig, serde_yaml::Error> {
    serde_yaml::from_str::<ClientConfig>(contents)
}
