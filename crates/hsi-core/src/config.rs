//! Configuration structures for fetching and sampling datasets.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Browser-like agent; some dataset hosts reject default client agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

/// Seed used by the per-class training splits.
pub const DEFAULT_SPLIT_SEED: u64 = 0x0d00_0721;

/// Top-level configuration for the fetchers and dataset wrappers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Cache root; falls back to `SCIKIT_LEARN_DATA`, then `~/scikit_learn_data`
    pub data_home: Option<PathBuf>,
    /// Download archives that are not already on disk
    pub download_if_missing: bool,
    /// HTTP client settings
    pub http: HttpConfig,
    /// Train/test sampling for datasets shipped without a split
    pub split: SplitConfig,
    /// Side length of extracted patches
    pub patch_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            data_home: None,
            download_if_missing: true,
            http: HttpConfig::default(),
            split: SplitConfig::default(),
            patch_size: 5,
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.patch_size == 0 {
            return Err(Error::Config("patch_size must be at least 1".to_string()));
        }
        self.http.validate()
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Render a progress bar while downloading
    pub show_progress: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 600,
            show_progress: true,
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("http.user_agent must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("http.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Per-class sampling used to derive a training split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Training pixels drawn from every class
    pub samples_per_class: usize,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            samples_per_class: 20,
            seed: DEFAULT_SPLIT_SEED,
        }
    }
}
