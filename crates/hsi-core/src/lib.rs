//! Core types shared by the hyperspectral dataset crates.
//!
//! This crate provides the error taxonomy, the sparse label image, the
//! per-dataset metadata record and the configuration used across the
//! workspace.

pub mod cli;
pub mod config;
pub mod error;
pub mod labels;
pub mod metadata;

pub use config::{FetchConfig, HttpConfig, SplitConfig};
pub use error::{Error, Result};
pub use labels::{LabelEntry, SparseLabels};
pub use metadata::{DatasetMetadata, RasterLayout};

pub mod prelude {
    pub use crate::cli::*;
    pub use crate::config::*;
    pub use crate::error::{Error, Result};
    pub use crate::labels::*;
    pub use crate::metadata::*;
}
