//! HSI + LiDAR remote-sensing datasets.
//!
//! - [`roi`]: ENVI ROI text exports to sparse label images
//! - [`split`]: reproducible per-class train/test splits
//! - [`decode`]: GeoTIFF and MAT decoding behind a swappable trait
//! - [`assemblers`]: fetch, verify and decode Houston 2013, MUUFL and Trento
//! - [`patch_dataset`], [`hsi_dsm`]: Burn datasets of patches around pixels
//! - [`render`]: label maps to images

pub mod assemblers;
pub mod decode;
pub mod hsi_dsm;
pub mod patch_dataset;
pub mod render;
pub mod roi;
pub mod split;

pub use assemblers::{fetch, AssembledDataset, DatasetCache, DatasetId, GroundTruth};
pub use assemblers::houston2013::fetch_houston2013;
pub use assemblers::houston2013_mmrs::fetch_houston2013_mmrs;
pub use assemblers::muufl::fetch_muufl;
pub use assemblers::trento::fetch_trento;
pub use decode::{DefaultDecoder, MatArray, MatVariables, RasterDecoder};
pub use hsi_dsm::{HsiDsmDataset, Subset};
pub use patch_dataset::{pad_symmetric, PatchBatch, PatchBatcher, PatchDataset, PatchExtras, PatchItem};
pub use render::{render_class_scores, render_labels, reassemble_predictions, save_png, Palette};
pub use roi::{parse_roi_str, read_roi, read_roi_with, BlockSeparator, RoiConflict, RoiParseOutcome};
pub use split::{split_labels, split_labels_with, SparseSplit, SplitStats};
