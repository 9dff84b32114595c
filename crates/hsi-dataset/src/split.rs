//! Stratified train/test splitting of sparse label images.
//!
//! For every class id from 1 to the largest id present, a fixed number of
//! labeled pixels is drawn without replacement into the training image. All
//! remaining labeled pixels form the test image, so the two always partition
//! the input. The split is reproducible for a given seed.

use std::fmt;
use std::fs;
use std::path::Path;

use hsi_core::{Error, LabelEntry, Result, SparseLabels, SplitConfig};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A train/test pair covering the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseSplit {
    pub train: SparseLabels,
    pub test: SparseLabels,
}

/// Split with an explicit generator.
///
/// Classes are visited in ascending id order and each class's pixels in
/// storage order, so the outcome only depends on the generator state.
pub fn split_labels_with<R: Rng + ?Sized>(
    labels: &SparseLabels,
    samples_per_class: usize,
    rng: &mut R,
) -> Result<SparseSplit> {
    let (height, width) = labels.shape();
    let mut train = SparseLabels::new(height, width);
    let mut test = SparseLabels::new(height, width);

    for class_id in 1..=labels.max_class_id() {
        let members: Vec<LabelEntry> = labels.entries_of_class(class_id);
        if members.len() < samples_per_class {
            return Err(Error::InsufficientSamples {
                class_id,
                available: members.len(),
                requested: samples_per_class,
            });
        }

        let mut chosen = vec![false; members.len()];
        for idx in sample(rng, members.len(), samples_per_class).iter() {
            chosen[idx] = true;
        }

        for (entry, picked) in members.iter().zip(&chosen) {
            let target = if *picked { &mut train } else { &mut test };
            target.insert(entry.row, entry.col, entry.class_id)?;
        }
        debug!(
            "Class {class_id}: {samples_per_class} train, {} test",
            members.len() - samples_per_class
        );
    }

    Ok(SparseSplit { train, test })
}

/// Split with a `ChaCha8Rng` seeded from `seed`.
pub fn split_labels(
    labels: &SparseLabels,
    samples_per_class: usize,
    seed: u64,
) -> Result<SparseSplit> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let split = split_labels_with(labels, samples_per_class, &mut rng)?;
    info!(
        "Split {} labeled pixel(s): {} train / {} test (seed {seed:#x})",
        labels.nnz(),
        split.train.nnz(),
        split.test.nnz()
    );
    Ok(split)
}

impl SparseSplit {
    /// Split according to a [`SplitConfig`].
    pub fn from_config(labels: &SparseLabels, config: &SplitConfig) -> Result<Self> {
        split_labels(labels, config.samples_per_class, config.seed)
    }

    pub fn stats(&self) -> SplitStats {
        SplitStats {
            train_size: self.train.nnz(),
            test_size: self.test.nnz(),
            num_classes: self.train.max_class_id().max(self.test.max_class_id()) as usize,
        }
    }

    /// Save the split to a JSON file for reproducibility
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a split written by [`SparseSplit::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Statistics about a split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitStats {
    pub train_size: usize,
    pub test_size: usize,
    pub num_classes: usize,
}

impl fmt::Display for SplitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.train_size + self.test_size;
        let pct = |n: usize| {
            if total == 0 {
                0.0
            } else {
                100.0 * n as f64 / total as f64
            }
        };
        writeln!(f, "Split Statistics:")?;
        writeln!(f, "  Labeled pixels: {total}")?;
        writeln!(f, "  Number of classes: {}", self.num_classes)?;
        writeln!(f, "  Train: {} ({:.1}%)", self.train_size, pct(self.train_size))?;
        writeln!(f, "  Test: {} ({:.1}%)", self.test_size, pct(self.test_size))?;
        Ok(())
    }
}
