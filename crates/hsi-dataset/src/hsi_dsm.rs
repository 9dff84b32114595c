//! Train / test / whole-scene patch datasets over an assembled HSI + DSM
//! dataset.

use std::fmt;
use std::str::FromStr;

use burn::data::dataset::Dataset;
use hsi_core::{DatasetMetadata, Error, FetchConfig, Result, SplitConfig};
use ndarray::s;
use tracing::info;

use crate::assemblers::AssembledDataset;
use crate::patch_dataset::{PatchDataset, PatchItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subset {
    Train,
    Test,
    /// Every pixel of the scene, unlabeled
    Full,
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subset::Train => write!(f, "train"),
            Subset::Test => write!(f, "test"),
            Subset::Full => write!(f, "full"),
        }
    }
}

impl FromStr for Subset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Subset::Train),
            "test" => Ok(Subset::Test),
            "full" => Ok(Subset::Full),
            other => Err(Error::InvalidArgument(format!(
                "unknown subset `{other}` (expected train, test or full)"
            ))),
        }
    }
}

/// Patches of one subset; only the first DSM band is kept.
#[derive(Clone, Debug)]
pub struct HsiDsmDataset {
    patches: PatchDataset,
    subset: Subset,
    metadata: DatasetMetadata,
}

impl HsiDsmDataset {
    /// Datasets without an official split are split with `split`.
    pub fn new(
        assembled: &AssembledDataset,
        subset: Subset,
        patch_size: usize,
        split: &SplitConfig,
    ) -> Result<Self> {
        let dsm = assembled.aux.slice(s![0..1, .., ..]).to_owned();
        let n_class = assembled.n_class();

        let patches = match subset {
            Subset::Full => PatchDataset::whole_scene(&assembled.hsi, &dsm, n_class, patch_size)?,
            Subset::Train | Subset::Test => {
                let pair = assembled.truth.train_test(split)?;
                let labels = if subset == Subset::Train {
                    &pair.train
                } else {
                    &pair.test
                };
                PatchDataset::new(&assembled.hsi, &dsm, labels, n_class, patch_size)?
            }
        };

        info!(
            "{} {subset}: {} patch(es) of size {patch_size}",
            assembled.metadata.name(),
            patches.len()
        );
        Ok(Self {
            patches,
            subset,
            metadata: assembled.metadata.clone(),
        })
    }

    /// Patch size and split taken from `config`.
    pub fn from_config(
        assembled: &AssembledDataset,
        subset: Subset,
        config: &FetchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::new(assembled, subset, config.patch_size, &config.split)
    }

    pub fn subset(&self) -> Subset {
        self.subset
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn patches(&self) -> &PatchDataset {
        &self.patches
    }
}

impl Dataset<PatchItem> for HsiDsmDataset {
    fn get(&self, index: usize) -> Option<PatchItem> {
        self.patches.get(index)
    }

    fn len(&self) -> usize {
        self.patches.len()
    }
}
