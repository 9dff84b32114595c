//! Dataset assemblers: cache, verify and decode each supported dataset into
//! channel-first rasters plus ground truth.

pub mod houston2013;
pub mod houston2013_mmrs;
pub mod muufl;
pub mod trento;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hsi_core::{DatasetMetadata, Error, FetchConfig, Result, SparseLabels, SplitConfig};
use hsi_fetch::{resolve_data_home, Fetcher, HttpTransport, Transport};
use ndarray::Array3;
use tracing::info;

use crate::decode::{DefaultDecoder, RasterDecoder};
use crate::split::SparseSplit;

/// The datasets this crate knows how to assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetId {
    Houston2013,
    Houston2013Mmrs,
    Muufl,
    Trento,
}

impl DatasetId {
    pub const ALL: [DatasetId; 4] = [
        DatasetId::Houston2013,
        DatasetId::Houston2013Mmrs,
        DatasetId::Muufl,
        DatasetId::Trento,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DatasetId::Houston2013 => "houston2013",
            DatasetId::Houston2013Mmrs => "houston2013-mmrs",
            DatasetId::Muufl => "muufl",
            DatasetId::Trento => "trento",
        }
    }

    /// Nominal metadata, available without touching the cache.
    pub fn metadata(&self) -> Result<DatasetMetadata> {
        match self {
            DatasetId::Houston2013 => houston2013::metadata(),
            DatasetId::Houston2013Mmrs => houston2013_mmrs::metadata(),
            DatasetId::Muufl => muufl::metadata(),
            DatasetId::Trento => trento::metadata(),
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatasetId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|id| id.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|id| id.name()).collect();
                Error::InvalidArgument(format!(
                    "unknown dataset `{s}` (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Ground truth as shipped by the dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum GroundTruth {
    /// Official train/test partition
    Split {
        train: SparseLabels,
        test: SparseLabels,
    },
    /// One label image; split it yourself
    Full(SparseLabels),
}

impl GroundTruth {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            GroundTruth::Split { train, .. } => train.shape(),
            GroundTruth::Full(labels) => labels.shape(),
        }
    }

    /// Every labeled pixel. For an official split, train entries come first.
    pub fn labels(&self) -> Result<SparseLabels> {
        match self {
            GroundTruth::Full(labels) => Ok(labels.clone()),
            GroundTruth::Split { train, test } => {
                let (height, width) = train.shape();
                let mut all = SparseLabels::new(height, width);
                for entry in train.iter().chain(test.iter()) {
                    all.insert(entry.row, entry.col, entry.class_id)?;
                }
                Ok(all)
            }
        }
    }

    /// Train/test pair: the official one, or a stratified split of the
    /// full labels.
    pub fn train_test(&self, config: &SplitConfig) -> Result<SparseSplit> {
        match self {
            GroundTruth::Split { train, test } => Ok(SparseSplit {
                train: train.clone(),
                test: test.clone(),
            }),
            GroundTruth::Full(labels) => SparseSplit::from_config(labels, config),
        }
    }
}

/// Decoded rasters, ground truth and metadata of one dataset.
#[derive(Debug, Clone)]
pub struct AssembledDataset {
    /// Hyperspectral cube, `(bands, height, width)`
    pub hsi: Array3<f32>,
    /// Elevation bands, `(bands, height, width)`
    pub aux: Array3<f32>,
    pub truth: GroundTruth,
    pub metadata: DatasetMetadata,
}

impl AssembledDataset {
    /// Bundle the parts after checking them against `metadata`.
    pub fn new(
        hsi: Array3<f32>,
        aux: Array3<f32>,
        truth: GroundTruth,
        metadata: DatasetMetadata,
    ) -> Result<Self> {
        check_raster(&metadata, "HSI", &hsi, metadata.hsi_bands())?;
        check_raster(&metadata, "auxiliary", &aux, metadata.aux_bands())?;
        match &truth {
            GroundTruth::Split { train, test } => {
                check_labels(&metadata, "train", train)?;
                check_labels(&metadata, "test", test)?;
            }
            GroundTruth::Full(labels) => check_labels(&metadata, "ground truth", labels)?,
        }
        Ok(Self {
            hsi,
            aux,
            truth,
            metadata,
        })
    }

    pub fn n_class(&self) -> usize {
        self.metadata.n_class()
    }
}

fn check_raster(
    metadata: &DatasetMetadata,
    what: &str,
    raster: &Array3<f32>,
    bands: usize,
) -> Result<()> {
    let expected = (bands, metadata.height(), metadata.width());
    if raster.dim() != expected {
        return Err(Error::Decode(format!(
            "{}: {what} raster has shape {:?}, expected {:?}",
            metadata.name(),
            raster.dim(),
            expected
        )));
    }
    Ok(())
}

fn check_labels(metadata: &DatasetMetadata, what: &str, labels: &SparseLabels) -> Result<()> {
    let expected = (metadata.height(), metadata.width());
    if labels.shape() != expected {
        return Err(Error::Decode(format!(
            "{}: {what} labels have shape {:?}, expected {:?}",
            metadata.name(),
            labels.shape(),
            expected
        )));
    }
    if labels.max_class_id() as usize > metadata.n_class() {
        return Err(Error::Decode(format!(
            "{}: {what} labels use class {} but only {} classes are known",
            metadata.name(),
            labels.max_class_id(),
            metadata.n_class()
        )));
    }
    Ok(())
}

/// A data home together with the fetcher and decoder used to fill it.
pub struct DatasetCache<T: Transport = HttpTransport, D: RasterDecoder = DefaultDecoder> {
    data_home: PathBuf,
    download_if_missing: bool,
    fetcher: Fetcher<T>,
    decoder: D,
}

impl DatasetCache {
    /// HTTP fetcher, default decoder and data home resolved from `config`.
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        config.validate()?;
        let data_home = resolve_data_home(config.data_home.as_deref())?;
        Ok(DatasetCache::new(data_home, Fetcher::http(&config.http)?, DefaultDecoder)
            .download_if_missing(config.download_if_missing))
    }
}

impl<T: Transport, D: RasterDecoder> DatasetCache<T, D> {
    pub fn new(data_home: impl Into<PathBuf>, fetcher: Fetcher<T>, decoder: D) -> Self {
        Self {
            data_home: data_home.into(),
            download_if_missing: true,
            fetcher,
            decoder,
        }
    }

    pub fn download_if_missing(mut self, allow: bool) -> Self {
        self.download_if_missing = allow;
        self
    }

    pub fn data_home(&self) -> &Path {
        &self.data_home
    }

    pub fn allows_download(&self) -> bool {
        self.download_if_missing
    }

    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Download, extract and verify a dataset; returns its files root.
    pub fn prepare(&self, id: DatasetId) -> Result<PathBuf> {
        let root = match id {
            DatasetId::Houston2013 => houston2013::prepare(self)?,
            DatasetId::Houston2013Mmrs => houston2013_mmrs::prepare(self)?,
            DatasetId::Muufl => muufl::prepare(self)?,
            DatasetId::Trento => trento::prepare(self)?,
        };
        info!("{id} ready at {}", root.display());
        Ok(root)
    }

    /// Prepare and decode a dataset.
    pub fn fetch(&self, id: DatasetId) -> Result<AssembledDataset> {
        let root = self.prepare(id)?;
        match id {
            DatasetId::Houston2013 => houston2013::assemble(&self.decoder, &root),
            DatasetId::Houston2013Mmrs => houston2013_mmrs::assemble(&self.decoder, &root),
            DatasetId::Muufl => muufl::assemble(&self.decoder, &root),
            DatasetId::Trento => trento::assemble(&self.decoder, &root),
        }
    }
}

/// Fetch a dataset over HTTP into `data_home` (or the default data home).
pub fn fetch(
    id: DatasetId,
    data_home: Option<&Path>,
    download_if_missing: bool,
) -> Result<AssembledDataset> {
    let config = FetchConfig {
        data_home: data_home.map(Path::to_path_buf),
        download_if_missing,
        ..FetchConfig::default()
    };
    DatasetCache::from_config(&config)?.fetch(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsi_core::LabelEntry;
    use hsi_core::RasterLayout;

    fn tiny_metadata() -> DatasetMetadata {
        DatasetMetadata::new(
            "tiny",
            "https://example.org",
            RasterLayout {
                hsi_bands: 3,
                aux_bands: 1,
                height: 2,
                width: 2,
            },
            vec!["a".to_string(), "b".to_string()],
        )
        .unwrap()
    }

    fn labels(entries: &[(usize, usize, u32)]) -> SparseLabels {
        SparseLabels::from_entries(
            2,
            2,
            entries.iter().map(|&(r, c, id)| LabelEntry::new(r, c, id)),
        )
        .unwrap()
    }

    #[test]
    fn test_dataset_id_names() {
        for id in DatasetId::ALL {
            assert_eq!(id.name().parse::<DatasetId>().unwrap(), id);
        }
        assert_eq!(
            "Houston2013_MMRS".parse::<DatasetId>().unwrap(),
            DatasetId::Houston2013Mmrs
        );
        assert!(matches!(
            "augsburg".parse::<DatasetId>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_nominal_metadata_is_valid() {
        for id in DatasetId::ALL {
            let meta = id.metadata().unwrap();
            assert!(meta.n_class() > 0);
        }
        assert_eq!(DatasetId::Houston2013.metadata().unwrap().n_class(), 15);
        assert_eq!(DatasetId::Trento.metadata().unwrap().n_class(), 6);
    }

    #[test]
    fn test_assembled_shape_checks() {
        let hsi = Array3::zeros((3, 2, 2));
        let aux = Array3::zeros((1, 2, 2));
        let truth = GroundTruth::Full(labels(&[(0, 0, 1), (1, 1, 2)]));
        assert!(AssembledDataset::new(hsi.clone(), aux.clone(), truth.clone(), tiny_metadata()).is_ok());

        let err = AssembledDataset::new(Array3::zeros((4, 2, 2)), aux.clone(), truth, tiny_metadata())
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));

        let too_many_classes = GroundTruth::Full(labels(&[(0, 0, 3)]));
        assert!(AssembledDataset::new(hsi, aux, too_many_classes, tiny_metadata()).is_err());
    }

    #[test]
    fn test_ground_truth_union_and_split() {
        let truth = GroundTruth::Split {
            train: labels(&[(0, 0, 1)]),
            test: labels(&[(1, 1, 2), (0, 1, 1)]),
        };
        let all = truth.labels().unwrap();
        assert_eq!(all.nnz(), 3);
        assert_eq!(all.entries()[0], LabelEntry::new(0, 0, 1));

        let split = truth.train_test(&SplitConfig::default()).unwrap();
        assert_eq!(split.train.nnz(), 1);
        assert_eq!(split.test.nnz(), 2);

        let full = GroundTruth::Full(labels(&[(0, 0, 1), (0, 1, 1), (1, 1, 2)]));
        let config = SplitConfig {
            samples_per_class: 1,
            ..SplitConfig::default()
        };
        let split = full.train_test(&config).unwrap();
        assert_eq!(split.train.nnz(), 2);
        assert_eq!(split.test.nnz(), 1);
    }
}
