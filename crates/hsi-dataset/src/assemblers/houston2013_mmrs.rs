//! Houston 2013 as repackaged by the Multimodal Remote Sensing Toolkit: MAT
//! files with the HSI cube, LiDAR and the toolkit's train/test masks.
//!
//! There is no public download; place `houston2013mmrs.zip` in the data home.

use std::path::{Path, PathBuf};

use hsi_core::{DatasetMetadata, Result};
use hsi_fetch::{ArchiveLayout, ArchiveSource, Manifest, Transport};

use super::houston2013::{CLASS_NAMES, LAYOUT, WAVELENGTHS};
use super::{AssembledDataset, DatasetCache, DatasetId, GroundTruth};
use crate::decode::RasterDecoder;

const FILES: &[(&str, &str)] = &[
    ("gt.mat", "75ecccc08ac7709e48285bb098fda802da6efd6dc0168cb1c99c6ce09d0b6ae0"),
    ("HSI.mat", "6a0edba3c224df411623ed5774fc34e91929ab341709859b2f56cc38dbb3c6fd"),
    ("LiDAR.mat", "7aa956e7c371fd29a495f0cb9bb8f572aaa4065fcfeda2b3e854a5cef74b35ad"),
    ("TRLabel.mat", "96ce863eaf4dc548c3140a480dee33c812d46194ae5ed345fed6e71a3d72b527"),
    ("TSLabel.mat", "46bd849d556c80ed67b33f23dd288eafa7ac9f97a847390be373b702b0bf5a45"),
];

pub fn metadata() -> Result<DatasetMetadata> {
    DatasetMetadata::new(
        "houston2013mmrs",
        "https://github.com/likyoo/Multimodal-Remote-Sensing-Toolkit",
        LAYOUT,
        CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
    )?
    .with_full_name("MMRS version of IEEE GRSS DF Contest Houston 2013")
    .with_wavelengths(WAVELENGTHS.to_vec())
}

pub fn layout(data_home: &Path) -> ArchiveLayout {
    ArchiveLayout::under(data_home, "houston2013mmrs.zip", "houston2013mmrs", "Houston2013")
}

pub fn source() -> ArchiveSource<'static> {
    ArchiveSource {
        urls: &[],
        digest: None,
        manifest: Manifest::sha256(FILES),
        license: None,
    }
}

pub(crate) fn prepare<T: Transport, D: RasterDecoder>(cache: &DatasetCache<T, D>) -> Result<PathBuf> {
    cache.fetcher().prepare_archive(
        &layout(cache.data_home()),
        &source(),
        cache.allows_download(),
        |_, _| Ok(()),
    )
}

pub(crate) fn assemble<D: RasterDecoder>(decoder: &D, root: &Path) -> Result<AssembledDataset> {
    let hsi = decoder.read_mat(&root.join("HSI.mat"))?.get("HSI")?.to_chw()?;
    let aux = decoder.read_mat(&root.join("LiDAR.mat"))?.get("LiDAR")?.to_chw()?;
    let train = decoder.read_mat(&root.join("TRLabel.mat"))?.get("TRLabel")?.to_labels()?;
    let test = decoder.read_mat(&root.join("TSLabel.mat"))?.get("TSLabel")?.to_labels()?;

    AssembledDataset::new(hsi, aux, GroundTruth::Split { train, test }, metadata()?)
}

/// Assemble the MMRS variant from an archive already in the data home.
pub fn fetch_houston2013_mmrs(data_home: Option<&Path>) -> Result<AssembledDataset> {
    super::fetch(DatasetId::Houston2013Mmrs, data_home, false)
}
