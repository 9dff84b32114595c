//! Trento (Italy) HSI + LiDAR scene.

use std::path::{Path, PathBuf};

use hsi_core::{DatasetMetadata, RasterLayout, Result};
use hsi_fetch::{ArchiveLayout, ArchiveSource, ExpectedDigest, Manifest, Transport};

use super::{AssembledDataset, DatasetCache, DatasetId, GroundTruth};
use crate::decode::RasterDecoder;

const COMMIT: &str = "b4afc449ce5d6936ddc04fe267d86f9f35536afd";

const ARCHIVE_URLS: &[&str] =
    &["https://github.com/tyust-dayu/Trento/archive/b4afc449ce5d6936ddc04fe267d86f9f35536afd.zip"];
/// Published in upper case.
const ARCHIVE_SHA256: &str = "B203331B039D994015C4137753F15973CB638046532B8DCED6064888BF970631";

const FILES: &[(&str, &str)] = &[
    ("allgrd.mat", "7e3fb2a2ea22c2661dfc768db3cb93c9643b324e7e64fadedfa57f5edbf1818f"),
    ("Italy_hsi.mat", "7b965fd405314b5c91451042e547a1923be6f5a38c6da83969032cff79729280"),
    ("Italy_lidar.mat", "a04dc90368d6a7b4f9d3936024ba9fef4105456c090daa14fff31b8b79e94ab1"),
];

const CLASS_NAMES: [&str; 6] = ["Apple trees", "Buildings", "Ground", "Woods", "Vineyard", "Roads"];

const LAYOUT: RasterLayout = RasterLayout {
    hsi_bands: 63,
    aux_bands: 2,
    height: 166,
    width: 600,
};

pub fn metadata() -> Result<DatasetMetadata> {
    Ok(DatasetMetadata::new(
        "trento",
        "https://github.com/tyust-dayu/Trento",
        LAYOUT,
        CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
    )?
    .with_full_name("Trento"))
}

pub fn layout(data_home: &Path) -> ArchiveLayout {
    ArchiveLayout::under(
        data_home,
        &format!("Trento-{COMMIT}.zip"),
        "Trento",
        &format!("Trento-{COMMIT}"),
    )
}

pub fn source() -> ArchiveSource<'static> {
    ArchiveSource {
        urls: ARCHIVE_URLS,
        digest: Some(ExpectedDigest::sha256(ARCHIVE_SHA256)),
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
    let hsi = decoder.read_mat(&root.join("Italy_hsi.mat"))?.get("data")?.to_chw()?;
    let aux = decoder.read_mat(&root.join("Italy_lidar.mat"))?.get("data")?.to_chw()?;
    let labels = decoder
        .read_mat(&root.join("allgrd.mat"))?
        .get("mask_test")?
        .to_labels()?;

    AssembledDataset::new(hsi, aux, GroundTruth::Full(labels), metadata()?)
}

/// Fetch Trento over HTTP. The ground truth comes without a split.
pub fn fetch_trento(data_home: Option<&Path>, download_if_missing: bool) -> Result<AssembledDataset> {
    super::fetch(DatasetId::Trento, data_home, download_if_missing)
}
