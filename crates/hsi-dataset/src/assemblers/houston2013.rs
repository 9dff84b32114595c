//! IEEE GRSS Data Fusion Contest 2013 (Houston): CASI hyperspectral cube,
//! LiDAR DSM and the official train/validation ROI exports.

use std::path::{Path, PathBuf};

use hsi_core::{DatasetMetadata, RasterLayout, Result};
use hsi_fetch::{ArchiveLayout, ArchiveSource, ExpectedDigest, LicenseFile, Manifest, TextEncoding, Transport};
use tracing::info;

use super::{AssembledDataset, DatasetCache, DatasetId, GroundTruth};
use crate::decode::RasterDecoder;
use crate::roi::read_roi;

pub const HEIGHT: usize = 349;
pub const WIDTH: usize = 1905;

const ARCHIVE_URLS: &[&str] = &["https://machinelearning.ee.uh.edu/2egf4tg8hial13gt/2013_DFTC.zip"];
const ARCHIVE_SHA256: &str = "f4d619d5cbcb09d0301038f1b8fe83def6c2d484334b7b8127740a00ecf7e245";

const CASI_TIF: &str = "2013_IEEE_GRSS_DF_Contest_CASI.tif";
const LIDAR_TIF: &str = "2013_IEEE_GRSS_DF_Contest_LiDAR.tif";
const TRAIN_ROI: &str = "2013_IEEE_GRSS_DF_Contest_Samples_TR.txt";
const TEST_ROI: &str = "2013_IEEE_GRSS_DF_Contest_Samples_VA.txt";

/// The validation ROI text is not part of the contest zip.
const TEST_ROI_MIRRORS: &[&str] = &[
    "https://github.com/songyz2019/fetch_houston2013/raw/8539c932284a0d2ae60e7f968f430c42d4d1c09a/data/2013_IEEE_GRSS_DF_Contest_Samples_VA.txt",
    "https://pastebin.com/raw/FJyu5SQX",
];

const FILES: &[(&str, &str)] = &[
    ("2013_IEEE_GRSS_DF_Contest_CASI.hdr", "869be3459978b535b873bca98b1cf05066c7acca9c160b486a86efd775005e8d"),
    ("2013_IEEE_GRSS_DF_Contest_CASI.tif", "1440f38594e8e82cc1944c084fc138ef55a70af54122828e999c4fb438574c14"),
    ("2013_IEEE_GRSS_DF_Contest_LiDAR.hdr", "053c083de1cb0d9ad51c56964b29669733ef2c7db05997d4f4e0779ab2f6aade"),
    ("2013_IEEE_GRSS_DF_Contest_LiDAR.tif", "9f4facce8876ee84642d9cb03536baf0389506de97ddc01b73366fe4521de981"),
    ("2013_IEEE_GRSS_DF_Contest_Samples_TR.roi", "feedf41f7064d8f80cf2d9bda72fcbcc98b64658d01e519ad0b90b1ca88f1375"),
    ("2013_IEEE_GRSS_DF_Contest_Samples_TR.txt", "16c69cf216535d7b4df2045b05d49c50a078609aa6d011a5e23e54f4cd08abda"),
    ("2013_IEEE_GRSS_DF_Contest_Samples_VA.zip", "aac7015c7a986063002a86eb7f7cc57ed6f14f5eaf3e9ca29c0cb1e63fd7e0d5"),
    ("copyright.txt", "63d908383566b1ff6fd259aa202e31dab9a629808919d87d94970df7ad25180d"),
    ("2013_IEEE_GRSS_DF_Contest_Samples_VA.txt", "768bb02193d04c8020b45f1f31a49926a5b914040f77f71a81df756d6e8b8dcb"),
];

pub(crate) const CLASS_NAMES: [&str; 15] = [
    "Healthy grass",
    "Stressed grass",
    "Synthetic grass",
    "Trees",
    "Soil",
    "Water",
    "Residential",
    "Commercial",
    "Road",
    "Highway",
    "Railway",
    "Parking Lot 1",
    "Parking Lot 2",
    "Tennis Court",
    "Running Track",
];

/// CASI band centers in nanometers.
#[rustfmt::skip]
pub(crate) const WAVELENGTHS: [f32; 144] = [
    364.000000, 368.799988, 373.600006, 378.399994, 383.200012, 387.899994,
    392.700012, 397.500000, 402.299988, 407.000000, 411.799988, 416.600006,
    421.399994, 426.100006, 430.899994, 435.700012, 440.500000, 445.200012,
    450.000000, 454.799988, 459.600006, 464.299988, 469.100006, 473.899994,
    478.600006, 483.399994, 488.200012, 492.899994, 497.700012, 502.500000,
    507.299988, 512.000000, 516.799988, 521.599976, 526.299988, 531.099976,
    535.900024, 540.599976, 545.400024, 550.200012, 554.900024, 559.700012,
    564.500000, 569.200012, 574.000000, 578.799988, 583.500000, 588.299988,
    593.099976, 597.799988, 602.599976, 607.400024, 612.099976, 616.900024,
    621.599976, 626.400024, 631.200012, 635.900024, 640.700012, 645.500000,
    650.200012, 655.000000, 659.799988, 664.500000, 669.299988, 674.099976,
    678.799988, 683.599976, 688.299988, 693.099976, 697.900024, 702.599976,
    707.400024, 712.200012, 716.900024, 721.700012, 726.500000, 731.200012,
    736.000000, 740.700012, 745.500000, 750.299988, 755.000000, 759.799988,
    764.599976, 769.299988, 774.099976, 778.900024, 783.599976, 788.400024,
    793.200012, 797.900024, 802.700012, 807.500000, 812.200012, 817.000000,
    821.799988, 826.500000, 831.299988, 836.099976, 840.799988, 845.599976,
    850.400024, 855.099976, 859.900024, 864.700012, 869.400024, 874.200012,
    879.000000, 883.700012, 888.500000, 893.299988, 898.000000, 902.799988,
    907.599976, 912.299988, 917.099976, 921.900024, 926.700012, 931.400024,
    936.200012, 941.000000, 945.799988, 950.500000, 955.299988, 960.099976,
    964.799988, 969.599976, 974.400024, 979.200012, 983.900024, 988.700012,
    993.500000, 998.299988, 1003.099976, 1007.799988, 1012.599976, 1017.400024,
    1022.200012, 1026.900024, 1031.699951, 1036.500000, 1041.300049, 1046.099976,
];

pub(crate) const LAYOUT: RasterLayout = RasterLayout {
    hsi_bands: 144,
    aux_bands: 1,
    height: HEIGHT,
    width: WIDTH,
};

pub fn metadata() -> Result<DatasetMetadata> {
    DatasetMetadata::new(
        "houston2013",
        "https://hyperspectral.ee.uh.edu/?page_id=459",
        LAYOUT,
        CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
    )?
    .with_full_name("IEEE GRSS DF Contest Houston 2013")
    .with_wavelengths(WAVELENGTHS.to_vec())
}

pub fn layout(data_home: &Path) -> ArchiveLayout {
    ArchiveLayout::under(data_home, "Houston2013.zip", "Houston2013", "2013_DFTC")
}

pub fn source() -> ArchiveSource<'static> {
    ArchiveSource {
        urls: ARCHIVE_URLS,
        digest: Some(ExpectedDigest::sha256(ARCHIVE_SHA256)),
        manifest: Manifest::sha256(FILES),
        license: Some(LicenseFile {
            path: "copyright.txt",
            encoding: TextEncoding::Latin1,
        }),
    }
}

pub(crate) fn prepare<T: Transport, D: RasterDecoder>(cache: &DatasetCache<T, D>) -> Result<PathBuf> {
    let allow = cache.allows_download();
    cache.fetcher().prepare_archive(
        &layout(cache.data_home()),
        &source(),
        allow,
        |fetcher, layout| {
            let test_roi = layout.files_root.join(TEST_ROI);
            if !test_roi.exists() {
                info!("{TEST_ROI} is not in the archive, fetching it separately");
                fetcher.ensure_local(&test_roi, TEST_ROI_MIRRORS, None, allow)?;
            }
            Ok(())
        },
    )
}

pub(crate) fn assemble<D: RasterDecoder>(decoder: &D, root: &Path) -> Result<AssembledDataset> {
    let hsi = decoder.read_geotiff(&root.join(CASI_TIF))?;
    let aux = decoder.read_geotiff(&root.join(LIDAR_TIF))?;
    let train = read_roi(&root.join(TRAIN_ROI), (HEIGHT, WIDTH))?.into_labels();
    let test = read_roi(&root.join(TEST_ROI), (HEIGHT, WIDTH))?.into_labels();

    AssembledDataset::new(hsi, aux, GroundTruth::Split { train, test }, metadata()?)
}

/// Fetch Houston 2013 over HTTP. Returns the official train/test split.
pub fn fetch_houston2013(
    data_home: Option<&Path>,
    download_if_missing: bool,
) -> Result<AssembledDataset> {
    super::fetch(DatasetId::Houston2013, data_home, download_if_missing)
}
