//! MUUFL Gulfport campus scene (release v0.1).

use std::path::{Path, PathBuf};

use hsi_core::{DatasetMetadata, RasterLayout, Result};
use hsi_fetch::{ArchiveLayout, ArchiveSource, ExpectedDigest, LicenseFile, Manifest, TextEncoding, Transport};

use super::{AssembledDataset, DatasetCache, DatasetId, GroundTruth};
use crate::decode::RasterDecoder;

const ARCHIVE_URLS: &[&str] = &["https://github.com/GatorSense/MUUFLGulfport/archive/refs/tags/v0.1.zip"];
const ARCHIVE_SHA256: &str = "2219e6259e3ad80521a8a7ff879916624efa61eb6df1bfd80538f6f2d4befa2c";

const SCENE_MAT: &str = "MUUFLGulfportSceneLabels/muufl_gulfport_campus_1_hsi_220_label.mat";

const FILES: &[(&str, &str)] = &[(
    SCENE_MAT,
    "69420a72866dff4a858ae503e6e2981af46f406a4ad8f4dd642efa43feb59edc",
)];

const CLASS_NAMES: [&str; 11] = [
    "Trees",
    "Mostly grass",
    "Mixed ground surface",
    "Dirt and sand",
    "Road",
    "Water",
    "Building shadow",
    "Building",
    "Sidewalk",
    "Yellow curb",
    "Cloth panels",
];

const LAYOUT: RasterLayout = RasterLayout {
    hsi_bands: 64,
    aux_bands: 2,
    height: 325,
    width: 220,
};

pub fn metadata() -> Result<DatasetMetadata> {
    Ok(DatasetMetadata::new(
        "muufl",
        "https://github.com/GatorSense/MUUFLGulfport",
        LAYOUT,
        CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
    )?
    .with_full_name("MUUFL Gulfport")
    .with_version("0.1")
    .with_license("MIT"))
}

pub fn layout(data_home: &Path) -> ArchiveLayout {
    ArchiveLayout::under(data_home, "MUUFLGulfport.zip", "MUUFLGulfport", "MUUFLGulfport-0.1")
}

pub fn source() -> ArchiveSource<'static> {
    ArchiveSource {
        urls: ARCHIVE_URLS,
        digest: Some(ExpectedDigest::sha256(ARCHIVE_SHA256)),
        manifest: Manifest::sha256(FILES),
        license: Some(LicenseFile {
            path: "LICENSE",
            encoding: TextEncoding::Utf8,
        }),
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

/// The scene file holds one `hsi` struct; LiDAR is the first element of
/// the `Lidar` struct array. Unlabeled pixels are stored as -1.
pub(crate) fn assemble<D: RasterDecoder>(decoder: &D, root: &Path) -> Result<AssembledDataset> {
    let scene = decoder.read_mat(&root.join(SCENE_MAT))?;
    let hsi = scene.get("hsi.Data")?.to_chw()?;
    let aux = scene.get("hsi.Lidar.z")?.to_chw()?;
    let labels = scene.get("hsi.sceneLabels.labels")?.to_labels()?;

    AssembledDataset::new(hsi, aux, GroundTruth::Full(labels), metadata()?)
}

/// Fetch MUUFL Gulfport over HTTP. The ground truth comes without a split.
pub fn fetch_muufl(data_home: Option<&Path>, download_if_missing: bool) -> Result<AssembledDataset> {
    super::fetch(DatasetId::Muufl, data_home, download_if_missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{mat_writer, parse_mat, MatVariables};
    use hsi_core::Error;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Serves one pre-built MAT file regardless of path.
    struct FixtureDecoder {
        mat: Vec<u8>,
        reads: RefCell<Vec<PathBuf>>,
    }

    impl RasterDecoder for FixtureDecoder {
        fn read_geotiff(&self, path: &Path) -> Result<ndarray::Array3<f32>> {
            Err(Error::NotFound(path.to_path_buf()))
        }

        fn read_mat(&self, path: &Path) -> Result<MatVariables> {
            self.reads.borrow_mut().push(path.to_path_buf());
            Ok(MatVariables::from_values(parse_mat(&self.mat)?))
        }
    }

    fn scene_mat(height: usize, width: usize) -> Vec<u8> {
        let pixels = height * width;
        let data: Vec<f64> = (0..pixels * 64).map(|v| v as f64).collect();
        let z: Vec<f64> = vec![3.5; pixels * 2];
        let mut labels = vec![-1.0; pixels];
        labels[0] = 1.0;
        labels[1] = 11.0;

        let dims3 = |c: usize| [height, width, c];
        let lidar = mat_writer::structure(
            "",
            &[1, 1],
            &["z"],
            &[vec![mat_writer::double("", &dims3(2), &z)]],
        );
        let scene_labels = mat_writer::structure(
            "",
            &[1, 1],
            &["labels"],
            &[vec![mat_writer::double("", &[height, width], &labels)]],
        );
        let hsi = mat_writer::structure(
            "hsi",
            &[1, 1],
            &["Data", "Lidar", "sceneLabels"],
            &[vec![
                mat_writer::double("", &dims3(64), &data),
                lidar,
                scene_labels,
            ]],
        );
        mat_writer::file(&[hsi])
    }

    #[test]
    fn test_assemble_scene_struct() {
        let decoder = FixtureDecoder {
            mat: scene_mat(325, 220),
            reads: RefCell::new(Vec::new()),
        };
        let temp_dir = TempDir::new().unwrap();
        let dataset = assemble(&decoder, temp_dir.path()).unwrap();

        assert_eq!(dataset.hsi.dim(), (64, 325, 220));
        assert_eq!(dataset.aux.dim(), (2, 325, 220));
        assert_eq!(dataset.aux[[1, 10, 10]], 3.5);
        match &dataset.truth {
            GroundTruth::Full(labels) => {
                assert_eq!(labels.nnz(), 2);
                // column-major: element 1 is (row 1, col 0)
                assert_eq!(labels.get(0, 0), Some(1));
                assert_eq!(labels.get(1, 0), Some(11));
            }
            other => panic!("unexpected truth: {other:?}"),
        }
        assert_eq!(
            decoder.reads.borrow().as_slice(),
            &[temp_dir.path().join(SCENE_MAT)]
        );
    }

    #[test]
    fn test_wrong_extent_is_a_decode_error() {
        let decoder = FixtureDecoder {
            mat: scene_mat(4, 5),
            reads: RefCell::new(Vec::new()),
        };
        let err = assemble(&decoder, Path::new("/nowhere")).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_metadata() {
        let meta = metadata().unwrap();
        assert_eq!(meta.full_name(), "MUUFL Gulfport");
        assert_eq!(meta.version(), Some("0.1"));
        assert_eq!(meta.license(), Some("MIT"));
        assert_eq!(meta.class_name(11), Some("Cloth panels"));
        assert!(meta.wavelengths().is_none());
    }
}
