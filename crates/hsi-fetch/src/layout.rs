//! Per-dataset cache layout and the download / extract / verify sequence.

use std::fs;
use std::path::{Path, PathBuf};

use hsi_core::Result;
use tracing::{info, warn};

use crate::checksum::{verify_files, ExpectedDigest, Manifest};
use crate::extract::{extract_zip, is_populated};
use crate::fetcher::Fetcher;
use crate::transport::Transport;

/// Where a dataset archive lives and where its files end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    /// Downloaded zip, removed after a successful extraction
    pub archive_path: PathBuf,
    /// Directory the zip is unpacked into
    pub extract_dir: PathBuf,
    /// Directory the manifest paths are relative to
    pub files_root: PathBuf,
}

impl ArchiveLayout {
    /// `<data_home>/<archive>`, unpacked into `<data_home>/<extract>`, files
    /// under `<data_home>/<extract>/<root>`.
    pub fn under(data_home: &Path, archive: &str, extract: &str, root: &str) -> Self {
        let extract_dir = data_home.join(extract);
        Self {
            archive_path: data_home.join(archive),
            files_root: extract_dir.join(root),
            extract_dir,
        }
    }
}

/// Text encodings of the license notices shipped in archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// A license or copyright file to echo after first extraction.
#[derive(Debug, Clone, Copy)]
pub struct LicenseFile<'a> {
    /// Relative to the files root
    pub path: &'a str,
    pub encoding: TextEncoding,
}

/// Everything needed to materialize one dataset archive.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveSource<'a> {
    pub urls: &'a [&'a str],
    pub digest: Option<ExpectedDigest<'a>>,
    pub manifest: Manifest<'a>,
    pub license: Option<LicenseFile<'a>>,
}

/// Decode bytes as the given encoding. Latin-1 maps each byte to one char.
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
    }
}

impl<T: Transport> Fetcher<T> {
    /// Bring `layout.files_root` into a verified state.
    ///
    /// A populated files root is only verified. Otherwise the archive is
    /// fetched, extracted, passed to `post_extract`, verified and deleted.
    pub fn prepare_archive<F>(
        &self,
        layout: &ArchiveLayout,
        source: &ArchiveSource<'_>,
        allow_download: bool,
        post_extract: F,
    ) -> Result<PathBuf>
    where
        F: FnOnce(&Self, &ArchiveLayout) -> Result<()>,
    {
        let root = &layout.files_root;
        if is_populated(root) {
            let context = format!("please try removing {}", root.display());
            verify_files(root, source.manifest, &context)?;
            return Ok(root.clone());
        }

        self.ensure_local(&layout.archive_path, source.urls, source.digest, allow_download)?;
        extract_zip(&layout.archive_path, &layout.extract_dir)?;
        post_extract(self, layout)?;
        verify_files(root, source.manifest, "")?;

        fs::remove_file(&layout.archive_path)?;

        if let Some(license) = source.license {
            match fs::read(root.join(license.path)) {
                Ok(bytes) => info!("{}", decode_text(&bytes, license.encoding)),
                Err(e) => warn!("Could not read {}: {e}", license.path),
            }
        }

        Ok(root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MemoryTransport;
    use hsi_core::Error;
    use sha2::{Digest, Sha256};
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const A_SHA256: &str = "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb";

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_text(&[0x43, 0xA9], TextEncoding::Latin1), "C\u{a9}");
        assert_eq!(decode_text("Ā".as_bytes(), TextEncoding::Utf8), "Ā");
    }

    #[test]
    fn test_layout_under() {
        let layout = ArchiveLayout::under(Path::new("/d"), "X.zip", "X", "inner");
        assert_eq!(layout.archive_path, PathBuf::from("/d/X.zip"));
        assert_eq!(layout.extract_dir, PathBuf::from("/d/X"));
        assert_eq!(layout.files_root, PathBuf::from("/d/X/inner"));
    }

    #[test]
    fn test_prepare_downloads_extracts_and_removes_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = zip_bytes(&[("inner/a.txt", b"a"), ("inner/LICENSE", b"MIT")]);
        let archive_sha = format!("{:x}", Sha256::digest(&archive));

        let layout = ArchiveLayout::under(temp_dir.path(), "X.zip", "X", "inner");
        let entries = [("a.txt", A_SHA256)];
        let source = ArchiveSource {
            urls: &["mem://x"],
            digest: Some(ExpectedDigest::sha256(&archive_sha)),
            manifest: Manifest::sha256(&entries),
            license: Some(LicenseFile {
                path: "LICENSE",
                encoding: TextEncoding::Utf8,
            }),
        };

        let fetcher = Fetcher::new(MemoryTransport::default().with("mem://x", &archive));
        let mut hook_ran = false;
        let root = fetcher
            .prepare_archive(&layout, &source, true, |_, l| {
                hook_ran = true;
                assert!(l.files_root.join("a.txt").exists());
                Ok(())
            })
            .unwrap();

        assert!(hook_ran);
        assert_eq!(root, layout.files_root);
        assert!(!layout.archive_path.exists());

        // second call only verifies
        fetcher
            .prepare_archive(&layout, &source, false, |_, _| panic!("re-extracted"))
            .unwrap();
        assert_eq!(fetcher.transport().requests.borrow().len(), 1);
    }

    #[test]
    fn test_prepare_reports_tampered_tree() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ArchiveLayout::under(temp_dir.path(), "X.zip", "X", "inner");
        fs::create_dir_all(&layout.files_root).unwrap();
        File::create(layout.files_root.join("a.txt"))
            .unwrap()
            .write_all(b"b")
            .unwrap();

        let entries = [("a.txt", A_SHA256)];
        let source = ArchiveSource {
            urls: &[],
            digest: None,
            manifest: Manifest::sha256(&entries),
            license: None,
        };
        let fetcher = Fetcher::new(MemoryTransport::default());
        let err = fetcher
            .prepare_archive(&layout, &source, true, |_, _| Ok(()))
            .unwrap_err();

        match err {
            Error::Integrity { context, .. } => assert!(context.contains("please try removing")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_prepare_without_archive_and_no_download() {
        let temp_dir = TempDir::new().unwrap();
        let layout = ArchiveLayout::under(temp_dir.path(), "X.zip", "X", "inner");
        let source = ArchiveSource {
            urls: &["mem://x"],
            digest: None,
            manifest: Manifest::sha256(&[]),
            license: None,
        };
        let fetcher = Fetcher::new(MemoryTransport::default());
        let err = fetcher
            .prepare_archive(&layout, &source, false, |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
