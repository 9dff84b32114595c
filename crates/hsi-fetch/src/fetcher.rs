//! Mirror-aware download of single files into the cache.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use hsi_core::{Error, HttpConfig, Result};
use tracing::{info, warn};

use crate::checksum::{verify_file, ExpectedDigest};
use crate::transport::{HttpTransport, Transport, TransportError};

/// Ensures files exist locally, downloading from mirrors when allowed.
pub struct Fetcher<T: Transport = HttpTransport> {
    transport: T,
}

impl Fetcher<HttpTransport> {
    /// Fetcher over a fresh HTTP client built from `config`.
    pub fn http(config: &HttpConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Make sure `target` exists, then verify it against `expected`.
    ///
    /// An existing file is never re-downloaded. Mirrors are tried in order.
    /// A download is checked while still a `.part` file; a mismatch removes
    /// it and is final.
    pub fn ensure_local(
        &self,
        target: &Path,
        urls: &[&str],
        expected: Option<ExpectedDigest<'_>>,
        allow_download: bool,
    ) -> Result<PathBuf> {
        if target.exists() {
            if let Some(expected) = expected {
                let context = format!("please try removing {}", target.display());
                verify_file(target, expected, &context)?;
            }
            return Ok(target.to_path_buf());
        }

        if !allow_download || urls.is_empty() {
            return Err(Error::NotFound(target.to_path_buf()));
        }
        self.download_from_mirrors(target, urls, expected)?;
        Ok(target.to_path_buf())
    }

    fn download_from_mirrors(
        &self,
        target: &Path,
        urls: &[&str],
        expected: Option<ExpectedDigest<'_>>,
    ) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = partial_path(target);

        let mut attempts = Vec::with_capacity(urls.len());
        for url in urls {
            info!("Downloading {url}");
            match self.download_one(url, &partial) {
                Ok(bytes) => {
                    if let Some(expected) = expected {
                        verify_download(&partial, target, expected, url)?;
                    }
                    fs::rename(&partial, target)?;
                    info!("Saved {} ({bytes} bytes)", target.display());
                    return Ok(());
                }
                Err(e) => {
                    warn!("Download from {url} failed: {e}");
                    attempts.push(format!("{url}: {e}"));
                }
            }
        }

        Err(Error::Download {
            target: target.to_path_buf(),
            attempts,
        })
    }

    /// Stream `url` into `partial`; the file is removed if the transfer fails.
    fn download_one(&self, url: &str, partial: &Path) -> std::result::Result<u64, TransportError> {
        let outcome = (|| -> std::result::Result<u64, TransportError> {
            let mut sink = BufWriter::new(File::create(partial)?);
            let bytes = self.transport.download(url, &mut sink)?;
            sink.flush()?;
            Ok(bytes)
        })();

        if outcome.is_err() {
            let _ = fs::remove_file(partial);
        }
        outcome
    }
}

/// Check a finished `.part` download. On a mismatch the partial file is
/// deleted and the error names the final target.
fn verify_download(
    partial: &Path,
    target: &Path,
    expected: ExpectedDigest<'_>,
    url: &str,
) -> Result<()> {
    let context = format!("downloaded from {url}; the file was discarded");
    match verify_file(partial, expected, &context) {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = fs::remove_file(partial);
            Err(match err {
                Error::Integrity {
                    algorithm,
                    expected,
                    actual,
                    context,
                    ..
                } => Error::Integrity {
                    file: target.to_path_buf(),
                    algorithm,
                    expected,
                    actual,
                    context,
                },
                other => other,
            })
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MemoryTransport;
    use tempfile::TempDir;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_existing_file_skips_download() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a.txt");
        fs::write(&target, b"abc").unwrap();

        let fetcher = Fetcher::new(MemoryTransport::default());
        fetcher
            .ensure_local(&target, &["mem://a"], Some(ExpectedDigest::sha256(ABC_SHA256)), true)
            .unwrap();
        assert!(fetcher.transport().requests.borrow().is_empty());
    }

    #[test]
    fn test_missing_without_download_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a.txt");

        let fetcher = Fetcher::new(MemoryTransport::default().with("mem://a", b"abc"));
        let err = fetcher
            .ensure_local(&target, &["mem://a"], None, false)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!target.exists());
    }

    #[test]
    fn test_falls_through_to_next_mirror() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("sub").join("a.txt");

        let fetcher = Fetcher::new(MemoryTransport::default().with("mem://second", b"abc"));
        fetcher
            .ensure_local(
                &target,
                &["mem://first", "mem://second"],
                Some(ExpectedDigest::sha256(ABC_SHA256)),
                true,
            )
            .unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"abc");
        assert!(!partial_path(&target).exists());
        assert_eq!(
            *fetcher.transport().requests.borrow(),
            vec!["mem://first".to_string(), "mem://second".to_string()]
        );
    }

    #[test]
    fn test_all_mirrors_failing_is_download_error() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a.txt");

        let fetcher = Fetcher::new(MemoryTransport::default());
        let err = fetcher
            .ensure_local(&target, &["mem://x", "mem://y"], None, true)
            .unwrap_err();
        match err {
            Error::Download { attempts, .. } => assert_eq!(attempts.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!target.exists());
        assert!(!partial_path(&target).exists());
    }

    #[test]
    fn test_checksum_failure_after_download_is_terminal() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a.txt");

        let fetcher = Fetcher::new(
            MemoryTransport::default()
                .with("mem://bad", b"tampered")
                .with("mem://good", b"abc"),
        );
        let err = fetcher
            .ensure_local(
                &target,
                &["mem://bad", "mem://good"],
                Some(ExpectedDigest::sha256(ABC_SHA256)),
                true,
            )
            .unwrap_err();

        match err {
            Error::Integrity { file, .. } => assert_eq!(file, target),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fetcher.transport().requests.borrow().len(), 1);
        assert!(!target.exists());
        assert!(!partial_path(&target).exists());
    }

    #[test]
    fn test_corrupt_download_is_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a.txt");
        let expected = Some(ExpectedDigest::sha256(ABC_SHA256));

        let corrupt = Fetcher::new(MemoryTransport::default().with("mem://a", b"abd"));
        let err = corrupt
            .ensure_local(&target, &["mem://a"], expected, true)
            .unwrap_err();
        assert!(matches!(err, Error::Integrity { .. }));
        assert!(!target.exists());

        // the next run downloads again instead of re-checking a bad file
        let healthy = Fetcher::new(MemoryTransport::default().with("mem://a", b"abc"));
        healthy
            .ensure_local(&target, &["mem://a"], expected, true)
            .unwrap();
        assert_eq!(healthy.transport().requests.borrow().len(), 1);
        assert_eq!(fs::read(&target).unwrap(), b"abc");
    }

    #[test]
    fn test_tampered_cached_file_fails_with_removal_hint() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a.txt");
        fs::write(&target, b"abd").unwrap();

        let fetcher = Fetcher::new(MemoryTransport::default().with("mem://a", b"abc"));
        let err = fetcher
            .ensure_local(&target, &["mem://a"], Some(ExpectedDigest::sha256(ABC_SHA256)), true)
            .unwrap_err();
        match err {
            Error::Integrity { context, .. } => assert!(context.contains("please try removing")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(fetcher.transport().requests.borrow().is_empty());
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/d/Houston2013.zip")),
            PathBuf::from("/d/Houston2013.zip.part")
        );
    }
}
