//! Streaming file digests and manifest verification.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use hsi_core::{Error, Result};
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;

const CHUNK_SIZE: usize = 8192;

/// Digest family used by a dataset source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha256 => write!(f, "SHA256"),
            DigestAlgorithm::Sha512 => write!(f, "SHA512"),
        }
    }
}

/// A published digest for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedDigest<'a> {
    pub algorithm: DigestAlgorithm,
    pub hex: &'a str,
}

impl<'a> ExpectedDigest<'a> {
    pub fn sha256(hex: &'a str) -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
            hex,
        }
    }

    pub fn sha512(hex: &'a str) -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha512,
            hex,
        }
    }
}

/// Relative path to expected hex digest, all with the same algorithm.
#[derive(Debug, Clone, Copy)]
pub struct Manifest<'a> {
    pub algorithm: DigestAlgorithm,
    pub entries: &'a [(&'a str, &'a str)],
}

impl<'a> Manifest<'a> {
    pub const fn sha256(entries: &'a [(&'a str, &'a str)]) -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
            entries,
        }
    }
}

fn stream_digest<D: Digest>(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Lowercase hex digest of a file, read in 8 KiB chunks.
pub fn file_digest(path: &Path, algorithm: DigestAlgorithm) -> Result<String> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let reader = BufReader::new(file);
    let digest = match algorithm {
        DigestAlgorithm::Sha256 => stream_digest::<Sha256>(reader)?,
        DigestAlgorithm::Sha512 => stream_digest::<Sha512>(reader)?,
    };
    Ok(digest)
}

/// Check one file against its published digest. Comparison ignores case.
pub fn verify_file(path: &Path, expected: ExpectedDigest<'_>, context: &str) -> Result<()> {
    let actual = file_digest(path, expected.algorithm)?;
    debug!("{} {} = {}", expected.algorithm, path.display(), actual);

    if !actual.eq_ignore_ascii_case(expected.hex.trim()) {
        return Err(Error::Integrity {
            file: path.to_path_buf(),
            algorithm: expected.algorithm.to_string(),
            expected: expected.hex.to_ascii_lowercase(),
            actual,
            context: context.to_string(),
        });
    }
    Ok(())
}

/// Verify every manifest entry under `root`; the first mismatch aborts.
pub fn verify_files(root: &Path, manifest: Manifest<'_>, context: &str) -> Result<()> {
    for &(relative, hex) in manifest.entries {
        let expected = ExpectedDigest {
            algorithm: manifest.algorithm,
            hex,
        };
        verify_file(&root.join(relative), expected, context)?;
    }
    debug!(
        "Verified {} file(s) under {}",
        manifest.entries.len(),
        root.display()
    );
    Ok(())
}
