//! Local cache management for remote-sensing datasets.
//!
//! Resolves the cache root, downloads files through an explicit transport
//! with mirror fallback, verifies digests and unpacks archives.

pub mod checksum;
pub mod data_home;
pub mod extract;
pub mod fetcher;
pub mod layout;
pub mod transport;

pub use checksum::{file_digest, verify_file, verify_files, DigestAlgorithm, ExpectedDigest, Manifest};
pub use data_home::{resolve_data_home, DATA_HOME_ENV};
pub use extract::{extract_zip, is_populated};
pub use fetcher::Fetcher;
pub use layout::{decode_text, ArchiveLayout, ArchiveSource, LicenseFile, TextEncoding};
pub use transport::{HttpTransport, Transport, TransportError};
