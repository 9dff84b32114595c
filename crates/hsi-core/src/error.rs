//! Error types shared by the fetchers, parsers and samplers.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for dataset fetching and decoding.
#[derive(Error, Debug)]
pub enum Error {
    /// A required local file is absent and downloading is disabled
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Every mirror failed
    #[error("Failed to download {} from any of {} source(s): {}", .target.display(), .attempts.len(), .attempts.join("; "))]
    Download {
        target: PathBuf,
        attempts: Vec<String>,
    },

    /// Checksum mismatch, before or after a download
    #[error("Incorrect {algorithm} for {}. Expect {expected}, Actual {actual}. {context}", .file.display())]
    Integrity {
        file: PathBuf,
        algorithm: String,
        expected: String,
        actual: String,
        context: String,
    },

    /// Corrupt or unreadable archive
    #[error("Failed to extract {}: {reason}", .archive.display())]
    Extraction { archive: PathBuf, reason: String },

    /// Unparseable ROI text
    #[error("Malformed ROI file {} at line {line}: {reason}", .path.display())]
    MalformedRoi {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A class has fewer labeled points than requested
    #[error("Class {class_id} has {available} labeled pixel(s), {requested} requested")]
    InsufficientSamples {
        class_id: u32,
        available: usize,
        requested: usize,
    },

    /// Raster or MAT decoding error
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Sample index past the end of a dataset
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Specialized Result type for dataset operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_display_names_everything() {
        let err = Error::Integrity {
            file: PathBuf::from("/data/Houston2013.zip"),
            algorithm: "SHA256".to_string(),
            expected: "abcd".to_string(),
            actual: "ef01".to_string(),
            context: "please try removing /data/Houston2013".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Houston2013.zip"));
        assert!(msg.contains("Expect abcd"));
        assert!(msg.contains("Actual ef01"));
        assert!(msg.contains("please try removing"));
    }

    #[test]
    fn test_download_display_lists_attempts() {
        let err = Error::Download {
            target: PathBuf::from("a.txt"),
            attempts: vec!["http://one: timeout".to_string(), "http://two: 404".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 source(s)"));
        assert!(msg.contains("http://two: 404"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_insufficient_samples_display() {
        let err = Error::InsufficientSamples {
            class_id: 3,
            available: 5,
            requested: 20,
        };
        assert_eq!(
            err.to_string(),
            "Class 3 has 5 labeled pixel(s), 20 requested"
        );
    }
}
