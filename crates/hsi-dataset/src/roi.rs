//! ENVI ROI text export parser.
//!
//! Each block of data lines is one class, numbered from 1 in file order.
//! Fields are whitespace separated; field 1 is the column and field 2 the
//! row (field 0 is the point index). Lines starting with `;` are comments.
//!
//! A pixel claimed by two different classes is dropped from the result and
//! can not be claimed again by a later class.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use hsi_core::{Error, Result, SparseLabels};
use hsi_fetch::{decode_text, TextEncoding};
use tracing::{debug, warn};

/// How consecutive classes are delimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockSeparator {
    /// A blank line ends the current block.
    #[default]
    BlankLine,
    /// A data line whose point index is `1` starts a new block. Blank lines
    /// are ignored.
    PointIndexReset,
}

/// A pixel written by two classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiConflict {
    pub row: usize,
    pub col: usize,
    /// Class that held the pixel first
    pub first: u32,
    /// Class that tried to claim it
    pub second: u32,
}

/// Result of parsing one ROI file.
#[derive(Debug, Clone)]
pub struct RoiParseOutcome {
    pub labels: SparseLabels,
    /// Number of blocks seen; equals the highest class id assigned
    pub blocks: u32,
    pub conflicts: Vec<RoiConflict>,
}

impl RoiParseOutcome {
    pub fn into_labels(self) -> SparseLabels {
        self.labels
    }
}

/// Read an ROI file with blank-line separated blocks.
pub fn read_roi(path: &Path, shape: (usize, usize)) -> Result<RoiParseOutcome> {
    read_roi_with(path, shape, BlockSeparator::default())
}

/// Read an ROI file. UTF-8 is tried first, then ISO-8859-1.
pub fn read_roi_with(
    path: &Path,
    shape: (usize, usize),
    separator: BlockSeparator,
) -> Result<RoiParseOutcome> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => decode_text(e.as_bytes(), TextEncoding::Latin1),
    };
    parse(&text, shape, separator, path)
}

/// Parse ROI text held in memory.
pub fn parse_roi_str(
    text: &str,
    shape: (usize, usize),
    separator: BlockSeparator,
) -> Result<RoiParseOutcome> {
    parse(text, shape, separator, Path::new("<memory>"))
}

struct Accumulator<'p> {
    path: &'p Path,
    labels: SparseLabels,
    poisoned: HashSet<(usize, usize)>,
    conflicts: Vec<RoiConflict>,
    class_id: u32,
    buffer: Vec<(usize, Vec<&'p str>)>,
}

impl<'p> Accumulator<'p> {
    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.class_id += 1;
        let class_id = self.class_id;
        let mut written = 0usize;

        for (line, fields) in std::mem::take(&mut self.buffer) {
            let (row, col) = self.coordinate(line, &fields)?;
            if self.poisoned.contains(&(row, col)) {
                continue;
            }
            match self.labels.get(row, col) {
                Some(existing) if existing == class_id => {}
                Some(existing) => {
                    self.labels.remove(row, col);
                    self.poisoned.insert((row, col));
                    self.conflicts.push(RoiConflict {
                        row,
                        col,
                        first: existing,
                        second: class_id,
                    });
                }
                None => {
                    self.labels.insert(row, col, class_id)?;
                    written += 1;
                }
            }
        }

        debug!("ROI block {class_id}: {written} pixel(s)");
        Ok(())
    }

    fn coordinate(&self, line: usize, fields: &[&str]) -> Result<(usize, usize)> {
        if fields.len() < 3 {
            return Err(self.malformed(
                line,
                format!("expected at least 3 fields, found {}", fields.len()),
            ));
        }
        let col = self.index(line, fields[1])?;
        let row = self.index(line, fields[2])?;
        let (height, width) = self.labels.shape();
        if row >= height || col >= width {
            return Err(self.malformed(
                line,
                format!("pixel ({row}, {col}) outside {height}x{width} image"),
            ));
        }
        Ok((row, col))
    }

    fn index(&self, line: usize, field: &str) -> Result<usize> {
        if let Ok(value) = field.parse::<usize>() {
            return Ok(value);
        }
        match field.parse::<f64>() {
            Ok(value) if value >= 0.0 && value.fract() == 0.0 && value < usize::MAX as f64 => {
                Ok(value as usize)
            }
            _ => Err(self.malformed(line, format!("`{field}` is not a pixel index"))),
        }
    }

    fn malformed(&self, line: usize, reason: String) -> Error {
        Error::MalformedRoi {
            path: self.path.to_path_buf(),
            line,
            reason,
        }
    }
}

fn parse<'p>(
    text: &'p str,
    shape: (usize, usize),
    separator: BlockSeparator,
    path: &'p Path,
) -> Result<RoiParseOutcome> {
    let mut acc = Accumulator {
        path,
        labels: SparseLabels::new(shape.0, shape.1),
        poisoned: HashSet::new(),
        conflicts: Vec::new(),
        class_id: 0,
        buffer: Vec::new(),
    };

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with(';') {
            continue;
        }
        if trimmed.is_empty() {
            if separator == BlockSeparator::BlankLine {
                acc.flush()?;
            }
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if separator == BlockSeparator::PointIndexReset && fields.first() == Some(&"1") {
            acc.flush()?;
        }
        acc.buffer.push((idx + 1, fields));
    }
    acc.flush()?;

    if !acc.conflicts.is_empty() {
        warn!(
            "{} pixel(s) in {} claimed by more than one class were dropped",
            acc.conflicts.len(),
            path.display()
        );
    }

    Ok(RoiParseOutcome {
        labels: acc.labels,
        blocks: acc.class_id,
        conflicts: acc.conflicts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse_blank(text: &str, shape: (usize, usize)) -> RoiParseOutcome {
        parse_roi_str(text, shape, BlockSeparator::BlankLine).unwrap()
    }

    #[test]
    fn test_two_blocks_row_is_third_field() {
        let outcome = parse_blank("1 0 0\n1 0 1\n\n1 2 2\n", (4, 4));
        let labels = &outcome.labels;

        assert_eq!(outcome.blocks, 2);
        assert_eq!(labels.nnz(), 3);
        assert_eq!(labels.get(0, 0), Some(1));
        assert_eq!(labels.get(1, 0), Some(1));
        assert_eq!(labels.get(2, 2), Some(2));
        assert_eq!(labels.get(0, 1), None);
    }

    #[test]
    fn test_empty_and_comment_only_files() {
        assert!(parse_blank("", (3, 3)).labels.is_empty());

        let outcome = parse_blank("; ENVI Output of ROIs\n; Number of ROIs: 0\n\n", (3, 3));
        assert!(outcome.labels.is_empty());
        assert_eq!(outcome.blocks, 0);
    }

    #[test]
    fn test_trailing_block_without_separator_is_kept() {
        let outcome = parse_blank("1 1 1\n\n\n1 2 0\n2 2 1", (3, 3));
        assert_eq!(outcome.blocks, 2);
        assert_eq!(outcome.labels.get(0, 2), Some(2));
        assert_eq!(outcome.labels.get(1, 2), Some(2));
    }

    #[test]
    fn test_envi_header_and_crlf() {
        let text = "; ENVI Output of ROIs (4.8) [Thu Mar 14 2013]\r\n\
                    ; Number of ROIs: 2\r\n\
                    ;   ID     X     Y\r\n\
                    \r\n\
                    ; ROI name: Healthy grass\r\n\
                       1   3   1\r\n\
                       2   4   1\r\n\
                    \r\n\
                    ; ROI name: Water\r\n\
                       1   0   2\r\n";
        let outcome = parse_blank(text, (3, 5));
        assert_eq!(outcome.labels.get(1, 3), Some(1));
        assert_eq!(outcome.labels.get(1, 4), Some(1));
        assert_eq!(outcome.labels.get(2, 0), Some(2));
    }

    #[test]
    fn test_cross_class_duplicate_is_dropped_for_good() {
        let text = "1 1 1\n2 0 0\n\n1 1 1\n2 2 2\n\n1 1 1\n";
        let outcome = parse_blank(text, (3, 3));

        assert_eq!(outcome.blocks, 3);
        assert_eq!(outcome.labels.get(1, 1), None);
        assert_eq!(outcome.labels.get(0, 0), Some(1));
        assert_eq!(outcome.labels.get(2, 2), Some(2));
        assert_eq!(
            outcome.conflicts,
            vec![RoiConflict {
                row: 1,
                col: 1,
                first: 1,
                second: 2
            }]
        );
    }

    #[test]
    fn test_same_class_duplicate_kept_once() {
        let outcome = parse_blank("1 1 1\n2 1 1\n", (2, 2));
        assert_eq!(outcome.labels.nnz(), 1);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn test_block_of_victims_still_consumes_class_id() {
        let text = "1 0 0\n\n1 0 0\n\n1 1 1\n";
        let outcome = parse_blank(text, (2, 2));
        assert_eq!(outcome.blocks, 3);
        assert_eq!(outcome.labels.get(1, 1), Some(3));
    }

    #[test]
    fn test_point_index_reset_separator() {
        let text = "; header\n1 0 0\n2 1 0\n1 1 1\n2 0 1\n";
        let outcome = parse_roi_str(text, (2, 2), BlockSeparator::PointIndexReset).unwrap();

        assert_eq!(outcome.blocks, 2);
        assert_eq!(outcome.labels.get(0, 0), Some(1));
        assert_eq!(outcome.labels.get(0, 1), Some(1));
        assert_eq!(outcome.labels.get(1, 1), Some(2));
        assert_eq!(outcome.labels.get(1, 0), Some(2));
    }

    #[test]
    fn test_integral_float_coordinates_accepted() {
        let outcome = parse_blank("1 2.0 1.0 -95.3 29.7\n", (2, 3));
        assert_eq!(outcome.labels.get(1, 2), Some(1));
    }

    #[test]
    fn test_malformed_lines_report_line_number() {
        let err = parse_roi_str("1 0 0\n1 x 0\n", (2, 2), BlockSeparator::BlankLine).unwrap_err();
        match err {
            Error::MalformedRoi { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        let err = parse_roi_str("\n\n1 0\n", (2, 2), BlockSeparator::BlankLine).unwrap_err();
        assert!(matches!(err, Error::MalformedRoi { line: 3, .. }));

        let err = parse_roi_str("1 0 9\n", (2, 2), BlockSeparator::BlankLine).unwrap_err();
        assert!(matches!(err, Error::MalformedRoi { .. }));
    }

    #[test]
    fn test_read_roi_latin1_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("roi.txt");
        let mut bytes = b"; ROI name: Caf\xe9\n".to_vec();
        bytes.extend_from_slice(b"1 1 0\n");
        fs::write(&path, bytes).unwrap();

        let outcome = read_roi(&path, (1, 2)).unwrap();
        assert_eq!(outcome.labels.get(0, 1), Some(1));
    }

    #[test]
    fn test_read_roi_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_roi(&temp_dir.path().join("none.txt"), (1, 1)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
