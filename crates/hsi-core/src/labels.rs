//! Sparse label images.
//!
//! A [`SparseLabels`] maps `(row, col)` to a positive class id. Pixels that are
//! not stored are unlabeled (class id 0). Storage is a coordinate list with
//! no duplicate coordinates; iteration follows storage order, which is
//! insertion order and NOT guaranteed to be row-major.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One labeled pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelEntry {
    pub row: usize,
    pub col: usize,
    pub class_id: u32,
}

impl LabelEntry {
    pub fn new(row: usize, col: usize, class_id: u32) -> Self {
        Self { row, col, class_id }
    }
}

/// Coordinate-list label image of a fixed `(height, width)` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LabelsRepr", into = "LabelsRepr")]
pub struct SparseLabels {
    height: usize,
    width: usize,
    entries: Vec<LabelEntry>,
    index: HashMap<(usize, usize), usize>,
}

/// On-disk form; the coordinate index is rebuilt and validated on load.
#[derive(Serialize, Deserialize)]
struct LabelsRepr {
    height: usize,
    width: usize,
    entries: Vec<LabelEntry>,
}

impl TryFrom<LabelsRepr> for SparseLabels {
    type Error = Error;

    fn try_from(repr: LabelsRepr) -> Result<Self> {
        SparseLabels::from_entries(repr.height, repr.width, repr.entries)
    }
}

impl From<SparseLabels> for LabelsRepr {
    fn from(labels: SparseLabels) -> Self {
        Self {
            height: labels.height,
            width: labels.width,
            entries: labels.entries,
        }
    }
}

impl PartialEq for SparseLabels {
    fn eq(&self, other: &Self) -> bool {
        self.height == other.height && self.width == other.width && self.entries == other.entries
    }
}

impl SparseLabels {
    /// An all-unlabeled image.
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build from explicit entries, rejecting out-of-bounds coordinates,
    /// zero class ids and repeated coordinates.
    pub fn from_entries(
        height: usize,
        width: usize,
        entries: impl IntoIterator<Item = LabelEntry>,
    ) -> Result<Self> {
        let mut labels = Self::new(height, width);
        for entry in entries {
            if !labels.insert(entry.row, entry.col, entry.class_id)? {
                return Err(Error::InvalidArgument(format!(
                    "duplicate label coordinate ({}, {})",
                    entry.row, entry.col
                )));
            }
        }
        Ok(labels)
    }

    /// Build from a dense map. Values `<= 0` (including the `-1` some sources
    /// use for "no label") are unlabeled. Entries are stored in row-major order.
    pub fn from_dense(dense: ArrayView2<'_, f64>) -> Result<Self> {
        let (height, width) = dense.dim();
        let mut labels = Self::new(height, width);
        for ((row, col), &value) in dense.indexed_iter() {
            if value <= 0.0 {
                continue;
            }
            if value.fract() != 0.0 || value > u32::MAX as f64 {
                return Err(Error::InvalidArgument(format!(
                    "label at ({row}, {col}) is not a class id: {value}"
                )));
            }
            labels.insert(row, col, value as u32)?;
        }
        Ok(labels)
    }

    /// Store `class_id` at `(row, col)`.
    ///
    /// Returns `Ok(false)` and leaves the image unchanged if the coordinate is
    /// already labeled.
    pub fn insert(&mut self, row: usize, col: usize, class_id: u32) -> Result<bool> {
        if row >= self.height || col >= self.width {
            return Err(Error::InvalidArgument(format!(
                "coordinate ({row}, {col}) outside {}x{} label image",
                self.height, self.width
            )));
        }
        if class_id == 0 {
            return Err(Error::InvalidArgument(format!(
                "class id 0 is reserved for unlabeled pixels ({row}, {col})"
            )));
        }
        if self.index.contains_key(&(row, col)) {
            return Ok(false);
        }
        self.index.insert((row, col), self.entries.len());
        self.entries.push(LabelEntry::new(row, col, class_id));
        Ok(true)
    }

    /// Drop the label at `(row, col)`, returning the removed class id.
    pub fn remove(&mut self, row: usize, col: usize) -> Option<u32> {
        let pos = self.index.remove(&(row, col))?;
        let removed = self.entries.swap_remove(pos);
        if let Some(moved) = self.entries.get(pos) {
            self.index.insert((moved.row, moved.col), pos);
        }
        Some(removed.class_id)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// `(height, width)`
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Number of labeled pixels.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabelEntry> {
        self.entries.iter()
    }

    /// Class id at `(row, col)`, `None` when unlabeled.
    pub fn get(&self, row: usize, col: usize) -> Option<u32> {
        self.index
            .get(&(row, col))
            .map(|&pos| self.entries[pos].class_id)
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.index.contains_key(&(row, col))
    }

    /// Largest stored class id, 0 for an empty image.
    pub fn max_class_id(&self) -> u32 {
        self.entries.iter().map(|e| e.class_id).max().unwrap_or(0)
    }

    /// Labeled pixel count per class id.
    pub fn class_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.class_id).or_insert(0) += 1;
        }
        counts
    }

    /// Entries of one class, in storage order.
    pub fn entries_of_class(&self, class_id: u32) -> Vec<LabelEntry> {
        self.entries
            .iter()
            .filter(|e| e.class_id == class_id)
            .copied()
            .collect()
    }

    /// Dense `(height, width)` map with 0 for unlabeled pixels.
    pub fn to_dense(&self) -> Array2<u32> {
        let mut dense = Array2::zeros((self.height, self.width));
        for entry in &self.entries {
            dense[[entry.row, entry.col]] = entry.class_id;
        }
        dense
    }

    /// Persist as JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a label image written by [`SparseLabels::save_json`].
    pub fn load_json(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl<'a> IntoIterator for &'a SparseLabels {
    type Item = &'a LabelEntry;
    type IntoIter = std::slice::Iter<'a, LabelEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_insert_and_get() {
        let mut labels = SparseLabels::new(4, 4);
        assert!(labels.insert(0, 1, 2).unwrap());
        assert_eq!(labels.get(0, 1), Some(2));
        assert_eq!(labels.get(1, 0), None);
        assert_eq!(labels.nnz(), 1);
    }

    #[test]
    fn test_insert_existing_coordinate_is_rejected() {
        let mut labels = SparseLabels::new(2, 2);
        assert!(labels.insert(1, 1, 1).unwrap());
        assert!(!labels.insert(1, 1, 2).unwrap());
        assert_eq!(labels.get(1, 1), Some(1));
        assert_eq!(labels.nnz(), 1);
    }

    #[test]
    fn test_insert_out_of_bounds_and_zero() {
        let mut labels = SparseLabels::new(2, 3);
        assert!(labels.insert(2, 0, 1).is_err());
        assert!(labels.insert(0, 3, 1).is_err());
        assert!(labels.insert(0, 0, 0).is_err());
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut labels = SparseLabels::new(3, 3);
        labels.insert(0, 0, 1).unwrap();
        labels.insert(1, 1, 2).unwrap();
        labels.insert(2, 2, 3).unwrap();

        assert_eq!(labels.remove(0, 0), Some(1));
        assert_eq!(labels.remove(0, 0), None);
        assert_eq!(labels.get(2, 2), Some(3));
        assert_eq!(labels.get(1, 1), Some(2));
        assert_eq!(labels.nnz(), 2);
    }

    #[test]
    fn test_from_dense_maps_negative_to_unlabeled() {
        let dense = array![[-1.0, 0.0, 2.0], [1.0, -1.0, 0.0]];
        let labels = SparseLabels::from_dense(dense.view()).unwrap();
        assert_eq!(labels.nnz(), 2);
        assert_eq!(labels.get(0, 2), Some(2));
        assert_eq!(labels.get(1, 0), Some(1));
        assert_eq!(labels.max_class_id(), 2);
    }

    #[test]
    fn test_from_dense_rejects_fractional() {
        let dense = array![[0.5]];
        assert!(SparseLabels::from_dense(dense.view()).is_err());
    }

    #[test]
    fn test_from_entries_rejects_duplicates() {
        let entries = vec![LabelEntry::new(0, 0, 1), LabelEntry::new(0, 0, 2)];
        assert!(SparseLabels::from_entries(2, 2, entries).is_err());
    }

    #[test]
    fn test_class_counts_and_dense() {
        let labels = SparseLabels::from_entries(
            2,
            2,
            vec![
                LabelEntry::new(0, 0, 1),
                LabelEntry::new(0, 1, 1),
                LabelEntry::new(1, 1, 2),
            ],
        )
        .unwrap();

        let counts = labels.class_counts();
        assert_eq!(counts[&1], 2);
        assert_eq!(counts[&2], 1);
        assert_eq!(labels.to_dense(), array![[1u32, 1], [0, 2]]);
        assert_eq!(labels.entries_of_class(1).len(), 2);
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("labels.json");

        let labels = SparseLabels::from_entries(
            5,
            7,
            vec![LabelEntry::new(4, 6, 3), LabelEntry::new(0, 0, 1)],
        )
        .unwrap();
        labels.save_json(&path).unwrap();

        let loaded = SparseLabels::load_json(&path).unwrap();
        assert_eq!(loaded, labels);
        assert_eq!(loaded.get(4, 6), Some(3));
    }

    #[test]
    fn test_load_json_validates_entries() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"height":2,"width":2,"entries":[{"row":5,"col":0,"class_id":1}]}"#,
        )
        .unwrap();
        assert!(SparseLabels::load_json(&path).is_err());
    }
}
