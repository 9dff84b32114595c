//! Raster and MAT decoding used by the dataset assemblers.

mod geotiff;
mod mat5;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use hsi_core::{Error, Result, SparseLabels};
use ndarray::{Array2, Array3, ShapeBuilder};

pub use geotiff::read_geotiff;
pub use mat5::{parse_mat, MatArray, MatStruct, MatValue};

#[cfg(test)]
pub(crate) use mat5::writer as mat_writer;

/// Decoders the assemblers depend on. Swap in another implementation to
/// read from a different backend or to feed fixtures in tests.
pub trait RasterDecoder {
    /// Channel-first raster.
    fn read_geotiff(&self, path: &Path) -> Result<Array3<f32>>;

    /// Numeric variables of a MAT file, struct fields under dotted names.
    fn read_mat(&self, path: &Path) -> Result<MatVariables>;
}

/// `tiff` for GeoTIFF, the built-in level 5 reader for MAT files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecoder;

impl RasterDecoder for DefaultDecoder {
    fn read_geotiff(&self, path: &Path) -> Result<Array3<f32>> {
        read_geotiff(path)
    }

    fn read_mat(&self, path: &Path) -> Result<MatVariables> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let vars = parse_mat(&bytes)
            .map_err(|e| Error::Decode(format!("{}: {e}", path.display())))?;
        Ok(MatVariables::from_values(vars))
    }
}

/// Flattened MAT contents.
///
/// Struct fields are addressed as `var.field`; for struct arrays element 0
/// uses the plain dotted name and element `k > 0` uses `var[k].field`.
/// Cell items are `var{k}`.
#[derive(Debug, Clone, Default)]
pub struct MatVariables {
    arrays: BTreeMap<String, MatArray>,
    texts: BTreeMap<String, String>,
}

impl MatVariables {
    pub fn from_values(values: impl IntoIterator<Item = (String, MatValue)>) -> Self {
        let mut vars = Self::default();
        for (name, value) in values {
            vars.flatten(name, value);
        }
        vars
    }

    fn flatten(&mut self, name: String, value: MatValue) {
        match value {
            MatValue::Numeric(array) => {
                self.arrays.insert(name, array);
            }
            MatValue::Text(text) => {
                self.texts.insert(name, text);
            }
            MatValue::Struct(s) => {
                for (k, element) in s.elements.into_iter().enumerate() {
                    let base = if k == 0 {
                        name.clone()
                    } else {
                        format!("{name}[{k}]")
                    };
                    for (field, value) in s.fields.iter().zip(element) {
                        self.flatten(format!("{base}.{field}"), value);
                    }
                }
            }
            MatValue::Cell { items, .. } => {
                for (k, item) in items.into_iter().enumerate() {
                    self.flatten(format!("{name}{{{k}}}"), item);
                }
            }
            MatValue::Empty | MatValue::Unsupported(_) => {}
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, array: MatArray) {
        self.arrays.insert(name.into(), array);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Result<&MatArray> {
        self.arrays.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            Error::Decode(format!(
                "MAT variable `{name}` not found (have: {})",
                known.join(", ")
            ))
        })
    }

    pub fn take(&mut self, name: &str) -> Result<MatArray> {
        self.get(name)?;
        self.arrays
            .remove(name)
            .ok_or_else(|| Error::Decode(format!("MAT variable `{name}` not found")))
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str)
    }
}

impl MatArray {
    /// `(height, width)` or `(height, width, channels)` to a channel-first raster.
    pub fn to_chw(&self) -> Result<Array3<f32>> {
        let (h, w, c) = match self.dims.as_slice() {
            [h, w] => (*h, *w, 1),
            [h, w, c] => (*h, *w, *c),
            other => {
                return Err(Error::Decode(format!(
                    "expected a 2-D or 3-D array, got dims {other:?}"
                )))
            }
        };
        let data: Vec<f32> = self.data.iter().map(|&v| v as f32).collect();
        let hwc = Array3::from_shape_vec((h, w, c).f(), data)?;
        Ok(hwc.permuted_axes([2, 0, 1]).as_standard_layout().into_owned())
    }

    /// 2-D array in row-major layout.
    pub fn to_2d(&self) -> Result<Array2<f64>> {
        let (h, w) = match self.dims.as_slice() {
            [h, w] => (*h, *w),
            other => {
                return Err(Error::Decode(format!(
                    "expected a 2-D array, got dims {other:?}"
                )))
            }
        };
        let grid = Array2::from_shape_vec((h, w).f(), self.data.clone())?;
        Ok(grid.as_standard_layout().into_owned())
    }

    /// Dense label map to sparse labels; values `<= 0` are unlabeled.
    pub fn to_labels(&self) -> Result<SparseLabels> {
        SparseLabels::from_dense(self.to_2d()?.view())
    }
}
