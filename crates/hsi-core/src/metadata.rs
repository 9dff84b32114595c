//! Per-dataset metadata record.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Error, Result};

/// Immutable description of an assembled dataset.
///
/// Built once per fetch through [`DatasetMetadata::new`], which checks that
/// counts are positive and that wavelengths (when given) match the band count
/// and ascend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetMetadata {
    name: String,
    full_name: String,
    homepage: String,
    version: Option<String>,
    license: Option<String>,
    hsi_bands: usize,
    aux_bands: usize,
    height: usize,
    width: usize,
    class_names: Vec<String>,
    wavelengths: Option<Vec<f32>>,
}

/// Band counts and spatial extent shared by the HSI and auxiliary rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterLayout {
    pub hsi_bands: usize,
    pub aux_bands: usize,
    pub height: usize,
    pub width: usize,
}

impl DatasetMetadata {
    pub fn new(
        name: impl Into<String>,
        homepage: impl Into<String>,
        layout: RasterLayout,
        class_names: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("dataset name is empty".to_string()));
        }
        if layout.hsi_bands == 0 || layout.aux_bands == 0 {
            return Err(Error::InvalidArgument(format!(
                "{name}: band counts must be positive, got {}/{}",
                layout.hsi_bands, layout.aux_bands
            )));
        }
        if layout.height == 0 || layout.width == 0 {
            return Err(Error::InvalidArgument(format!(
                "{name}: spatial extent must be positive, got {}x{}",
                layout.height, layout.width
            )));
        }
        if class_names.is_empty() {
            return Err(Error::InvalidArgument(format!("{name}: no classes")));
        }

        Ok(Self {
            full_name: name.clone(),
            name,
            homepage: homepage.into(),
            version: None,
            license: None,
            hsi_bands: layout.hsi_bands,
            aux_bands: layout.aux_bands,
            height: layout.height,
            width: layout.width,
            class_names,
            wavelengths: None,
        })
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    /// Attach one center wavelength (nm) per HSI band.
    pub fn with_wavelengths(mut self, wavelengths: Vec<f32>) -> Result<Self> {
        if wavelengths.len() != self.hsi_bands {
            return Err(Error::InvalidArgument(format!(
                "{}: {} wavelengths for {} bands",
                self.name,
                wavelengths.len(),
                self.hsi_bands
            )));
        }
        if wavelengths.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidArgument(format!(
                "{}: wavelengths are not ascending",
                self.name
            )));
        }
        self.wavelengths = Some(wavelengths);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn homepage(&self) -> &str {
        &self.homepage
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    pub fn hsi_bands(&self) -> usize {
        self.hsi_bands
    }

    pub fn aux_bands(&self) -> usize {
        self.aux_bands
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn layout(&self) -> RasterLayout {
        RasterLayout {
            hsi_bands: self.hsi_bands,
            aux_bands: self.aux_bands,
            height: self.height,
            width: self.width,
        }
    }

    pub fn n_class(&self) -> usize {
        self.class_names.len()
    }

    /// Name of a 1-based class id.
    pub fn class_name(&self, class_id: u32) -> Option<&str> {
        let idx = (class_id as usize).checked_sub(1)?;
        self.class_names.get(idx).map(String::as_str)
    }

    /// Class id to name, ids starting at 1.
    pub fn class_map(&self) -> BTreeMap<u32, &str> {
        self.class_names
            .iter()
            .enumerate()
            .map(|(i, name)| (i as u32 + 1, name.as_str()))
            .collect()
    }

    pub fn wavelengths(&self) -> Option<&[f32]> {
        self.wavelengths.as_deref()
    }

    /// Index of the band whose wavelength is closest to `nm`.
    pub fn nearest_band(&self, nm: f32) -> Option<usize> {
        let wavelengths = self.wavelengths.as_ref()?;
        wavelengths
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - nm).abs().total_cmp(&(b.1 - nm).abs()))
            .map(|(i, _)| i)
    }
}
