//! Burn Dataset integration for labeled-pixel patches
//!
//! The rasters are padded once with symmetric (edge-repeating) reflection
//! and patches are sliced out on access, so memory stays at one padded copy
//! of each raster plus the index of labeled pixels.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use hsi_core::{Error, LabelEntry, Result, SparseLabels};
use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Where a patch came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchExtras {
    /// Row in the unpadded image
    pub row: usize,
    /// Column in the unpadded image
    pub col: usize,
    /// Position in the dataset
    pub index: usize,
    /// Raw class id, 0 for unlabeled pixels
    pub class_id: u32,
}

/// A single sample ready for Burn
#[derive(Clone, Debug)]
pub struct PatchItem {
    /// `(channels, P, P)`
    pub hsi: Array3<f32>,
    /// `(channels, P, P)`
    pub aux: Array3<f32>,
    /// Length `n_class`; all zeros for unlabeled pixels
    pub one_hot: Vec<f32>,
    pub extras: PatchExtras,
}

/// Symmetric index: `-1 -> 0`, `-2 -> 1`, `len -> len - 1`, ...
fn reflect(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let m = index.rem_euclid(period) as usize;
    if m < len {
        m
    } else {
        2 * len - 1 - m
    }
}

/// Pad both spatial axes of a `(C, H, W)` raster, repeating edge pixels
/// mirror-wise. Pads larger than the image keep reflecting.
pub fn pad_symmetric(raster: &Array3<f32>, before: usize, after: usize) -> Array3<f32> {
    let (channels, height, width) = raster.dim();
    if height == 0 || width == 0 {
        return raster.clone();
    }
    Array3::from_shape_fn(
        (channels, height + before + after, width + before + after),
        |(c, i, j)| {
            let row = reflect(i as isize - before as isize, height);
            let col = reflect(j as isize - before as isize, width);
            raster[[c, row, col]]
        },
    )
}

/// Patches around indexed pixels of an HSI raster and an auxiliary raster.
#[derive(Clone, Debug)]
pub struct PatchDataset {
    hsi: Array3<f32>,
    aux: Array3<f32>,
    pixels: Vec<LabelEntry>,
    patch_size: usize,
    n_class: usize,
}

impl PatchDataset {
    /// One sample per labeled pixel, in label storage order.
    pub fn new(
        hsi: &Array3<f32>,
        aux: &Array3<f32>,
        labels: &SparseLabels,
        n_class: usize,
        patch_size: usize,
    ) -> Result<Self> {
        let (_, height, width) = hsi.dim();
        if labels.shape() != (height, width) {
            return Err(Error::InvalidArgument(format!(
                "labels are {:?} but rasters are {height}x{width}",
                labels.shape()
            )));
        }
        if labels.max_class_id() as usize > n_class {
            return Err(Error::InvalidArgument(format!(
                "class id {} exceeds n_class {n_class}",
                labels.max_class_id()
            )));
        }
        Self::build(hsi, aux, labels.entries().to_vec(), n_class, patch_size)
    }

    /// Every pixel in row-major order with class id 0.
    pub fn whole_scene(
        hsi: &Array3<f32>,
        aux: &Array3<f32>,
        n_class: usize,
        patch_size: usize,
    ) -> Result<Self> {
        let (_, height, width) = hsi.dim();
        let pixels = (0..height)
            .flat_map(|row| (0..width).map(move |col| LabelEntry::new(row, col, 0)))
            .collect();
        Self::build(hsi, aux, pixels, n_class, patch_size)
    }

    fn build(
        hsi: &Array3<f32>,
        aux: &Array3<f32>,
        pixels: Vec<LabelEntry>,
        n_class: usize,
        patch_size: usize,
    ) -> Result<Self> {
        if patch_size == 0 {
            return Err(Error::InvalidArgument("patch size must be at least 1".to_string()));
        }
        let (_, height, width) = hsi.dim();
        if height == 0 || width == 0 {
            return Err(Error::InvalidArgument("rasters are empty".to_string()));
        }
        let (_, aux_height, aux_width) = aux.dim();
        if (aux_height, aux_width) != (height, width) {
            return Err(Error::InvalidArgument(format!(
                "HSI is {height}x{width} but auxiliary raster is {aux_height}x{aux_width}"
            )));
        }
        if patch_size % 2 == 0 {
            warn!("Patch size {patch_size} is even; patches are not centered on their pixel");
        }

        let before = (patch_size - 1) / 2;
        let after = patch_size / 2;
        Ok(Self {
            hsi: pad_symmetric(hsi, before, after),
            aux: pad_symmetric(aux, before, after),
            pixels,
            patch_size,
            n_class,
        })
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// False for even patch sizes, where the pixel sits just above and left
    /// of the window center.
    pub fn is_center_aligned(&self) -> bool {
        self.patch_size % 2 == 1
    }

    pub fn n_class(&self) -> usize {
        self.n_class
    }

    pub fn hsi_channels(&self) -> usize {
        self.hsi.dim().0
    }

    pub fn aux_channels(&self) -> usize {
        self.aux.dim().0
    }

    pub fn pixels(&self) -> &[LabelEntry] {
        &self.pixels
    }

    /// Extract the sample at `index`.
    pub fn patch(&self, index: usize) -> Result<PatchItem> {
        let pixel = self.pixels.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.pixels.len(),
        })?;
        let p = self.patch_size;
        // padding shifts the window origin onto the pixel's top-left neighbor
        let window = s![.., pixel.row..pixel.row + p, pixel.col..pixel.col + p];

        let mut one_hot = vec![0.0f32; self.n_class];
        if pixel.class_id > 0 {
            one_hot[pixel.class_id as usize - 1] = 1.0;
        }

        Ok(PatchItem {
            hsi: self.hsi.slice(window).to_owned(),
            aux: self.aux.slice(window).to_owned(),
            one_hot,
            extras: PatchExtras {
                row: pixel.row,
                col: pixel.col,
                index,
                class_id: pixel.class_id,
            },
        })
    }
}

impl Dataset<PatchItem> for PatchDataset {
    fn get(&self, index: usize) -> Option<PatchItem> {
        self.patch(index).ok()
    }

    fn len(&self) -> usize {
        self.pixels.len()
    }
}

/// A batch of patches for training
#[derive(Clone, Debug)]
pub struct PatchBatch<B: Backend> {
    /// `[batch_size, hsi_channels, P, P]`
    pub hsi: Tensor<B, 4>,
    /// `[batch_size, aux_channels, P, P]`
    pub aux: Tensor<B, 4>,
    /// `[batch_size, n_class]`
    pub one_hot: Tensor<B, 2>,
    /// `[batch_size]`, class id - 1 (so -1 for unlabeled pixels)
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher for creating patch batches
#[derive(Clone, Debug)]
pub struct PatchBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> PatchBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

fn stack<B: Backend>(cubes: Vec<&Array3<f32>>, device: &B::Device) -> Tensor<B, 4> {
    let (c, h, w) = cubes.first().map(|a| a.dim()).unwrap_or((0, 0, 0));
    let data: Vec<f32> = cubes.iter().flat_map(|a| a.iter().copied()).collect();
    Tensor::<B, 4>::from_floats(TensorData::new(data, [cubes.len(), c, h, w]), device)
}

impl<B: Backend> Batcher<PatchItem, PatchBatch<B>> for PatchBatcher<B> {
    fn batch(&self, items: Vec<PatchItem>) -> PatchBatch<B> {
        let batch_size = items.len();

        let hsi = stack::<B>(items.iter().map(|item| &item.hsi).collect(), &self.device);
        let aux = stack::<B>(items.iter().map(|item| &item.aux).collect(), &self.device);

        let n_class = items.first().map(|item| item.one_hot.len()).unwrap_or(0);
        let one_hot_data: Vec<f32> = items.iter().flat_map(|item| item.one_hot.clone()).collect();
        let one_hot = Tensor::<B, 2>::from_floats(
            TensorData::new(one_hot_data, [batch_size, n_class]),
            &self.device,
        );

        let targets_data: Vec<i64> = items
            .iter()
            .map(|item| item.extras.class_id as i64 - 1)
            .collect();
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets_data, [batch_size]),
            &self.device,
        );

        PatchBatch {
            hsi,
            aux,
            one_hot,
            targets,
        }
    }
}
