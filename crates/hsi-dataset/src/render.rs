//! Color rendering of label maps and per-class score maps.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use hsi_core::{Error, Result, SparseLabels};
use image::{ImageBuffer, Rgb, RgbImage};
use ndarray::{s, Array2, Array3};

use crate::assemblers::DatasetId;
use crate::patch_dataset::PatchExtras;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

const HOUSTON2013: &[&str] = &[
    "forestgreen", "limegreen", "darkgreen", "green", "indianred", "royalblue", "papayawhip",
    "pink", "red", "orangered", "cadetblue", "yellow", "darkorange", "darkmagenta", "cyan",
];
const MUUFL: &[&str] = &[
    "forestgreen", "limegreen", "lightblue", "papayawhip", "red", "blue", "purple", "pink",
    "orangered", "yellow", "brown",
];
const TRENTO: &[&str] = &["royalblue", "lightblue", "limegreen", "yellow", "red", "brown"];

fn named_color(name: &str) -> Option<Rgb<u8>> {
    let rgb = match name {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "blue" => [0, 0, 255],
        "brown" => [165, 42, 42],
        "cadetblue" => [95, 158, 160],
        "cyan" => [0, 255, 255],
        "darkgreen" => [0, 100, 0],
        "darkmagenta" => [139, 0, 139],
        "darkorange" => [255, 140, 0],
        "forestgreen" => [34, 139, 34],
        "green" => [0, 128, 0],
        "indianred" => [205, 92, 92],
        "lightblue" => [173, 216, 230],
        "limegreen" => [50, 205, 50],
        "orangered" => [255, 69, 0],
        "papayawhip" => [255, 239, 213],
        "pink" => [255, 192, 203],
        "purple" => [128, 0, 128],
        "red" => [255, 0, 0],
        "royalblue" => [65, 105, 225],
        "yellow" => [255, 255, 0],
        _ => return None,
    };
    Some(Rgb(rgb))
}

fn hex_color(hex: &str) -> Option<Rgb<u8>> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Colors for class ids 1, 2, ...; id 0 is always black.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Palette {
    /// Named CSS colors or `#rrggbb`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::InvalidArgument("palette has no colors".to_string()));
        }
        let colors = names
            .iter()
            .map(|name| {
                let name = name.as_ref().trim();
                named_color(&name.to_ascii_lowercase())
                    .or_else(|| hex_color(name))
                    .ok_or_else(|| Error::InvalidArgument(format!("unknown color `{name}`")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { colors })
    }

    /// `houston2013`, `muufl` or `trento`.
    pub fn preset(name: &str) -> Option<Self> {
        let names = match name {
            "houston2013" => HOUSTON2013,
            "muufl" => MUUFL,
            "trento" => TRENTO,
            _ => return None,
        };
        Self::from_names(names).ok()
    }

    pub fn for_dataset(id: DatasetId) -> Self {
        let names = match id {
            DatasetId::Houston2013 | DatasetId::Houston2013Mmrs => HOUSTON2013,
            DatasetId::Muufl => MUUFL,
            DatasetId::Trento => TRENTO,
        };
        Self {
            colors: names.iter().filter_map(|name| named_color(name)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Ids past the end of the palette wrap around.
    pub fn color(&self, class_id: u32) -> Rgb<u8> {
        if class_id == 0 || self.colors.is_empty() {
            return BACKGROUND;
        }
        self.colors[(class_id as usize - 1) % self.colors.len()]
    }
}

/// Colors by rank: the k-th smallest class id present gets palette entry k,
/// so missing ids do not shift the colors of the others.
fn colors_by_rank(ids: impl IntoIterator<Item = u32>, palette: &Palette) -> BTreeMap<u32, Rgb<u8>> {
    let present: BTreeSet<u32> = ids.into_iter().filter(|&id| id > 0).collect();
    present
        .into_iter()
        .enumerate()
        .map(|(rank, id)| (id, palette.color(rank as u32 + 1)))
        .collect()
}

/// Paint labeled pixels; unlabeled pixels stay black. Colors follow the
/// order of the class ids present in `labels`.
pub fn render_labels(labels: &SparseLabels, palette: &Palette) -> RgbImage {
    let (height, width) = labels.shape();
    let colors = colors_by_rank(labels.iter().map(|e| e.class_id), palette);
    let mut image: RgbImage = ImageBuffer::from_pixel(width as u32, height as u32, BACKGROUND);
    for entry in labels {
        let color = colors.get(&entry.class_id).copied().unwrap_or(BACKGROUND);
        image.put_pixel(entry.col as u32, entry.row as u32, color);
    }
    image
}

/// Paint the arg-max class of a `(n_class, H, W)` score map. Pixels whose
/// scores are all zero are background. Colors are assigned as in
/// [`render_labels`].
pub fn render_class_scores(scores: &Array3<f32>, palette: &Palette) -> RgbImage {
    let (_, height, width) = scores.dim();
    let mut winners = Array2::<u32>::zeros((height, width));
    for row in 0..height {
        for col in 0..width {
            let lane = scores.slice(s![.., row, col]);
            if lane.iter().all(|&v| v == 0.0) {
                continue;
            }
            let mut best = 0;
            for (k, &v) in lane.iter().enumerate() {
                if v > lane[best] {
                    best = k;
                }
            }
            winners[[row, col]] = best as u32 + 1;
        }
    }

    let colors = colors_by_rank(winners.iter().copied(), palette);
    let mut image: RgbImage = ImageBuffer::from_pixel(width as u32, height as u32, BACKGROUND);
    for ((row, col), id) in winners.indexed_iter() {
        if let Some(&color) = colors.get(id) {
            image.put_pixel(col as u32, row as u32, color);
        }
    }
    image
}

/// Scatter per-patch predictions back into a label image.
pub fn reassemble_predictions(
    shape: (usize, usize),
    predictions: impl IntoIterator<Item = (PatchExtras, u32)>,
) -> Result<SparseLabels> {
    let mut labels = SparseLabels::new(shape.0, shape.1);
    for (extras, class_id) in predictions {
        if class_id > 0 {
            labels.insert(extras.row, extras.col, class_id)?;
        }
    }
    Ok(labels)
}

/// Write an image as PNG, creating parent directories.
pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| Error::Decode(format!("{}: {e}", path.display())))
}
