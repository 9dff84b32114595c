//! GeoTIFF rasters as channel-first arrays.
//!
//! Samples of every page are read as-is (no georeferencing); chunky
//! multi-sample pages become several channels and pages are stacked in
//! file order. Planar multi-sample pages are rejected.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hsi_core::{Error, Result};
use ndarray::{concatenate, Array3, Axis};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::debug;

const PLANAR: u16 = 2;

fn tiff_err(path: &Path, err: tiff::TiffError) -> Error {
    Error::Decode(format!("{}: {err}", path.display()))
}

fn samples_as_f32(result: DecodingResult) -> Result<Vec<f32>> {
    let data = match result {
        DecodingResult::U8(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::Decode("unsupported TIFF sample format".to_string())),
    };
    Ok(data)
}

/// Interleaved `(height, width, channels)` samples to `(channels, height, width)`.
pub(crate) fn chunky_to_chw(data: Vec<f32>, height: usize, width: usize) -> Result<Array3<f32>> {
    let pixels = height * width;
    if pixels == 0 || data.len() % pixels != 0 {
        return Err(Error::Decode(format!(
            "{} samples do not tile a {height}x{width} image",
            data.len()
        )));
    }
    let channels = data.len() / pixels;
    let hwc = Array3::from_shape_vec((height, width, channels), data)?;
    Ok(hwc.permuted_axes([2, 0, 1]).as_standard_layout().into_owned())
}

/// Samples per pixel of the current page; planar storage with more than
/// one sample is not decoded.
fn samples_per_pixel<R>(path: &Path, decoder: &mut Decoder<R>) -> Result<usize>
where
    R: std::io::Read + std::io::Seek,
{
    let per_pixel = decoder
        .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)
        .map_err(|e| tiff_err(path, e))?
        .unwrap_or(1) as usize;
    let planar = decoder
        .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)
        .map_err(|e| tiff_err(path, e))?
        .unwrap_or(1);

    if per_pixel > 1 && planar == PLANAR {
        return Err(Error::Decode(format!(
            "{}: planar TIFF with {per_pixel} samples per pixel is not supported; \
             rewrite it pixel-interleaved or as one band per page",
            path.display()
        )));
    }
    Ok(per_pixel)
}

/// Decode every page of a TIFF and stack the bands.
pub fn read_geotiff(path: &Path) -> Result<Array3<f32>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| tiff_err(path, e))?
        .with_limits(Limits::unlimited());

    let mut pages = Vec::new();
    loop {
        let (width, height) = decoder.dimensions().map_err(|e| tiff_err(path, e))?;
        let per_pixel = samples_per_pixel(path, &mut decoder)?;
        let samples = samples_as_f32(decoder.read_image().map_err(|e| tiff_err(path, e))?)?;
        if samples.len() != per_pixel * width as usize * height as usize {
            return Err(Error::Decode(format!(
                "{}: page {} holds {} samples, expected {per_pixel} per pixel",
                path.display(),
                pages.len(),
                samples.len()
            )));
        }
        pages.push(chunky_to_chw(samples, height as usize, width as usize)?);

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(|e| tiff_err(path, e))?;
    }

    let spatial = pages[0].dim();
    if pages.iter().any(|p| p.dim().1 != spatial.1 || p.dim().2 != spatial.2) {
        return Err(Error::Decode(format!(
            "{}: pages differ in size",
            path.display()
        )));
    }

    let stacked = if pages.len() == 1 {
        pages.remove(0)
    } else {
        let views: Vec<_> = pages.iter().map(|p| p.view()).collect();
        concatenate(Axis(0), &views)?
    };
    debug!("Decoded {} as {:?}", path.display(), stacked.dim());
    Ok(stacked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tiff::encoder::{colortype, TiffEncoder};

    #[test]
    fn test_chunky_to_chw() {
        // 1x2 image with 3 samples per pixel
        let chw = chunky_to_chw(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 1, 2).unwrap();
        assert_eq!(chw.dim(), (3, 1, 2));
        assert_eq!(chw[[0, 0, 1]], 4.0);
        assert_eq!(chw[[2, 0, 0]], 3.0);
    }

    #[test]
    fn test_chunky_rejects_ragged() {
        assert!(chunky_to_chw(vec![1.0; 5], 2, 2).is_err());
    }

    #[test]
    fn test_read_rgb_page() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rgb.tif");
        {
            let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
            let data: Vec<u8> = (0..2 * 3 * 3).map(|v| v as u8).collect();
            encoder
                .write_image::<colortype::RGB8>(3, 2, &data)
                .unwrap();
        }

        let raster = read_geotiff(&path).unwrap();
        assert_eq!(raster.dim(), (3, 2, 3));
        // pixel (row 1, col 2) starts at sample (1 * 3 + 2) * 3 = 15
        assert_eq!(raster[[0, 1, 2]], 15.0);
        assert_eq!(raster[[2, 1, 2]], 17.0);
    }

    #[test]
    fn test_pages_are_stacked_as_bands() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bands.tif");
        {
            let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
            encoder
                .write_image::<colortype::Gray32Float>(2, 2, &[0.5, 1.5, 2.5, 3.5])
                .unwrap();
            encoder
                .write_image::<colortype::Gray32Float>(2, 2, &[10.0, 11.0, 12.0, 13.0])
                .unwrap();
        }

        let raster = read_geotiff(&path).unwrap();
        assert_eq!(raster.dim(), (2, 2, 2));
        assert_eq!(raster[[0, 1, 0]], 2.5);
        assert_eq!(raster[[1, 0, 1]], 11.0);
    }

    /// Little-endian 2x2 RGB8 TIFF stored one plane per strip.
    fn planar_rgb_tiff() -> Vec<u8> {
        const IFD_ENTRIES: u16 = 10;
        let extra = 8 + 2 + IFD_ENTRIES as u32 * 12 + 4;
        let bits_at = extra;
        let offsets_at = bits_at + 6;
        let counts_at = offsets_at + 12;
        let pixels_at = counts_at + 12;

        let mut out = Vec::new();
        out.extend_from_slice(b"II");
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());

        out.extend_from_slice(&IFD_ENTRIES.to_le_bytes());
        let mut entry = |tag: u16, ty: u16, count: u32, value: u32| {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&ty.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&value.to_le_bytes());
        };
        const SHORT: u16 = 3;
        const LONG: u16 = 4;
        entry(256, SHORT, 1, 2); // width
        entry(257, SHORT, 1, 2); // height
        entry(258, SHORT, 3, bits_at);
        entry(259, SHORT, 1, 1); // no compression
        entry(262, SHORT, 1, 2); // RGB
        entry(273, LONG, 3, offsets_at);
        entry(277, SHORT, 1, 3);
        entry(278, SHORT, 1, 2);
        entry(279, LONG, 3, counts_at);
        entry(284, SHORT, 1, 2); // planar
        out.extend_from_slice(&0u32.to_le_bytes());

        for _ in 0..3 {
            out.extend_from_slice(&8u16.to_le_bytes());
        }
        for plane in 0..3u32 {
            out.extend_from_slice(&(pixels_at + plane * 4).to_le_bytes());
        }
        for _ in 0..3 {
            out.extend_from_slice(&4u32.to_le_bytes());
        }
        for plane in 0..3u8 {
            out.extend_from_slice(&[plane * 10, plane * 10 + 1, plane * 10 + 2, plane * 10 + 3]);
        }
        out
    }

    #[test]
    fn test_planar_multisample_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("planar.tif");
        std::fs::write(&path, planar_rgb_tiff()).unwrap();

        let err = read_geotiff(&path).unwrap_err();
        match err {
            Error::Decode(msg) => {
                assert!(msg.contains("planar.tif"));
                assert!(msg.contains("planar"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_geotiff(&temp_dir.path().join("none.tif")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
