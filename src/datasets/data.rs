/////////////////////////////////////////////////////////////////////////////////////////
/// Decoding a frame into the pixel layout stored in the database.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::io::Reader as ImageReader;
use image::{DynamicImage, RgbImage};
use ndarray::prelude::*;

use super::metadata::ImageRecord;
use super::{DatasetError, DatasetResult};

/// Shape of one stored sample. Colour images are `[3, H, W]` when
/// `channel_first`, `[H, W, 3]` otherwise; grayscale is always `[H, W]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    pub width: u32,
    pub height: u32,
    pub color: bool,
    pub channel_first: bool,
}

impl ImageLayout {
    pub fn sample_shape(&self) -> Vec<usize> {
        let (w, h) = (self.width as usize, self.height as usize);
        match (self.color, self.channel_first) {
            (true, true) => vec![3, h, w],
            (true, false) => vec![h, w, 3],
            (false, _) => vec![h, w],
        }
    }

    /// Resizes (if needed) and converts an image into the stored layout.
    pub fn to_array(&self, img: &RgbImage) -> DatasetResult<ArrayD<u8>> {
        let (w, h) = (self.width as usize, self.height as usize);
        let resized;
        let img = if img.dimensions() == (self.width, self.height) {
            img
        } else {
            resized = imageops::resize(img, self.width, self.height, FilterType::Nearest);
            &resized
        };

        if !self.color {
            let gray = img.pixels().map(|p| luma(p.0)).collect();
            return Ok(Array2::from_shape_vec((h, w), gray)?.into_dyn());
        }
        let hwc = Array3::from_shape_vec((h, w, 3), img.as_raw().clone())?;
        if self.channel_first {
            Ok(hwc.permuted_axes([2, 0, 1]).as_standard_layout().into_owned().into_dyn())
        } else {
            Ok(hwc.into_dyn())
        }
    }
}

/// ITU-R 601 luma, `L = R * 299/1000 + G * 587/1000 + B * 114/1000`, in
/// 16 bit fixed point with rounding.
fn luma([r, g, b]: [u8; 3]) -> u8 {
    let l = r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000;
    (l >> 16) as u8
}

/// Cuts the box `[cx - w/2, cy - h/2, cx + w/2, cy + h/2]` out of `img`. Parts
/// of the box outside the source are left black.
pub fn crop_centered(img: &RgbImage, center: (i64, i64), size: (i64, i64)) -> RgbImage {
    let (cx, cy) = center;
    let (sw, sh) = size;
    let (left, top) = (cx - sw / 2, cy - sh / 2);
    let (right, bottom) = (cx + sw / 2, cy + sh / 2);
    let width = (right - left).max(1) as u32;
    let height = (bottom - top).max(1) as u32;

    let mut canvas = RgbImage::new(width, height);
    imageops::overlay(&mut canvas, img, -left, -top);
    canvas
}

pub fn decode(path: &Path) -> DatasetResult<DynamicImage> {
    let image_err = |e| DatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    };
    ImageReader::open(path)
        .map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?
        .with_guessed_format()
        .map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?
        .decode()
        .map_err(image_err)
}

/// Decode, optionally crop around the detected face, then lay out as a sample.
pub fn load_frame(
    frames_dir: &Path,
    record: &ImageRecord,
    layout: &ImageLayout,
    cropped: bool,
) -> DatasetResult<ArrayD<u8>> {
    let img = decode(&frames_dir.join(&record.filename))?.into_rgb8();
    if cropped {
        layout.to_array(&crop_centered(&img, record.center, record.size))
    } else {
        layout.to_array(&img)
    }
}
