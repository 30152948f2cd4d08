#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use ndarray::prelude::*;
use ytfaces_lib::datasets::store::{compute_mean, DatasetArrays};
use ytfaces_lib::BuildParams;

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;

/// Deterministic pixel content of a synthetic frame.
pub fn pixel(label: usize, video: usize, frame: usize, x: u32, y: u32) -> Rgb<u8> {
    Rgb([
        (label * 50 + video * 10 + frame) as u8,
        (x * 20) as u8,
        (y * 30 + 5) as u8,
    ])
}

/// Writes a YouTube Faces style tree: one aligned folder per identity and,
/// for each identity, `videos` x `frames` PNG frames with a metadata file
/// whose face box covers the whole frame.
pub fn write_dataset(root: &Path, names: &[&str], videos: usize, frames: usize) {
    let aligned = root.join("aligned_images_DB");
    let frames_dir = root.join("frame_images_DB");
    for (label, name) in names.iter().enumerate() {
        fs::create_dir_all(aligned.join(name)).unwrap();
        let mut rows = String::new();
        for video in 0..videos {
            let video_dir = frames_dir.join(name).join(video.to_string());
            fs::create_dir_all(&video_dir).unwrap();
            for frame in 0..frames {
                let img = RgbImage::from_fn(WIDTH, HEIGHT, |x, y| pixel(label, video, frame, x, y));
                img.save(video_dir.join(format!("{frame}.png"))).unwrap();
                rows.push_str(&format!(
                    "{name}\\{video}\\{frame}.png,0,{},{},{},{},0.0,1\n",
                    WIDTH / 2,
                    HEIGHT / 2,
                    WIDTH,
                    HEIGHT
                ));
            }
        }
        fs::write(frames_dir.join(format!("{name}.labeled_faces.txt")), rows).unwrap();
    }
}

pub fn params(root: &Path, filename: PathBuf) -> BuildParams {
    BuildParams {
        directory: root.to_path_buf(),
        filename,
        size: (WIDTH, HEIGHT),
        seed: Some(0),
        ..Default::default()
    }
}

/// A database whose every pixel of row `i` equals `i`, so batches reveal
/// which rows they were gathered from.
pub fn row_tagged_db(path: &Path, nb_samples: usize, nb_classes: usize) -> DatasetArrays {
    let mut x = ArrayD::<u8>::zeros(IxDyn(&[nb_samples, 1, 2, 3]));
    for (i, mut row) in x.axis_iter_mut(Axis(0)).enumerate() {
        row.fill(i as u8);
    }
    let mean = compute_mean(&x);
    let arrays = DatasetArrays {
        x,
        y: Array1::from_iter((0..nb_samples).map(|i| (i % nb_classes) as i32)),
        video: Array1::from_iter((0..nb_samples).map(|i| (i / 4) as i32)),
        labels: (0..nb_classes).map(|c| format!("Person_{c}")).collect(),
        mean,
    };
    arrays.write(path).unwrap();
    arrays
}
