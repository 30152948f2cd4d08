use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use itertools::Itertools;
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::data::{self, ImageLayout};
use super::metadata::{self, ImageRecord};
use super::store::{self, DatasetArrays};
use super::DatasetError;

/// Which identities go into the database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LabelSelection {
    /// Every identity of the aligned folder.
    #[default]
    All,
    /// This many identities drawn at random.
    Random(usize),
    /// Exactly these identities, in this order.
    Names(Vec<String>),
    /// The identities listed in a text file, one per line.
    File(PathBuf),
}

/// Main configuration parameters for generating a database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildParams {
    /// Root of the YouTube Faces dataset.
    pub directory: PathBuf,
    /// The `.npz` file to write.
    pub filename: PathBuf,
    /// (width, height) of the extracted images.
    pub size: (u32, u32),
    pub labels: LabelSelection,
    /// Cap on the total number of images, -1 for all.
    pub max_number: i64,
    /// Cap on the images per identity, -1 for all.
    pub max_images_per_person: i64,
    pub color: bool,
    pub channel_first: bool,
    /// Crop each frame to the detected face before resizing.
    pub cropped: bool,
    pub frames_folder: String,
    pub aligned_folder: String,
    pub seed: Option<u64>,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            filename: PathBuf::from("ytfdb.npz"),
            size: (100, 100),
            labels: LabelSelection::All,
            max_number: -1,
            max_images_per_person: -1,
            color: true,
            channel_first: true,
            cropped: true,
            frames_folder: "frame_images_DB".into(),
            aligned_folder: "aligned_images_DB".into(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub filename: PathBuf,
    pub nb_images: usize,
    pub labels: Vec<String>,
    pub image_shape: Vec<usize>,
    pub elapsed_secs: f64,
}

impl BuildSummary {
    pub fn nb_labels(&self) -> usize {
        self.labels.len()
    }
}

impl BuildParams {
    pub fn build(&self) -> Result<BuildSummary> {
        generate_ytf_database(self)
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.directory.join(&self.frames_folder)
    }

    pub fn aligned_dir(&self) -> PathBuf {
        self.directory.join(&self.aligned_folder)
    }

    pub fn layout(&self) -> ImageLayout {
        ImageLayout {
            width: self.size.0,
            height: self.size.1,
            color: self.color,
            channel_first: self.channel_first,
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

fn cap(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

fn check_labels(labels: &[String], universe: &[String]) -> Result<(), DatasetError> {
    match labels.iter().find(|l| !universe.contains(l)) {
        Some(unknown) => Err(DatasetError::UnknownLabel(unknown.clone())),
        None => Ok(()),
    }
}

/// Resolves the ordered label list; its positions are the class indices.
pub fn resolve_labels(params: &BuildParams, rng: &mut StdRng) -> Result<Vec<String>> {
    let aligned = params.aligned_dir();
    let universe = || {
        metadata::discover_labels(&aligned)
            .with_context(|| format!("listing identities in {}", aligned.display()))
    };

    let labels = match &params.labels {
        LabelSelection::All => {
            tracing::info!("Retrieving all labels...");
            universe()?
        }
        LabelSelection::Random(nb_labels) => {
            tracing::info!("Generating {} labels randomly...", nb_labels);
            let orig = universe()?;
            if *nb_labels > orig.len() {
                return Err(DatasetError::TooManyLabels {
                    requested: *nb_labels,
                    available: orig.len(),
                }
                .into());
            }
            let labels: Vec<String> = orig
                .choose_multiple(rng, *nb_labels)
                .cloned()
                .sorted_by_cached_key(|s| s.to_lowercase())
                .collect();
            for label in &labels {
                tracing::info!("\t{}", label);
            }
            labels
        }
        LabelSelection::Names(names) => {
            tracing::info!("Checking the labels...");
            check_labels(names, &universe()?)?;
            names.clone()
        }
        LabelSelection::File(path) => {
            tracing::info!("Reading the labels from {}...", path.display());
            let names = metadata::read_label_file(path)?;
            check_labels(&names, &universe()?)?;
            names
        }
    };
    Ok(labels)
}

/// Fetches every selected frame into one array file.
pub fn generate_ytf_database(params: &BuildParams) -> Result<BuildSummary> {
    let tstart = Instant::now();
    let mut rng = params.rng();

    let labels = resolve_labels(params, &mut rng)?;

    tracing::info!("Gathering image locations...");
    let frames_dir = params.frames_dir();
    let mut records = metadata::gather_images_info(
        &frames_dir,
        &labels,
        cap(params.max_images_per_person),
        &mut rng,
    );
    tracing::info!("Found {} images for {} people.", records.len(), labels.len());

    if let Some(max_number) = cap(params.max_number) {
        tracing::info!("Reducing this number to {}", max_number);
        records = metadata::sample_records(records, Some(max_number), &mut rng);
    }

    let layout = params.layout();
    let arrays = create_db(&frames_dir, &records, &labels, &layout, params.cropped)?;
    arrays
        .write(&params.filename)
        .with_context(|| format!("writing {}", params.filename.display()))?;

    let elapsed_secs = tstart.elapsed().as_secs_f64();
    tracing::info!("Done in {:.2} seconds.", elapsed_secs);

    Ok(BuildSummary {
        filename: params.filename.clone(),
        nb_images: records.len(),
        labels,
        image_shape: layout.sample_shape(),
        elapsed_secs,
    })
}

/// Decodes every record, in order, into the rows of the database arrays.
fn create_db(
    frames_dir: &Path,
    records: &[ImageRecord],
    labels: &[String],
    layout: &ImageLayout,
    cropped: bool,
) -> Result<DatasetArrays> {
    let nb_images = records.len();
    let sample_shape = layout.sample_shape();
    tracing::info!("Final size of the images: {:?}", sample_shape);

    let mut label_index = HashMap::<&str, i32>::new();
    for (i, name) in labels.iter().enumerate() {
        label_index.entry(name.as_str()).or_insert(i as i32);
    }

    let mut shape = vec![nb_images];
    shape.extend_from_slice(&sample_shape);
    let mut x = ArrayD::<u8>::zeros(IxDyn(&shape));
    let mut y = Array1::<i32>::zeros(nb_images);
    let mut video = Array1::<i32>::zeros(nb_images);

    for (idx, description) in records.iter().enumerate() {
        y[idx] = *label_index
            .get(description.name.as_str())
            .ok_or_else(|| DatasetError::UnknownLabel(description.name.clone()))?;
        video[idx] = description.video_index()?;
        let img = data::load_frame(frames_dir, description, layout, cropped)
            .with_context(|| format!("loading frame {}", description.filename))?;
        x.index_axis_mut(Axis(0), idx).assign(&img);
    }

    let mean = store::compute_mean(&x);
    Ok(DatasetArrays {
        x,
        y,
        video,
        labels: labels.to_vec(),
        mean,
    })
}
