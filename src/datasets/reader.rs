use std::path::{Path, PathBuf};

use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::store::DatasetArrays;
use super::transforms::{Categorical, MeanRemoval, OutputType, Targets};
use super::{DatasetError, DatasetResult, Partition, Transform};

/// Read access to a database written by the builder.
///
/// The arrays are loaded into memory when the file is opened; `get` and
/// `generate_batches` copy the requested rows out as `f32`.
pub struct YouTubeFacesDB {
    filename: PathBuf,
    x: ArrayD<u8>,
    y: Array1<i32>,
    video: Array1<i32>,
    mean: ArrayD<f32>,
    labels: Vec<String>,

    mean_removal: bool,
    output_type: OutputType,

    indices: Vec<usize>,
    training_indices: Vec<usize>,
    validation_indices: Vec<usize>,
    test_indices: Vec<usize>,
    rng: StdRng,
}

impl YouTubeFacesDB {
    /// * `mean_removal`: subtract the mean image from every returned sample.
    /// * `output_type`: class indices, or one-hot vectors of `nb_classes` components.
    pub fn open(
        filename: impl AsRef<Path>,
        mean_removal: bool,
        output_type: OutputType,
    ) -> DatasetResult<Self> {
        let filename = filename.as_ref().to_path_buf();
        let DatasetArrays {
            x,
            y,
            video,
            labels,
            mean,
        } = DatasetArrays::read(&filename)?;

        let indices: Vec<usize> = (0..x.len_of(Axis(0))).collect();
        Ok(Self {
            filename,
            x,
            y,
            video,
            mean,
            labels,
            mean_removal,
            output_type,
            training_indices: indices.clone(),
            indices,
            validation_indices: Vec::new(),
            test_indices: Vec::new(),
            rng: StdRng::from_entropy(),
        })
    }

    /// Fixes the random source used by `split` and `generate_batches`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn nb_samples(&self) -> usize {
        self.indices.len()
    }

    /// Shape of one sample.
    pub fn input_dim(&self) -> &[usize] {
        &self.x.shape()[1..]
    }

    pub fn nb_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label_name(&self, class: usize) -> Option<&str> {
        self.labels.get(class).map(String::as_str)
    }

    pub fn video(&self) -> ArrayView1<'_, i32> {
        self.video.view()
    }

    pub fn mean(&self) -> &ArrayD<f32> {
        &self.mean
    }

    pub fn nb_train(&self) -> usize {
        self.training_indices.len()
    }

    pub fn nb_val(&self) -> usize {
        self.validation_indices.len()
    }

    pub fn nb_test(&self) -> usize {
        self.test_indices.len()
    }

    pub fn partition_indices(&self, partition: Partition) -> &[usize] {
        match partition {
            Partition::Train => &self.training_indices,
            Partition::Val => &self.validation_indices,
            Partition::Test => &self.test_indices,
            Partition::All => &self.indices,
        }
    }

    pub fn partition_len(&self, partition: Partition) -> usize {
        self.partition_indices(partition).len()
    }

    /// Splits the rows into training, validation and test sets. Only the
    /// indices are stored; every call draws a fresh partition.
    pub fn split(&mut self, validation_size: f64, test_size: f64) -> DatasetResult<()> {
        let valid = |f: f64| (0.0..=1.0).contains(&f);
        if !valid(validation_size) || !valid(test_size) || validation_size + test_size > 1.0 {
            return Err(DatasetError::InvalidSplit {
                validation: validation_size,
                test: test_size,
            });
        }
        let nb_samples = self.nb_samples();
        let nb_val = (nb_samples as f64 * validation_size).floor() as usize;
        let nb_test = (nb_samples as f64 * test_size).floor() as usize;

        let mut indices = self.indices.clone();
        indices.shuffle(&mut self.rng);
        let mut rest = indices.split_off(nb_val);
        let mut training = rest.split_off(nb_test);
        indices.sort_unstable();
        rest.sort_unstable();
        training.sort_unstable();

        self.validation_indices = indices;
        self.test_indices = rest;
        self.training_indices = training;
        tracing::info!(
            "Training: {} ; Validation: {} ; Test: {} ; Total: {}",
            self.nb_train(),
            self.nb_val(),
            self.nb_test(),
            nb_samples
        );
        Ok(())
    }

    /// The whole partition as `(X, y)`.
    pub fn get(&self, partition: Partition) -> (ArrayD<f32>, Targets) {
        let (x, y) = match partition {
            Partition::All => (self.x.mapv(f32::from), self.y.clone()),
            _ => self.rows(self.partition_indices(partition)),
        };
        self.transform(x, y)
    }

    /// Like `get`, but an unknown partition name is reported and yields
    /// empty arrays.
    pub fn get_named(&self, partition: &str) -> (ArrayD<f32>, Targets) {
        match Partition::parse(partition) {
            Ok(p) => self.get(p),
            Err(e) => {
                tracing::error!("{e}");
                let (x, y) = self.rows(&[]);
                self.transform(x, y)
            }
        }
    }

    fn rows(&self, samples: &[usize]) -> (ArrayD<f32>, Array1<i32>) {
        if samples.is_empty() {
            let mut shape = vec![0];
            shape.extend_from_slice(self.input_dim());
            return (ArrayD::zeros(IxDyn(&shape)), Array1::zeros(0));
        }
        let x = self.x.select(Axis(0), samples).mapv(f32::from);
        let y = self.y.select(Axis(0), samples);
        (x, y)
    }

    /// Mean removal and target encoding, as configured at open time.
    pub fn transform(&self, x: ArrayD<f32>, y: Array1<i32>) -> (ArrayD<f32>, Targets) {
        let x = if self.mean_removal {
            MeanRemoval { mean: &self.mean }.transform(x)
        } else {
            x
        };
        let mut categorical = Categorical {
            output_type: self.output_type,
            nb_classes: self.nb_classes(),
        };
        (x, categorical.transform(y))
    }

    /// Minibatches of random samples of the partition, until it is fully seen.
    ///
    /// With `rest`, the samples left after the last full minibatch are sent
    /// as a final, smaller batch.
    pub fn generate_batches(
        &mut self,
        batch_size: usize,
        partition: Partition,
        rest: bool,
    ) -> DatasetResult<Batches<'_>> {
        if batch_size == 0 {
            return Err(DatasetError::InvalidBatchSize);
        }
        let mut indices = self.partition_indices(partition).to_vec();
        indices.shuffle(&mut self.rng);
        Ok(Batches {
            db: self,
            indices,
            batch_size,
            rest,
            pos: 0,
        })
    }

    /// Like `generate_batches`, but an unknown partition name is reported and
    /// yields no batches.
    pub fn generate_batches_named(
        &mut self,
        batch_size: usize,
        partition: &str,
        rest: bool,
    ) -> DatasetResult<Batches<'_>> {
        match Partition::parse(partition) {
            Ok(p) => self.generate_batches(batch_size, p, rest),
            Err(e) => {
                tracing::error!("{e}");
                if batch_size == 0 {
                    return Err(DatasetError::InvalidBatchSize);
                }
                Ok(Batches {
                    db: self,
                    indices: Vec::new(),
                    batch_size,
                    rest,
                    pos: 0,
                })
            }
        }
    }
}

/// Iterator over the minibatches of one pass through a partition.
pub struct Batches<'a> {
    db: &'a YouTubeFacesDB,
    indices: Vec<usize>,
    batch_size: usize,
    rest: bool,
    pos: usize,
}

impl Batches<'_> {
    fn remaining_batches(&self) -> usize {
        let left = self.indices.len() - self.pos;
        let full = left / self.batch_size;
        if self.rest && left % self.batch_size != 0 {
            full + 1
        } else {
            full
        }
    }
}

impl Iterator for Batches<'_> {
    type Item = (ArrayD<f32>, Targets);

    fn next(&mut self) -> Option<Self::Item> {
        let left = self.indices.len() - self.pos;
        if left == 0 || (left < self.batch_size && !self.rest) {
            return None;
        }
        let end = self.pos + left.min(self.batch_size);
        // each batch is read in ascending row order
        let mut samples = self.indices[self.pos..end].to_vec();
        samples.sort_unstable();
        self.pos = end;

        let (x, y) = self.db.rows(&samples);
        Some(self.db.transform(x, y))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining_batches();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Batches<'_> {}
