//! The on-disk database: five named arrays in one `.npz` container.
//!
//! | name     | dtype | shape                  |
//! |----------|-------|------------------------|
//! | `X`      | u8    | `(N, ..sample shape)`  |
//! | `Y`      | i32   | `(N,)`                 |
//! | `video`  | i32   | `(N,)`                 |
//! | `labels` | u8    | `(nb_labels, max_len)` |
//! | `mean`   | f32   | sample shape           |
//!
//! `labels` holds one null-padded UTF-8 name per row.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::prelude::*;
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError};

use super::{DatasetError, DatasetResult};

pub const X: &str = "X";
pub const Y: &str = "Y";
pub const VIDEO: &str = "video";
pub const LABELS: &str = "labels";
pub const MEAN: &str = "mean";

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetArrays {
    pub x: ArrayD<u8>,
    pub y: Array1<i32>,
    pub video: Array1<i32>,
    pub labels: Vec<String>,
    pub mean: ArrayD<f32>,
}

impl DatasetArrays {
    pub fn nb_samples(&self) -> usize {
        self.x.len_of(Axis(0))
    }

    pub fn sample_shape(&self) -> &[usize] {
        &self.x.shape()[1..]
    }

    /// Checks the cross-array invariants every database must satisfy.
    pub fn validate(&self) -> DatasetResult<()> {
        if self.x.ndim() < 2 {
            return Err(DatasetError::Corrupt(format!(
                "X must have a sample axis and at least one pixel axis, got shape {:?}",
                self.x.shape()
            )));
        }
        let n = self.nb_samples();
        if self.y.len() != n || self.video.len() != n {
            return Err(DatasetError::Corrupt(format!(
                "row counts differ: X {}, Y {}, video {}",
                n,
                self.y.len(),
                self.video.len()
            )));
        }
        if self.mean.shape() != self.sample_shape() {
            return Err(DatasetError::Corrupt(format!(
                "mean has shape {:?}, samples have shape {:?}",
                self.mean.shape(),
                self.sample_shape()
            )));
        }
        let nb_labels = self.labels.len();
        if let Some(bad) = self.y.iter().find(|&&l| l < 0 || l as usize >= nb_labels) {
            return Err(DatasetError::Corrupt(format!(
                "label index {bad} out of range for {nb_labels} labels"
            )));
        }
        Ok(())
    }

    pub fn write(&self, path: &Path) -> DatasetResult<()> {
        let file = File::create(path).map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut npz = NpzWriter::new(BufWriter::new(file));
        npz.add_array(X, &self.x)?;
        npz.add_array(Y, &self.y)?;
        npz.add_array(VIDEO, &self.video)?;
        npz.add_array(LABELS, &encode_labels(&self.labels))?;
        npz.add_array(MEAN, &self.mean)?;
        let mut out = npz.finish()?;
        out.flush().map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Loads every array into memory and validates the invariants.
    pub fn read(path: &Path) -> DatasetResult<Self> {
        let file = File::open(path).map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut npz = NpzReader::new(file)?;

        let x: ArrayD<u8> = by_name(&mut npz, X)?;
        let y: Array1<i32> = by_name(&mut npz, Y)?;
        let video: Array1<i32> = by_name(&mut npz, VIDEO)?;
        let labels: Array2<u8> = by_name(&mut npz, LABELS)?;
        let mean: ArrayD<f32> = by_name(&mut npz, MEAN)?;

        let arrays = Self {
            x,
            y,
            video,
            labels: decode_labels(&labels)?,
            mean,
        };
        arrays.validate()?;
        Ok(arrays)
    }
}

fn by_name<S, D>(npz: &mut NpzReader<File>, name: &'static str) -> DatasetResult<ArrayBase<S, D>>
where
    S: ndarray::DataOwned,
    S::Elem: ndarray_npy::ReadableElement,
    D: Dimension,
{
    match npz.by_name(name) {
        Ok(arr) => Ok(arr),
        Err(ReadNpzError::Zip(_)) => Err(DatasetError::MissingArray(name)),
        Err(e) => Err(e.into()),
    }
}

/// Element-wise mean over the sample axis. All zeros for an empty database.
pub fn compute_mean(x: &ArrayD<u8>) -> ArrayD<f32> {
    let mut acc = ArrayD::<f64>::zeros(IxDyn(&x.shape()[1..]));
    for row in x.axis_iter(Axis(0)) {
        acc.zip_mut_with(&row, |a, &p| *a += f64::from(p));
    }
    let n = x.len_of(Axis(0));
    if n > 0 {
        acc /= n as f64;
    }
    acc.mapv(|v| v as f32)
}

pub fn encode_labels(labels: &[String]) -> Array2<u8> {
    let width = labels.iter().map(|l| l.len()).max().unwrap_or(0).max(1);
    let mut arr = Array2::<u8>::zeros((labels.len(), width));
    for (mut row, label) in arr.axis_iter_mut(Axis(0)).zip(labels) {
        for (cell, b) in row.iter_mut().zip(label.bytes()) {
            *cell = b;
        }
    }
    arr
}

pub fn decode_labels(arr: &Array2<u8>) -> DatasetResult<Vec<String>> {
    arr.axis_iter(Axis(0))
        .map(|row| {
            let bytes: Vec<u8> = row.iter().copied().take_while(|&b| b != 0).collect();
            String::from_utf8(bytes)
                .map_err(|e| DatasetError::Corrupt(format!("label is not utf-8: {e}")))
        })
        .collect()
}
