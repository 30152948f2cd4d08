/// This module defines the YouTube Faces dataset logic: turning the raw frame
/// directories into a single array file, and reading that file back as
/// partitioned, batched arrays for a classifier.
///
/// The two halves only meet through the file written by `store`.
use std::path::PathBuf;
use std::str::FromStr;

use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

pub mod builder;
pub mod data;
pub mod metadata;
pub mod reader;
pub mod store;
pub mod transforms;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("{0} does not exist in the YouTube Faces database")]
    UnknownLabel(String),
    #[error("cannot select {requested} labels, only {available} exist")]
    TooManyLabels { requested: usize, available: usize },
    #[error("could not read {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },
    #[error("no video index in frame path {0}")]
    VideoIndex(String),
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),
    #[error(transparent)]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error("array {0} is missing from the database")]
    MissingArray(&'static str),
    #[error("corrupt database: {0}")]
    Corrupt(String),
    #[error("the partition must be in ['train', 'val', 'test', 'all'], got {0:?}")]
    UnknownPartition(String),
    #[error("output_type must be in ['integer', 'vector'], got {0:?}")]
    UnknownOutputType(String),
    #[error("invalid split: validation {validation}, test {test}")]
    InvalidSplit { validation: f64, test: f64 },
    #[error("batch size cannot be zero")]
    InvalidBatchSize,
}

/// Named subsets of the sample rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Partition {
    Train,
    Val,
    Test,
    All,
}

impl Partition {
    pub fn parse(name: &str) -> DatasetResult<Self> {
        Partition::from_str(name).map_err(|_| DatasetError::UnknownPartition(name.to_string()))
    }
}

pub trait Transform<In, Out> {
    fn transform(&mut self, x: In) -> Out;
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn partition_names() {
        for p in Partition::iter() {
            assert_eq!(Partition::parse(&p.to_string()).unwrap(), p);
        }
        assert_eq!(Partition::parse("val").unwrap(), Partition::Val);
        assert!(matches!(
            Partition::parse("validation"),
            Err(DatasetError::UnknownPartition(name)) if name == "validation"
        ));
    }
}
