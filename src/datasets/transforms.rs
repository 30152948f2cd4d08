use std::str::FromStr;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::{DatasetError, DatasetResult, Transform};

/// What the reader returns for the targets of each sample: the class index
/// (e.g. 3), or a one-hot vector with `nb_classes` components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumIter, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputType {
    Integer,
    #[default]
    Vector,
}

impl OutputType {
    pub fn parse(name: &str) -> DatasetResult<Self> {
        OutputType::from_str(name).map_err(|_| DatasetError::UnknownOutputType(name.to_string()))
    }

    /// Unknown names are reported and fall back to `Vector`.
    pub fn parse_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|e| {
            tracing::error!("{e}");
            OutputType::Vector
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Targets {
    Integer(Array1<i32>),
    Vector(Array2<f32>),
}

impl Targets {
    pub fn len(&self) -> usize {
        match self {
            Targets::Integer(y) => y.len(),
            Targets::Vector(y) => y.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The class index of every row, whichever form the targets are in.
    /// A one-hot row without a set component has no class.
    pub fn classes(&self) -> Vec<Option<usize>> {
        match self {
            Targets::Integer(y) => y.iter().map(|&c| usize::try_from(c).ok()).collect(),
            Targets::Vector(y) => y
                .axis_iter(Axis(0))
                .map(|row| row.iter().position(|&v| v == 1.0))
                .collect(),
        }
    }
}

/// Class vector (integers from 0 to nb_classes) to a binary class matrix.
pub fn to_categorical(y: &Array1<i32>, nb_classes: usize) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((y.len(), nb_classes));
    for (i, &c) in y.iter().enumerate() {
        out[[i, c as usize]] = 1.0;
    }
    out
}

/// Subtracts the mean image from every sample of a batch.
pub struct MeanRemoval<'a> {
    pub mean: &'a ArrayD<f32>,
}

impl Transform<ArrayD<f32>, ArrayD<f32>> for MeanRemoval<'_> {
    fn transform(&mut self, mut x: ArrayD<f32>) -> ArrayD<f32> {
        for mut sample in x.axis_iter_mut(Axis(0)) {
            sample -= self.mean;
        }
        x
    }
}

pub struct Categorical {
    pub output_type: OutputType,
    pub nb_classes: usize,
}

impl Transform<Array1<i32>, Targets> for Categorical {
    fn transform(&mut self, y: Array1<i32>) -> Targets {
        match self.output_type {
            OutputType::Integer => Targets::Integer(y),
            OutputType::Vector => Targets::Vector(to_categorical(&y, self.nb_classes)),
        }
    }
}
