//! Classifier seam
//!
//! The trainer only needs "labeled rows in, fitted classifier and validation
//! accuracy out"; the predictor only needs class probabilities. Features and
//! labels are frequency-encoded ranks, `-1` meaning unknown.

pub mod naive_bayes;
pub mod split;

pub use naive_bayes::{GridSearchFitter, NaiveBayes};

use crate::error::PipelineResult;
use serde::{Deserialize, Serialize};

/// Encoded rows of one feature group with their label ranks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingData {
    pub columns: Vec<String>,
    /// Known category count of each feature column
    pub cardinalities: Vec<usize>,
    /// Label classes are `0..n_classes`
    pub n_classes: usize,
    pub rows: Vec<Vec<i64>>,
    pub labels: Vec<i64>,
}

impl TrainingData {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same layout restricted to some rows
    pub fn subset(&self, indices: &[usize]) -> TrainingData {
        TrainingData {
            columns: self.columns.clone(),
            cardinalities: self.cardinalities.clone(),
            n_classes: self.n_classes,
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// What fitting a group produced
#[derive(Debug, Clone)]
pub struct FitOutcome<M> {
    pub model: M,
    /// `None` when the validation split is empty
    pub validation_accuracy: Option<f64>,
    pub summary: FitSummary,
}

/// Serializable part of a fit, kept in the training report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub selected_params: String,
    pub cv_accuracy: Option<f64>,
    pub validation_accuracy: Option<f64>,
    pub train_samples: usize,
    pub validation_samples: usize,
}

pub trait Classifier: Sized {
    /// Probability of every class for every row
    fn predict_proba(&self, rows: &[Vec<i64>]) -> PipelineResult<Vec<Vec<f64>>>;

    fn to_bytes(&self) -> PipelineResult<Vec<u8>>;

    fn from_bytes(bytes: &[u8]) -> PipelineResult<Self>;
}

pub trait ModelFitter {
    type Model: Classifier;

    fn fit(&self, train: &TrainingData, validation: &TrainingData) -> PipelineResult<FitOutcome<Self::Model>>;
}

/// Indices of the `k` most probable classes, most probable first
///
/// Equal probabilities rank the lower class index first.
pub fn top_k(probabilities: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| {
        probabilities[b]
            .partial_cmp(&probabilities[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(k);
    order
}

/// Share of rows whose most probable class equals the label
pub fn accuracy<C: Classifier>(model: &C, data: &TrainingData) -> PipelineResult<Option<f64>> {
    if data.is_empty() {
        return Ok(None);
    }
    let probabilities = model.predict_proba(&data.rows)?;
    let correct = probabilities
        .iter()
        .zip(&data.labels)
        .filter(|(p, &label)| top_k(p, 1).first().map(|&c| c as i64) == Some(label))
        .count();
    Ok(Some(correct as f64 / data.len() as f64))
}
