//! Categorical naive Bayes and its grid-search fitter

use super::split::stratified_folds;
use super::{accuracy, Classifier, FitOutcome, FitSummary, ModelFitter, TrainingData};
use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use sourcer_common::config::TrainingConfig;
use tracing::debug;

/// Naive Bayes over frequency-encoded categorical features
///
/// Unknown feature values (`-1`, or a rank beyond the column's known
/// categories) carry no evidence and are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayes {
    pub columns: Vec<String>,
    pub alpha: f64,
    pub n_classes: usize,
    pub cardinalities: Vec<usize>,
    class_counts: Vec<u64>,
    /// `[feature][class][category]`
    feature_counts: Vec<Vec<Vec<u64>>>,
}

impl NaiveBayes {
    pub fn fit(data: &TrainingData, alpha: f64) -> PipelineResult<Self> {
        if data.n_classes == 0 {
            return Err(PipelineError::Training("no label classes".to_string()));
        }
        if data.columns.len() != data.cardinalities.len() {
            return Err(PipelineError::Training(format!(
                "{} columns but {} cardinalities",
                data.columns.len(),
                data.cardinalities.len()
            )));
        }

        let mut class_counts = vec![0u64; data.n_classes];
        let mut feature_counts: Vec<Vec<Vec<u64>>> = data
            .cardinalities
            .iter()
            .map(|&card| vec![vec![0u64; card]; data.n_classes])
            .collect();

        for (row, &label) in data.rows.iter().zip(&data.labels) {
            let class = usize::try_from(label)
                .ok()
                .filter(|&c| c < data.n_classes)
                .ok_or_else(|| PipelineError::Training(format!("label rank {} out of range", label)))?;
            class_counts[class] += 1;

            for (feature, &value) in row.iter().enumerate() {
                if let Some(category) = known_category(value, data.cardinalities[feature]) {
                    feature_counts[feature][class][category] += 1;
                }
            }
        }

        Ok(Self {
            columns: data.columns.clone(),
            alpha,
            n_classes: data.n_classes,
            cardinalities: data.cardinalities.clone(),
            class_counts,
            feature_counts,
        })
    }

    fn log_posterior(&self, row: &[i64]) -> Vec<f64> {
        let total: u64 = self.class_counts.iter().sum();
        let k = self.n_classes as f64;

        (0..self.n_classes)
            .map(|class| {
                let mut score = ((self.class_counts[class] as f64 + self.alpha)
                    / (total as f64 + self.alpha * k))
                    .ln();

                for (feature, &value) in row.iter().enumerate() {
                    let card = self.cardinalities[feature];
                    if let Some(category) = known_category(value, card) {
                        let counts = &self.feature_counts[feature][class];
                        let seen: u64 = counts.iter().sum();
                        score += ((counts[category] as f64 + self.alpha)
                            / (seen as f64 + self.alpha * card as f64))
                            .ln();
                    }
                }
                score
            })
            .collect()
    }
}

fn known_category(value: i64, cardinality: usize) -> Option<usize> {
    usize::try_from(value).ok().filter(|&v| v < cardinality)
}

impl Classifier for NaiveBayes {
    fn predict_proba(&self, rows: &[Vec<i64>]) -> PipelineResult<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.columns.len() {
                    return Err(PipelineError::Training(format!(
                        "row has {} features, model expects {}",
                        row.len(),
                        self.columns.len()
                    )));
                }
                let log_scores = self.log_posterior(row);
                let max = log_scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let exp: Vec<f64> = log_scores.iter().map(|s| (s - max).exp()).collect();
                let sum: f64 = exp.iter().sum();
                Ok(exp.into_iter().map(|e| e / sum).collect())
            })
            .collect()
    }

    fn to_bytes(&self) -> PipelineResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> PipelineResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Picks the smoothing value by stratified cross-validation, then refits
#[derive(Debug, Clone)]
pub struct GridSearchFitter {
    pub smoothing_grid: Vec<f64>,
    pub folds: usize,
    pub seed: u64,
}

impl GridSearchFitter {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            smoothing_grid: config.smoothing_grid.clone(),
            folds: config.cv_folds,
            seed: config.cv_seed,
        }
    }

    /// Mean fold accuracy of one smoothing value; `None` without usable folds
    fn cross_validate(&self, data: &TrainingData, alpha: f64) -> PipelineResult<Option<f64>> {
        let folds = stratified_folds(&data.labels, self.folds.min(data.len()), self.seed);

        let mut scores = Vec::with_capacity(folds.len());
        for test in &folds {
            let train: Vec<usize> = (0..data.len()).filter(|i| test.binary_search(i).is_err()).collect();
            if test.is_empty() || train.is_empty() {
                continue;
            }
            let model = NaiveBayes::fit(&data.subset(&train), alpha)?;
            if let Some(score) = accuracy(&model, &data.subset(test))? {
                scores.push(score);
            }
        }

        if scores.is_empty() {
            return Ok(None);
        }
        Ok(Some(scores.iter().sum::<f64>() / scores.len() as f64))
    }
}

impl ModelFitter for GridSearchFitter {
    type Model = NaiveBayes;

    fn fit(&self, train: &TrainingData, validation: &TrainingData) -> PipelineResult<FitOutcome<NaiveBayes>> {
        if train.is_empty() {
            return Err(PipelineError::Training("no training rows".to_string()));
        }
        let first = *self
            .smoothing_grid
            .first()
            .ok_or_else(|| PipelineError::Training("empty smoothing grid".to_string()))?;

        // Earlier grid entries win ties
        let mut best = (first, None::<f64>);
        for &alpha in &self.smoothing_grid {
            let score = self.cross_validate(train, alpha)?;
            debug!(alpha, cv_accuracy = ?score, "Grid point evaluated");
            if let Some(s) = score {
                if best.1.map_or(true, |b| s > b) {
                    best = (alpha, Some(s));
                }
            }
        }

        let (alpha, cv_accuracy) = best;
        let model = NaiveBayes::fit(train, alpha)?;
        let validation_accuracy = accuracy(&model, validation)?;

        Ok(FitOutcome {
            model,
            validation_accuracy,
            summary: FitSummary {
                selected_params: format!("alpha={}", alpha),
                cv_accuracy,
                validation_accuracy,
                train_samples: train.len(),
                validation_samples: validation.len(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::top_k;

    /// Class equals the first feature; second feature is noise
    fn separable(n: usize) -> TrainingData {
        let rows: Vec<Vec<i64>> = (0..n).map(|i| vec![(i % 3) as i64, (i % 2) as i64]).collect();
        let labels = rows.iter().map(|r| r[0]).collect();
        TrainingData {
            columns: vec!["colC".into(), "colD".into()],
            cardinalities: vec![3, 2],
            n_classes: 3,
            rows,
            labels,
        }
    }

    fn fitter() -> GridSearchFitter {
        GridSearchFitter {
            smoothing_grid: vec![0.1, 0.5, 1.0, 2.0],
            folds: 5,
            seed: 42,
        }
    }

    #[test]
    fn test_probabilities_are_normalized() {
        let model = NaiveBayes::fit(&separable(30), 1.0).unwrap();
        for p in model.predict_proba(&[vec![0, 1], vec![-1, -1], vec![7, 0]]).unwrap() {
            assert_eq!(p.len(), 3);
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_learns_separable_feature() {
        let model = NaiveBayes::fit(&separable(30), 0.5).unwrap();
        let p = model.predict_proba(&[vec![2, 0]]).unwrap();
        assert_eq!(top_k(&p[0], 1), vec![2]);
    }

    #[test]
    fn test_grid_search_reports_accuracy() {
        let data = separable(60);
        let outcome = fitter().fit(&data.subset(&(0..54).collect::<Vec<_>>()), &data.subset(&(54..60).collect::<Vec<_>>())).unwrap();

        assert_eq!(outcome.validation_accuracy, Some(1.0));
        assert_eq!(outcome.summary.train_samples, 54);
        assert!(outcome.summary.cv_accuracy.is_some());
    }

    #[test]
    fn test_tiny_training_set_still_fits() {
        let data = separable(1);
        let outcome = fitter().fit(&data, &data.subset(&[])).unwrap();
        assert_eq!(outcome.validation_accuracy, None);
        assert_eq!(outcome.summary.selected_params, "alpha=0.1");
    }

    #[test]
    fn test_serialized_model_predicts_identically() {
        let model = NaiveBayes::fit(&separable(20), 1.0).unwrap();
        let restored = NaiveBayes::from_bytes(&model.to_bytes().unwrap()).unwrap();
        let rows = vec![vec![1, 0], vec![0, -1]];
        assert_eq!(model.predict_proba(&rows).unwrap(), restored.predict_proba(&rows).unwrap());
    }

    #[test]
    fn test_rejects_out_of_range_label() {
        let mut data = separable(3);
        data.labels[0] = 5;
        assert!(matches!(NaiveBayes::fit(&data, 1.0), Err(PipelineError::Training(_))));
    }
}
