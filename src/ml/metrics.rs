//! Evaluation metrics for integer label arrays.

use std::collections::BTreeMap;

use ndarray::{ArrayBase, Data, Ix1};
use serde::{Deserialize, Serialize};

use crate::utils::{ABSTAIN, LabelArray, LabelError, filter_labels};

#[derive(Debug, Clone)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Build a matrix from gold and predicted labels, skipping abstains.
    pub fn from_labels<S1, S2>(
        golds: &ArrayBase<S1, Ix1>,
        preds: &ArrayBase<S2, Ix1>,
        n_classes: usize,
    ) -> Result<Self, LabelError>
    where
        S1: Data<Elem = i64>,
        S2: Data<Elem = i64>,
    {
        let (kept_golds, kept_preds) = drop_abstains(golds, preds)?;
        check_classes(golds, n_classes)?;
        check_classes(preds, n_classes)?;
        let mut cm = Self::new(n_classes);
        for (&truth, &predicted) in kept_golds.iter().zip(kept_preds.iter()) {
            cm.add(truth as usize, predicted as usize);
        }
        Ok(cm)
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }

    /// Total number of recorded pairs.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&v| v as u64).sum()
    }
}

#[derive(Debug, Clone)]
/// Precision/recall statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f32,
    /// `TP / (TP + FN)`.
    pub recall: f32,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Serializable scoring summary for a set of predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub accuracy: f32,
    /// Fraction of predictions that did not abstain.
    pub coverage: f32,
    /// Number of rows scored after dropping abstains.
    pub evaluated: usize,
    pub per_class: Vec<PerClassMetric>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerClassMetric {
    pub class_idx: usize,
    pub support: u32,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
}

/// Compute per-class precision and recall from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f32;
        let mut fp = 0f32;
        let mut fn_ = 0f32;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f32;
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += cm.get(i, class_idx) as f32;
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        stats.push(PerClassStats {
            precision,
            recall,
            support,
        });
    }
    stats
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f32 {
    let total = cm.total();
    if total == 0 {
        return 0.0;
    }
    let correct: u64 = (0..cm.n_classes).map(|c| cm.get(c, c) as u64).sum();
    (correct as f32) / (total as f32)
}

pub fn f1_score(precision: f32, recall: f32) -> f32 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Score predictions against gold labels.
///
/// Rows where either side abstains are excluded from accuracy and the
/// per-class statistics; coverage is measured over all predictions.
pub fn score_predictions<S1, S2>(
    golds: &ArrayBase<S1, Ix1>,
    preds: &ArrayBase<S2, Ix1>,
    n_classes: usize,
) -> Result<ScoreReport, LabelError>
where
    S1: Data<Elem = i64>,
    S2: Data<Elem = i64>,
{
    let cm = ConfusionMatrix::from_labels(golds, preds, n_classes)?;
    let coverage = if preds.is_empty() {
        0.0
    } else {
        preds.iter().filter(|&&p| p != ABSTAIN).count() as f32 / preds.len() as f32
    };
    let per_class = precision_recall_by_class(&cm)
        .into_iter()
        .enumerate()
        .map(|(class_idx, stats)| PerClassMetric {
            class_idx,
            support: stats.support,
            precision: stats.precision,
            recall: stats.recall,
            f1: f1_score(stats.precision, stats.recall),
        })
        .collect();
    Ok(ScoreReport {
        accuracy: accuracy(&cm),
        coverage,
        evaluated: cm.total() as usize,
        per_class,
    })
}

/// Every label must be an abstain or a class index below `n_classes`.
fn check_classes<S>(labels: &ArrayBase<S, Ix1>, n_classes: usize) -> Result<(), LabelError>
where
    S: Data<Elem = i64>,
{
    for (index, &label) in labels.iter().enumerate() {
        if label == ABSTAIN {
            continue;
        }
        if !matches!(usize::try_from(label), Ok(class) if class < n_classes) {
            return Err(LabelError::ClassOutOfRange {
                index,
                label,
                num_classes: n_classes,
            });
        }
    }
    Ok(())
}

fn drop_abstains<S1, S2>(
    golds: &ArrayBase<S1, Ix1>,
    preds: &ArrayBase<S2, Ix1>,
) -> Result<(ndarray::Array1<i64>, ndarray::Array1<i64>), LabelError>
where
    S1: Data<Elem = i64>,
    S2: Data<Elem = i64>,
{
    let mut labels = BTreeMap::new();
    labels.insert("golds".to_string(), Some(LabelArray::Labels(golds.to_owned())));
    labels.insert("preds".to_string(), Some(LabelArray::Labels(preds.to_owned())));
    let filters = BTreeMap::from([
        ("golds".to_string(), vec![ABSTAIN]),
        ("preds".to_string(), vec![ABSTAIN]),
    ]);
    let mut filtered = filter_labels(&labels, &filters)?;
    let mut take = |name: &str| match filtered.remove(name).flatten() {
        Some(LabelArray::Labels(labels)) => labels,
        _ => ndarray::Array1::zeros(0),
    };
    let golds = take("golds");
    let preds = take("preds");
    Ok((golds, preds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn abstains_are_excluded_from_accuracy() {
        let golds = array![0, 1, 1, -1, 0];
        let preds = array![0, 1, 0, 1, -1];
        let report = score_predictions(&golds, &preds, 2).unwrap();
        assert_eq!(report.evaluated, 3);
        assert!((report.accuracy - 2.0 / 3.0).abs() < 1e-6);
        assert!((report.coverage - 0.8).abs() < 1e-6);
    }

    #[test]
    fn per_class_stats_match_confusion_counts() {
        let golds = array![0, 0, 1, 1, 2];
        let preds = array![0, 1, 1, 1, 0];
        let cm = ConfusionMatrix::from_labels(&golds, &preds, 3).unwrap();
        assert_eq!(cm.get(0, 1), 1);
        let stats = precision_recall_by_class(&cm);
        assert!((stats[0].precision - 0.5).abs() < 1e-6);
        assert!((stats[0].recall - 0.5).abs() < 1e-6);
        assert!((stats[1].precision - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(stats[1].recall, 1.0);
        assert_eq!(stats[2].support, 1);
        assert_eq!(stats[2].recall, 0.0);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = score_predictions(&array![0, 1], &array![0], 2).unwrap_err();
        assert!(matches!(err, LabelError::LengthMismatch { .. }));
    }

    #[test]
    fn labels_outside_the_class_range_are_rejected() {
        let err = score_predictions(&array![0, 5, 7], &array![0, 5, 1], 2).unwrap_err();
        assert_eq!(
            err,
            LabelError::ClassOutOfRange {
                index: 1,
                label: 5,
                num_classes: 2
            }
        );

        let err = score_predictions(&array![0, 1], &array![0, -3], 2).unwrap_err();
        assert!(matches!(
            err,
            LabelError::ClassOutOfRange {
                index: 1,
                label: -3,
                ..
            }
        ));
    }

    #[test]
    fn empty_inputs_score_zero() {
        let empty = ndarray::Array1::<i64>::zeros(0);
        let report = score_predictions(&empty, &empty, 2).unwrap();
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.coverage, 0.0);
        assert_eq!(report.evaluated, 0);
    }
}
