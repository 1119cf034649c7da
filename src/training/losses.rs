//! Running loss bookkeeping between logging points.

use std::collections::BTreeMap;

/// Metric key for the micro-averaged loss across all tasks.
pub const TOTAL_LOSS_KEY: &str = "model/all/train/loss";
/// Metric key for the current learning rate.
pub const LR_KEY: &str = "model/all/train/lr";

#[derive(Debug, Clone, Copy, Default)]
struct RunningSum {
    sum: f64,
    count: f64,
}

/// Accumulates count-weighted losses keyed by `task/dataset/split/loss`.
#[derive(Debug, Clone, Default)]
pub struct RunningLosses {
    entries: BTreeMap<String, RunningSum>,
}

impl RunningLosses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch whose mean loss over `count` examples was `mean_loss`.
    pub fn record(&mut self, task: &str, dataset: &str, split: &str, mean_loss: f64, count: usize) {
        let identifier = format!("{task}/{dataset}/{split}/loss");
        let entry = self.entries.entry(identifier).or_default();
        entry.sum += mean_loss * count as f64;
        entry.count += count as f64;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-identifier averages, the micro-averaged total and the learning rate.
    pub fn aggregate(&self, lr: f64) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        let mut total_sum = 0.0;
        let mut total_count = 0.0;
        for (identifier, entry) in &self.entries {
            total_sum += entry.sum;
            total_count += entry.count;
            if entry.count > 0.0 {
                metrics.insert(identifier.clone(), entry.sum / entry.count);
            }
        }
        if total_count > 0.0 {
            metrics.insert(TOTAL_LOSS_KEY.to_string(), total_sum / total_count);
        }
        metrics.insert(LR_KEY.to_string(), lr);
        metrics
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
