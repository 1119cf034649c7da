//! Per-run step accounting derived from a trainer config and its data loaders.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use super::config::{BatchScheduler, ConfigError, TrainerConfig};
use super::schedule::{LrSchedule, ScheduleError};
use crate::utils::fork_rng;

/// Split name and batch count of one data loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSpec {
    pub name: String,
    pub split: String,
    pub n_batches: usize,
}

impl LoaderSpec {
    pub fn new(name: impl Into<String>, split: impl Into<String>, n_batches: usize) -> Self {
        Self {
            name: name.into(),
            split: split.into(),
            n_batches,
        }
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Position of a single training batch within a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedStep<'a> {
    /// Name of the train loader the batch is drawn from.
    pub loader: &'a str,
    pub epoch: usize,
    /// Batch index within the epoch.
    pub batch: usize,
    /// Batch index across the whole run.
    pub step: usize,
    pub lr: f64,
}

#[derive(Debug, Clone)]
pub struct TrainingPlan {
    n_epochs: usize,
    n_batches_per_epoch: usize,
    schedule: LrSchedule,
    train_loaders: Vec<LoaderSpec>,
    /// Present when batches are shuffled across loaders each epoch.
    shuffle_rng: Option<StdRng>,
}

impl TrainingPlan {
    /// Validate loader splits and build the learning-rate schedule.
    pub fn new(config: &TrainerConfig, loaders: &[LoaderSpec]) -> Result<Self, PlanError> {
        let splits: Vec<&str> = loaders.iter().map(|l| l.split.as_str()).collect();
        config.check_splits(splits.as_slice())?;

        let train_loaders: Vec<LoaderSpec> = loaders
            .iter()
            .filter(|l| l.split == config.train_split)
            .cloned()
            .collect();
        let n_batches_per_epoch = train_loaders.iter().map(|l| l.n_batches).sum();
        let schedule = LrSchedule::new(
            &config.lr_scheduler_config,
            config.optimizer_config.lr,
            n_batches_per_epoch,
            config.n_epochs,
        )?;
        tracing::info!(
            "Start training: {} epochs x {} batches, warmup {} batches",
            config.n_epochs,
            n_batches_per_epoch,
            schedule.warmup_steps()
        );
        let shuffle_rng = match config.batch_scheduler {
            BatchScheduler::Shuffled => Some(fork_rng()),
            BatchScheduler::Sequential => None,
        };
        Ok(Self {
            n_epochs: config.n_epochs,
            n_batches_per_epoch,
            schedule,
            train_loaders,
            shuffle_rng,
        })
    }

    pub fn n_batches_per_epoch(&self) -> usize {
        self.n_batches_per_epoch
    }

    pub fn total_steps(&self) -> usize {
        self.schedule.total_steps()
    }

    pub fn schedule(&self) -> &LrSchedule {
        &self.schedule
    }

    pub fn lr_at(&self, step: usize) -> f64 {
        self.schedule.lr_at(step)
    }

    /// Epoch containing global step `step`, or `None` past the end of the run.
    pub fn epoch_of(&self, step: usize) -> Option<usize> {
        if step >= self.total_steps() {
            return None;
        }
        Some(step / self.n_batches_per_epoch)
    }

    /// Every batch of the run in order.
    ///
    /// Sequential plans drain each train loader in turn. Shuffled plans
    /// reorder the same batches every epoch; repeated calls replay the
    /// same order.
    pub fn steps(&self) -> impl Iterator<Item = PlannedStep<'_>> + '_ {
        let mut rng = self.shuffle_rng.clone();
        (0..self.n_epochs).flat_map(move |epoch| {
            let order = self.epoch_order(rng.as_mut());
            order.into_iter().enumerate().map(move |(batch, loader)| {
                let step = epoch * self.n_batches_per_epoch + batch;
                PlannedStep {
                    loader: &self.train_loaders[loader].name,
                    epoch,
                    batch,
                    step,
                    lr: self.lr_at(step),
                }
            })
        })
    }

    /// Loader index for each batch of one epoch.
    fn epoch_order(&self, rng: Option<&mut StdRng>) -> Vec<usize> {
        let mut order: Vec<usize> = self
            .train_loaders
            .iter()
            .enumerate()
            .flat_map(|(idx, loader)| std::iter::repeat_n(idx, loader.n_batches))
            .collect();
        if let Some(rng) = rng {
            order.shuffle(rng);
        }
        order
    }
}
