//! Learning-rate schedule: linear warmup followed by an optional decay.

use thiserror::Error;

use super::config::{LrSchedulerConfig, LrSchedulerKind, WarmupUnit};

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("warmup_steps must be greater than or equal to 0, got {0}")]
    NegativeWarmup(f64),
    #[error("warmup_percentage must be within 0..=1, got {0}")]
    InvalidWarmupPercentage(f64),
    #[error("Linear decay needs more total steps ({total}) than warmup steps ({warmup})")]
    WarmupExceedsTotal { warmup: usize, total: usize },
    #[error("step_config.step_size must be at least 1")]
    ZeroStepSize,
    #[error("{n_epochs} epochs of {n_batches_per_epoch} batches exceed the step counter")]
    TooManySteps {
        n_batches_per_epoch: usize,
        n_epochs: usize,
    },
}

/// Closed-form learning rate for every batch of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct LrSchedule {
    base_lr: f64,
    kind: LrSchedulerKind,
    warmup_steps: usize,
    total_steps: usize,
    min_lr: f64,
    gamma: f64,
    step_size: usize,
}

impl LrSchedule {
    pub fn new(
        config: &LrSchedulerConfig,
        base_lr: f64,
        n_batches_per_epoch: usize,
        n_epochs: usize,
    ) -> Result<Self, ScheduleError> {
        let total_steps =
            n_batches_per_epoch
                .checked_mul(n_epochs)
                .ok_or(ScheduleError::TooManySteps {
                    n_batches_per_epoch,
                    n_epochs,
                })?;
        let warmup_steps = warmup_steps(config, n_batches_per_epoch, total_steps)?;

        let (gamma, step_size) = match config.lr_scheduler {
            LrSchedulerKind::Exponential => (config.exponential_config.gamma, 1),
            LrSchedulerKind::Step => {
                if config.step_config.step_size == 0 {
                    return Err(ScheduleError::ZeroStepSize);
                }
                (config.step_config.gamma, config.step_config.step_size)
            }
            LrSchedulerKind::Linear => {
                if total_steps <= warmup_steps {
                    return Err(ScheduleError::WarmupExceedsTotal {
                        warmup: warmup_steps,
                        total: total_steps,
                    });
                }
                (1.0, 1)
            }
            LrSchedulerKind::Constant => (1.0, 1),
        };

        if warmup_steps > 0 {
            tracing::info!("Warmup {warmup_steps} batches.");
        }
        Ok(Self {
            base_lr,
            kind: config.lr_scheduler,
            warmup_steps,
            total_steps,
            min_lr: config.min_lr,
            gamma,
            step_size,
        })
    }

    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Learning rate used for the batch at global index `step`.
    pub fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return self.base_lr * (step + 1) as f64 / self.warmup_steps as f64;
        }
        // Decay steps taken once warmup has finished, counting this batch.
        let decay_steps = step - self.warmup_steps + 1;
        let lr = match self.kind {
            LrSchedulerKind::Constant => return self.base_lr,
            LrSchedulerKind::Linear => {
                let span = (self.total_steps - self.warmup_steps) as f64;
                self.base_lr * (span - decay_steps as f64) / span
            }
            LrSchedulerKind::Exponential => self.base_lr * self.gamma.powi(exponent(decay_steps)),
            LrSchedulerKind::Step => {
                self.base_lr * self.gamma.powi(exponent(decay_steps / self.step_size))
            }
        };
        if self.min_lr > 0.0 && lr < self.min_lr {
            self.min_lr
        } else {
            lr
        }
    }
}

fn exponent(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn warmup_steps(
    config: &LrSchedulerConfig,
    n_batches_per_epoch: usize,
    total_steps: usize,
) -> Result<usize, ScheduleError> {
    match (config.warmup_steps, config.warmup_percentage) {
        (Some(steps), _) if steps != 0.0 => {
            if !(steps >= 0.0) {
                return Err(ScheduleError::NegativeWarmup(steps));
            }
            Ok(match config.warmup_unit {
                WarmupUnit::Epochs => (steps * n_batches_per_epoch as f64) as usize,
                WarmupUnit::Batches => steps as usize,
            })
        }
        (_, Some(percentage)) if percentage != 0.0 => {
            if !(0.0..=1.0).contains(&percentage) {
                return Err(ScheduleError::InvalidWarmupPercentage(percentage));
            }
            Ok((percentage * total_steps as f64) as usize)
        }
        _ => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: LrSchedulerKind) -> LrSchedulerConfig {
        LrSchedulerConfig {
            lr_scheduler: kind,
            ..LrSchedulerConfig::default()
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn constant_without_warmup_is_flat() {
        let schedule = LrSchedule::new(&config(LrSchedulerKind::Constant), 0.1, 10, 2).unwrap();
        assert_eq!(schedule.total_steps(), 20);
        assert!((0..20).all(|step| schedule.lr_at(step) == 0.1));
    }

    #[test]
    fn warmup_ramps_to_base() {
        let mut cfg = config(LrSchedulerKind::Constant);
        cfg.warmup_steps = Some(4.0);
        let schedule = LrSchedule::new(&cfg, 1.0, 10, 1).unwrap();
        let lrs: Vec<f64> = (0..6).map(|s| schedule.lr_at(s)).collect();
        assert_eq!(lrs, vec![0.25, 0.5, 0.75, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn warmup_in_epochs_and_percentage() {
        let mut cfg = config(LrSchedulerKind::Constant);
        cfg.warmup_steps = Some(0.5);
        cfg.warmup_unit = WarmupUnit::Epochs;
        assert_eq!(LrSchedule::new(&cfg, 1.0, 8, 3).unwrap().warmup_steps(), 4);

        let mut cfg = config(LrSchedulerKind::Constant);
        cfg.warmup_percentage = Some(0.25);
        assert_eq!(LrSchedule::new(&cfg, 1.0, 8, 3).unwrap().warmup_steps(), 6);
    }

    #[test]
    fn linear_decays_to_zero_at_the_end() {
        let mut cfg = config(LrSchedulerKind::Linear);
        cfg.warmup_steps = Some(2.0);
        let schedule = LrSchedule::new(&cfg, 1.0, 6, 1).unwrap();
        assert!(close(schedule.lr_at(1), 1.0));
        assert!(close(schedule.lr_at(2), 0.75));
        assert!(close(schedule.lr_at(5), 0.0));
    }

    #[test]
    fn exponential_and_step_decay() {
        let exp = LrSchedule::new(&config(LrSchedulerKind::Exponential), 1.0, 10, 1).unwrap();
        assert!(close(exp.lr_at(0), 0.9));
        assert!(close(exp.lr_at(2), 0.729));

        let mut cfg = config(LrSchedulerKind::Step);
        cfg.step_config.step_size = 2;
        cfg.step_config.gamma = 0.5;
        let step = LrSchedule::new(&cfg, 1.0, 10, 1).unwrap();
        let lrs: Vec<f64> = (0..5).map(|s| step.lr_at(s)).collect();
        assert_eq!(lrs, vec![1.0, 0.5, 0.5, 0.25, 0.25]);
    }

    #[test]
    fn min_lr_floors_decay() {
        let mut cfg = config(LrSchedulerKind::Exponential);
        cfg.exponential_config.gamma = 0.1;
        cfg.min_lr = 0.05;
        let schedule = LrSchedule::new(&cfg, 1.0, 10, 1).unwrap();
        assert!(close(schedule.lr_at(0), 0.1));
        assert_eq!(schedule.lr_at(1), 0.05);
        assert_eq!(schedule.lr_at(9), 0.05);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut cfg = config(LrSchedulerKind::Constant);
        cfg.warmup_steps = Some(-1.0);
        assert_eq!(
            LrSchedule::new(&cfg, 1.0, 10, 1),
            Err(ScheduleError::NegativeWarmup(-1.0))
        );

        let mut cfg = config(LrSchedulerKind::Linear);
        cfg.warmup_steps = Some(10.0);
        assert_eq!(
            LrSchedule::new(&cfg, 1.0, 10, 1),
            Err(ScheduleError::WarmupExceedsTotal {
                warmup: 10,
                total: 10
            })
        );

        let mut cfg = config(LrSchedulerKind::Step);
        cfg.step_config.step_size = 0;
        assert_eq!(
            LrSchedule::new(&cfg, 1.0, 10, 1),
            Err(ScheduleError::ZeroStepSize)
        );
    }

    #[test]
    fn overflowing_step_count_is_an_error() {
        assert_eq!(
            LrSchedule::new(&config(LrSchedulerKind::Constant), 1.0, 2, usize::MAX),
            Err(ScheduleError::TooManySteps {
                n_batches_per_epoch: 2,
                n_epochs: usize::MAX
            })
        );
    }
}
