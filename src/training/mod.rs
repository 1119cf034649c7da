//! Training-run configuration and bookkeeping.
//!
//! Pure configuration and step accounting for a training loop: layered config
//! overrides, learning-rate warmup/decay, and running loss aggregation. Model
//! execution itself lives with the caller.

pub mod config;
mod config_defaults;
pub mod losses;
pub mod merge;
pub mod plan;
pub mod schedule;

pub use config::{ConfigError, TrainerConfig};
pub use losses::RunningLosses;
pub use merge::{MergeError, MissPolicy, recursive_merge};
pub use plan::{LoaderSpec, PlanError, PlannedStep, TrainingPlan};
pub use schedule::{LrSchedule, ScheduleError};
