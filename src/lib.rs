//! Label utilities and training-run bookkeeping for weakly supervised classifiers.
/// App directory resolution.
pub mod app_dirs;
/// Tracing subscriber setup.
pub mod logging;
/// Evaluation metrics.
pub mod ml;
/// Trainer configuration, learning-rate schedules and loss tracking.
pub mod training;
/// Shared label array utilities.
pub mod utils;
