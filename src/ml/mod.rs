//! Machine learning helpers for evaluating label predictions.

pub mod metrics;
