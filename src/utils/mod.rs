//! Shared label utilities.
//!
//! These helpers sanitize label arrays, convert between hard predictions and
//! probability matrices, and control the process-wide RNG used for
//! reproducible tie-breaking.

mod error;
pub mod labels;
pub mod preds;
pub mod seed;

pub use error::LabelError;
pub use labels::{
    ABSTAIN, LabelArray, LabelValue, filter_labels, preds_to_probs, to_int_label_array,
    to_label_vector,
};
pub use preds::{DEFAULT_TIE_TOLERANCE, TieBreakPolicy, probs_to_preds};
pub use seed::{current_seed, fork_rng, set_seed, with_global_rng};
