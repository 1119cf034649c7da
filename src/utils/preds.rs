//! Hard predictions from probability matrices.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, ArrayBase, Data, Ix2};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::labels::ABSTAIN;
use super::{LabelError, seed};

/// Default tolerance used to decide whether two probabilities are tied.
pub const DEFAULT_TIE_TOLERANCE: f64 = 1e-5;

/// How to resolve rows where several classes share the maximum probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreakPolicy {
    /// Pick uniformly among tied classes using the seeded global RNG.
    #[default]
    Random,
    /// Pick uniformly among tied classes using a fresh OS-seeded RNG.
    TrueRandom,
    /// Emit `ABSTAIN` for tied rows.
    Abstain,
}

impl TieBreakPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::TrueRandom => "true-random",
            Self::Abstain => "abstain",
        }
    }
}

impl fmt::Display for TieBreakPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TieBreakPolicy {
    type Err = LabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "random" => Ok(Self::Random),
            "true-random" => Ok(Self::TrueRandom),
            "abstain" => Ok(Self::Abstain),
            other => Err(LabelError::UnknownTieBreakPolicy(other.to_string())),
        }
    }
}

/// Convert an `[n, K]` probability matrix into one predicted class per row.
///
/// Classes within `tol` of the row maximum are considered tied and resolved
/// according to `policy`.
pub fn probs_to_preds<S>(
    probs: &ArrayBase<S, Ix2>,
    policy: TieBreakPolicy,
    tol: f64,
) -> Result<Array1<i64>, LabelError>
where
    S: Data<Elem = f64>,
{
    let num_classes = probs.ncols();
    if num_classes <= 1 {
        return Err(LabelError::TooFewClasses { num_classes });
    }

    let mut preds = Array1::<i64>::zeros(probs.nrows());
    let mut ties = 0usize;
    let mut max_idxs = Vec::with_capacity(num_classes);
    for (row_idx, row) in probs.outer_iter().enumerate() {
        if row.iter().any(|p| !p.is_finite()) {
            return Err(LabelError::NonFiniteProbability { row: row_idx });
        }
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        max_idxs.clear();
        // The maximum itself always qualifies, even with a non-positive tolerance.
        max_idxs.extend(
            row.iter()
                .enumerate()
                .filter(|(_, p)| {
                    let diff = (**p - max).abs();
                    diff < tol || diff == 0.0
                })
                .map(|(idx, _)| idx),
        );

        let class = if max_idxs.len() == 1 {
            max_idxs[0] as i64
        } else {
            ties += 1;
            match policy {
                TieBreakPolicy::Random => {
                    seed::with_global_rng(|rng| max_idxs.choose(rng).copied())
                        .map_or(ABSTAIN, |idx| idx as i64)
                }
                TieBreakPolicy::TrueRandom => max_idxs
                    .choose(&mut rand::rng())
                    .map_or(ABSTAIN, |&idx| idx as i64),
                TieBreakPolicy::Abstain => ABSTAIN,
            }
        };
        preds[row_idx] = class;
    }

    if ties > 0 {
        tracing::debug!("Resolved {ties} tied rows with policy {policy}");
    }
    Ok(preds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::seed::{SEED_TEST_LOCK, set_seed};
    use ndarray::{Array2, array};

    #[test]
    fn picks_argmax_without_ties() {
        let probs = array![[0.1, 0.7, 0.2], [0.6, 0.3, 0.1]];
        let preds = probs_to_preds(&probs, TieBreakPolicy::Abstain, DEFAULT_TIE_TOLERANCE).unwrap();
        assert_eq!(preds, array![1, 0]);
    }

    #[test]
    fn abstains_on_ties_within_tolerance() {
        let probs = array![[0.5, 0.5], [0.499_999, 0.500_001], [0.4, 0.6]];
        let preds = probs_to_preds(&probs, TieBreakPolicy::Abstain, 1e-5).unwrap();
        assert_eq!(preds, array![ABSTAIN, ABSTAIN, 1]);
    }

    #[test]
    fn random_ties_are_reproducible_after_seeding() {
        let _guard = SEED_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let probs = Array2::from_elem((64, 3), 1.0 / 3.0);
        set_seed(123);
        let first = probs_to_preds(&probs, TieBreakPolicy::Random, DEFAULT_TIE_TOLERANCE).unwrap();
        set_seed(123);
        let second = probs_to_preds(&probs, TieBreakPolicy::Random, DEFAULT_TIE_TOLERANCE).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|&p| (0..3).contains(&p)));
        assert!(first.iter().any(|&p| p != first[0]));
    }

    #[test]
    fn random_ties_only_choose_tied_classes() {
        let _guard = SEED_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let probs = array![[0.45, 0.1, 0.45], [0.45, 0.1, 0.45]];
        for policy in [TieBreakPolicy::Random, TieBreakPolicy::TrueRandom] {
            let preds = probs_to_preds(&probs, policy, DEFAULT_TIE_TOLERANCE).unwrap();
            assert!(preds.iter().all(|&p| p == 0 || p == 2));
        }
    }

    #[test]
    fn zero_tolerance_still_finds_the_maximum() {
        let probs = array![[0.2, 0.8]];
        let preds = probs_to_preds(&probs, TieBreakPolicy::Abstain, 0.0).unwrap();
        assert_eq!(preds, array![1]);
    }

    #[test]
    fn rejects_single_column() {
        let probs = array![[1.0], [1.0]];
        assert_eq!(
            probs_to_preds(&probs, TieBreakPolicy::Random, DEFAULT_TIE_TOLERANCE),
            Err(LabelError::TooFewClasses { num_classes: 1 })
        );
    }

    #[test]
    fn rejects_nan_rows() {
        let probs = array![[0.5, 0.5], [f64::NAN, 0.2]];
        assert_eq!(
            probs_to_preds(&probs, TieBreakPolicy::Abstain, DEFAULT_TIE_TOLERANCE),
            Err(LabelError::NonFiniteProbability { row: 1 })
        );
    }

    #[test]
    fn policy_names_round_trip_through_from_str() {
        for policy in [
            TieBreakPolicy::Random,
            TieBreakPolicy::TrueRandom,
            TieBreakPolicy::Abstain,
        ] {
            assert_eq!(policy.as_str().parse::<TieBreakPolicy>(), Ok(policy));
        }
        assert_eq!(
            "coin-flip".parse::<TieBreakPolicy>(),
            Err(LabelError::UnknownTieBreakPolicy("coin-flip".to_string()))
        );
    }
}
