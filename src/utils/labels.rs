//! Label array sanitizing, filtering, and one-hot conversion.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayBase, ArrayD, Axis, Data, Dimension, Ix1, IxDyn};

use super::LabelError;

/// Label value reserved for "no prediction".
pub const ABSTAIN: i64 = -1;

/// Element types that can be sanitized into integer labels.
pub trait LabelValue: Copy {
    /// Return the exact integer value, or `None` if the element is fractional,
    /// non-finite, or outside the `i64` range.
    fn to_label(self) -> Option<i64>;
    /// Widen the element for error reporting.
    fn as_f64(self) -> f64;
}

macro_rules! impl_label_value_float {
    ($($ty:ty),*) => {$(
        impl LabelValue for $ty {
            fn to_label(self) -> Option<i64> {
                let value = self as f64;
                // `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
                if !value.is_finite()
                    || value.fract() != 0.0
                    || value < i64::MIN as f64
                    || value >= i64::MAX as f64
                {
                    return None;
                }
                Some(value as i64)
            }

            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    )*};
}

macro_rules! impl_label_value_int {
    ($($ty:ty),*) => {$(
        impl LabelValue for $ty {
            fn to_label(self) -> Option<i64> {
                i64::try_from(self).ok()
            }

            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    )*};
}

impl_label_value_float!(f32, f64);
impl_label_value_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

/// Cast an array to integer labels, optionally flattening it to 1-D.
///
/// With `flatten_vector`, every length-1 axis is squeezed out, so `[n, 1]`
/// column vectors become `[n]` and scalars become a single-element vector.
/// Inputs that remain multi-dimensional after squeezing are rejected.
pub fn to_int_label_array<S, D>(
    x: &ArrayBase<S, D>,
    flatten_vector: bool,
) -> Result<ArrayD<i64>, LabelError>
where
    S: Data,
    S::Elem: LabelValue,
    D: Dimension,
{
    let mut values = Vec::with_capacity(x.len());
    for (index, &value) in x.iter().enumerate() {
        match value.to_label() {
            Some(label) => values.push(label),
            None => {
                return Err(LabelError::NonInteger {
                    index,
                    value: value.as_f64(),
                });
            }
        }
    }

    let shape = if flatten_vector {
        let squeezed: Vec<usize> = x.shape().iter().copied().filter(|&d| d != 1).collect();
        match squeezed.len() {
            0 => vec![values.len()],
            1 => squeezed,
            _ => {
                return Err(LabelError::NotOneDimensional {
                    shape: x.shape().to_vec(),
                });
            }
        }
    } else {
        x.shape().to_vec()
    };

    ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|_| LabelError::NotOneDimensional {
        shape: x.shape().to_vec(),
    })
}

/// Sanitize any label-shaped array into a flat `Array1<i64>`.
pub fn to_label_vector<S, D>(x: &ArrayBase<S, D>) -> Result<Array1<i64>, LabelError>
where
    S: Data,
    S::Elem: LabelValue,
    D: Dimension,
{
    to_int_label_array(x, true)?
        .into_dimensionality::<Ix1>()
        .map_err(|_| LabelError::NotOneDimensional {
            shape: x.shape().to_vec(),
        })
}

/// A per-datapoint array that can be masked row-wise alongside other labels.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelArray {
    /// One integer label per datapoint.
    Labels(Array1<i64>),
    /// One probability row per datapoint.
    Probs(Array2<f64>),
}

impl LabelArray {
    /// Number of datapoints (rows).
    pub fn rows(&self) -> usize {
        match self {
            Self::Labels(labels) => labels.len(),
            Self::Probs(probs) => probs.nrows(),
        }
    }

    pub fn as_labels(&self) -> Option<&Array1<i64>> {
        match self {
            Self::Labels(labels) => Some(labels),
            Self::Probs(_) => None,
        }
    }

    pub fn as_probs(&self) -> Option<&Array2<f64>> {
        match self {
            Self::Labels(_) => None,
            Self::Probs(probs) => Some(probs),
        }
    }

    fn select_rows(&self, keep: &[bool]) -> Self {
        match self {
            Self::Labels(labels) => Self::Labels(
                labels
                    .iter()
                    .zip(keep)
                    .filter(|(_, keep)| **keep)
                    .map(|(label, _)| *label)
                    .collect(),
            ),
            Self::Probs(probs) => {
                let indices: Vec<usize> = keep
                    .iter()
                    .enumerate()
                    .filter(|(_, keep)| **keep)
                    .map(|(idx, _)| idx)
                    .collect();
                Self::Probs(probs.select(Axis(0), &indices))
            }
        }
    }
}

impl From<Array1<i64>> for LabelArray {
    fn from(labels: Array1<i64>) -> Self {
        Self::Labels(labels)
    }
}

impl From<Array2<f64>> for LabelArray {
    fn from(probs: Array2<f64>) -> Self {
        Self::Probs(probs)
    }
}

/// Drop datapoints whose labels match any of the filtered values.
///
/// Each entry of `filter_dict` names a label vector in `label_dict` and the
/// values to remove from it. The per-entry masks are AND-combined and the
/// result is applied to every entry of `label_dict`, so golds, preds and probs
/// stay aligned. Filters naming absent or `None` entries are skipped; when no
/// filter applies the input is returned unchanged.
pub fn filter_labels(
    label_dict: &BTreeMap<String, Option<LabelArray>>,
    filter_dict: &BTreeMap<String, Vec<i64>>,
) -> Result<BTreeMap<String, Option<LabelArray>>, LabelError> {
    let mut mask: Option<Vec<bool>> = None;
    for (name, filter_values) in filter_dict {
        let Some(Some(entry)) = label_dict.get(name) else {
            continue;
        };
        let LabelArray::Labels(labels) = entry else {
            return Err(LabelError::NotALabelVector { name: name.clone() });
        };
        let entry_mask = labels.iter().map(|label| !filter_values.contains(label));
        mask = Some(match mask {
            None => entry_mask.collect(),
            Some(combined) => {
                if combined.len() != labels.len() {
                    return Err(LabelError::LengthMismatch {
                        name: name.clone(),
                        expected: combined.len(),
                        actual: labels.len(),
                    });
                }
                combined
                    .into_iter()
                    .zip(entry_mask)
                    .map(|(a, b)| a && b)
                    .collect()
            }
        });
    }

    let Some(mask) = mask else {
        return Ok(label_dict.clone());
    };
    tracing::debug!(
        "Filtering labels keeps {} of {} rows",
        mask.iter().filter(|keep| **keep).count(),
        mask.len()
    );

    label_dict
        .iter()
        .map(|(name, entry)| {
            let filtered = match entry {
                None => None,
                Some(array) => {
                    if array.rows() != mask.len() {
                        return Err(LabelError::LengthMismatch {
                            name: name.clone(),
                            expected: mask.len(),
                            actual: array.rows(),
                        });
                    }
                    Some(array.select_rows(&mask))
                }
            };
            Ok((name.clone(), filtered))
        })
        .collect()
}

/// One-hot encode hard predictions into an `[n, num_classes]` matrix.
pub fn preds_to_probs<S>(
    preds: &ArrayBase<S, Ix1>,
    num_classes: usize,
) -> Result<Array2<f64>, LabelError>
where
    S: Data<Elem = i64>,
{
    if num_classes == 0 {
        return Err(LabelError::NoClasses);
    }
    let mut probs = Array2::<f64>::zeros((preds.len(), num_classes));
    for (index, &label) in preds.iter().enumerate() {
        let class = usize::try_from(label)
            .ok()
            .filter(|&class| class < num_classes)
            .ok_or(LabelError::ClassOutOfRange {
                index,
                label,
                num_classes,
            })?;
        probs[[index, class]] = 1.0;
    }
    Ok(probs)
}
