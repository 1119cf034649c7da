use thiserror::Error;

/// Errors raised while converting or filtering label arrays.
#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    /// An element could not be represented as an integer label.
    #[error("Input contains a non-integer value {value} at position {index}")]
    NonInteger {
        /// Row-major position of the offending element.
        index: usize,
        /// The offending value, widened for display.
        value: f64,
    },
    /// Flattening left more than one non-trivial axis.
    #[error("Input of shape {shape:?} could not be converted to a 1d label array")]
    NotOneDimensional {
        /// Shape of the input array.
        shape: Vec<usize>,
    },
    /// A filter targeted an entry that holds probabilities, not labels.
    #[error("Cannot filter {name}: entry is not a label vector")]
    NotALabelVector {
        /// Name of the entry in the label dictionary.
        name: String,
    },
    /// Arrays that are masked together disagree on their row count.
    #[error("Entry {name} has {actual} rows, expected {expected}")]
    LengthMismatch {
        /// Name of the mismatched entry.
        name: String,
        /// Row count shared by the other entries.
        expected: usize,
        /// Row count of this entry.
        actual: usize,
    },
    /// One-hot encoding requested with zero classes.
    #[error("num_classes must be at least 1")]
    NoClasses,
    /// A prediction fell outside `0..num_classes`.
    #[error("Label {label} at position {index} is outside 0..{num_classes}")]
    ClassOutOfRange {
        /// Position of the offending prediction.
        index: usize,
        /// The offending label.
        label: i64,
        /// Number of classes in the target encoding.
        num_classes: usize,
    },
    /// Probability matrices need at least two columns to pick a class.
    #[error(
        "probs must have probabilities for at least 2 classes. Instead, got {num_classes} classes."
    )]
    TooFewClasses {
        /// Number of columns in the matrix.
        num_classes: usize,
    },
    /// A probability row contained NaN or infinity.
    #[error("Row {row} contains a non-finite probability")]
    NonFiniteProbability {
        /// Index of the offending row.
        row: usize,
    },
    /// The tie-break policy name was not recognized.
    #[error("tie_break_policy={0} policy not recognized.")]
    UnknownTieBreakPolicy(String),
}
