use std::collections::BTreeMap;

use labelkit::ml::metrics::score_predictions;
use labelkit::utils::{
    ABSTAIN, DEFAULT_TIE_TOLERANCE, LabelArray, TieBreakPolicy, filter_labels, preds_to_probs,
    probs_to_preds, set_seed, to_label_vector,
};
use ndarray::array;

#[test]
fn label_model_output_is_scored_on_covered_points() {
    let probs = array![
        [0.9, 0.1],
        [0.5, 0.5],
        [0.2, 0.8],
        [0.3, 0.7],
        [0.5, 0.5],
    ];
    let golds = to_label_vector(&array![[0.0], [1.0], [1.0], [0.0], [0.0]]).unwrap();
    let preds = probs_to_preds(&probs, TieBreakPolicy::Abstain, DEFAULT_TIE_TOLERANCE).unwrap();
    assert_eq!(preds, array![0, ABSTAIN, 1, 1, ABSTAIN]);

    let labels: BTreeMap<String, Option<LabelArray>> = [
        ("golds".to_string(), Some(golds.clone().into())),
        ("preds".to_string(), Some(preds.clone().into())),
        ("probs".to_string(), Some(probs.into())),
    ]
    .into_iter()
    .collect();
    let filters = BTreeMap::from([("preds".to_string(), vec![ABSTAIN])]);
    let covered = filter_labels(&labels, &filters).unwrap();
    assert_eq!(
        covered["probs"].as_ref().and_then(LabelArray::as_probs).map(|p| p.nrows()),
        Some(3)
    );

    let report = score_predictions(&golds, &preds, 2).unwrap();
    assert_eq!(report.evaluated, 3);
    assert!((report.accuracy - 2.0 / 3.0).abs() < 1e-6);
    assert!((report.coverage - 0.6).abs() < 1e-6);
}

#[test]
fn one_hot_probs_decode_back_to_predictions() {
    let preds = array![2, 0, 1, 1];
    let probs = preds_to_probs(&preds, 3).unwrap();
    set_seed(1);
    let decoded = probs_to_preds(&probs, TieBreakPolicy::Random, DEFAULT_TIE_TOLERANCE).unwrap();
    assert_eq!(decoded, preds);
}
