pub(super) fn default_n_epochs() -> usize {
    1
}

pub(super) fn default_train_split() -> String {
    "train".to_string()
}

pub(super) fn default_valid_split() -> String {
    "valid".to_string()
}

pub(super) fn default_test_split() -> String {
    "test".to_string()
}

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_optimizer_lr() -> f64 {
    0.001
}

pub(super) fn default_grad_clip() -> Option<f64> {
    Some(1.0)
}

pub(super) fn default_gamma() -> f64 {
    0.9
}

pub(super) fn default_step_size() -> usize {
    5
}
