//! Recursive merging of TOML config tables.
//!
//! Overrides may name a key at any depth: a key that is not present at the
//! current level is looked up inside nested tables before it counts as a miss.

use thiserror::Error;
use toml::{Table, Value};

/// What to do with an override key that the destination does not contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissPolicy {
    /// Log a warning and drop the key.
    #[default]
    Report,
    /// Fail the merge.
    Exception,
    /// Add the key at the level where it was not found.
    Insert,
    /// Silently drop the key.
    Ignore,
}

/// Errors raised while merging config tables.
#[derive(Debug, Error, PartialEq)]
pub enum MergeError {
    /// An override tried to replace a table with a scalar or array.
    #[error("Attempted to overwrite table {key} with non-table: {value}")]
    OverwriteTable { key: String, value: String },
    /// An override key was not found and the policy forbids misses.
    #[error("Could not find key \"{key}\" in destination config")]
    Missing { key: String },
}

/// Merge `y` into a copy of `x` and return the result.
pub fn recursive_merge(x: &Table, y: &Table, misses: MissPolicy) -> Result<Table, MergeError> {
    let mut merged = x.clone();
    merge_table(&mut merged, y, misses)?;
    Ok(merged)
}

fn merge_table(dst: &mut Table, src: &Table, misses: MissPolicy) -> Result<(), MergeError> {
    for (key, value) in src {
        if merge_key(dst, key, value, misses)? {
            continue;
        }
        match misses {
            MissPolicy::Insert => {
                tracing::debug!("Added {key}={value} from overrides");
                dst.insert(key.clone(), value.clone());
            }
            MissPolicy::Exception => return Err(MergeError::Missing { key: key.clone() }),
            MissPolicy::Report => {
                tracing::warn!("Could not find key \"{key}\" in destination config");
            }
            MissPolicy::Ignore => {}
        }
    }
    Ok(())
}

/// Apply one override, searching nested tables when `key` is not at this level.
/// Returns whether the key was found.
fn merge_key(
    dst: &mut Table,
    key: &str,
    value: &Value,
    misses: MissPolicy,
) -> Result<bool, MergeError> {
    if let Some(existing) = dst.get_mut(key) {
        match (existing, value) {
            (Value::Table(existing), Value::Table(incoming)) => {
                merge_table(existing, incoming, misses)?;
            }
            (Value::Table(_), value) => {
                return Err(MergeError::OverwriteTable {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
            (existing, value) if *existing == *value => {
                tracing::debug!("Reaffirming {key}={existing}");
            }
            (existing, value) => {
                tracing::debug!("Overwriting {key}={existing} to {key}={value}");
                *existing = value.clone();
            }
        }
        return Ok(true);
    }

    for (_, nested) in dst.iter_mut() {
        if let Value::Table(nested) = nested {
            if merge_key(nested, key, value, MissPolicy::Ignore)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> Table {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn overrides_scalars_and_merges_tables() {
        let x = table("n_epochs = 1\n[optimizer_config]\nlr = 0.001\nl2 = 0.0\n");
        let y = table("n_epochs = 3\n[optimizer_config]\nlr = 0.1\n");
        let merged = recursive_merge(&x, &y, MissPolicy::Exception).unwrap();
        assert_eq!(merged["n_epochs"].as_integer(), Some(3));
        assert_eq!(merged["optimizer_config"]["lr"].as_float(), Some(0.1));
        assert_eq!(merged["optimizer_config"]["l2"].as_float(), Some(0.0));
        assert_eq!(x["n_epochs"].as_integer(), Some(1));
    }

    #[test]
    fn flat_keys_find_nested_destinations() {
        let x = table("[optimizer_config]\nlr = 0.001\n");
        let y = table("lr = 0.5\n");
        let merged = recursive_merge(&x, &y, MissPolicy::Exception).unwrap();
        assert_eq!(merged["optimizer_config"]["lr"].as_float(), Some(0.5));
        assert!(!merged.contains_key("lr"));
    }

    #[test]
    fn flat_keys_search_every_nested_table() {
        let x = table("[lr_scheduler_config]\nmin_lr = 0.0\n[optimizer_config]\nlr = 0.001\n");
        let y = table("lr = 0.5\nmin_lr = 0.01\n");
        let merged = recursive_merge(&x, &y, MissPolicy::Exception).unwrap();
        assert_eq!(merged["optimizer_config"]["lr"].as_float(), Some(0.5));
        assert_eq!(merged["lr_scheduler_config"]["min_lr"].as_float(), Some(0.01));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn miss_policies() {
        let x = table("a = 1\n");
        let y = table("b = 2\n");
        let inserted = recursive_merge(&x, &y, MissPolicy::Insert).unwrap();
        assert_eq!(inserted["b"].as_integer(), Some(2));

        let reported = recursive_merge(&x, &y, MissPolicy::Report).unwrap();
        assert!(!reported.contains_key("b"));

        let ignored = recursive_merge(&x, &y, MissPolicy::Ignore).unwrap();
        assert_eq!(ignored, x);

        assert_eq!(
            recursive_merge(&x, &y, MissPolicy::Exception),
            Err(MergeError::Missing {
                key: "b".to_string()
            })
        );
    }

    #[test]
    fn missing_nested_keys_insert_at_their_level() {
        let x = table("[lr_scheduler_config]\nmin_lr = 0.0\n");
        let y = table("[lr_scheduler_config]\nwarmup_steps = 4\n");
        let merged = recursive_merge(&x, &y, MissPolicy::Insert).unwrap();
        assert_eq!(
            merged["lr_scheduler_config"]["warmup_steps"].as_integer(),
            Some(4)
        );
    }

    #[test]
    fn table_cannot_be_replaced_by_scalar() {
        let x = table("[optimizer_config]\nlr = 0.001\n");
        let y = table("optimizer_config = 3\n");
        let err = recursive_merge(&x, &y, MissPolicy::Insert).unwrap_err();
        assert!(matches!(err, MergeError::OverwriteTable { key, .. } if key == "optimizer_config"));
    }
}
