use std::path::Path;

use ndarray::{Array1, Array2, ArrayD, Ix2, IxDyn};
use serde_json::Value;

/// Read a rectangular nested JSON array of numbers.
pub(crate) fn read_array(path: &Path) -> Result<ArrayD<f64>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|err| format!("Invalid JSON in {}: {err}", path.display()))?;
    json_to_array(&value).map_err(|err| format!("{}: {err}", path.display()))
}

pub(crate) fn read_matrix(path: &Path) -> Result<Array2<f64>, String> {
    read_array(path)?
        .into_dimensionality::<Ix2>()
        .map_err(|_| format!("{}: expected a 2d array of probabilities", path.display()))
}

pub(crate) fn json_to_array(value: &Value) -> Result<ArrayD<f64>, String> {
    let mut shape = Vec::new();
    let mut cursor = value;
    while let Value::Array(items) = cursor {
        shape.push(items.len());
        match items.first() {
            Some(first) => cursor = first,
            None => break,
        }
    }
    let mut data = Vec::with_capacity(shape.iter().product());
    flatten(value, &shape, &mut data)?;
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|err| err.to_string())
}

fn flatten(value: &Value, shape: &[usize], out: &mut Vec<f64>) -> Result<(), String> {
    match (value, shape.split_first()) {
        (Value::Array(items), Some((&len, rest))) => {
            if items.len() != len {
                return Err("array is not rectangular".to_string());
            }
            for item in items {
                flatten(item, rest, out)?;
            }
            Ok(())
        }
        (Value::Number(number), None) => {
            let value = number
                .as_f64()
                .ok_or_else(|| format!("unsupported number {number}"))?;
            out.push(value);
            Ok(())
        }
        (other, _) => Err(format!("unexpected value {other}")),
    }
}

pub(crate) fn vector_to_json(values: &Array1<i64>) -> Value {
    Value::from(values.to_vec())
}

pub(crate) fn matrix_to_json(values: &Array2<f64>) -> Value {
    Value::Array(
        values
            .outer_iter()
            .map(|row| Value::from(row.to_vec()))
            .collect(),
    )
}
