//! Feature matrix construction from tabular data
//!
//! Bridges the CSV layer and the anomaly engine: validates that the required
//! numeric columns exist and extracts them into a dense `Array2<f64>` in a
//! fixed column order.

use crate::error::{LoginsightError, Result};
use ndarray::Array2;
use polars::prelude::*;

/// Columns a user-behavior table must provide, in feature order.
pub const REQUIRED_COLUMNS: [&str; 3] = ["login_frequency", "session_duration", "login_hour"];

/// Extract an ordered feature matrix from a DataFrame.
///
/// Each row of `df` becomes one feature vector, with features ordered exactly
/// as `columns`. Extra columns in `df` are ignored.
///
/// # Errors
/// * [`LoginsightError::MissingColumn`] if a required column is absent
/// * [`LoginsightError::DataError`] if a cell is non-numeric, null, or non-finite
pub fn build_feature_matrix(df: &DataFrame, columns: &[&str]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = columns.len();

    let mut matrix = Array2::zeros((n_rows, n_cols));

    for (j, &name) in columns.iter().enumerate() {
        let column = df
            .column(name)
            .map_err(|_| LoginsightError::MissingColumn(name.to_string()))?;

        let series = column
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|_| {
                LoginsightError::DataError(format!("column '{name}' is not numeric"))
            })?;

        let values = series.f64().map_err(|e| {
            LoginsightError::DataError(format!("column '{name}': {e}"))
        })?;

        for (i, value) in values.into_iter().enumerate() {
            let v = value.ok_or_else(|| {
                LoginsightError::DataError(format!(
                    "column '{name}' has a non-numeric or missing value at row {i}"
                ))
            })?;
            if !v.is_finite() {
                return Err(LoginsightError::DataError(format!(
                    "column '{name}' has a non-finite value at row {i}"
                )));
            }
            matrix[[i, j]] = v;
        }
    }

    Ok(matrix)
}

/// Validate a feature matrix built outside the CSV path.
pub fn validate_matrix(x: &Array2<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(LoginsightError::DataError(
            "feature matrix is empty".to_string(),
        ));
    }
    if x.ncols() == 0 {
        return Err(LoginsightError::DataError(
            "feature matrix has no columns".to_string(),
        ));
    }
    for v in x.iter() {
        if !v.is_finite() {
            return Err(LoginsightError::DataError(
                "feature matrix contains NaN or Inf values".to_string(),
            ));
        }
    }
    Ok(())
}
