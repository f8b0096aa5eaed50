//! Column derivations shared by the enrichers.

use crate::coercion::{coerce_array, ColumnType};
use crate::dataset::Dataset;
use crate::error::{EtlError, Result};
use arrow::array::{Array, BooleanArray, Float64Array, Int64Array, StringArray, TimestampNanosecondArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::temporal_conversions::timestamp_ns_to_datetime;
use chrono::{Datelike, Duration, NaiveDate};

/// Calendar bucket a timestamp is labelled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// `YYYY-MM`
    Month,
    /// `YYYY-MM-DD/YYYY-MM-DD`, Monday to Sunday
    Week,
}

impl Period {
    /// Labels are fixed-width, so lexical order is chronological.
    pub fn label(&self, date: NaiveDate) -> String {
        match self {
            Self::Month => date.format("%Y-%m").to_string(),
            Self::Week => {
                let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                let end = start + Duration::days(6);
                format!("{}/{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
        }
    }
}

/// Period labels for a timestamp column; null timestamps stay null.
pub fn period_column(dataset: &Dataset, column: &str, period: Period) -> Result<StringArray> {
    let coerced = coerce_array(dataset.require_column(column)?, ColumnType::Timestamp)?;
    let timestamps = coerced
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .ok_or_else(|| EtlError::Internal(format!("Column '{column}' is not a timestamp")))?;
    Ok(timestamps
        .iter()
        .map(|v| v.and_then(timestamp_ns_to_datetime).map(|dt| period.label(dt.date())))
        .collect())
}

/// Applies `predicate` per row; null inputs yield `null_as`.
pub fn flag(values: &Float64Array, null_as: bool, predicate: impl Fn(f64) -> bool) -> BooleanArray {
    values
        .iter()
        .map(|v| Some(v.map(&predicate).unwrap_or(null_as)))
        .collect()
}

/// Compares two numeric columns row by row; a null on either side is `false`.
pub fn compare_columns(
    left: &Float64Array,
    right: &Float64Array,
    predicate: impl Fn(f64, f64) -> bool,
) -> BooleanArray {
    left.iter()
        .zip(right.iter())
        .map(|pair| match pair {
            (Some(l), Some(r)) => Some(predicate(l, r)),
            _ => Some(false),
        })
        .collect()
}

/// Character count of a text column, `0` for nulls.
pub fn char_lengths(dataset: &Dataset, column: &str) -> Result<Int64Array> {
    let Some(array) = dataset.column(column) else {
        return Ok(Int64Array::from(vec![0; dataset.num_rows()]));
    };
    let text = cast(array, &DataType::Utf8)?;
    let text = text
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| EtlError::Internal(format!("Column '{column}' is not text")))?;
    Ok(text
        .iter()
        .map(|v| Some(v.map(|s| s.chars().count() as i64).unwrap_or(0)))
        .collect())
}
