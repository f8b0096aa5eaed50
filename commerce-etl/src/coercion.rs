//! Coerce-or-null type conversion with an audit trail.
//!
//! Raw columns are converted to their declared type with Arrow's safe cast:
//! values that cannot be parsed become null instead of failing the run. Every
//! conversion compares null counts before and after so that silent loss is
//! visible in the logs and in the returned [`CoercionAudit`].

use crate::dataset::Dataset;
use crate::error::Result;
use crate::logging::EtlLogger;
use arrow::array::{Array, ArrayRef, AsArray, Int64Array, StringArray};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Logical column types a cleaner can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
    /// Naive timestamp with nanosecond precision
    Timestamp,
    Boolean,
    Text,
}

impl ColumnType {
    /// The Arrow type values are coerced to.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Integer => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Timestamp => DataType::Timestamp(TimeUnit::Nanosecond, None),
            Self::Boolean => DataType::Boolean,
            Self::Text => DataType::Utf8,
        }
    }

    /// Whether an Arrow type already satisfies this declaration.
    pub fn matches(&self, data_type: &DataType) -> bool {
        match self {
            Self::Text => is_text(data_type),
            other => *data_type == other.data_type(),
        }
    }

    /// Whether values of this type can be range-checked.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Boolean => write!(f, "boolean"),
            Self::Text => write!(f, "text"),
        }
    }
}

pub(crate) fn is_text(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

/// Before/after null counts of one column conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoercionAudit {
    pub column: String,
    pub target: ColumnType,
    pub nulls_before: usize,
    pub nulls_after: usize,
}

impl CoercionAudit {
    /// Values that were present but could not be converted.
    pub fn introduced_nulls(&self) -> usize {
        self.nulls_after.saturating_sub(self.nulls_before)
    }
}

/// Converts an array to `target`, turning unparseable values into nulls.
///
/// Text input is trimmed first, so `" 12.5 "` parses as `12.5` and blank
/// strings become null. An integer target accepts only integral values:
/// `2.5` (float or text) becomes null rather than being truncated to `2`,
/// while `4.0` and `"4.0"` become `4`.
pub fn coerce_array(array: &ArrayRef, target: ColumnType) -> Result<ArrayRef> {
    let target_type = target.data_type();
    if array.data_type() == &target_type {
        return Ok(Arc::clone(array));
    }

    let options = CastOptions {
        safe: true,
        ..Default::default()
    };

    let source = if is_text(array.data_type()) && target != ColumnType::Text {
        trimmed_text(array)?
    } else {
        Arc::clone(array)
    };

    if target == ColumnType::Integer
        && (is_text(source.data_type()) || source.data_type().is_floating())
    {
        return integral_values(&source, &options);
    }

    Ok(cast_with_options(&source, &target_type, &options)?)
}

/// Largest magnitude an `f64` can hold while every integer below it is exact.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

fn integral_values(source: &ArrayRef, options: &CastOptions) -> Result<ArrayRef> {
    // Integer literals in text parse exactly, beyond the float-exact range too.
    let exact = if is_text(source.data_type()) {
        Some(cast_with_options(source, &DataType::Int64, options)?)
    } else {
        None
    };
    let exact = exact.as_ref().map(|a| a.as_primitive::<Int64Type>());
    let floats = cast_with_options(source, &DataType::Float64, options)?;
    let floats = floats.as_primitive::<Float64Type>();

    let values: Int64Array = (0..floats.len())
        .map(|i| match exact {
            Some(exact) if exact.is_valid(i) => Some(exact.value(i)),
            _ => floats
                .is_valid(i)
                .then(|| floats.value(i))
                .filter(|v| v.fract() == 0.0 && v.abs() <= MAX_EXACT_FLOAT_INT)
                .map(|v| v as i64),
        })
        .collect();
    Ok(Arc::new(values))
}

fn trimmed_text(array: &ArrayRef) -> Result<ArrayRef> {
    let utf8 = cast_with_options(array, &DataType::Utf8, &CastOptions::default())?;
    let values = utf8
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| crate::error::EtlError::Internal("Expected a Utf8 array".to_string()))?;
    let trimmed: StringArray = values
        .iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()))
        .collect();
    Ok(Arc::new(trimmed))
}

/// Coerces one column of a dataset and logs the audit.
pub fn coerce_column(
    dataset: &Dataset,
    column: &str,
    target: ColumnType,
    logger: &EtlLogger,
) -> Result<(Dataset, CoercionAudit)> {
    let array = dataset.require_column(column)?;
    let nulls_before = array.logical_null_count();
    let coerced = coerce_array(array, target)?;
    let nulls_after = coerced.logical_null_count();

    logger.coercion_audit(dataset.name(), column, nulls_before, nulls_after);

    let audit = CoercionAudit {
        column: column.to_string(),
        target,
        nulls_before,
        nulls_after,
    };
    Ok((dataset.with_column(column, coerced)?, audit))
}

/// Coerces every declared column that is present; absent columns are skipped.
pub fn coerce_columns(
    dataset: &Dataset,
    columns: &[(&str, ColumnType)],
    logger: &EtlLogger,
) -> Result<(Dataset, Vec<CoercionAudit>)> {
    let mut current = dataset.clone();
    let mut audits = Vec::with_capacity(columns.len());
    for (column, target) in columns {
        if !current.has_column(column) {
            crate::perf_debug!(
                logger,
                table = dataset.name(),
                column = *column,
                "Skipping coercion of absent column"
            );
            continue;
        }
        let (next, audit) = coerce_column(&current, column, *target, logger)?;
        current = next;
        audits.push(audit);
    }
    Ok((current, audits))
}

/// Trims and lower-cases a categorical text column.
pub fn normalize_categorical(dataset: &Dataset, column: &str) -> Result<Dataset> {
    let array = dataset.require_column(column)?;
    let utf8 = cast_with_options(array, &DataType::Utf8, &CastOptions::default())?;
    let values = utf8
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| crate::error::EtlError::Internal("Expected a Utf8 array".to_string()))?;
    let normalized: StringArray = values
        .iter()
        .map(|v| v.map(|s| s.trim().to_lowercase()))
        .collect();
    dataset.with_column(column, Arc::new(normalized))
}
