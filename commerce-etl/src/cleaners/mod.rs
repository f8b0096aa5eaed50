//! Cleaning of raw entity tables.
//!
//! Every cleaner runs the same four phases in a fixed order:
//!
//! 1. [`DataCleaner::handle_nulls`] rejects nulls in null-intolerant columns and
//!    fills the null-tolerant ones with their declared [`NullStrategy`].
//! 2. [`DataCleaner::handle_duplicates`] keeps the last row per key.
//! 3. [`DataCleaner::convert_types`] coerces declared columns, turning
//!    unparseable values into nulls and auditing the loss.
//! 4. [`DataCleaner::validate_cleaned_data`] re-checks required columns, nulls
//!    left by coercion in null-intolerant columns, ranges and key uniqueness.
//!
//! What differs between entities is data, not behavior: each cleaner exposes an
//! [`EntitySchema`] of constant column tables and inherits the phase logic.
//!
//! # Examples
//!
//! ```rust
//! use arrow::array::{ArrayRef, Int64Array};
//! use commerce_etl::cleaners::{DataCleaner, InventoryCleaner};
//! use commerce_etl::dataset::Dataset;
//! use commerce_etl::logging::EtlLogger;
//! use std::sync::Arc;
//!
//! let raw = Dataset::try_from_columns(
//!     "inventory",
//!     vec![
//!         ("inventory_id", Arc::new(Int64Array::from(vec![Some(1), None])) as ArrayRef),
//!         ("product_id", Arc::new(Int64Array::from(vec![10, 11])) as ArrayRef),
//!         ("warehouse_id", Arc::new(Int64Array::from(vec![1, 1])) as ArrayRef),
//!         ("quantity", Arc::new(Int64Array::from(vec![5, 6])) as ArrayRef),
//!         ("min_stock_level", Arc::new(Int64Array::from(vec![1, 1])) as ArrayRef),
//!         ("max_stock_level", Arc::new(Int64Array::from(vec![9, 9])) as ArrayRef),
//!     ],
//! )
//! .unwrap();
//!
//! let err = InventoryCleaner::new(EtlLogger::transformation()).clean(&raw).unwrap_err();
//! assert_eq!(err.kind(), "NullConstraintError");
//! assert!(err.to_string().contains("inventory_id"));
//! ```

mod inventory;
mod orders;
mod reviews;
mod strategy;

pub use inventory::InventoryCleaner;
pub use orders::OrdersCleaner;
pub use reviews::ReviewsCleaner;
pub use strategy::{fill_nulls, FillValue, NullStrategy};

use crate::coercion::{coerce_columns, normalize_categorical, ColumnType};
use crate::dataset::Dataset;
use crate::error::{EtlError, Result};
use crate::logging::EtlLogger;
use crate::validation::SchemaValidator;
use arrow::array::UInt32Array;
use std::collections::HashSet;
use tracing::instrument;

/// An inclusive numeric domain declared for a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeRule {
    pub column: &'static str,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeRule {
    pub const fn non_negative(column: &'static str) -> Self {
        Self {
            column,
            min: Some(0.0),
            max: None,
        }
    }

    pub const fn between(column: &'static str, min: f64, max: f64) -> Self {
        Self {
            column,
            min: Some(min),
            max: Some(max),
        }
    }
}

/// Per-entity column contract driving the four cleaning phases.
#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    /// Logical entity name, used in log events.
    pub entity: &'static str,
    /// Columns identifying a row; deduplication and uniqueness use them.
    pub key_columns: &'static [&'static str],
    /// Columns that must be present after cleaning.
    pub required_columns: &'static [&'static str],
    /// Columns that must never hold nulls.
    pub non_null_columns: &'static [&'static str],
    /// Null-tolerant columns and how to fill them. Absent columns are skipped.
    pub null_strategies: &'static [(&'static str, NullStrategy)],
    /// Declared column types for coercion. Absent columns are skipped.
    pub column_types: &'static [(&'static str, ColumnType)],
    /// Text columns trimmed and lower-cased during type conversion.
    pub categorical_columns: &'static [&'static str],
    pub ranges: &'static [RangeRule],
}

/// The four-phase cleaning contract.
///
/// Implementors provide their [`EntitySchema`] and logger; the phases and
/// [`DataCleaner::clean`] are provided.
pub trait DataCleaner: Send + Sync {
    fn schema(&self) -> &EntitySchema;

    fn logger(&self) -> &EtlLogger;

    /// Rejects nulls in null-intolerant columns, then fills the tolerant ones.
    fn handle_nulls(&self, dataset: &Dataset) -> Result<Dataset> {
        let schema = self.schema();
        SchemaValidator::new(dataset, self.logger())
            .validate_no_nulls(Some(schema.non_null_columns))?;

        let mut current = dataset.clone();
        for (column, strategy) in schema.null_strategies {
            if !current.has_column(column) {
                continue;
            }
            let before = current.null_count(column).unwrap_or(0);
            current = fill_nulls(&current, column, *strategy)?;
            if before > 0 {
                crate::log_data_op!(
                    self.logger(),
                    table = dataset.name(),
                    column = *column,
                    filled = before,
                    strategy = ?strategy,
                    "Filled null values"
                );
            }
        }
        Ok(current)
    }

    /// Drops rows whose key reappears later, keeping the last occurrence.
    fn handle_duplicates(&self, dataset: &Dataset) -> Result<Dataset> {
        let deduplicated = keep_last_by_key(dataset, self.schema().key_columns)?;
        let removed = dataset.num_rows() - deduplicated.num_rows();
        if removed > 0 {
            crate::log_data_op!(
                self.logger(),
                table = dataset.name(),
                removed,
                "Removed duplicate rows"
            );
        }
        Ok(deduplicated)
    }

    /// Coerces declared columns and normalizes categorical text.
    fn convert_types(&self, dataset: &Dataset) -> Result<Dataset> {
        let schema = self.schema();
        let (mut current, _audits) = coerce_columns(dataset, schema.column_types, self.logger())?;
        for column in schema.categorical_columns {
            if current.has_column(column) {
                current = normalize_categorical(&current, column)?;
            }
        }
        Ok(current)
    }

    /// Re-validates the processed table against the entity contract.
    fn validate_cleaned_data(&self, dataset: &Dataset) -> Result<Dataset> {
        let schema = self.schema();
        let validator = SchemaValidator::new(dataset, self.logger());
        validator.validate_required_columns(schema.required_columns)?;
        validator.validate_no_nulls(Some(schema.non_null_columns))?;
        for rule in schema.ranges {
            if dataset.has_column(rule.column) {
                validator.validate_numeric_range(rule.column, rule.min, rule.max)?;
            }
        }
        validator.validate_unique_values(schema.key_columns)?;
        Ok(dataset.clone())
    }

    /// Runs the four phases in order.
    #[instrument(skip_all, fields(entity = self.schema().entity, rows = dataset.num_rows()))]
    fn clean(&self, dataset: &Dataset) -> Result<Dataset> {
        let input_rows = dataset.num_rows();
        let current = self.handle_nulls(dataset)?;
        let current = self.handle_duplicates(&current)?;
        let current = self.convert_types(&current)?;
        let cleaned = self.validate_cleaned_data(&current)?;

        check_invariants(&cleaned, input_rows, self.schema(), self.logger())?;
        crate::log_data_op!(
            self.logger(),
            table = dataset.name(),
            rows_in = input_rows,
            rows_out = cleaned.num_rows(),
            "Cleaning finished"
        );
        Ok(cleaned)
    }
}

/// Keeps the last row of every key combination, in original row order.
pub fn keep_last_by_key(dataset: &Dataset, key_columns: &[&str]) -> Result<Dataset> {
    if dataset.is_empty() {
        return Ok(dataset.clone());
    }
    let rows = dataset.key_rows(key_columns)?;
    let mut seen = HashSet::with_capacity(rows.num_rows());
    let mut keep: Vec<u32> = Vec::with_capacity(rows.num_rows());
    for idx in (0..rows.num_rows()).rev() {
        if seen.insert(rows.row(idx)) {
            let idx = u32::try_from(idx).map_err(|_| {
                EtlError::Internal(format!("Table '{}' exceeds u32 rows", dataset.name()))
            })?;
            keep.push(idx);
        }
    }
    if keep.len() == dataset.num_rows() {
        return Ok(dataset.clone());
    }
    keep.reverse();
    dataset.take(&UInt32Array::from(keep))
}

fn check_invariants(
    cleaned: &Dataset,
    input_rows: usize,
    schema: &EntitySchema,
    logger: &EtlLogger,
) -> Result<()> {
    if cleaned.num_rows() > input_rows {
        return Err(logger.raise(EtlError::cleaning_invariant(
            cleaned.name(),
            format!(
                "row count grew from {input_rows} to {}",
                cleaned.num_rows()
            ),
        )));
    }
    for key in schema.key_columns {
        if let Some(nulls) = cleaned.null_count(key).filter(|n| *n > 0) {
            return Err(logger.raise(EtlError::cleaning_invariant(
                cleaned.name(),
                format!("key column '{key}' has {nulls} nulls after cleaning"),
            )));
        }
    }
    Ok(())
}
