//! Business metrics computed from enriched tables.
//!
//! Aggregators are read-only: they register the enriched table in a fresh
//! query session and return a new result table or scalar. Empty inputs give
//! empty or zero-valued results; a missing grouping column fails with
//! `MissingRequiredColumns` before any query runs.

mod customer;
mod inventory;
mod lifecycle;
mod product;
mod review;
mod sales;

pub use customer::CustomerAnalytics;
pub use inventory::InventoryAnalytics;
pub use lifecycle::OrderLifecycle;
pub use product::ProductAnalytics;
pub use review::ReviewAnalytics;
pub use sales::SalesAnalytics;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::logging::EtlLogger;
use crate::validation::SchemaValidator;
use arrow::array::Array;

/// Table name an aggregator's input is registered under.
pub(crate) const INPUT: &str = "enriched";

pub(crate) fn require_columns(dataset: &Dataset, columns: &[&str], logger: &EtlLogger) -> Result<()> {
    SchemaValidator::new(dataset, logger).validate_required_columns(columns)
}

/// First value of a one-row result, `0.0` when absent or null.
pub(crate) fn first_value(dataset: &Dataset, column: &str) -> Result<f64> {
    let values = dataset.float_values(column)?;
    if values.is_empty() || values.is_null(0) {
        return Ok(0.0);
    }
    Ok(values.value(0))
}

/// Linear-interpolated quantile of `values`; `None` when there are none.
pub(crate) fn quantile(values: &mut [f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let position = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(values[lower] + (values[upper] - values[lower]) * weight)
}
