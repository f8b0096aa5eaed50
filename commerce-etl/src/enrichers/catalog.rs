//! Validation and light normalization of reference catalogs.
//!
//! Catalogs are read-only inputs: they are checked, their declared columns
//! are coerced, and they are projected onto the columns a join brings in.
//! They are never deduplicated or null-filled.

use crate::cleaners::RangeRule;
use crate::coercion::{coerce_columns, ColumnType};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::logging::EtlLogger;
use crate::validation::SchemaValidator;

/// Column contract of a catalog as one enricher uses it.
#[derive(Debug, Clone, Copy)]
pub struct CatalogSpec {
    pub name: &'static str,
    /// Join key shared with the driving table.
    pub key: &'static str,
    /// Columns kept for the join, key included. All must be present.
    pub columns: &'static [&'static str],
    pub non_null_columns: &'static [&'static str],
    pub column_types: &'static [(&'static str, ColumnType)],
    pub ranges: &'static [RangeRule],
}

impl CatalogSpec {
    /// Validates, coerces and projects a catalog.
    pub fn prepare(&self, catalog: &Dataset, logger: &EtlLogger) -> Result<Dataset> {
        let catalog = catalog.with_name(self.name);
        let validator = SchemaValidator::new(&catalog, logger);
        validator.validate_required_columns(self.columns)?;
        validator.validate_no_nulls(Some(self.non_null_columns))?;

        let (coerced, _audits) = coerce_columns(&catalog, self.column_types, logger)?;
        let validator = SchemaValidator::new(&coerced, logger);
        for rule in self.ranges {
            validator.validate_numeric_range(rule.column, rule.min, rule.max)?;
        }

        coerced.select(self.columns)
    }
}
