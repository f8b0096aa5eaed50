//! Stateless structural and data-quality checks on a dataset.
//!
//! Every check is fail-fast: it reports the problem as a typed
//! [`SchemaValidationError`] and never repairs the table.

use crate::coercion::ColumnType;
use crate::dataset::Dataset;
use crate::error::{Result, SchemaValidationError};
use crate::logging::EtlLogger;
use arrow::array::{Array, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use std::collections::HashSet;

/// Runs schema checks against one table.
///
/// # Examples
///
/// ```rust
/// use arrow::array::{ArrayRef, Int64Array};
/// use commerce_etl::dataset::Dataset;
/// use commerce_etl::logging::EtlLogger;
/// use commerce_etl::validation::SchemaValidator;
/// use std::sync::Arc;
///
/// let reviews = Dataset::try_from_columns(
///     "reviews",
///     vec![("rating", Arc::new(Int64Array::from(vec![1, 5, 7])) as ArrayRef)],
/// )
/// .unwrap();
/// let logger = EtlLogger::transformation();
/// let validator = SchemaValidator::new(&reviews, &logger);
///
/// assert!(validator.validate_required_columns(&["rating"]).is_ok());
/// let err = validator
///     .validate_numeric_range("rating", Some(1.0), Some(5.0))
///     .unwrap_err();
/// assert_eq!(err.kind(), "RangeValidationError");
/// ```
pub struct SchemaValidator<'a> {
    dataset: &'a Dataset,
    logger: &'a EtlLogger,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(dataset: &'a Dataset, logger: &'a EtlLogger) -> Self {
        Self { dataset, logger }
    }

    fn table(&self) -> String {
        self.dataset.name().to_string()
    }

    /// Fails listing every declared column that is absent.
    pub fn validate_required_columns(&self, columns: &[&str]) -> Result<()> {
        let missing: Vec<String> = columns
            .iter()
            .filter(|c| !self.dataset.has_column(c))
            .map(|c| (*c).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(self
                .logger
                .raise(SchemaValidationError::MissingRequiredColumns {
                    table: self.table(),
                    columns: missing,
                }));
        }
        crate::perf_debug!(
            self.logger,
            table = self.dataset.name(),
            columns = columns.len(),
            "Required columns present"
        );
        Ok(())
    }

    /// Fails listing every column that is not in `allowed`.
    pub fn validate_allowed_columns(&self, allowed: &[&str]) -> Result<()> {
        let unexpected: Vec<String> = self
            .dataset
            .column_names()
            .into_iter()
            .filter(|c| !allowed.contains(c))
            .map(String::from)
            .collect();
        if !unexpected.is_empty() {
            return Err(self.logger.raise(SchemaValidationError::UnexpectedColumns {
                table: self.table(),
                columns: unexpected,
            }));
        }
        Ok(())
    }

    /// Fails naming every column that holds nulls, with its null count.
    ///
    /// `None` checks all columns.
    pub fn validate_no_nulls(&self, columns: Option<&[&str]>) -> Result<()> {
        let all = self.dataset.column_names();
        let columns = columns.unwrap_or(&all);
        self.validate_required_columns(columns)?;

        let violations: Vec<(String, usize)> = columns
            .iter()
            .filter_map(|c| {
                self.dataset
                    .null_count(c)
                    .filter(|n| *n > 0)
                    .map(|n| ((*c).to_string(), n))
            })
            .collect();
        if !violations.is_empty() {
            return Err(self.logger.raise(SchemaValidationError::NullConstraint {
                table: self.table(),
                violations,
            }));
        }
        Ok(())
    }

    /// Fails with the number of non-null values outside `[min, max]`.
    ///
    /// Nulls are not range violations.
    pub fn validate_numeric_range(
        &self,
        column: &str,
        min_value: Option<f64>,
        max_value: Option<f64>,
    ) -> Result<()> {
        self.validate_required_columns(&[column])?;
        let array = self.dataset.require_column(column)?;
        if !array.data_type().is_numeric() {
            return Err(self.logger.raise(SchemaValidationError::DataTypeMismatch {
                table: self.table(),
                column: column.to_string(),
                expected: "numeric".to_string(),
                found: array.data_type().to_string(),
            }));
        }

        let values = cast(array, &DataType::Float64)?;
        let values = values
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| crate::error::EtlError::Internal("Expected Float64 values".into()))?;

        let below = min_value
            .map(|min| values.iter().flatten().filter(|v| *v < min).count())
            .unwrap_or(0);
        let above = max_value
            .map(|max| values.iter().flatten().filter(|v| *v > max).count())
            .unwrap_or(0);

        if below + above > 0 {
            let bound = match (below > 0, above > 0, min_value, max_value) {
                (true, true, Some(min), Some(max)) => format!("range [{min}, {max}]"),
                (true, _, Some(min), _) => format!("min_value {min}"),
                (_, _, _, Some(max)) => format!("max_value {max}"),
                _ => "declared range".to_string(),
            };
            return Err(self.logger.raise(SchemaValidationError::RangeValidation {
                table: self.table(),
                column: column.to_string(),
                violations: below + above,
                bound,
            }));
        }
        Ok(())
    }

    /// Fails with the number of rows whose key combination already occurred.
    pub fn validate_unique_values(&self, columns: &[&str]) -> Result<()> {
        self.validate_required_columns(columns)?;
        let rows = self.dataset.key_rows(columns)?;
        let distinct: HashSet<_> = rows.iter().collect();
        let duplicates = self.dataset.num_rows() - distinct.len();
        if duplicates > 0 {
            return Err(self.logger.raise(SchemaValidationError::DuplicateKey {
                table: self.table(),
                columns: columns.iter().map(|c| (*c).to_string()).collect(),
                duplicates,
            }));
        }
        Ok(())
    }

    /// Fails on the first column whose Arrow type does not match its declaration.
    pub fn validate_column_types(&self, columns: &[(&str, ColumnType)]) -> Result<()> {
        for (column, expected) in columns {
            let array = self.dataset.require_column(column)?;
            if !expected.matches(array.data_type()) {
                return Err(self.logger.raise(SchemaValidationError::DataTypeMismatch {
                    table: self.table(),
                    column: (*column).to_string(),
                    expected: expected.to_string(),
                    found: array.data_type().to_string(),
                }));
            }
        }
        Ok(())
    }
}
