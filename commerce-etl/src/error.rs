//! Error types for the commerce ETL pipeline.
//!
//! Failures fall into two families. [`SchemaValidationError`] covers the typed
//! structural and data-quality checks run by the validator, cleaners and
//! enrichers; each variant names the offending table and columns. [`EtlError`]
//! is the crate-wide error that wraps those checks together with generic
//! post-condition violations and the errors of the underlying engine.

use std::fmt;
use thiserror::Error;

/// A violated structural or data-quality contract on a table.
///
/// These are never repaired locally: they abort the pipeline of the entity
/// whose table failed the check.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaValidationError {
    /// One or more declared columns are absent.
    #[error("Table '{table}' is missing required columns: {}", .columns.join(", "))]
    MissingRequiredColumns { table: String, columns: Vec<String> },

    /// Columns outside a strict allow-list are present.
    #[error("Table '{table}' has unexpected columns: {}", .columns.join(", "))]
    UnexpectedColumns { table: String, columns: Vec<String> },

    /// A column does not carry the declared type.
    #[error("Table '{table}' column '{column}' has type {found}, expected {expected}")]
    DataTypeMismatch {
        table: String,
        column: String,
        expected: String,
        found: String,
    },

    /// Null values in columns that must be complete.
    #[error("Table '{table}' has null values in: {}", format_null_counts(.violations))]
    NullConstraint {
        table: String,
        /// `(column, null_count)` for every offending column.
        violations: Vec<(String, usize)>,
    },

    /// Values outside a declared numeric domain.
    #[error("Table '{table}' column '{column}' has {violations} rows violating {bound}")]
    RangeValidation {
        table: String,
        column: String,
        violations: usize,
        bound: String,
    },

    /// Key combinations that occur more than once.
    #[error("Table '{table}' has {duplicates} duplicate rows on key ({})", .columns.join(", "))]
    DuplicateKey {
        table: String,
        columns: Vec<String>,
        duplicates: usize,
    },
}

fn format_null_counts(violations: &[(String, usize)]) -> String {
    violations
        .iter()
        .map(|(column, count)| format!("{column} ({count} nulls)"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SchemaValidationError {
    /// Returns the taxonomy name of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingRequiredColumns { .. } => "MissingRequiredColumnsError",
            Self::UnexpectedColumns { .. } => "UnexpectedColumnsError",
            Self::DataTypeMismatch { .. } => "DataTypeMismatchError",
            Self::NullConstraint { .. } => "NullConstraintError",
            Self::RangeValidation { .. } => "RangeValidationError",
            Self::DuplicateKey { .. } => "DuplicateKeyError",
        }
    }

    /// Returns the table the failed check ran against.
    pub fn table(&self) -> &str {
        match self {
            Self::MissingRequiredColumns { table, .. }
            | Self::UnexpectedColumns { table, .. }
            | Self::DataTypeMismatch { table, .. }
            | Self::NullConstraint { table, .. }
            | Self::RangeValidation { table, .. }
            | Self::DuplicateKey { table, .. } => table,
        }
    }
}

/// A failed entity pipeline, reported alongside its siblings.
#[derive(Debug)]
pub struct EntityFailure {
    /// Logical entity name (`orders`, `inventory`, `reviews`).
    pub entity: String,
    /// The error that stopped it.
    pub error: Box<EtlError>,
}

impl fmt::Display for EntityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.error)
    }
}

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum EtlError {
    /// A typed schema or data-quality check failed.
    #[error("Schema validation failed: {0}")]
    SchemaValidation(#[from] SchemaValidationError),

    /// A generic data-quality post-condition failed.
    #[error("Data quality error in '{table}': {message}")]
    DataQuality { table: String, message: String },

    /// Cleaning produced an inconsistent table outside the typed checks.
    #[error("Cleaning invariant violated in '{table}': {message}")]
    CleaningInvariant { table: String, message: String },

    /// One or more independent entity pipelines failed.
    #[error("{} entity pipeline(s) failed: {}", .0.len(), format_failures(.0))]
    EntityFailures(Vec<EntityFailure>),

    /// Error reading or writing a data source or sink.
    #[error("Data source error ({source_type}): {message}")]
    DataSource {
        /// Kind of collaborator (e.g. "CSV", "Parquet", "directory")
        source_type: String,
        message: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from Parquet encoding.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from JSON (de)serialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration or parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unsafe identifier or expression.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_failures(failures: &[EntityFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A type alias for `Result<T, EtlError>`.
pub type Result<T> = std::result::Result<T, EtlError>;

impl EtlError {
    /// Creates a data-quality error.
    pub fn data_quality(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataQuality {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a cleaning-invariant error.
    pub fn cleaning_invariant(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CleaningInvariant {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a data source error.
    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
        }
    }

    /// Returns the taxonomy name of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaValidation(inner) => inner.kind(),
            Self::DataQuality { .. } => "DataQualityError",
            Self::CleaningInvariant { .. } => "CleaningInvariantError",
            Self::EntityFailures(_) => "EntityFailures",
            Self::DataSource { .. } => "DataSourceError",
            Self::DataFusion(_) => "DataFusionError",
            Self::Arrow(_) => "ArrowError",
            Self::Parquet(_) => "ParquetError",
            Self::Io(_) => "IoError",
            Self::Serialization(_) => "SerializationError",
            Self::Configuration(_) => "ConfigurationError",
            Self::SecurityError(_) => "SecurityError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Returns the wrapped schema validation error, if any.
    pub fn as_schema_validation(&self) -> Option<&SchemaValidationError> {
        match self {
            Self::SchemaValidation(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<EtlError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e.into() {
            // Typed failures keep their variant so callers can still match on them.
            err @ (EtlError::SchemaValidation(_)
            | EtlError::DataQuality { .. }
            | EtlError::CleaningInvariant { .. }
            | EtlError::EntityFailures(_)) => err,
            EtlError::Internal(inner) => EtlError::Internal(format!("{}: {inner}", f())),
            other => EtlError::Internal(format!("{}: {other}", f())),
        })
    }
}
