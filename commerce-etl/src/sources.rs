//! Extraction collaborators that read raw tables into datasets.
//!
//! The transform stage only needs a mapping of logical table name to
//! [`Dataset`]; an [`Extractor`] produces one entry of that mapping at a time.

use crate::dataset::{Dataset, DatasetMetadata};
use crate::error::{EtlError, Result};
use crate::logging::EtlLogger;
use async_trait::async_trait;
use chrono::Utc;
use datafusion::prelude::{CsvReadOptions, SessionContext};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

/// A source of raw tables addressed by name.
///
/// # Examples
///
/// ```rust,no_run
/// use commerce_etl::logging::EtlLogger;
/// use commerce_etl::sources::{CsvExtractor, Extractor};
///
/// # async fn example() -> commerce_etl::error::Result<()> {
/// let extractor = CsvExtractor::new("data/raw", EtlLogger::extraction())?;
/// let orders = extractor.extract("ecommerce_orders").await?;
/// println!("{} orders", orders.num_rows());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Extractor: Debug + Send + Sync {
    /// Reads the table called `name`.
    async fn extract(&self, name: &str) -> Result<Dataset>;

    /// Human-readable description of where tables come from.
    fn description(&self) -> String;
}

/// Reads `<root>/<name>.csv` files with a header row.
#[derive(Debug, Clone)]
pub struct CsvExtractor {
    root: PathBuf,
    delimiter: u8,
    logger: EtlLogger,
}

impl CsvExtractor {
    /// Creates an extractor over an existing directory.
    pub fn new(root: impl AsRef<Path>, logger: EtlLogger) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let logger = logger.for_component("csv_extractor");
        if !root.is_dir() {
            return Err(logger.raise(EtlError::data_source(
                "directory",
                format!("source directory '{}' does not exist", root.display()),
            )));
        }
        Ok(Self {
            root,
            delimiter: b',',
            logger,
        })
    }

    /// Uses a field delimiter other than `,`.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.csv"))
    }
}

#[async_trait]
impl Extractor for CsvExtractor {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn extract(&self, name: &str) -> Result<Dataset> {
        if name.trim().is_empty() {
            return Err(self
                .logger
                .raise(EtlError::Configuration("table name must not be empty".to_string())));
        }
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(self.logger.raise(EtlError::data_source(
                "CSV",
                format!("file '{}' does not exist", path.display()),
            )));
        }
        let path_str = path.to_str().ok_or_else(|| {
            self.logger.raise(EtlError::data_source(
                "CSV",
                format!("path '{}' is not valid UTF-8", path.display()),
            ))
        })?;

        let options = CsvReadOptions::new()
            .has_header(true)
            .delimiter(self.delimiter);
        let df = SessionContext::new()
            .read_csv(path_str, options)
            .await
            .map_err(|e| self.logger.raise(e))?;
        let schema = Arc::clone(df.schema().inner());
        let batches = df.collect().await.map_err(|e| self.logger.raise(e))?;
        let schema = batches.first().map(|b| b.schema()).unwrap_or(schema);
        let dataset = Dataset::from_batches(name, schema, &batches)?;

        let profile = dataset.profile();
        crate::log_data_op!(
            self.logger,
            table = name,
            rows = profile.rows,
            columns = profile.columns,
            missing = profile.missing_values,
            "Extracted table"
        );
        let metadata = DatasetMetadata {
            source: Some(path.display().to_string()),
            extracted_at: Some(Utc::now()),
            profile: Some(profile),
            ..DatasetMetadata::default()
        };
        Ok(dataset.with_metadata(metadata))
    }

    fn description(&self) -> String {
        format!("CSV files in {}", self.root.display())
    }
}
