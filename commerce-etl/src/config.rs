//! Pipeline configuration.
//!
//! Thresholds are handed to the aggregators by the orchestrator; the core
//! never discovers them on its own.

use crate::context::EtlContextConfig;
use crate::error::{EtlError, Result};
use crate::security::check_fraction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Parameters of the ranking and filtering aggregations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationThresholds {
    pub top_spenders_n: usize,
    /// Spend quantile a customer must reach to rank as a top spender.
    pub top_spenders_percentile: f64,
    pub recurring_min_orders: usize,
    pub top_products_n: usize,
    pub low_stock_items_n: usize,
    pub min_reviews_for_product: usize,
    pub top_reviewed_products_n: usize,
}

impl Default for AggregationThresholds {
    fn default() -> Self {
        Self {
            top_spenders_n: 5,
            top_spenders_percentile: 0.8,
            recurring_min_orders: 2,
            top_products_n: 10,
            low_stock_items_n: 20,
            min_reviews_for_product: 3,
            top_reviewed_products_n: 20,
        }
    }
}

/// Which file formats the loading stage writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFormats {
    pub csv: bool,
    pub parquet: bool,
}

impl Default for OutputFormats {
    fn default() -> Self {
        Self {
            csv: true,
            parquet: true,
        }
    }
}

/// Top-level configuration of an ETL run.
///
/// # Examples
///
/// ```rust
/// use commerce_etl::config::PipelineConfig;
///
/// let config = PipelineConfig::from_json_str(
///     r#"{ "thresholds": { "top_spenders_n": 3 }, "output_formats": { "parquet": false } }"#,
/// )
/// .unwrap();
/// assert_eq!(config.thresholds.top_spenders_n, 3);
/// assert_eq!(config.thresholds.recurring_min_orders, 2);
/// assert!(config.output_formats.csv);
/// assert!(!config.output_formats.parquet);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub thresholds: AggregationThresholds,
    /// Logical table name to source file stem.
    pub source_tables: BTreeMap<String, String>,
    pub output_formats: OutputFormats,
    pub context: EtlContextConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let source_tables = [
            "orders",
            "order_items",
            "customers",
            "promotions",
            "products",
            "reviews",
            "inventory",
            "warehouses",
        ]
        .into_iter()
        .map(|name| (name.to_string(), format!("ecommerce_{name}")))
        .collect();

        Self {
            thresholds: AggregationThresholds::default(),
            source_tables,
            output_formats: OutputFormats::default(),
            context: EtlContextConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Configuration(format!(
                "Cannot read configuration file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        check_fraction(
            self.thresholds.top_spenders_percentile,
            "top_spenders_percentile",
        )?;
        if self.source_tables.is_empty() {
            return Err(EtlError::Configuration(
                "source_tables must map at least one logical table".to_string(),
            ));
        }
        if let Some((name, _)) = self
            .source_tables
            .iter()
            .find(|(name, stem)| name.trim().is_empty() || stem.trim().is_empty())
        {
            return Err(EtlError::Configuration(format!(
                "source_tables entry '{name}' has an empty name or file stem"
            )));
        }
        Ok(())
    }

    /// Source file stem of a logical table, falling back to the name itself.
    pub fn source_for<'a>(&'a self, logical: &'a str) -> &'a str {
        self.source_tables
            .get(logical)
            .map(String::as_str)
            .unwrap_or(logical)
    }

    pub fn with_thresholds(mut self, thresholds: AggregationThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_output_formats(mut self, output_formats: OutputFormats) -> Self {
        self.output_formats = output_formats;
        self
    }

    pub fn with_context(mut self, context: EtlContextConfig) -> Self {
        self.context = context;
        self
    }

    pub fn with_source_table(mut self, logical: impl Into<String>, stem: impl Into<String>) -> Self {
        self.source_tables.insert(logical.into(), stem.into());
        self
    }
}
