//! DataFusion query context for enrichment joins and aggregations.
//!
//! Every query runs in its own [`SessionContext`] so table registrations from
//! one aggregation never leak into another.

use crate::dataset::Dataset;
use crate::error::{ErrorContext, Result};
use datafusion::datasource::MemTable;
use datafusion::execution::context::SessionConfig;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Execution settings for query sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlContextConfig {
    /// Rows per Arrow batch
    pub batch_size: usize,
    /// Parallelism of each query plan
    pub target_partitions: usize,
}

impl Default for EtlContextConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: num_cpus::get(),
        }
    }
}

/// Factory for query sessions with shared execution settings.
#[derive(Debug, Clone, Default)]
pub struct EtlContext {
    config: EtlContextConfig,
}

impl EtlContext {
    pub fn new(config: EtlContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EtlContextConfig {
        &self.config
    }

    /// Creates a fresh session.
    pub fn session(&self) -> SessionContext {
        let config = SessionConfig::new()
            .with_target_partitions(self.config.target_partitions.max(1))
            .with_batch_size(self.config.batch_size.max(1));
        SessionContext::new_with_config(config)
    }

    /// Registers `inputs` under their given table names, runs `sql` and
    /// collects the result into a dataset called `output_name`.
    ///
    /// Empty inputs are fine: the result is then an empty dataset with the
    /// query's output schema.
    #[instrument(skip(self, inputs, sql), fields(output = output_name, tables = inputs.len()))]
    pub async fn query(
        &self,
        inputs: &[(&str, &Dataset)],
        sql: &str,
        output_name: &str,
    ) -> Result<Dataset> {
        let ctx = self.session();
        for (table, dataset) in inputs {
            let mem = MemTable::try_new(dataset.schema(), vec![vec![dataset.batch().clone()]])?;
            ctx.register_table(*table, Arc::new(mem))?;
        }

        debug!(sql, "Executing query");
        let df = ctx
            .sql(sql)
            .await
            .with_context(|| format!("Planning query for '{output_name}'"))?;
        let schema = Arc::clone(df.schema().inner());
        let batches = df
            .collect()
            .await
            .with_context(|| format!("Executing query for '{output_name}'"))?;
        // Physical output may refine nullability; trust the batches when present.
        let schema = batches.first().map(|b| b.schema()).unwrap_or(schema);
        let result = Dataset::from_batches(output_name, schema, &batches)?;
        debug!(rows = result.num_rows(), "Query finished");
        Ok(result)
    }
}
