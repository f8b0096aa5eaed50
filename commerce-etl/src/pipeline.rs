//! Orchestration of extract, transform and load.
//!
//! [`EtlPipeline::transform`] is the core: it cleans and enriches the three
//! entity tables, then computes every business metric. The entity pipelines
//! are independent, so all three are attempted; when any fails the run stops
//! before aggregation and reports every failure at once.

use crate::aggregators::{
    CustomerAnalytics, InventoryAnalytics, OrderLifecycle, ProductAnalytics, ReviewAnalytics,
    SalesAnalytics,
};
use crate::config::PipelineConfig;
use crate::context::EtlContext;
use crate::dataset::{Dataset, DatasetMetadata};
use crate::enrichers::{
    Enricher, InventoryCatalogs, InventoryEnricher, OrdersCatalogs, OrdersEnricher,
    ReviewsCatalogs, ReviewsEnricher,
};
use crate::error::{EntityFailure, EtlError, Result};
use crate::logging::{EtlLogger, LogConfig};
use crate::sinks::{CsvLoader, Loader, ParquetLoader};
use crate::sources::Extractor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument};

/// Entity tables produced by enrichment.
pub const ENTITIES: [&str; 3] = ["orders", "inventory", "reviews"];

/// Names of every metric produced by [`EtlPipeline::transform`].
pub const RESULT_NAMES: [&str; 16] = [
    "top_spenders",
    "recurring_customers",
    "average_ticket",
    "top_products",
    "monthly_sales",
    "promotion_usage_rate",
    "status_funnel",
    "cancellation_rate",
    "delivery_rate",
    "backlog_in_progress",
    "inventory_health",
    "low_stock_items",
    "warehouse_utilization",
    "reviews_overview",
    "reviews_by_product",
    "reviews_monthly",
];

/// Enriched entity tables and metric tables, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub enriched: BTreeMap<String, Dataset>,
    pub results: BTreeMap<String, Dataset>,
}

/// Timing of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StageTiming {
    fn since(started_at: DateTime<Utc>, clock: Instant) -> Self {
        Self {
            started_at,
            duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetrics {
    pub timing: StageTiming,
    pub tables_extracted: usize,
    pub total_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationMetrics {
    pub timing: StageTiming,
    pub tables_enriched: usize,
    pub metrics_generated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingMetrics {
    pub timing: StageTiming,
    pub files_written: usize,
    /// Where each file landed, in write order.
    pub files: Vec<DatasetMetadata>,
}

/// Summary of a full run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub extraction: ExtractionMetrics,
    pub transformation: TransformationMetrics,
    pub loading: LoadingMetrics,
}

/// Runs the batch: extract every configured table, transform, load.
///
/// # Examples
///
/// ```rust,no_run
/// use commerce_etl::config::PipelineConfig;
/// use commerce_etl::logging::EtlLogger;
/// use commerce_etl::pipeline::EtlPipeline;
/// use commerce_etl::sources::CsvExtractor;
///
/// # async fn example() -> commerce_etl::error::Result<()> {
/// let pipeline = EtlPipeline::new(PipelineConfig::default());
/// let extractor = CsvExtractor::new("data/raw", EtlLogger::extraction())?;
/// let loaders = pipeline.loaders_for("data/processed");
/// let report = pipeline.run(&extractor, &loaders).await?;
/// println!("{}", serde_json::to_string_pretty(&report)?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EtlPipeline {
    config: PipelineConfig,
    ctx: EtlContext,
    extraction: EtlLogger,
    transformation: EtlLogger,
    loading: EtlLogger,
}

impl EtlPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_log_config(config, LogConfig::default())
    }

    pub fn with_log_config(config: PipelineConfig, log_config: LogConfig) -> Self {
        let transformation = EtlLogger::new("transformation", log_config);
        Self {
            ctx: EtlContext::new(config.context.clone()),
            config,
            extraction: transformation.for_stage("extraction"),
            loading: transformation.for_stage("loading"),
            transformation,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loaders for the output formats enabled in the configuration.
    pub fn loaders_for(&self, root: impl AsRef<Path>) -> Vec<Box<dyn Loader>> {
        let root = root.as_ref();
        let mut loaders: Vec<Box<dyn Loader>> = Vec::new();
        if self.config.output_formats.csv {
            loaders.push(Box::new(CsvLoader::new(root, self.loading.clone())));
        }
        if self.config.output_formats.parquet {
            loaders.push(Box::new(ParquetLoader::new(root, self.loading.clone())));
        }
        loaders
    }

    /// Reads every configured source table, keyed by logical name.
    #[instrument(skip_all, fields(source = %extractor.description()))]
    pub async fn extract(&self, extractor: &dyn Extractor) -> Result<BTreeMap<String, Dataset>> {
        let mut tables = BTreeMap::new();
        for (logical, stem) in &self.config.source_tables {
            let dataset = extractor.extract(stem).await?.with_name(logical.as_str());
            tables.insert(logical.clone(), dataset);
        }
        crate::log_data_op!(self.extraction, tables = tables.len(), "Extraction finished");
        Ok(tables)
    }

    /// Cleans and enriches each entity, then computes all metrics.
    #[instrument(skip_all, fields(tables = tables.len()))]
    pub async fn transform(&self, tables: &BTreeMap<String, Dataset>) -> Result<TransformOutput> {
        let logger = &self.transformation;
        let attempts = [
            ("orders", self.enrich_orders(tables).await),
            ("inventory", self.enrich_inventory(tables).await),
            ("reviews", self.enrich_reviews(tables).await),
        ];

        let mut enriched = BTreeMap::new();
        let mut failures = Vec::new();
        for (entity, attempt) in attempts {
            match attempt {
                Ok(dataset) => {
                    enriched.insert(entity.to_string(), dataset);
                }
                Err(error) => failures.push(EntityFailure {
                    entity: entity.to_string(),
                    error: Box::new(error),
                }),
            }
        }
        if !failures.is_empty() {
            return Err(logger.raise(EtlError::EntityFailures(failures)));
        }

        let results = self.aggregate(&enriched, tables).await?;
        info!(
            stage = logger.stage(),
            enriched = enriched.len(),
            metrics = results.len(),
            "Transformation finished"
        );
        Ok(TransformOutput { enriched, results })
    }

    /// Writes every enriched and metric table with every loader.
    #[instrument(skip_all, fields(loaders = loaders.len()))]
    pub fn load(
        &self,
        output: &TransformOutput,
        loaders: &[Box<dyn Loader>],
    ) -> Result<Vec<DatasetMetadata>> {
        let named = output
            .enriched
            .iter()
            .map(|(entity, ds)| (format!("{entity}_enriched"), ds))
            .chain(output.results.iter().map(|(name, ds)| (name.clone(), ds)));

        let mut written = Vec::new();
        for (name, dataset) in named {
            for loader in loaders {
                written.push(loader.save(dataset, &name)?);
            }
        }
        crate::log_data_op!(self.loading, files = written.len(), "Loading finished");
        Ok(written)
    }

    /// Extract, transform and load in sequence.
    pub async fn run(
        &self,
        extractor: &dyn Extractor,
        loaders: &[Box<dyn Loader>],
    ) -> Result<RunReport> {
        let started_at = Utc::now();

        let clock = Instant::now();
        let tables = self.extract(extractor).await?;
        let extraction = ExtractionMetrics {
            timing: StageTiming::since(started_at, clock),
            tables_extracted: tables.len(),
            total_rows: tables.values().map(Dataset::num_rows).sum(),
        };

        let (stage_start, clock) = (Utc::now(), Instant::now());
        let output = self.transform(&tables).await?;
        let transformation = TransformationMetrics {
            timing: StageTiming::since(stage_start, clock),
            tables_enriched: output.enriched.len(),
            metrics_generated: output.results.len(),
        };

        let (stage_start, clock) = (Utc::now(), Instant::now());
        let files = self.load(&output, loaders)?;
        let loading = LoadingMetrics {
            timing: StageTiming::since(stage_start, clock),
            files_written: files.len(),
            files,
        };

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            extraction,
            transformation,
            loading,
        };
        info!(
            tables = report.extraction.tables_extracted,
            metrics = report.transformation.metrics_generated,
            files = report.loading.files_written,
            "Pipeline run finished"
        );
        Ok(report)
    }

    fn table<'a>(&self, tables: &'a BTreeMap<String, Dataset>, name: &str) -> Result<&'a Dataset> {
        tables.get(name).ok_or_else(|| {
            self.transformation.raise(EtlError::data_source(
                "extraction",
                format!("required table '{name}' was not extracted"),
            ))
        })
    }

    async fn enrich_orders(&self, tables: &BTreeMap<String, Dataset>) -> Result<Dataset> {
        let orders = self.table(tables, "orders")?;
        let catalogs = OrdersCatalogs {
            customers: self.table(tables, "customers")?.clone(),
            promotions: self.table(tables, "promotions")?.clone(),
            order_items: self.table(tables, "order_items")?.clone(),
        };
        OrdersEnricher::with_default_cleaner(self.ctx.clone(), self.transformation.clone())
            .enrich(orders, &catalogs)
            .await
    }

    async fn enrich_inventory(&self, tables: &BTreeMap<String, Dataset>) -> Result<Dataset> {
        let inventory = self.table(tables, "inventory")?;
        let catalogs = InventoryCatalogs {
            products: self.table(tables, "products")?.clone(),
            warehouses: self.table(tables, "warehouses")?.clone(),
        };
        InventoryEnricher::with_default_cleaner(self.ctx.clone(), self.transformation.clone())
            .enrich(inventory, &catalogs)
            .await
    }

    async fn enrich_reviews(&self, tables: &BTreeMap<String, Dataset>) -> Result<Dataset> {
        let reviews = self.table(tables, "reviews")?;
        let catalogs = ReviewsCatalogs {
            products: self.table(tables, "products")?.clone(),
            customers: self.table(tables, "customers")?.clone(),
        };
        ReviewsEnricher::with_default_cleaner(self.ctx.clone(), self.transformation.clone())
            .enrich(reviews, &catalogs)
            .await
    }

    async fn aggregate(
        &self,
        enriched: &BTreeMap<String, Dataset>,
        tables: &BTreeMap<String, Dataset>,
    ) -> Result<BTreeMap<String, Dataset>> {
        let orders = self.table(enriched, "orders")?;
        let inventory = self.table(enriched, "inventory")?;
        let reviews = self.table(enriched, "reviews")?;
        let t = &self.config.thresholds;
        let (ctx, logger) = (&self.ctx, &self.transformation);

        let customers = CustomerAnalytics::new(ctx.clone(), logger.clone());
        let products = ProductAnalytics::new(ctx.clone(), logger.clone());
        let sales = SalesAnalytics::new(ctx.clone(), logger.clone());
        let lifecycle = OrderLifecycle::new(ctx.clone(), logger.clone());
        let stock = InventoryAnalytics::new(ctx.clone(), logger.clone());
        let ratings = ReviewAnalytics::new(ctx.clone(), logger.clone());

        let mut results = BTreeMap::new();
        let mut put = |name: &str, dataset: Dataset| {
            results.insert(name.to_string(), dataset.with_name(name));
        };

        put(
            "top_spenders",
            customers
                .top_spenders(orders, t.top_spenders_n, t.top_spenders_percentile)
                .await?,
        );
        put(
            "recurring_customers",
            customers
                .recurring_customers(orders, t.recurring_min_orders)
                .await?,
        );
        put(
            "average_ticket",
            scalar("average_ticket", customers.average_ticket_overall(orders).await?)?,
        );
        put(
            "top_products",
            products
                .top_products_by_quantity(
                    self.table(tables, "order_items")?,
                    self.table(tables, "products")?,
                    t.top_products_n,
                )
                .await?,
        );
        put("monthly_sales", sales.monthly_sales(orders).await?);
        put(
            "promotion_usage_rate",
            scalar("promotion_usage_rate", sales.promotion_usage_rate(orders).await?)?,
        );
        put("status_funnel", lifecycle.status_funnel(orders).await?);
        put(
            "cancellation_rate",
            scalar("cancellation_rate", lifecycle.cancellation_rate(orders).await?)?,
        );
        put(
            "delivery_rate",
            scalar("delivery_rate", lifecycle.delivery_rate(orders).await?)?,
        );
        put("backlog_in_progress", lifecycle.in_progress_backlog(orders).await?);
        put("inventory_health", stock.stock_health_summary(inventory).await?);
        put(
            "low_stock_items",
            stock.low_stock_items(inventory, t.low_stock_items_n).await?,
        );
        put("warehouse_utilization", stock.warehouse_utilization(inventory).await?);
        put("reviews_overview", ratings.rating_overview(reviews).await?);
        put(
            "reviews_by_product",
            ratings
                .rating_by_product(reviews, t.min_reviews_for_product, t.top_reviewed_products_n)
                .await?,
        );
        put("reviews_monthly", ratings.monthly_review_volume(reviews).await?);

        Ok(results)
    }
}

fn scalar(name: &str, value: f64) -> Result<Dataset> {
    Dataset::scalar(name, name, value)
}
