use super::catalog::CatalogSpec;
use super::derive::compare_columns;
use super::join::left_join;
use super::{ensure_row_count, Enricher};
use crate::cleaners::{DataCleaner, InventoryCleaner, RangeRule};
use crate::coercion::ColumnType;
use crate::context::EtlContext;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::logging::EtlLogger;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

const PRODUCTS: CatalogSpec = CatalogSpec {
    name: "products",
    key: "product_id",
    columns: &["product_id", "product_name", "category_id", "brand_id"],
    non_null_columns: &["product_id"],
    column_types: &[],
    ranges: &[],
};

const WAREHOUSES: CatalogSpec = CatalogSpec {
    name: "warehouses",
    key: "warehouse_id",
    columns: &["warehouse_id", "location", "capacity_units", "current_occupancy"],
    non_null_columns: &["warehouse_id"],
    column_types: &[
        ("capacity_units", ColumnType::Integer),
        ("current_occupancy", ColumnType::Integer),
    ],
    ranges: &[
        RangeRule::non_negative("capacity_units"),
        RangeRule::non_negative("current_occupancy"),
    ],
};

/// Reference tables joined into inventory.
#[derive(Debug, Clone)]
pub struct InventoryCatalogs {
    pub products: Dataset,
    pub warehouses: Dataset,
}

/// Cleans inventory and adds product, warehouse and stock-health columns.
pub struct InventoryEnricher {
    cleaner: Box<dyn DataCleaner>,
    ctx: EtlContext,
    logger: EtlLogger,
}

impl InventoryEnricher {
    pub fn new(cleaner: impl DataCleaner + 'static, ctx: EtlContext, logger: EtlLogger) -> Self {
        Self {
            cleaner: Box::new(cleaner),
            ctx,
            logger: logger.for_component("inventory_enricher"),
        }
    }

    pub fn with_default_cleaner(ctx: EtlContext, logger: EtlLogger) -> Self {
        Self::new(InventoryCleaner::new(logger.clone()), ctx, logger)
    }

    fn add_stock_flags(&self, inventory: &Dataset) -> Result<Dataset> {
        let quantity = inventory.float_values("quantity")?;
        let min_level = inventory.float_values("min_stock_level")?;
        let max_level = inventory.float_values("max_stock_level")?;

        let low = compare_columns(&quantity, &min_level, |q, min| q <= min);
        let over = compare_columns(&quantity, &max_level, |q, max| q >= max);
        inventory
            .with_column("is_low_stock", Arc::new(low))?
            .with_column("is_overstock", Arc::new(over))
    }
}

#[async_trait]
impl Enricher for InventoryEnricher {
    type Catalogs = InventoryCatalogs;

    #[instrument(skip_all, fields(entity = "inventory", rows = inventory.num_rows()))]
    async fn enrich(&self, inventory: &Dataset, catalogs: &InventoryCatalogs) -> Result<Dataset> {
        crate::log_data_op!(
            self.logger,
            rows = inventory.num_rows(),
            "Starting inventory enrichment"
        );
        let cleaned = self.cleaner.clean(inventory)?;

        let products = PRODUCTS.prepare(&catalogs.products, &self.logger)?;
        let warehouses = WAREHOUSES.prepare(&catalogs.warehouses, &self.logger)?;

        let enriched = left_join(&self.ctx, &cleaned, &products, PRODUCTS.key, &self.logger).await?;
        let enriched =
            left_join(&self.ctx, &enriched, &warehouses, WAREHOUSES.key, &self.logger).await?;
        let enriched = self.add_stock_flags(&enriched)?;

        ensure_row_count(&cleaned, &enriched, &self.logger)?;
        crate::log_data_op!(
            self.logger,
            rows = enriched.num_rows(),
            "Inventory enrichment finished"
        );
        Ok(enriched)
    }
}
