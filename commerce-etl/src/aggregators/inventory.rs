use super::{require_columns, INPUT};
use crate::context::EtlContext;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::logging::EtlLogger;
use tracing::instrument;

/// Stock health and warehouse occupancy.
#[derive(Debug, Clone)]
pub struct InventoryAnalytics {
    ctx: EtlContext,
    logger: EtlLogger,
}

impl InventoryAnalytics {
    pub fn new(ctx: EtlContext, logger: EtlLogger) -> Self {
        Self {
            ctx,
            logger: logger.for_component("inventory_analytics"),
        }
    }

    /// One row counting low-stock, overstock and healthy records.
    ///
    /// A record is healthy when it is neither low on stock nor overstocked.
    /// Columns: `total_records`, `low_stock`, `overstock`, `healthy`.
    #[instrument(skip(self, inventory), fields(rows = inventory.num_rows()))]
    pub async fn stock_health_summary(&self, inventory: &Dataset) -> Result<Dataset> {
        require_columns(inventory, &["is_low_stock", "is_overstock"], &self.logger)?;
        let result = self
            .ctx
            .query(
                &[(INPUT, inventory)],
                "SELECT COUNT(*) AS total_records, \
                 COALESCE(SUM(CASE WHEN is_low_stock THEN 1 ELSE 0 END), 0) AS low_stock, \
                 COALESCE(SUM(CASE WHEN is_overstock THEN 1 ELSE 0 END), 0) AS overstock, \
                 COALESCE(SUM(CASE WHEN NOT is_low_stock AND NOT is_overstock THEN 1 ELSE 0 END), 0) AS healthy \
                 FROM enriched",
                "inventory_health",
            )
            .await?;
        crate::log_data_op!(self.logger, "Stock health summary computed");
        Ok(result)
    }

    /// Low-stock records ordered by how far they are below their minimum,
    /// at most `top_n`.
    ///
    /// Columns: `inventory_id`, `product_id`, `product_name`, `warehouse_id`,
    /// `quantity`, `min_stock_level`, `stock_deficit`.
    #[instrument(skip(self, inventory), fields(rows = inventory.num_rows()))]
    pub async fn low_stock_items(&self, inventory: &Dataset, top_n: usize) -> Result<Dataset> {
        require_columns(
            inventory,
            &[
                "inventory_id",
                "product_id",
                "product_name",
                "warehouse_id",
                "quantity",
                "min_stock_level",
                "is_low_stock",
            ],
            &self.logger,
        )?;
        let sql = format!(
            "SELECT inventory_id, product_id, product_name, warehouse_id, quantity, min_stock_level, \
             min_stock_level - quantity AS stock_deficit \
             FROM enriched WHERE is_low_stock \
             ORDER BY stock_deficit DESC, inventory_id LIMIT {top_n}"
        );
        let result = self
            .ctx
            .query(&[(INPUT, inventory)], &sql, "low_stock_items")
            .await?;
        crate::log_data_op!(self.logger, items = result.num_rows(), "Low stock items computed");
        Ok(result)
    }

    /// Occupancy of each warehouse holding inventory, fullest first.
    ///
    /// `occupancy_ratio` is `current_occupancy / capacity_units`: null when
    /// the capacity is unknown and `0` when it is not positive.
    /// Columns: `warehouse_id`, `location`, `capacity_units`,
    /// `current_occupancy`, `inventory_records`, `total_quantity`,
    /// `occupancy_ratio`.
    #[instrument(skip(self, inventory), fields(rows = inventory.num_rows()))]
    pub async fn warehouse_utilization(&self, inventory: &Dataset) -> Result<Dataset> {
        require_columns(
            inventory,
            &[
                "warehouse_id",
                "location",
                "capacity_units",
                "current_occupancy",
                "quantity",
            ],
            &self.logger,
        )?;
        let result = self
            .ctx
            .query(
                &[(INPUT, inventory)],
                "SELECT warehouse_id, \
                 MAX(location) AS location, \
                 MAX(capacity_units) AS capacity_units, \
                 MAX(current_occupancy) AS current_occupancy, \
                 COUNT(*) AS inventory_records, \
                 SUM(quantity) AS total_quantity, \
                 CASE \
                   WHEN MAX(capacity_units) IS NULL THEN NULL \
                   WHEN MAX(capacity_units) <= 0 THEN 0.0 \
                   ELSE CAST(MAX(current_occupancy) AS DOUBLE) / CAST(MAX(capacity_units) AS DOUBLE) \
                 END AS occupancy_ratio \
                 FROM enriched \
                 GROUP BY warehouse_id \
                 ORDER BY occupancy_ratio DESC NULLS LAST, warehouse_id",
                "warehouse_utilization",
            )
            .await?;
        crate::log_data_op!(
            self.logger,
            warehouses = result.num_rows(),
            "Warehouse utilization computed"
        );
        Ok(result)
    }
}
