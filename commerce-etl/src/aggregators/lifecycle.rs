use super::{first_value, require_columns, INPUT};
use crate::context::EtlContext;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::logging::EtlLogger;
use tracing::instrument;

/// Statuses of orders that are neither delivered nor cancelled.
pub const IN_PROGRESS_STATUSES: [&str; 3] = ["pending", "processing", "shipped"];

/// Order status funnel and terminal-state rates.
#[derive(Debug, Clone)]
pub struct OrderLifecycle {
    ctx: EtlContext,
    logger: EtlLogger,
}

impl OrderLifecycle {
    pub fn new(ctx: EtlContext, logger: EtlLogger) -> Self {
        Self {
            ctx,
            logger: logger.for_component("order_lifecycle"),
        }
    }

    /// Order count and share per status.
    ///
    /// Rows are ordered by count descending, ties broken alphabetically by
    /// status. Null statuses are not counted.
    /// Columns: `status`, `orders`, `share`.
    #[instrument(skip(self, orders), fields(rows = orders.num_rows()))]
    pub async fn status_funnel(&self, orders: &Dataset) -> Result<Dataset> {
        require_columns(orders, &["status"], &self.logger)?;
        let result = self
            .ctx
            .query(
                &[(INPUT, orders)],
                "WITH counts AS ( \
                   SELECT status, COUNT(*) AS orders FROM enriched \
                   WHERE status IS NOT NULL GROUP BY status \
                 ), total AS (SELECT SUM(orders) AS total FROM counts) \
                 SELECT c.status, c.orders, \
                 CAST(c.orders AS DOUBLE) / CAST(t.total AS DOUBLE) AS share \
                 FROM counts c CROSS JOIN total t \
                 ORDER BY c.orders DESC, c.status ASC",
                "status_funnel",
            )
            .await?;
        crate::log_data_op!(self.logger, statuses = result.num_rows(), "Status funnel computed");
        Ok(result)
    }

    /// Fraction of orders whose status is `cancelled`.
    #[instrument(skip(self, orders), fields(rows = orders.num_rows()))]
    pub async fn cancellation_rate(&self, orders: &Dataset) -> Result<f64> {
        let rate = self.status_rate(orders, "cancelled").await?;
        crate::log_data_op!(self.logger, rate, "Cancellation rate computed");
        Ok(rate)
    }

    /// Fraction of orders whose status is `delivered`.
    #[instrument(skip(self, orders), fields(rows = orders.num_rows()))]
    pub async fn delivery_rate(&self, orders: &Dataset) -> Result<f64> {
        let rate = self.status_rate(orders, "delivered").await?;
        crate::log_data_op!(self.logger, rate, "Delivery rate computed");
        Ok(rate)
    }

    async fn status_rate(&self, orders: &Dataset, status: &'static str) -> Result<f64> {
        require_columns(orders, &["status"], &self.logger)?;
        let sql = format!(
            "SELECT COALESCE(AVG(CASE WHEN lower(status) = '{status}' THEN 1.0 ELSE 0.0 END), 0.0) \
             AS rate FROM enriched"
        );
        let result = self
            .ctx
            .query(&[(INPUT, orders)], &sql, "status_rate")
            .await?;
        first_value(&result, "rate")
    }

    /// Count and value of in-progress orders per `order_month`, oldest first.
    ///
    /// Columns: `order_month`, `backlog_orders`, `backlog_value`.
    #[instrument(skip(self, orders), fields(rows = orders.num_rows()))]
    pub async fn in_progress_backlog(&self, orders: &Dataset) -> Result<Dataset> {
        require_columns(
            orders,
            &["status", "order_month", "order_id", "total_amount"],
            &self.logger,
        )?;
        let statuses = IN_PROGRESS_STATUSES
            .iter()
            .map(|s| format!("'{s}'"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT order_month, COUNT(order_id) AS backlog_orders, \
             SUM(total_amount) AS backlog_value \
             FROM enriched \
             WHERE lower(status) IN ({statuses}) AND order_month IS NOT NULL \
             GROUP BY order_month ORDER BY order_month"
        );
        let result = self
            .ctx
            .query(&[(INPUT, orders)], &sql, "backlog_in_progress")
            .await?;
        crate::log_data_op!(self.logger, months = result.num_rows(), "In-progress backlog computed");
        Ok(result)
    }
}
