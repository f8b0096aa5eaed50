use super::{first_value, require_columns, INPUT};
use crate::context::EtlContext;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::logging::EtlLogger;
use tracing::instrument;

/// Revenue over time and promotion uptake.
#[derive(Debug, Clone)]
pub struct SalesAnalytics {
    ctx: EtlContext,
    logger: EtlLogger,
}

impl SalesAnalytics {
    pub fn new(ctx: EtlContext, logger: EtlLogger) -> Self {
        Self {
            ctx,
            logger: logger.for_component("sales_analytics"),
        }
    }

    /// Revenue and order count per `order_month`, oldest month first.
    ///
    /// Columns: `order_month`, `revenue`, `order_count`.
    #[instrument(skip(self, orders), fields(rows = orders.num_rows()))]
    pub async fn monthly_sales(&self, orders: &Dataset) -> Result<Dataset> {
        require_columns(orders, &["order_month", "order_id", "total_amount"], &self.logger)?;
        let result = self
            .ctx
            .query(
                &[(INPUT, orders)],
                "SELECT order_month, SUM(total_amount) AS revenue, COUNT(order_id) AS order_count \
                 FROM enriched WHERE order_month IS NOT NULL \
                 GROUP BY order_month ORDER BY order_month",
                "monthly_sales",
            )
            .await?;
        crate::log_data_op!(self.logger, months = result.num_rows(), "Monthly sales computed");
        Ok(result)
    }

    /// Fraction of orders that used a promotion; `0.0` for an empty table.
    #[instrument(skip(self, orders), fields(rows = orders.num_rows()))]
    pub async fn promotion_usage_rate(&self, orders: &Dataset) -> Result<f64> {
        require_columns(orders, &["used_promotion"], &self.logger)?;
        let result = self
            .ctx
            .query(
                &[(INPUT, orders)],
                "SELECT COALESCE(AVG(CASE WHEN used_promotion THEN 1.0 ELSE 0.0 END), 0.0) AS rate \
                 FROM enriched",
                "promotion_usage_rate",
            )
            .await?;
        let rate = first_value(&result, "rate")?;
        crate::log_data_op!(self.logger, rate, "Promotion usage rate computed");
        Ok(rate)
    }
}
