use super::{first_value, quantile, require_columns, INPUT};
use crate::context::EtlContext;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::logging::EtlLogger;
use crate::security::check_fraction;
use arrow::array::BooleanArray;
use tracing::instrument;

/// Spend and loyalty metrics per customer.
#[derive(Debug, Clone)]
pub struct CustomerAnalytics {
    ctx: EtlContext,
    logger: EtlLogger,
}

impl CustomerAnalytics {
    pub fn new(ctx: EtlContext, logger: EtlLogger) -> Self {
        Self {
            ctx,
            logger: logger.for_component("customer_analytics"),
        }
    }

    /// Customers whose total spend reaches the `percentile` quantile of all
    /// customers' spend, highest first, at most `top_n`.
    ///
    /// Columns: `customer_id`, `total_spent`, `order_count`.
    #[instrument(skip(self, orders), fields(rows = orders.num_rows()))]
    pub async fn top_spenders(
        &self,
        orders: &Dataset,
        top_n: usize,
        percentile: f64,
    ) -> Result<Dataset> {
        check_fraction(percentile, "percentile")
            .map_err(|e| self.logger.raise(e))?;
        require_columns(orders, &["customer_id", "total_amount"], &self.logger)?;

        let totals = self
            .ctx
            .query(
                &[(INPUT, orders)],
                "SELECT customer_id, SUM(total_amount) AS total_spent, COUNT(*) AS order_count \
                 FROM enriched WHERE customer_id IS NOT NULL \
                 GROUP BY customer_id \
                 ORDER BY total_spent DESC NULLS LAST, customer_id",
                "top_spenders",
            )
            .await?;

        let spent = totals.float_values("total_spent")?;
        let mut observed: Vec<f64> = spent.iter().flatten().collect();
        let Some(threshold) = quantile(&mut observed, percentile) else {
            return Ok(totals);
        };
        let keep: BooleanArray = spent
            .iter()
            .map(|v| Some(v.is_some_and(|v| v >= threshold)))
            .collect();
        let result = totals.filter(&keep)?.head(top_n);

        crate::log_data_op!(
            self.logger,
            threshold,
            customers = result.num_rows(),
            "Top spenders computed"
        );
        Ok(result)
    }

    /// Customers with at least `min_orders` orders, most orders first.
    ///
    /// Columns: `customer_id`, `order_count`.
    #[instrument(skip(self, orders), fields(rows = orders.num_rows()))]
    pub async fn recurring_customers(&self, orders: &Dataset, min_orders: usize) -> Result<Dataset> {
        require_columns(orders, &["customer_id", "order_id"], &self.logger)?;
        let sql = format!(
            "SELECT customer_id, COUNT(order_id) AS order_count \
             FROM enriched WHERE customer_id IS NOT NULL \
             GROUP BY customer_id HAVING COUNT(order_id) >= {min_orders} \
             ORDER BY order_count DESC, customer_id"
        );
        let result = self
            .ctx
            .query(&[(INPUT, orders)], &sql, "recurring_customers")
            .await?;
        crate::log_data_op!(
            self.logger,
            min_orders,
            customers = result.num_rows(),
            "Recurring customers computed"
        );
        Ok(result)
    }

    /// Mean order value over all rows; `0.0` for an empty table.
    #[instrument(skip(self, orders), fields(rows = orders.num_rows()))]
    pub async fn average_ticket_overall(&self, orders: &Dataset) -> Result<f64> {
        require_columns(orders, &["total_amount"], &self.logger)?;
        let result = self
            .ctx
            .query(
                &[(INPUT, orders)],
                "SELECT COALESCE(AVG(CAST(total_amount AS DOUBLE)), 0.0) AS average_ticket FROM enriched",
                "average_ticket",
            )
            .await?;
        let average = first_value(&result, "average_ticket")?;
        crate::log_data_op!(self.logger, average, "Average ticket computed");
        Ok(average)
    }
}
