use super::require_columns;
use crate::coercion::{coerce_columns, ColumnType};
use crate::context::EtlContext;
use crate::dataset::Dataset;
use crate::enrichers::left_join;
use crate::error::Result;
use crate::logging::EtlLogger;
use tracing::instrument;

/// Product sales rankings.
#[derive(Debug, Clone)]
pub struct ProductAnalytics {
    ctx: EtlContext,
    logger: EtlLogger,
}

impl ProductAnalytics {
    pub fn new(ctx: EtlContext, logger: EtlLogger) -> Self {
        Self {
            ctx,
            logger: logger.for_component("product_analytics"),
        }
    }

    /// Units sold per product with its name, best sellers first, at most
    /// `top_n`. Products missing from the catalog keep a null name.
    ///
    /// Columns: `product_id`, `total_quantity`, `product_name`.
    #[instrument(skip(self, order_items, products), fields(items = order_items.num_rows()))]
    pub async fn top_products_by_quantity(
        &self,
        order_items: &Dataset,
        products: &Dataset,
        top_n: usize,
    ) -> Result<Dataset> {
        require_columns(order_items, &["product_id", "quantity"], &self.logger)?;
        require_columns(products, &["product_id", "product_name"], &self.logger)?;

        let (items, _audits) =
            coerce_columns(order_items, &[("quantity", ColumnType::Integer)], &self.logger)?;
        let sold = self
            .ctx
            .query(
                &[("order_items", &items)],
                "SELECT product_id, SUM(quantity) AS total_quantity \
                 FROM order_items WHERE product_id IS NOT NULL GROUP BY product_id",
                "product_quantities",
            )
            .await?;
        let names = self
            .ctx
            .query(
                &[("products", products)],
                "SELECT product_id, MAX(product_name) AS product_name \
                 FROM products WHERE product_id IS NOT NULL GROUP BY product_id",
                "product_names",
            )
            .await?;

        let named = left_join(&self.ctx, &sold, &names, "product_id", &self.logger).await?;
        let sql = format!(
            "SELECT product_id, total_quantity, product_name FROM ranked \
             ORDER BY total_quantity DESC NULLS LAST, product_id LIMIT {top_n}"
        );
        let result = self
            .ctx
            .query(&[("ranked", &named)], &sql, "top_products")
            .await?;

        crate::log_data_op!(
            self.logger,
            products = result.num_rows(),
            "Top products computed"
        );
        Ok(result)
    }
}
