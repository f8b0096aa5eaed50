use super::catalog::CatalogSpec;
use super::derive::{flag, period_column, Period};
use super::join::left_join;
use super::{ensure_row_count, Enricher};
use crate::cleaners::{fill_nulls, DataCleaner, NullStrategy, OrdersCleaner, RangeRule};
use crate::coercion::ColumnType;
use crate::context::EtlContext;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::logging::EtlLogger;
use arrow::array::Float64Array;
use arrow::compute::is_not_null;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

const CUSTOMERS: CatalogSpec = CatalogSpec {
    name: "customers",
    key: "customer_id",
    columns: &[
        "customer_id",
        "segment",
        "registration_date",
        "city",
        "country",
        "email",
    ],
    non_null_columns: &["customer_id", "segment"],
    column_types: &[("registration_date", ColumnType::Timestamp)],
    ranges: &[],
};

const PROMOTIONS: CatalogSpec = CatalogSpec {
    name: "promotions",
    key: "promotion_id",
    columns: &[
        "promotion_id",
        "promotion_type",
        "discount_value",
        "start_date",
        "end_date",
        "is_active",
    ],
    non_null_columns: &["promotion_id", "promotion_type", "is_active"],
    column_types: &[
        ("discount_value", ColumnType::Float),
        ("start_date", ColumnType::Timestamp),
        ("end_date", ColumnType::Timestamp),
    ],
    ranges: &[RangeRule::non_negative("discount_value")],
};

const ORDER_ITEMS: CatalogSpec = CatalogSpec {
    name: "order_items",
    key: "order_id",
    columns: &["order_id", "product_id", "quantity", "unit_price", "subtotal"],
    non_null_columns: &["order_id", "product_id"],
    column_types: &[
        ("quantity", ColumnType::Integer),
        ("unit_price", ColumnType::Float),
        ("subtotal", ColumnType::Float),
    ],
    ranges: &[],
};

/// Discount at or above which an order counts as highly discounted.
pub const HIGH_DISCOUNT_PERCENT: f64 = 20.0;

/// Reference tables joined into orders.
#[derive(Debug, Clone)]
pub struct OrdersCatalogs {
    pub customers: Dataset,
    pub promotions: Dataset,
    pub order_items: Dataset,
}

/// Cleans orders and adds customer, promotion, basket and period columns.
pub struct OrdersEnricher {
    cleaner: Box<dyn DataCleaner>,
    ctx: EtlContext,
    logger: EtlLogger,
}

impl OrdersEnricher {
    /// Creates an enricher around the cleaner that runs as its first step.
    pub fn new(cleaner: impl DataCleaner + 'static, ctx: EtlContext, logger: EtlLogger) -> Self {
        Self {
            cleaner: Box::new(cleaner),
            ctx,
            logger: logger.for_component("orders_enricher"),
        }
    }

    /// Enricher with the standard [`OrdersCleaner`].
    pub fn with_default_cleaner(ctx: EtlContext, logger: EtlLogger) -> Self {
        Self::new(OrdersCleaner::new(logger.clone()), ctx, logger)
    }

    /// Adds `items_count` (0 for orders without items) and `avg_item_price`.
    async fn add_basket_metrics(&self, orders: &Dataset, items: &Dataset) -> Result<Dataset> {
        let per_order = self
            .ctx
            .query(
                &[("order_items", items)],
                "SELECT \"order_id\", SUM(\"quantity\") AS items_count \
                 FROM order_items GROUP BY \"order_id\"",
                "items_per_order",
            )
            .await?;
        let with_counts = left_join(&self.ctx, orders, &per_order, "order_id", &self.logger).await?;
        let with_counts = fill_nulls(&with_counts, "items_count", NullStrategy::FillZero)?;

        let totals = with_counts.float_values("total_amount")?;
        let counts = with_counts.float_values("items_count")?;
        let avg: Float64Array = totals
            .iter()
            .zip(counts.iter())
            .map(|pair| match pair {
                (Some(total), Some(count)) if count != 0.0 => Some(total / count),
                _ => Some(0.0),
            })
            .collect();
        with_counts.with_column("avg_item_price", Arc::new(avg))
    }

    fn add_derived_columns(&self, orders: &Dataset) -> Result<Dataset> {
        let month = period_column(orders, "order_date", Period::Month)?;
        let week = period_column(orders, "order_date", Period::Week)?;
        let used_promotion = is_not_null(orders.require_column("promotion_id")?)?;
        let free_shipping = flag(&orders.float_values("shipping_cost")?, true, |v| v == 0.0);
        let high_discount = flag(&orders.float_values("discount_percent")?, false, |v| {
            v >= HIGH_DISCOUNT_PERCENT
        });

        orders
            .with_column("order_month", Arc::new(month))?
            .with_column("order_week", Arc::new(week))?
            .with_column("used_promotion", Arc::new(used_promotion))?
            .with_column("is_free_shipping", Arc::new(free_shipping))?
            .with_column("is_high_discount", Arc::new(high_discount))
    }
}

#[async_trait]
impl Enricher for OrdersEnricher {
    type Catalogs = OrdersCatalogs;

    #[instrument(skip_all, fields(entity = "orders", rows = orders.num_rows()))]
    async fn enrich(&self, orders: &Dataset, catalogs: &OrdersCatalogs) -> Result<Dataset> {
        crate::log_data_op!(self.logger, rows = orders.num_rows(), "Starting orders enrichment");
        let cleaned = self.cleaner.clean(orders)?;

        let customers = CUSTOMERS.prepare(&catalogs.customers, &self.logger)?;
        let promotions = PROMOTIONS.prepare(&catalogs.promotions, &self.logger)?;
        let items = ORDER_ITEMS.prepare(&catalogs.order_items, &self.logger)?;

        let enriched = left_join(&self.ctx, &cleaned, &customers, CUSTOMERS.key, &self.logger).await?;
        let enriched =
            left_join(&self.ctx, &enriched, &promotions, PROMOTIONS.key, &self.logger).await?;
        let enriched = self.add_basket_metrics(&enriched, &items).await?;
        let enriched = self.add_derived_columns(&enriched)?;

        ensure_row_count(&cleaned, &enriched, &self.logger)?;
        crate::log_data_op!(
            self.logger,
            rows = enriched.num_rows(),
            columns = enriched.num_columns(),
            "Orders enrichment finished"
        );
        Ok(enriched)
    }
}
