use super::catalog::CatalogSpec;
use super::derive::{char_lengths, flag, period_column, Period};
use super::join::left_join;
use super::{ensure_row_count, Enricher};
use crate::cleaners::{DataCleaner, ReviewsCleaner};
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
    non_null_columns: &["product_id", "product_name", "category_id", "brand_id"],
    column_types: &[],
    ranges: &[],
};

const CUSTOMERS: CatalogSpec = CatalogSpec {
    name: "customers",
    key: "customer_id",
    columns: &["customer_id", "segment", "city", "country"],
    non_null_columns: &["customer_id"],
    column_types: &[],
    ranges: &[],
};

pub const POSITIVE_RATING: f64 = 4.0;
pub const NEGATIVE_RATING: f64 = 2.0;

/// Reference tables joined into reviews.
#[derive(Debug, Clone)]
pub struct ReviewsCatalogs {
    pub products: Dataset,
    pub customers: Dataset,
}

/// Cleans reviews and adds product, customer and sentiment columns.
pub struct ReviewsEnricher {
    cleaner: Box<dyn DataCleaner>,
    ctx: EtlContext,
    logger: EtlLogger,
}

impl ReviewsEnricher {
    pub fn new(cleaner: impl DataCleaner + 'static, ctx: EtlContext, logger: EtlLogger) -> Self {
        Self {
            cleaner: Box::new(cleaner),
            ctx,
            logger: logger.for_component("reviews_enricher"),
        }
    }

    pub fn with_default_cleaner(ctx: EtlContext, logger: EtlLogger) -> Self {
        Self::new(ReviewsCleaner::new(logger.clone()), ctx, logger)
    }

    fn add_derived_columns(&self, reviews: &Dataset) -> Result<Dataset> {
        let month = period_column(reviews, "created_at", Period::Month)?;
        let comment_length = char_lengths(reviews, "comment")?;
        let rating = reviews.float_values("rating")?;
        let positive = flag(&rating, false, |r| r >= POSITIVE_RATING);
        let negative = flag(&rating, false, |r| r <= NEGATIVE_RATING);

        reviews
            .with_column("review_month", Arc::new(month))?
            .with_column("comment_length", Arc::new(comment_length))?
            .with_column("is_positive", Arc::new(positive))?
            .with_column("is_negative", Arc::new(negative))
    }
}

#[async_trait]
impl Enricher for ReviewsEnricher {
    type Catalogs = ReviewsCatalogs;

    #[instrument(skip_all, fields(entity = "reviews", rows = reviews.num_rows()))]
    async fn enrich(&self, reviews: &Dataset, catalogs: &ReviewsCatalogs) -> Result<Dataset> {
        crate::log_data_op!(self.logger, rows = reviews.num_rows(), "Starting reviews enrichment");
        let cleaned = self.cleaner.clean(reviews)?;

        let products = PRODUCTS.prepare(&catalogs.products, &self.logger)?;
        let customers = CUSTOMERS.prepare(&catalogs.customers, &self.logger)?;

        let enriched = left_join(&self.ctx, &cleaned, &products, PRODUCTS.key, &self.logger).await?;
        let enriched =
            left_join(&self.ctx, &enriched, &customers, CUSTOMERS.key, &self.logger).await?;
        let enriched = self.add_derived_columns(&enriched)?;

        ensure_row_count(&cleaned, &enriched, &self.logger)?;
        crate::log_data_op!(
            self.logger,
            rows = enriched.num_rows(),
            "Reviews enrichment finished"
        );
        Ok(enriched)
    }
}
