use super::{require_columns, INPUT};
use crate::context::EtlContext;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::logging::EtlLogger;
use tracing::instrument;

/// Satisfaction and volume metrics over reviews.
#[derive(Debug, Clone)]
pub struct ReviewAnalytics {
    ctx: EtlContext,
    logger: EtlLogger,
}

impl ReviewAnalytics {
    pub fn new(ctx: EtlContext, logger: EtlLogger) -> Self {
        Self {
            ctx,
            logger: logger.for_component("review_analytics"),
        }
    }

    /// One row with mean rating, positive and negative rates, and review count.
    ///
    /// Columns: `average_rating`, `positive_rate`, `negative_rate`, `review_count`.
    #[instrument(skip(self, reviews), fields(rows = reviews.num_rows()))]
    pub async fn rating_overview(&self, reviews: &Dataset) -> Result<Dataset> {
        require_columns(reviews, &["rating", "is_positive", "is_negative"], &self.logger)?;
        let result = self
            .ctx
            .query(
                &[(INPUT, reviews)],
                "SELECT COALESCE(AVG(CAST(rating AS DOUBLE)), 0.0) AS average_rating, \
                 COALESCE(AVG(CASE WHEN is_positive THEN 1.0 ELSE 0.0 END), 0.0) AS positive_rate, \
                 COALESCE(AVG(CASE WHEN is_negative THEN 1.0 ELSE 0.0 END), 0.0) AS negative_rate, \
                 COUNT(*) AS review_count \
                 FROM enriched",
                "reviews_overview",
            )
            .await?;
        crate::log_data_op!(self.logger, "Review overview computed");
        Ok(result)
    }

    /// Per-product mean rating for products with at least `min_reviews`
    /// reviews, ranked by rating then review count, at most `top_n`.
    ///
    /// Columns: `product_id`, `product_name`, `average_rating`,
    /// `review_count`, `positive_rate`.
    #[instrument(skip(self, reviews), fields(rows = reviews.num_rows()))]
    pub async fn rating_by_product(
        &self,
        reviews: &Dataset,
        min_reviews: usize,
        top_n: usize,
    ) -> Result<Dataset> {
        require_columns(
            reviews,
            &["product_id", "product_name", "review_id", "rating", "is_positive"],
            &self.logger,
        )?;
        let sql = format!(
            "SELECT product_id, \
             MAX(product_name) AS product_name, \
             AVG(CAST(rating AS DOUBLE)) AS average_rating, \
             COUNT(review_id) AS review_count, \
             AVG(CASE WHEN is_positive THEN 1.0 ELSE 0.0 END) AS positive_rate \
             FROM enriched \
             GROUP BY product_id \
             HAVING COUNT(review_id) >= {min_reviews} \
             ORDER BY average_rating DESC, review_count DESC, product_id \
             LIMIT {top_n}"
        );
        let result = self
            .ctx
            .query(&[(INPUT, reviews)], &sql, "reviews_by_product")
            .await?;
        crate::log_data_op!(
            self.logger,
            min_reviews,
            products = result.num_rows(),
            "Product rating ranking computed"
        );
        Ok(result)
    }

    /// Review count and mean rating per `review_month`, oldest first.
    ///
    /// Columns: `review_month`, `volume`, `average_rating`.
    #[instrument(skip(self, reviews), fields(rows = reviews.num_rows()))]
    pub async fn monthly_review_volume(&self, reviews: &Dataset) -> Result<Dataset> {
        require_columns(reviews, &["review_month", "review_id", "rating"], &self.logger)?;
        let result = self
            .ctx
            .query(
                &[(INPUT, reviews)],
                "SELECT review_month, COUNT(review_id) AS volume, \
                 AVG(CAST(rating AS DOUBLE)) AS average_rating \
                 FROM enriched WHERE review_month IS NOT NULL \
                 GROUP BY review_month ORDER BY review_month",
                "reviews_monthly",
            )
            .await?;
        crate::log_data_op!(self.logger, months = result.num_rows(), "Monthly review volume computed");
        Ok(result)
    }
}
