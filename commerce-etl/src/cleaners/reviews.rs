use super::{DataCleaner, EntitySchema, NullStrategy, RangeRule};
use crate::coercion::ColumnType;
use crate::logging::EtlLogger;

const REVIEWS_SCHEMA: EntitySchema = EntitySchema {
    entity: "reviews",
    key_columns: &["review_id"],
    required_columns: &["review_id", "product_id", "customer_id", "rating", "created_at"],
    non_null_columns: &["review_id", "product_id", "customer_id", "rating", "created_at"],
    null_strategies: &[("helpful_votes", NullStrategy::FillZero)],
    column_types: &[
        ("rating", ColumnType::Integer),
        ("helpful_votes", ColumnType::Integer),
        ("created_at", ColumnType::Timestamp),
    ],
    categorical_columns: &[],
    ranges: &[
        RangeRule::between("rating", 1.0, 5.0),
        RangeRule::non_negative("helpful_votes"),
    ],
};

/// Cleans product reviews. `comment` stays nullable.
#[derive(Debug, Clone)]
pub struct ReviewsCleaner {
    logger: EtlLogger,
}

impl ReviewsCleaner {
    pub fn new(logger: EtlLogger) -> Self {
        Self {
            logger: logger.for_component("reviews_cleaner"),
        }
    }
}

impl DataCleaner for ReviewsCleaner {
    fn schema(&self) -> &EntitySchema {
        &REVIEWS_SCHEMA
    }

    fn logger(&self) -> &EtlLogger {
        &self.logger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use arrow::array::{ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::Int64Type;
    use std::sync::Arc;

    fn raw_reviews(ratings: Vec<Option<i64>>, votes: Vec<Option<i64>>) -> Dataset {
        let n = ratings.len();
        let ids: Vec<i64> = (1..=n as i64).collect();
        Dataset::try_from_columns(
            "reviews",
            vec![
                ("review_id", Arc::new(Int64Array::from(ids)) as ArrayRef),
                ("product_id", Arc::new(Int64Array::from(vec![7; n])) as ArrayRef),
                ("customer_id", Arc::new(Int64Array::from(vec![3; n])) as ArrayRef),
                ("rating", Arc::new(Int64Array::from(ratings)) as ArrayRef),
                ("helpful_votes", Arc::new(Int64Array::from(votes)) as ArrayRef),
                (
                    "created_at",
                    Arc::new(StringArray::from(vec!["2024-03-01 08:00:00"; n])) as ArrayRef,
                ),
                (
                    "comment",
                    Arc::new(StringArray::from(vec![None::<&str>; n])) as ArrayRef,
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_clean_fills_helpful_votes() {
        let cleaner = ReviewsCleaner::new(EtlLogger::transformation());
        let cleaned = cleaner
            .clean(&raw_reviews(vec![Some(5), Some(1)], vec![None, Some(2)]))
            .unwrap();
        assert_eq!(cleaned.null_count("helpful_votes"), Some(0));
        // Nullable comments survive cleaning.
        assert_eq!(cleaned.null_count("comment"), Some(2));
    }

    #[test]
    fn test_null_rating_is_rejected() {
        let cleaner = ReviewsCleaner::new(EtlLogger::transformation());
        let err = cleaner
            .clean(&raw_reviews(vec![Some(5), None], vec![Some(0), Some(0)]))
            .unwrap_err();
        assert_eq!(err.kind(), "NullConstraintError");
        assert!(err.to_string().contains("rating (1 nulls)"));
    }

    #[test]
    fn test_fractional_rating_fails_instead_of_truncating() {
        let cleaner = ReviewsCleaner::new(EtlLogger::transformation());
        let base = raw_reviews(vec![Some(1), Some(1)], vec![Some(0), Some(0)]);
        let as_floats = base
            .with_column(
                "rating",
                Arc::new(Float64Array::from(vec![2.5, 4.0])) as ArrayRef,
            )
            .unwrap();
        let as_text = base
            .with_column(
                "rating",
                Arc::new(StringArray::from(vec!["2.5", "4"])) as ArrayRef,
            )
            .unwrap();

        for raw in [as_floats, as_text] {
            let err = cleaner.clean(&raw).unwrap_err();
            assert_eq!(err.kind(), "NullConstraintError");
            assert!(err.to_string().contains("rating (1 nulls)"), "{err}");
        }
    }

    #[test]
    fn test_integral_float_ratings_are_kept() {
        let cleaner = ReviewsCleaner::new(EtlLogger::transformation());
        let raw = raw_reviews(vec![Some(1), Some(1)], vec![Some(0), Some(0)])
            .with_column(
                "rating",
                Arc::new(Float64Array::from(vec![2.0, 5.0])) as ArrayRef,
            )
            .unwrap();
        let cleaned = cleaner.clean(&raw).unwrap();
        let ratings = cleaned.column("rating").unwrap().as_primitive::<Int64Type>();
        assert_eq!(ratings.values().to_vec(), vec![2, 5]);
    }

    #[test]
    fn test_rating_out_of_range() {
        let cleaner = ReviewsCleaner::new(EtlLogger::transformation());
        let err = cleaner
            .clean(&raw_reviews(vec![Some(6), Some(0)], vec![Some(0), Some(0)]))
            .unwrap_err();
        assert!(err.to_string().contains("2 rows violating range [1, 5]"));
    }

    #[test]
    fn test_clean_is_idempotent() {
        let cleaner = ReviewsCleaner::new(EtlLogger::transformation());
        let once = cleaner
            .clean(&raw_reviews(vec![Some(4), Some(2)], vec![Some(1), None]))
            .unwrap();
        let twice = cleaner.clean(&once).unwrap();
        assert_eq!(once.batch(), twice.batch());
    }
}
