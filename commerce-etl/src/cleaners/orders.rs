use super::{DataCleaner, EntitySchema, NullStrategy, RangeRule};
use crate::coercion::ColumnType;
use crate::logging::EtlLogger;

const ORDERS_SCHEMA: EntitySchema = EntitySchema {
    entity: "orders",
    key_columns: &["order_id"],
    required_columns: &[
        "order_id",
        "customer_id",
        "promotion_id",
        "total_amount",
        "shipping_cost",
        "discount_percent",
        "status",
        "order_date",
    ],
    non_null_columns: &["order_id", "customer_id", "total_amount", "status", "order_date"],
    null_strategies: &[
        ("shipping_cost", NullStrategy::FillZero),
        ("discount_percent", NullStrategy::FillZero),
    ],
    column_types: &[
        ("total_amount", ColumnType::Float),
        ("shipping_cost", ColumnType::Float),
        ("discount_percent", ColumnType::Float),
        ("order_date", ColumnType::Timestamp),
    ],
    categorical_columns: &["status"],
    ranges: &[
        RangeRule::non_negative("total_amount"),
        RangeRule::non_negative("shipping_cost"),
        RangeRule::between("discount_percent", 0.0, 100.0),
    ],
};

/// Cleans the orders table.
///
/// `promotion_id` is nullable and left untouched; `status` is trimmed and
/// lower-cased.
#[derive(Debug, Clone)]
pub struct OrdersCleaner {
    logger: EtlLogger,
}

impl OrdersCleaner {
    pub fn new(logger: EtlLogger) -> Self {
        Self {
            logger: logger.for_component("orders_cleaner"),
        }
    }
}

impl DataCleaner for OrdersCleaner {
    fn schema(&self) -> &EntitySchema {
        &ORDERS_SCHEMA
    }

    fn logger(&self) -> &EtlLogger {
        &self.logger
    }
}
