use super::{DataCleaner, EntitySchema, NullStrategy, RangeRule};
use crate::coercion::ColumnType;
use crate::logging::EtlLogger;

const INVENTORY_SCHEMA: EntitySchema = EntitySchema {
    entity: "inventory",
    key_columns: &["inventory_id"],
    required_columns: &[
        "inventory_id",
        "product_id",
        "warehouse_id",
        "quantity",
        "min_stock_level",
        "max_stock_level",
    ],
    non_null_columns: &["inventory_id", "product_id", "warehouse_id"],
    // Stock levels default to zero so stock health can always be evaluated.
    null_strategies: &[
        ("quantity", NullStrategy::FillZero),
        ("min_stock_level", NullStrategy::FillZero),
        ("max_stock_level", NullStrategy::FillZero),
    ],
    column_types: &[
        ("quantity", ColumnType::Integer),
        ("min_stock_level", ColumnType::Integer),
        ("max_stock_level", ColumnType::Integer),
        ("last_restock_date", ColumnType::Timestamp),
    ],
    categorical_columns: &[],
    ranges: &[
        RangeRule::non_negative("quantity"),
        RangeRule::non_negative("min_stock_level"),
        RangeRule::non_negative("max_stock_level"),
    ],
};

/// Cleans inventory records, keeping the most recent stock state per
/// `inventory_id`.
#[derive(Debug, Clone)]
pub struct InventoryCleaner {
    logger: EtlLogger,
}

impl InventoryCleaner {
    pub fn new(logger: EtlLogger) -> Self {
        Self {
            logger: logger.for_component("inventory_cleaner"),
        }
    }
}

impl DataCleaner for InventoryCleaner {
    fn schema(&self) -> &EntitySchema {
        &INVENTORY_SCHEMA
    }

    fn logger(&self) -> &EtlLogger {
        &self.logger
    }
}
