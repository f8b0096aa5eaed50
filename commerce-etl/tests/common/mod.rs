//! Shared fixtures for the integration tests.
//!
//! The tables form one small, consistent store. Raw orders contain a
//! duplicate of order 2 (the later row wins), mixed-case statuses, and null
//! shipping costs. Customer 103 is missing from the customer catalog and
//! order 5 has no items, so both join misses are exercised.

#![allow(dead_code)]

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type};
use commerce_etl::dataset::Dataset;
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn int(values: Vec<Option<i64>>) -> ArrayRef {
    Arc::new(Int64Array::from(values))
}

pub fn float(values: Vec<Option<f64>>) -> ArrayRef {
    Arc::new(Float64Array::from(values))
}

pub fn text(values: Vec<Option<&str>>) -> ArrayRef {
    Arc::new(StringArray::from(values))
}

pub fn boolean(values: Vec<bool>) -> ArrayRef {
    Arc::new(BooleanArray::from(values))
}

fn table(name: &str, columns: Vec<(&str, ArrayRef)>) -> Dataset {
    Dataset::try_from_columns(name, columns).unwrap()
}

/// Six raw rows, five distinct orders after cleaning: ids 1, 3, 4, 2, 5.
pub fn orders() -> Dataset {
    table(
        "orders",
        vec![
            ("order_id", int(vec![Some(1), Some(2), Some(3), Some(4), Some(2), Some(5)])),
            (
                "customer_id",
                int(vec![Some(100), Some(101), Some(100), Some(102), Some(101), Some(103)]),
            ),
            ("promotion_id", int(vec![None, Some(1), None, Some(2), Some(1), None])),
            (
                "total_amount",
                float(vec![Some(100.0), Some(50.0), Some(200.0), Some(80.0), Some(60.0), Some(300.0)]),
            ),
            (
                "shipping_cost",
                float(vec![Some(5.0), None, Some(0.0), Some(10.0), Some(0.0), None]),
            ),
            (
                "discount_percent",
                float(vec![Some(0.0), Some(25.0), None, Some(10.0), Some(25.0), Some(0.0)]),
            ),
            (
                "status",
                text(vec![
                    Some("Delivered"),
                    Some(" pending"),
                    Some("SHIPPED"),
                    Some("cancelled"),
                    Some("processing"),
                    Some("delivered"),
                ]),
            ),
            (
                "order_date",
                text(vec![
                    Some("2024-01-05"),
                    Some("2024-01-20"),
                    Some("2024-02-03"),
                    Some("2024-02-14"),
                    Some("2024-01-21"),
                    Some("2024-03-01"),
                ]),
            ),
        ],
    )
}

/// Units per order: 1 -> 3, 2 -> 3, 3 -> 4, 4 -> 2, 5 -> none.
/// Units per product: 10 -> 5, 12 -> 4, 11 -> 3.
pub fn order_items() -> Dataset {
    table(
        "order_items",
        vec![
            ("order_id", int(vec![Some(1), Some(1), Some(2), Some(3), Some(4)])),
            ("product_id", int(vec![Some(10), Some(11), Some(10), Some(12), Some(11)])),
            ("quantity", int(vec![Some(2), Some(1), Some(3), Some(4), Some(2)])),
            (
                "unit_price",
                float(vec![Some(30.0), Some(40.0), Some(20.0), Some(50.0), Some(40.0)]),
            ),
            (
                "subtotal",
                float(vec![Some(60.0), Some(40.0), Some(60.0), Some(200.0), Some(80.0)]),
            ),
        ],
    )
}

/// Customer 103 is deliberately absent.
pub fn customers() -> Dataset {
    table(
        "customers",
        vec![
            ("customer_id", int(vec![Some(100), Some(101), Some(102), Some(104)])),
            (
                "segment",
                text(vec![Some("premium"), Some("regular"), Some("regular"), Some("new")]),
            ),
            (
                "registration_date",
                text(vec![
                    Some("2023-01-01"),
                    Some("2023-05-10"),
                    None,
                    Some("2024-03-01"),
                ]),
            ),
            ("city", text(vec![Some("Lyon"), Some("Porto"), Some("Oslo"), Some("Turin")])),
            ("country", text(vec![Some("FR"), Some("PT"), Some("NO"), Some("IT")])),
            (
                "email",
                text(vec![
                    Some("a@example.com"),
                    Some("b@example.com"),
                    None,
                    Some("d@example.com"),
                ]),
            ),
        ],
    )
}

pub fn promotions() -> Dataset {
    table(
        "promotions",
        vec![
            ("promotion_id", int(vec![Some(1), Some(2)])),
            ("promotion_type", text(vec![Some("percentage"), Some("fixed")])),
            ("discount_value", float(vec![Some(25.0), Some(10.0)])),
            ("start_date", text(vec![Some("2024-01-01"), Some("2024-02-01")])),
            ("end_date", text(vec![Some("2024-01-31"), None])),
            ("is_active", boolean(vec![true, false])),
        ],
    )
}

pub fn products() -> Dataset {
    table(
        "products",
        vec![
            ("product_id", int(vec![Some(10), Some(11), Some(12), Some(13)])),
            (
                "product_name",
                text(vec![Some("Widget"), Some("Gadget"), Some("Gizmo"), Some("Doohickey")]),
            ),
            ("category_id", int(vec![Some(1), Some(1), Some(2), Some(2)])),
            ("brand_id", int(vec![Some(7), Some(8), Some(7), Some(9)])),
        ],
    )
}

/// Occupancy ratios: 1 -> 0.8, 2 -> 0.2, 3 -> 0.0 (zero capacity).
pub fn warehouses() -> Dataset {
    table(
        "warehouses",
        vec![
            ("warehouse_id", int(vec![Some(1), Some(2), Some(3)])),
            ("location", text(vec![Some("north"), Some("south"), Some("east")])),
            ("capacity_units", int(vec![Some(1000), Some(500), Some(0)])),
            ("current_occupancy", int(vec![Some(800), Some(100), Some(0)])),
        ],
    )
}

/// Inventory 3 appears twice; the later row (quantity 50) wins.
/// Low stock: 1 (deficit 5), 4 (deficit 20, null quantity), 5 (deficit 0).
/// Overstock: 2. Healthy: 3.
pub fn inventory() -> Dataset {
    table(
        "inventory",
        vec![
            (
                "inventory_id",
                int(vec![Some(3), Some(1), Some(2), Some(3), Some(4), Some(5)]),
            ),
            (
                "product_id",
                int(vec![Some(12), Some(10), Some(11), Some(12), Some(13), Some(10)]),
            ),
            (
                "warehouse_id",
                int(vec![Some(2), Some(1), Some(1), Some(2), Some(2), Some(3)]),
            ),
            (
                "quantity",
                int(vec![Some(999), Some(5), Some(150), Some(50), None, Some(10)]),
            ),
            (
                "min_stock_level",
                int(vec![Some(10), Some(10), Some(10), Some(10), Some(20), Some(10)]),
            ),
            (
                "max_stock_level",
                int(vec![Some(100), Some(100), Some(100), Some(100), Some(100), Some(50)]),
            ),
            (
                "last_restock_date",
                text(vec![
                    Some("2024-01-01"),
                    Some("2024-01-02"),
                    Some("2024-01-03"),
                    Some("2024-01-04"),
                    None,
                    Some("not a date"),
                ]),
            ),
        ],
    )
}

/// Mean rating 20 / 6. Positive: 1, 2, 5. Negative: 3, 4.
pub fn reviews() -> Dataset {
    table(
        "reviews",
        vec![
            (
                "review_id",
                int(vec![Some(1), Some(2), Some(3), Some(4), Some(5), Some(6)]),
            ),
            (
                "product_id",
                int(vec![Some(10), Some(10), Some(10), Some(11), Some(11), Some(12)]),
            ),
            (
                "customer_id",
                int(vec![Some(100), Some(101), Some(102), Some(100), Some(103), Some(104)]),
            ),
            ("rating", int(vec![Some(5), Some(4), Some(2), Some(1), Some(5), Some(3)])),
            (
                "comment",
                text(vec![Some("Great"), None, Some("Meh"), Some("Bad"), Some("Love it"), Some("")]),
            ),
            (
                "helpful_votes",
                int(vec![Some(3), None, Some(0), Some(1), None, Some(2)]),
            ),
            (
                "created_at",
                text(vec![
                    Some("2024-01-10"),
                    Some("2024-01-15"),
                    Some("2024-02-01"),
                    Some("2024-02-02"),
                    Some("2024-02-20"),
                    Some("2024-03-05"),
                ]),
            ),
        ],
    )
}

/// Every raw table keyed by logical name.
pub fn all_tables() -> BTreeMap<String, Dataset> {
    [
        orders(),
        order_items(),
        customers(),
        promotions(),
        products(),
        warehouses(),
        inventory(),
        reviews(),
    ]
    .into_iter()
    .map(|ds| (ds.name().to_string(), ds))
    .collect()
}

pub fn ints(dataset: &Dataset, column: &str) -> Vec<Option<i64>> {
    let values = cast(dataset.column(column).unwrap(), &DataType::Int64).unwrap();
    values.as_primitive::<Int64Type>().iter().collect()
}

pub fn floats(dataset: &Dataset, column: &str) -> Vec<Option<f64>> {
    dataset.float_values(column).unwrap().iter().collect()
}

pub fn strings(dataset: &Dataset, column: &str) -> Vec<Option<String>> {
    let values = cast(dataset.column(column).unwrap(), &DataType::Utf8).unwrap();
    values
        .as_string::<i32>()
        .iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

pub fn bools(dataset: &Dataset, column: &str) -> Vec<Option<bool>> {
    dataset.column(column).unwrap().as_boolean().iter().collect()
}

pub fn approx(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

pub fn nulls(dataset: &Dataset, column: &str) -> usize {
    dataset.column(column).unwrap().logical_null_count()
}
