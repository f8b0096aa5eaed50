//! # commerce-etl - Batch transform stage for e-commerce data
//!
//! `commerce-etl` turns raw e-commerce tables (orders, order items, customers,
//! promotions, products, inventory, warehouses, reviews) into cleaned,
//! enriched tables and a set of business metrics. Tables are Arrow record
//! batches; joins and aggregations run on DataFusion.
//!
//! ## Overview
//!
//! The transform stage runs three independent entity pipelines:
//!
//! - **Cleaning**: each [`cleaners::DataCleaner`] validates required columns,
//!   fills or rejects nulls, removes duplicate keys keeping the last
//!   occurrence, coerces types (unparseable values become null and the change
//!   is logged) and validates ranges and key uniqueness.
//! - **Enrichment**: each [`enrichers::Enricher`] cleans its driving table,
//!   left-joins the reference catalogs and derives flag and period columns.
//!   The row count never changes.
//! - **Aggregation**: the [`aggregators`] compute customer, product, sales,
//!   inventory, review and order-lifecycle metrics from the enriched tables.
//!
//! [`pipeline::EtlPipeline`] wires extraction, transformation and loading
//! together and reports per-stage metrics.
//!
//! ## Quick Start
//!
//! ```rust
//! use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
//! use commerce_etl::prelude::*;
//! use std::sync::Arc;
//!
//! let orders = Dataset::try_from_columns(
//!     "orders",
//!     vec![
//!         ("order_id", Arc::new(Int64Array::from(vec![1, 1, 2])) as ArrayRef),
//!         ("customer_id", Arc::new(Int64Array::from(vec![10, 10, 11])) as ArrayRef),
//!         ("promotion_id", Arc::new(Int64Array::from(vec![None, None, Some(3)])) as ArrayRef),
//!         ("total_amount", Arc::new(Float64Array::from(vec![20.0, 25.0, 40.0])) as ArrayRef),
//!         ("shipping_cost", Arc::new(Float64Array::from(vec![None, Some(5.0), Some(0.0)])) as ArrayRef),
//!         ("discount_percent", Arc::new(Float64Array::from(vec![0.0, 0.0, 25.0])) as ArrayRef),
//!         ("status", Arc::new(StringArray::from(vec!["Pending", "shipped ", "delivered"])) as ArrayRef),
//!         ("order_date", Arc::new(StringArray::from(vec!["2024-01-05", "2024-01-06", "2024-02-01"])) as ArrayRef),
//!     ],
//! )?;
//!
//! let cleaned = OrdersCleaner::new(EtlLogger::transformation()).clean(&orders)?;
//! // Duplicate order 1 collapses to its last occurrence.
//! assert_eq!(cleaned.num_rows(), 2);
//! # Ok::<(), commerce_etl::error::EtlError>(())
//! ```
//!
//! ## Logging
//!
//! Every component receives an [`logging::EtlLogger`] at construction. The
//! process-wide subscriber is installed once by the embedding binary:
//!
//! ```rust,no_run
//! use commerce_etl::logging::setup::{init_logging, LoggingConfig};
//!
//! init_logging(LoggingConfig::production()).expect("logging already initialized");
//! ```
//!
//! ## Errors
//!
//! All fallible operations return [`error::Result`]. Contract violations are
//! typed [`error::SchemaValidationError`]s naming the failing column and
//! constraint; each is logged when raised.

pub mod aggregators;
pub mod cleaners;
pub mod coercion;
pub mod config;
pub mod context;
pub mod dataset;
pub mod enrichers;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod prelude;
pub mod security;
pub mod sinks;
pub mod sources;
pub mod validation;
