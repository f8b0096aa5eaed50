//! Prelude for commonly used types and traits in commerce-etl.

pub use crate::cleaners::{DataCleaner, InventoryCleaner, OrdersCleaner, ReviewsCleaner};
pub use crate::config::PipelineConfig;
pub use crate::context::{EtlContext, EtlContextConfig};
pub use crate::dataset::Dataset;
pub use crate::enrichers::{Enricher, InventoryEnricher, OrdersEnricher, ReviewsEnricher};
pub use crate::error::{ErrorContext, EtlError, Result, SchemaValidationError};
pub use crate::logging::{EtlLogger, LogConfig};
pub use crate::pipeline::EtlPipeline;
