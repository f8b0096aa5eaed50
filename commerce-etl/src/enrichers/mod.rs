//! Enrichment of cleaned entity tables.
//!
//! Each enricher runs the same sequence:
//!
//! 1. clean the driving table with its injected cleaner;
//! 2. validate and normalize every reference catalog;
//! 3. left-join the catalogs on their foreign keys;
//! 4. add entity-specific aggregates (orders only: basket size and average
//!    item price);
//! 5. derive flag and period columns.
//!
//! The output always has exactly as many rows as the cleaned table. Catalog
//! misses surface as nulls in the joined columns, never as dropped rows.

mod catalog;
mod derive;
mod inventory;
mod join;
mod orders;
mod reviews;

pub use catalog::CatalogSpec;
pub use derive::Period;
pub use inventory::{InventoryCatalogs, InventoryEnricher};
pub use join::left_join;
pub use orders::{OrdersCatalogs, OrdersEnricher, HIGH_DISCOUNT_PERCENT};
pub use reviews::{ReviewsCatalogs, ReviewsEnricher, NEGATIVE_RATING, POSITIVE_RATING};

use crate::dataset::Dataset;
use crate::error::{EtlError, Result};
use crate::logging::EtlLogger;
use async_trait::async_trait;

/// Joins a driving table against its catalogs and derives analytics columns.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// The reference tables this enricher joins.
    type Catalogs: Send + Sync;

    /// Cleans `primary` and enriches it. Never changes its row count.
    async fn enrich(&self, primary: &Dataset, catalogs: &Self::Catalogs) -> Result<Dataset>;
}

fn ensure_row_count(cleaned: &Dataset, enriched: &Dataset, logger: &EtlLogger) -> Result<()> {
    if cleaned.num_rows() != enriched.num_rows() {
        return Err(logger.raise(EtlError::data_quality(
            cleaned.name(),
            format!(
                "enrichment changed row count from {} to {}",
                cleaned.num_rows(),
                enriched.num_rows()
            ),
        )));
    }
    Ok(())
}
