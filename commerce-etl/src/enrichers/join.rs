//! Row-preserving left joins.

use crate::coercion::{coerce_array, ColumnType};
use crate::context::EtlContext;
use crate::dataset::Dataset;
use crate::error::{EtlError, Result};
use crate::logging::EtlLogger;
use crate::security::{qualified_list, SqlIdent};
use arrow::array::{Array, ArrayRef, UInt64Array};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::DataType;
use std::sync::Arc;

/// Column carrying the driving table's row position through a join.
pub(crate) const ROW_ORDER: &str = "__row_order";
/// Key compared by the join, typed alike on both sides.
const JOIN_KEY: &str = "__join_key";

/// Left-joins `catalog` onto `driving` on `key`, keeping every driving row in
/// its original order.
///
/// Driving rows without a match get nulls in every joined column. The driving
/// table's own columns, the key included, come back unchanged. Fails with
/// `DataQuality` when a joined column already exists in the driving table or
/// when duplicate catalog keys change the row count.
pub async fn left_join(
    ctx: &EtlContext,
    driving: &Dataset,
    catalog: &Dataset,
    key: &str,
    logger: &EtlLogger,
) -> Result<Dataset> {
    driving.require_column(key)?;
    catalog.require_column(key)?;

    let joined: Vec<&str> = catalog
        .column_names()
        .into_iter()
        .filter(|c| *c != key)
        .collect();
    let collisions: Vec<&str> = joined
        .iter()
        .copied()
        .filter(|c| driving.has_column(c))
        .collect();
    if !collisions.is_empty() {
        return Err(logger.raise(EtlError::data_quality(
            driving.name(),
            format!(
                "joining '{}' would overwrite existing columns: {}",
                catalog.name(),
                collisions.join(", ")
            ),
        )));
    }

    let (left_key, right_key) = join_keys(driving, catalog, key)?;
    let positions: ArrayRef = Arc::new(UInt64Array::from_iter_values(
        0..driving.num_rows() as u64,
    ));
    let lhs = driving
        .with_column(JOIN_KEY, left_key)?
        .with_column(ROW_ORDER, positions)?;
    let rhs = catalog.with_column(JOIN_KEY, right_key)?;

    let join_sql = SqlIdent::new(JOIN_KEY)?;
    let order_sql = SqlIdent::new(ROW_ORDER)?;
    let mut select = "l.*".to_string();
    if !joined.is_empty() {
        select.push_str(", ");
        select.push_str(&qualified_list("r", joined.iter().copied())?);
    }
    let sql = format!(
        "SELECT {select} FROM lhs l LEFT JOIN rhs r ON l.{join_sql} = r.{join_sql} ORDER BY l.{order_sql}"
    );

    let result = ctx
        .query(&[("lhs", &lhs), ("rhs", &rhs)], &sql, driving.name())
        .await?
        .without_column(ROW_ORDER)?
        .without_column(JOIN_KEY)?
        .with_metadata(driving.metadata().clone());

    if result.num_rows() != driving.num_rows() {
        return Err(logger.raise(EtlError::data_quality(
            driving.name(),
            format!(
                "join with '{}' changed row count from {} to {}; catalog key '{key}' is not unique",
                catalog.name(),
                driving.num_rows(),
                result.num_rows()
            ),
        )));
    }

    crate::perf_debug!(
        logger,
        table = driving.name(),
        catalog = catalog.name(),
        key,
        joined_columns = joined.len(),
        "Left join finished"
    );
    Ok(result)
}

/// Join key arrays for both sides, typed alike.
///
/// The catalog key is coerced to the driving key's type with the same
/// coerce-or-null rules as cleaning, so `"10"` matches `10` while `"10.5"`
/// matches nothing. An untyped (all-null) driving key adopts the catalog's
/// type.
fn join_keys(driving: &Dataset, catalog: &Dataset, key: &str) -> Result<(ArrayRef, ArrayRef)> {
    let left = driving.require_column(key)?;
    let right = catalog.require_column(key)?;
    if left.data_type() == right.data_type() {
        return Ok((Arc::clone(left), Arc::clone(right)));
    }

    let options = CastOptions {
        safe: true,
        ..Default::default()
    };
    if left.data_type() == &DataType::Null {
        let left = cast_with_options(left, right.data_type(), &options)?;
        return Ok((left, Arc::clone(right)));
    }
    let right = match left.data_type() {
        DataType::Int64 => coerce_array(right, ColumnType::Integer)?,
        DataType::Float64 => coerce_array(right, ColumnType::Float)?,
        other => cast_with_options(right, other, &options)?,
    };
    Ok((Arc::clone(left), right))
}
