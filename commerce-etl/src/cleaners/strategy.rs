//! Null-fill strategies shared by every cleaner.

use crate::dataset::Dataset;
use crate::error::Result;
use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, Scalar, StringArray};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{cast, is_null};
use arrow::datatypes::DataType;
use std::sync::Arc;

/// A literal used to fill missing values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillValue {
    Integer(i64),
    Float(f64),
    Text(&'static str),
    Boolean(bool),
}

impl FillValue {
    fn to_array(self) -> ArrayRef {
        match self {
            Self::Integer(v) => Arc::new(Int64Array::from(vec![v])),
            Self::Float(v) => Arc::new(Float64Array::from(vec![v])),
            Self::Text(v) => Arc::new(StringArray::from(vec![v])),
            Self::Boolean(v) => Arc::new(BooleanArray::from(vec![v])),
        }
    }
}

/// Declared policy for filling missing values in one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NullStrategy {
    /// Replace nulls with zero in the column's own type.
    FillZero,
    /// Replace nulls with an entity-specific default.
    FillDefault(FillValue),
}

impl NullStrategy {
    fn fill_value(&self) -> FillValue {
        match self {
            Self::FillZero => FillValue::Integer(0),
            Self::FillDefault(value) => *value,
        }
    }
}

/// Fills the nulls of `column` according to `strategy`.
///
/// The fill literal is cast to the column's type, so zero-filling a raw text
/// column writes `"0"`, which later coerces to a number. A column with no
/// nulls is returned unchanged.
pub fn fill_nulls(dataset: &Dataset, column: &str, strategy: NullStrategy) -> Result<Dataset> {
    let array = dataset.require_column(column)?;
    let literal = strategy.fill_value().to_array();
    // An all-null column has no type of its own; adopt the literal's.
    let array = if array.data_type() == &DataType::Null {
        cast(array, literal.data_type())?
    } else {
        Arc::clone(array)
    };
    if array.null_count() == 0 {
        return Ok(dataset.clone());
    }

    let fill = Scalar::new(cast(&literal, array.data_type())?);
    let mask = is_null(&array)?;
    let filled = zip(&mask, &fill, &array)?;
    dataset.with_column(column, filled)
}
