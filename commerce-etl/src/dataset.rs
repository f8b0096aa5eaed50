//! The tabular dataset passed between pipeline stages.
//!
//! A [`Dataset`] is a named Arrow [`RecordBatch`] plus provenance metadata.
//! It is immutable: every transformation returns a new dataset, and cloning
//! only bumps reference counts on the underlying column buffers, so several
//! aggregators can read the same enriched table without copying it.

use crate::error::{EtlError, Result, SchemaValidationError};
use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, UInt32Array};
use arrow::compute::{cast, concat_batches, filter_record_batch, take_record_batch};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, Rows, SortField};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shape and completeness of a dataset at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    /// Total null cells across all columns.
    pub missing_values: usize,
    /// Null cells as a percentage of all cells, rounded to two decimals.
    pub missing_percentage: f64,
    /// In-memory size of the column buffers.
    pub memory_bytes: usize,
}

/// Provenance recorded by the extraction and loading collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Where the data was read from.
    pub source: Option<String>,
    pub extracted_at: Option<DateTime<Utc>>,
    /// Where the data was last written to.
    pub target: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub file_size_bytes: Option<u64>,
    pub profile: Option<DatasetProfile>,
}

/// An immutable, named table of typed columns sharing one row count.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: Arc<str>,
    batch: RecordBatch,
    metadata: DatasetMetadata,
}

impl Dataset {
    /// Wraps a record batch.
    pub fn new(name: impl Into<Arc<str>>, batch: RecordBatch) -> Self {
        Self {
            name: name.into(),
            batch,
            metadata: DatasetMetadata::default(),
        }
    }

    /// Concatenates query output batches into one dataset.
    pub fn from_batches(
        name: impl Into<Arc<str>>,
        schema: SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<Self> {
        let batch = concat_batches(&schema, batches)?;
        Ok(Self::new(name, batch))
    }

    /// Builds a dataset from named columns.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arrow::array::{ArrayRef, Int64Array, StringArray};
    /// use commerce_etl::dataset::Dataset;
    /// use std::sync::Arc;
    ///
    /// let orders = Dataset::try_from_columns(
    ///     "orders",
    ///     vec![
    ///         ("order_id", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
    ///         ("status", Arc::new(StringArray::from(vec!["pending", "shipped"])) as ArrayRef),
    ///     ],
    /// )
    /// .unwrap();
    /// assert_eq!(orders.num_rows(), 2);
    /// ```
    pub fn try_from_columns(
        name: impl Into<Arc<str>>,
        columns: Vec<(&str, ArrayRef)>,
    ) -> Result<Self> {
        let batch = RecordBatch::try_from_iter(columns)?;
        Ok(Self::new(name, batch))
    }

    /// Creates an empty dataset with the given schema.
    pub fn empty(name: impl Into<Arc<str>>, schema: SchemaRef) -> Self {
        Self::new(name, RecordBatch::new_empty(schema))
    }

    /// Creates a one-row, one-column dataset holding a scalar metric.
    pub fn scalar(name: impl Into<Arc<str>>, column: &str, value: f64) -> Result<Self> {
        Self::try_from_columns(
            name,
            vec![(column, Arc::new(Float64Array::from(vec![value])) as ArrayRef)],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a copy under a different name.
    pub fn with_name(&self, name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            batch: self.batch.clone(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema_ref().index_of(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// Returns a column or fails with `MissingRequiredColumns`.
    pub fn require_column(&self, name: &str) -> Result<&ArrayRef> {
        self.column(name).ok_or_else(|| {
            SchemaValidationError::MissingRequiredColumns {
                table: self.name.to_string(),
                columns: vec![name.to_string()],
            }
            .into()
        })
    }

    /// Null count of a column, `None` if the column is absent.
    pub fn null_count(&self, name: &str) -> Option<usize> {
        self.column(name).map(|c| c.logical_null_count())
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Returns a copy carrying the given metadata.
    pub fn with_metadata(mut self, metadata: DatasetMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns a copy with `column` replaced, or appended if absent.
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Self> {
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len() + 1);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() + 1);
        let mut replaced = false;

        for (field, column) in schema.fields().iter().zip(self.batch.columns()) {
            if field.name() == name {
                fields.push(Field::new(name, array.data_type().clone(), true));
                columns.push(Arc::clone(&array));
                replaced = true;
            } else {
                fields.push(field.as_ref().clone());
                columns.push(Arc::clone(column));
            }
        }
        if !replaced {
            fields.push(Field::new(name, array.data_type().clone(), true));
            columns.push(array);
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Ok(self.derive(batch))
    }

    /// Returns a copy without `column`. Absent columns are ignored.
    pub fn without_column(&self, name: &str) -> Result<Self> {
        match self.batch.schema_ref().index_of(name) {
            Ok(idx) => {
                let keep: Vec<usize> = (0..self.num_columns()).filter(|i| *i != idx).collect();
                Ok(self.derive(self.batch.project(&keep)?))
            }
            Err(_) => Ok(self.clone()),
        }
    }

    /// Projects the dataset onto `columns`, in that order.
    pub fn select(&self, columns: &[&str]) -> Result<Self> {
        let schema = self.batch.schema_ref();
        let mut indices = Vec::with_capacity(columns.len());
        let mut missing = Vec::new();
        for column in columns {
            match schema.index_of(column) {
                Ok(idx) => indices.push(idx),
                Err(_) => missing.push((*column).to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(SchemaValidationError::MissingRequiredColumns {
                table: self.name.to_string(),
                columns: missing,
            }
            .into());
        }
        Ok(self.derive(self.batch.project(&indices)?))
    }

    /// Gathers rows by index, in index order.
    pub fn take(&self, indices: &UInt32Array) -> Result<Self> {
        Ok(self.derive(take_record_batch(&self.batch, indices)?))
    }

    /// Keeps the rows where `predicate` is true; null counts as false.
    pub fn filter(&self, predicate: &BooleanArray) -> Result<Self> {
        Ok(self.derive(filter_record_batch(&self.batch, predicate)?))
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> Self {
        let len = n.min(self.num_rows());
        self.derive(self.batch.slice(0, len))
    }

    /// Reads a numeric column as `f64`.
    pub fn float_values(&self, name: &str) -> Result<Float64Array> {
        let values = cast(self.require_column(name)?, &DataType::Float64)?;
        values
            .as_any()
            .downcast_ref::<Float64Array>()
            .cloned()
            .ok_or_else(|| EtlError::Internal(format!("Column '{name}' is not numeric")))
    }

    /// Encodes the given key columns into comparable, hashable rows.
    ///
    /// Null key values compare equal to each other, so two rows with a null in
    /// the same key position count as the same key.
    pub fn key_rows(&self, columns: &[&str]) -> Result<Rows> {
        if columns.is_empty() {
            return Err(EtlError::Internal(format!(
                "No key columns given for table '{}'",
                self.name
            )));
        }
        let arrays = columns
            .iter()
            .map(|c| self.require_column(c).cloned())
            .collect::<Result<Vec<_>>>()?;
        let fields = arrays
            .iter()
            .map(|a| SortField::new(a.data_type().clone()))
            .collect();
        let converter = RowConverter::new(fields)?;
        Ok(converter.convert_columns(&arrays)?)
    }

    /// Computes the shape and completeness profile of the current contents.
    pub fn profile(&self) -> DatasetProfile {
        let rows = self.num_rows();
        let columns = self.num_columns();
        let missing_values: usize = self.batch.columns().iter().map(|c| c.logical_null_count()).sum();
        let cells = rows * columns;
        let missing_percentage = if cells == 0 {
            0.0
        } else {
            ((missing_values as f64 / cells as f64) * 10_000.0).round() / 100.0
        };

        DatasetProfile {
            rows,
            columns,
            column_names: self.column_names().into_iter().map(String::from).collect(),
            missing_values,
            missing_percentage,
            memory_bytes: self.batch.get_array_memory_size(),
        }
    }

    fn derive(&self, batch: RecordBatch) -> Self {
        Self {
            name: Arc::clone(&self.name),
            batch,
            metadata: self.metadata.clone(),
        }
    }
}
