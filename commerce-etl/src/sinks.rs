//! Loading collaborators that persist result datasets.

use crate::dataset::{Dataset, DatasetMetadata};
use crate::error::{EtlError, Result};
use crate::logging::EtlLogger;
use arrow::csv::WriterBuilder;
use chrono::Utc;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// A destination for named result tables.
pub trait Loader: Debug + Send + Sync {
    /// Writes `dataset` under `name` and returns where and when it landed.
    fn save(&self, dataset: &Dataset, name: &str) -> Result<DatasetMetadata>;

    /// File extension this loader produces, without the dot.
    fn extension(&self) -> &'static str;
}

fn check_target_dir(root: &Path, logger: &EtlLogger) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(logger.raise(EtlError::data_source(
            "directory",
            format!("target directory '{}' does not exist", root.display()),
        )))
    }
}

fn target_path(root: &Path, name: &str, extension: &str, logger: &EtlLogger) -> Result<PathBuf> {
    if name.trim().is_empty() {
        return Err(logger.raise(EtlError::Configuration(
            "output name must not be empty".to_string(),
        )));
    }
    check_target_dir(root, logger)?;
    Ok(root.join(format!("{name}.{extension}")))
}

fn loaded_metadata(dataset: &Dataset, path: &Path) -> Result<DatasetMetadata> {
    let size = std::fs::metadata(path)?.len();
    Ok(DatasetMetadata {
        target: Some(path.display().to_string()),
        loaded_at: Some(Utc::now()),
        file_size_bytes: Some(size),
        ..dataset.metadata().clone()
    })
}

/// Writes `<root>/<name>.csv` with a header row.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    root: PathBuf,
    logger: EtlLogger,
}

impl CsvLoader {
    pub fn new(root: impl AsRef<Path>, logger: EtlLogger) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            logger: logger.for_component("csv_loader"),
        }
    }
}

impl Loader for CsvLoader {
    #[instrument(skip(self, dataset), fields(rows = dataset.num_rows()))]
    fn save(&self, dataset: &Dataset, name: &str) -> Result<DatasetMetadata> {
        let path = target_path(&self.root, name, self.extension(), &self.logger)?;
        let file = File::create(&path).map_err(|e| self.logger.raise(e))?;
        write_csv(dataset, file).map_err(|e| self.logger.raise(e))?;

        let metadata = loaded_metadata(dataset, &path)?;
        crate::log_data_op!(
            self.logger,
            table = name,
            path = %path.display(),
            bytes = metadata.file_size_bytes,
            "Saved CSV"
        );
        Ok(metadata)
    }

    fn extension(&self) -> &'static str {
        "csv"
    }
}

/// Writes `dataset` as CSV with a header row and flushes, returning the sink.
fn write_csv<W: Write>(dataset: &Dataset, sink: W) -> Result<W> {
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(BufWriter::new(sink));
    writer.write(dataset.batch())?;
    writer
        .into_inner()
        .into_inner()
        .map_err(|e| EtlError::Io(e.into_error()))
}

/// Writes `<root>/<name>.parquet`, snappy-compressed unless configured otherwise.
#[derive(Debug, Clone)]
pub struct ParquetLoader {
    root: PathBuf,
    compression: Compression,
    logger: EtlLogger,
}

impl ParquetLoader {
    pub fn new(root: impl AsRef<Path>, logger: EtlLogger) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            compression: Compression::SNAPPY,
            logger: logger.for_component("parquet_loader"),
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

impl Loader for ParquetLoader {
    #[instrument(skip(self, dataset), fields(rows = dataset.num_rows()))]
    fn save(&self, dataset: &Dataset, name: &str) -> Result<DatasetMetadata> {
        let path = target_path(&self.root, name, self.extension(), &self.logger)?;
        let file = File::create(&path).map_err(|e| self.logger.raise(e))?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .build();
        let mut writer = ArrowWriter::try_new(file, dataset.schema(), Some(props))
            .map_err(|e| self.logger.raise(e))?;
        writer
            .write(dataset.batch())
            .map_err(|e| self.logger.raise(e))?;
        writer.close().map_err(|e| self.logger.raise(e))?;

        let metadata = loaded_metadata(dataset, &path)?;
        crate::log_data_op!(
            self.logger,
            table = name,
            path = %path.display(),
            bytes = metadata.file_size_bytes,
            "Saved Parquet"
        );
        Ok(metadata)
    }

    fn extension(&self) -> &'static str {
        "parquet"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn monthly_sales() -> Dataset {
        Dataset::try_from_columns(
            "monthly_sales",
            vec![
                (
                    "order_month",
                    Arc::new(StringArray::from(vec!["2024-01", "2024-02"])) as ArrayRef,
                ),
                (
                    "revenue",
                    Arc::new(Float64Array::from(vec![Some(100.0), None])) as ArrayRef,
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_csv_loader_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let loader = CsvLoader::new(dir.path(), EtlLogger::loading());
        let metadata = loader.save(&monthly_sales(), "monthly_sales").unwrap();

        let content = std::fs::read_to_string(dir.path().join("monthly_sales.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "order_month,revenue");
        assert_eq!(lines.len(), 3);
        assert!(metadata.target.unwrap().ends_with("monthly_sales.csv"));
        assert!(metadata.file_size_bytes.unwrap() > 0);
        assert!(metadata.loaded_at.is_some());
    }

    #[test]
    fn test_parquet_loader_round_trips_row_count() {
        let dir = TempDir::new().unwrap();
        let loader = ParquetLoader::new(dir.path(), EtlLogger::loading());
        loader.save(&monthly_sales(), "monthly_sales").unwrap();

        let file = File::open(dir.path().join("monthly_sales.parquet")).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 2);
    }

    /// Accepts nothing, so buffered output fails when flushed.
    #[derive(Debug)]
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_csv_flush_failure_is_reported() {
        let err = write_csv(&monthly_sales(), FullDisk).unwrap_err();
        assert_eq!(err.kind(), "IoError");
        assert!(err.to_string().contains("no space left"));
    }

    #[test]
    fn test_write_csv_returns_flushed_sink() {
        let bytes = write_csv(&monthly_sales(), Vec::new()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("order_month,revenue\n2024-01,"));
    }

    #[test]
    fn test_loaders_reject_bad_targets() {
        let loader = CsvLoader::new("/definitely/not/here", EtlLogger::loading());
        let err = loader.save(&monthly_sales(), "monthly_sales").unwrap_err();
        assert_eq!(err.kind(), "DataSourceError");

        let dir = TempDir::new().unwrap();
        let loader = ParquetLoader::new(dir.path(), EtlLogger::loading());
        let err = loader.save(&monthly_sales(), "").unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }
}
