//! Writers for scored rows: CSV or Parquet

use crate::config::FEATURE_DIMS;
use crate::scorer::ScoredUser;
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

// Macro for creating Arrow schema fields
macro_rules! field {
    ($name:expr, $data_type:expr) => {
        Field::new($name, $data_type, false)
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

fn weight_column(i: usize) -> String {
    format!("w{}", i)
}

fn header() -> Vec<String> {
    let mut columns = vec!["user_id".to_string(), "predicted_label".to_string()];
    columns.extend((0..FEATURE_DIMS).map(weight_column));
    columns
}

/// Rows are staged in `<path>.partial` and renamed into place once complete,
/// so a failed write never leaves a truncated result behind.
pub fn write_results(path: &Path, rows: &[ScoredUser], format: OutputFormat) -> Result<()> {
    let staging = staging_path(path);
    match format {
        OutputFormat::Csv => write_csv(&staging, rows)?,
        OutputFormat::Parquet => write_parquet(&staging, rows)?,
    }
    std::fs::rename(&staging, path)
        .with_context(|| format!("moving results into {}", path.display()))?;
    info!("Wrote {} scored users to {}", rows.len(), path.display());
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

pub fn write_csv(path: &Path, rows: &[ScoredUser]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header())?;
    for row in rows {
        let mut record = Vec::with_capacity(2 + FEATURE_DIMS);
        record.push(row.user_id.clone());
        record.push(row.predicted_label.to_string());
        record.extend(row.weights.iter().map(|w| w.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn results_schema() -> Schema {
    let mut fields = vec![
        field!("user_id", DataType::Utf8),
        field!("predicted_label", DataType::Int32),
    ];
    fields.extend((0..FEATURE_DIMS).map(|i| field!(weight_column(i), DataType::Float64)));
    Schema::new(fields)
}

fn create_parquet_writer(output_path: &Path, schema: Arc<Schema>) -> Result<ArrowWriter<File>> {
    let file = File::create(output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let writer = ArrowWriter::try_new(file, schema, Some(props))?;
    Ok(writer)
}

pub fn results_to_record_batch(rows: &[ScoredUser]) -> Result<RecordBatch> {
    let schema = Arc::new(results_schema());
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.user_id.as_str()),
        )),
        Arc::new(Int32Array::from_iter_values(
            rows.iter().map(|r| i32::from(r.predicted_label)),
        )),
    ];
    for i in 0..FEATURE_DIMS {
        columns.push(Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.weights[i]),
        )));
    }
    Ok(RecordBatch::try_new(schema, columns)?)
}

pub fn write_parquet(path: &Path, rows: &[ScoredUser]) -> Result<()> {
    let batch = results_to_record_batch(rows)?;
    let mut writer = create_parquet_writer(path, batch.schema())?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
