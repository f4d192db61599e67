//! Pre-built Parquet files for common testing scenarios.

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

/// `int_field: Int64, string_field: Utf8`.
#[must_use]
pub fn sample_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("int_field", DataType::Int64, false),
        Field::new("string_field", DataType::Utf8, false),
    ]))
}

/// Three rows: `(1, "a")`, `(2, "b")`, `(3, "c")`.
///
/// # Errors
/// Only if Arrow rejects the columns, which it does not for this schema.
pub fn sample_batch() -> Result<RecordBatch> {
    let ints: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
    let strings: ArrayRef = Arc::new(StringArray::from(vec!["a", "b", "c"]));
    RecordBatch::try_new(sample_schema(), vec![ints, strings]).context("build sample batch")
}

/// [`sample_batch`] as a one row group Parquet file.
///
/// # Errors
/// If writing the file fails.
pub fn sample_parquet_bytes() -> Result<Vec<u8>> {
    parquet_bytes(&[sample_batch()?])
}

/// Write `batches` to an in-memory Parquet file, one row group per batch.
///
/// # Errors
/// If `batches` is empty, the schemas differ, or writing fails.
pub fn parquet_bytes(batches: &[RecordBatch]) -> Result<Vec<u8>> {
    let first = batches.first().context("need at least one batch for the schema")?;
    let mut buf = Vec::new();
    let mut writer =
        ArrowWriter::try_new(&mut buf, first.schema(), None).context("create ArrowWriter")?;
    for batch in batches {
        writer.write(batch).context("write batch to parquet")?;
        writer.flush().context("close row group")?;
    }
    writer.close().context("close ArrowWriter")?;
    Ok(buf)
}

/// A single row group of `rows` plain-encoded ids (`id: Int64`), cut into
/// data pages of `rows_per_page` rows.
///
/// # Errors
/// If writing the file fails.
pub fn paged_parquet_bytes(rows: usize, rows_per_page: usize) -> Result<Vec<u8>> {
    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
    let ids: Vec<i64> = (0..i64::try_from(rows)?).collect();
    let batch = RecordBatch::try_new(Arc::clone(&schema), vec![Arc::new(Int64Array::from(ids))])
        .context("build paged batch")?;
    let props = WriterProperties::builder()
        .set_dictionary_enabled(false)
        .set_write_batch_size(rows_per_page)
        .set_data_page_row_count_limit(rows_per_page)
        .build();

    let mut buf = Vec::new();
    let mut writer =
        ArrowWriter::try_new(&mut buf, schema, Some(props)).context("create ArrowWriter")?;
    writer.write(&batch).context("write batch to parquet")?;
    writer.close().context("close ArrowWriter")?;
    Ok(buf)
}

/// `id: Int64, name: Utf8 (nullable)` split into `groups` batches of
/// `rows_per_group` rows.
///
/// Ids count up from 0 across batches. Every third name is null, the others
/// are `name-{id}`.
///
/// # Errors
/// Only if Arrow rejects the columns.
pub fn numbered_batches(groups: usize, rows_per_group: usize) -> Result<Vec<RecordBatch>> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ]));
    (0..groups)
        .map(|g| {
            let start = g * rows_per_group;
            let ids: Vec<i64> = (start..start + rows_per_group)
                .map(|i| i64::try_from(i).unwrap_or(i64::MAX))
                .collect();
            let names: Vec<Option<String>> = ids
                .iter()
                .map(|id| (id % 3 != 0).then(|| format!("name-{id}")))
                .collect();
            let columns: Vec<ArrayRef> = vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(StringArray::from(names)),
            ];
            RecordBatch::try_new(Arc::clone(&schema), columns).context("build numbered batch")
        })
        .collect()
}

/// Rows whose text needs quoting: embedded delimiters, quotes and line
/// breaks, plus a null.
///
/// # Errors
/// Only if Arrow rejects the columns.
pub fn awkward_batch() -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("key", DataType::Int64, false),
        Field::new("text", DataType::Utf8, true),
    ]));
    let texts = awkward_texts();
    let keys: Vec<i64> = (1..=i64::try_from(texts.len())?).collect();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(keys)),
        Arc::new(StringArray::from(texts)),
    ];
    RecordBatch::try_new(schema, columns).context("build awkward batch")
}

/// The `text` column of [`awkward_batch`].
#[must_use]
pub fn awkward_texts() -> Vec<Option<&'static str>> {
    vec![
        Some("plain"),
        Some("with,comma"),
        Some("with;semicolon"),
        Some("with \"quotes\""),
        Some("two\nlines"),
        Some("tab\tseparated"),
        None,
    ]
}
