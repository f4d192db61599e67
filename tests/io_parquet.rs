use anyhow::Result;
use arrow::array::{Array, Int64Array};
use arrow::datatypes::DataType;
use parquet2csv::testing::*;
use parquet2csv::*;

fn open(bytes: Vec<u8>, options: &ReadOptions) -> Result<BatchReader<MockSource>> {
    BatchReader::open(MockSource::new(bytes), options).map_err(|e| e.error)
}

fn ids(stream: BatchStream) -> Result<Vec<i64>> {
    let mut out = Vec::new();
    for batch in stream {
        let batch = batch?;
        let column = batch
            .record()
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("id column is Int64")
            .clone();
        out.extend(column.values().iter().copied());
    }
    Ok(out)
}

#[test]
fn reader_reports_file_shape() -> Result<()> {
    let reader = open(parquet_bytes(&numbered_batches(3, 4)?)?, &ReadOptions::new())?;

    assert_eq!(reader.num_rows(), 12);
    assert_eq!(reader.num_row_groups(), 3);
    let schema = reader.schema();
    assert_eq!(schema.field(0).name(), "id");
    assert_eq!(schema.field(1).name(), "name");
    reader.close()
}

#[test]
fn batches_follow_the_batch_size() -> Result<()> {
    let reader = open(
        parquet_bytes(&numbered_batches(1, 10)?)?,
        &ReadOptions::new().with_batch_size(4),
    )?;

    let sizes: Vec<usize> = reader
        .records(&CancelToken::new(), Selection::all())
        .map(|b| b.map(|b| b.num_rows()))
        .collect::<Result<_>>()?;

    assert_eq!(sizes, vec![4, 4, 2]);
    reader.close()
}

#[test]
fn stream_is_fused_after_an_error() -> Result<()> {
    for parallel in [false, true] {
        let source = MockSource::new(parquet_bytes(&numbered_batches(3, 4)?)?).fail_reads_below(8);
        let closes = source.closes();
        let reader = BatchReader::open(source, &ReadOptions::new().with_parallel(parallel))
            .map_err(|e| e.error)?;

        let mut records = reader.records(&CancelToken::new(), Selection::all());
        assert!(matches!(records.next(), Some(Err(_))), "parallel: {parallel}");
        assert!(records.next().is_none());
        assert!(records.next().is_none());
        assert_eq!(records.delivered(), 0);

        reader.close()?;
        assert_closed_once(&closes);
    }
    Ok(())
}

#[test]
fn column_selection_projects_the_schema() -> Result<()> {
    let reader = open(parquet_bytes(&numbered_batches(2, 3)?)?, &ReadOptions::new())?;

    let records = reader.records(&CancelToken::new(), Selection::all().with_columns(vec![1]));
    assert_eq!(records.schema().fields().len(), 1);
    assert_eq!(records.schema().field(0).name(), "name");

    let mut rows = 0;
    for batch in records {
        let batch = batch?;
        assert_eq!(batch.record().num_columns(), 1);
        rows += batch.num_rows();
    }
    assert_eq!(rows, 6);
    reader.close()
}

#[test]
fn row_group_selection_reads_only_those_groups() -> Result<()> {
    let reader = open(
        parquet_bytes(&numbered_batches(3, 2)?)?,
        &ReadOptions::new(),
    )?;

    let got = ids(reader.records(
        &CancelToken::new(),
        Selection::all().with_row_groups(vec![2, 0]),
    ))?;

    assert_eq!(got, vec![4, 5, 0, 1]);
    reader.close()
}

#[test]
fn unknown_row_group_is_the_only_element() -> Result<()> {
    let reader = open(sample_parquet_bytes()?, &ReadOptions::new())?;

    let mut records = reader.records(&CancelToken::new(), Selection::all().with_row_groups(vec![5]));
    let err = match records.next() {
        Some(Err(e)) => e,
        other => panic!("expected one error, got {other:?}"),
    };
    assert!(err.to_string().contains("row group 5"));
    assert!(records.next().is_none());
    reader.close()
}

#[test]
fn parallel_decode_keeps_file_order() -> Result<()> {
    let bytes = parquet_bytes(&numbered_batches(8, 50)?)?;

    let serial = open(bytes.clone(), &ReadOptions::new().with_batch_size(16))?;
    let parallel = open(bytes, &ReadOptions::new().with_batch_size(16).with_parallel(true))?;

    let expected = ids(serial.records(&CancelToken::new(), Selection::all()))?;
    let got = ids(parallel.records(&CancelToken::new(), Selection::all()))?;

    assert_eq!(expected, (0..400).collect::<Vec<i64>>());
    assert_eq!(got, expected);
    serial.close()?;
    parallel.close()
}

#[test]
fn read_dict_decodes_dictionary_columns() -> Result<()> {
    let reader = open(
        parquet_bytes(&numbered_batches(2, 6)?)?,
        &ReadOptions::new().with_batch_size(6).with_read_dict(1, true),
    )?;

    let expected = DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8));
    assert_eq!(reader.schema().field(1).data_type(), &expected);

    for batch in reader.records(&CancelToken::new(), Selection::all()) {
        let batch = batch?;
        let names = batch.record().column(1);
        assert_eq!(names.data_type(), &expected);
        assert_eq!(names.null_count(), 2);
    }
    reader.close()
}

#[test]
fn force_large_widens_string_columns() -> Result<()> {
    let reader = open(
        parquet_bytes(&numbered_batches(1, 5)?)?,
        &ReadOptions::new().with_force_large(1, true).with_force_large(0, true),
    )?;

    let schema = reader.schema();
    assert_eq!(schema.field(0).data_type(), &DataType::Int64);
    assert_eq!(schema.field(1).data_type(), &DataType::LargeUtf8);

    let mut records = reader.records(&CancelToken::new(), Selection::all());
    let batch = records.next().expect("one batch")?;
    assert_eq!(batch.record().column(1).data_type(), &DataType::LargeUtf8);
    drop(records);
    reader.close()
}

#[test]
fn overrides_for_missing_columns_are_ignored() -> Result<()> {
    let reader = open(
        sample_parquet_bytes()?,
        &ReadOptions::new().with_read_dict(9, true),
    )?;
    assert_eq!(reader.schema().field(1).data_type(), &DataType::Utf8);
    reader.close()
}

#[test]
fn closing_the_reader_fails_the_next_pull() -> Result<()> {
    let reader = open(
        parquet_bytes(&numbered_batches(3, 10)?)?,
        &ReadOptions::new().with_batch_size(10),
    )?;

    let mut records = reader.records(&CancelToken::new(), Selection::all());
    let first = records.next().expect("first batch")?;
    assert_eq!(first.num_rows(), 10);
    reader.close()?;

    let rest: Vec<Result<Batch>> = records.by_ref().collect();
    assert!(matches!(rest.last(), Some(Err(_))));
    assert_eq!(rest.iter().filter(|r| r.is_err()).count(), 1);
    assert!(records.next().is_none());
    Ok(())
}

#[test]
fn second_stream_starts_from_the_beginning() -> Result<()> {
    let reader = open(parquet_bytes(&numbered_batches(2, 3)?)?, &ReadOptions::new())?;

    let first = ids(reader.records(&CancelToken::new(), Selection::all()))?;
    let second = ids(reader.records(&CancelToken::new(), Selection::all()))?;

    assert_eq!(first, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(first, second);
    reader.close()
}

#[test]
fn expired_deadline_stops_the_stream() -> Result<()> {
    let reader = open(sample_parquet_bytes()?, &ReadOptions::new())?;
    let ctx = CancelToken::new().with_timeout(std::time::Duration::ZERO);

    let mut records = reader.records(&ctx, Selection::all());
    let err = match records.next() {
        Some(Err(e)) => e,
        other => panic!("expected a deadline error, got {other:?}"),
    };
    assert_eq!(err.downcast_ref::<Cancelled>(), Some(&Cancelled::DeadlineExceeded));
    reader.close()
}

#[test]
fn pages_are_read_about_once() -> Result<()> {
    let bytes = paged_parquet_bytes(200_000, 1000)?;
    let file_len = bytes.len() as u64;

    for parallel in [false, true] {
        let source = MockSource::new(bytes.clone());
        let reads = source.reads();
        let mut rows = 0;

        ReadOptions::new().with_parallel(parallel).convert(
            &CancelToken::new(),
            source,
            Count::new(&mut rows, SinkOptions::new().with_release_records(true)),
        )?;

        assert_eq!(rows, 200_000);
        assert!(
            reads.bytes() < 2 * file_len,
            "parallel: {parallel}, read {} bytes of a {file_len} byte file",
            reads.bytes()
        );
    }
    Ok(())
}

#[cfg(feature = "parallel-io")]
#[test]
fn queued_row_groups_are_charged_to_the_pool() -> Result<()> {
    let groups = 4;
    let reader = open(
        parquet_bytes(&numbered_batches(groups, 10)?)?,
        &ReadOptions::new().with_batch_size(10).with_parallel(true),
    )?;
    let window = num_cpus::get().clamp(1, groups);

    let mut records = reader.records(&CancelToken::new(), Selection::all());
    let first = records.next().expect("first batch")?;

    let stats = reader.pool().stats();
    assert_eq!(stats.reservations, window);
    assert!(stats.outstanding_bytes >= first.reserved_bytes());

    drop(first);
    drop(records);
    assert_eq!(reader.pool().stats().outstanding_bytes, 0);
    reader.close()
}
