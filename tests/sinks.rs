use anyhow::Result;
use parquet2csv::testing::*;
use parquet2csv::*;

#[test]
fn count_sink_counts_rows() -> Result<()> {
    let mut rows = 0;
    convert(
        &CancelToken::new(),
        MockSource::new(sample_parquet_bytes()?),
        Count::new(&mut rows, SinkOptions::new()),
    )?;
    assert_eq!(rows, 3);
    Ok(())
}

#[test]
fn count_sink_adds_to_an_existing_count() -> Result<()> {
    let mut rows = 10;
    ReadOptions::new().with_batch_size(7).convert(
        &CancelToken::new(),
        MockSource::new(parquet_bytes(&numbered_batches(3, 20)?)?),
        Count::new(&mut rows, SinkOptions::new().with_release_records(true)),
    )?;
    assert_eq!(rows, 70);
    Ok(())
}

#[test]
fn discard_with_release_releases_every_batch() -> Result<()> {
    let pool = MemoryPool::new();
    ReadOptions::new().with_batch_size(10).convert_in(
        &CancelToken::new(),
        MockSource::new(parquet_bytes(&numbered_batches(4, 10)?)?),
        Discard::new(SinkOptions::new().with_release_records(true)),
        pool.clone(),
    )?;

    let stats = pool.stats();
    assert_eq!(stats.reservations, 4);
    assert_eq!(stats.released_early, 4);
    assert_eq!(stats.outstanding_bytes, 0);
    Ok(())
}

#[test]
fn discard_without_release_leaves_batches_unreleased() -> Result<()> {
    let pool = MemoryPool::new();
    ReadOptions::new().with_batch_size(10).convert_in(
        &CancelToken::new(),
        MockSource::new(parquet_bytes(&numbered_batches(4, 10)?)?),
        Discard::new(SinkOptions::new()),
        pool.clone(),
    )?;

    let stats = pool.stats();
    assert_eq!(stats.reservations, 4);
    assert_eq!(stats.released_early, 0);
    // Dropped batches still give their memory back.
    assert_eq!(stats.outstanding_bytes, 0);
    Ok(())
}

#[test]
fn release_marks_each_observed_batch() -> Result<()> {
    let reader = BatchReader::open(
        MockSource::new(parquet_bytes(&numbered_batches(3, 4)?)?),
        &ReadOptions::new().with_batch_size(4),
    )
    .map_err(|e| e.error)?;

    let mut probes = Vec::new();
    for batch in reader.records(&CancelToken::new(), Selection::all()) {
        let batch = batch?;
        let probe = batch.probe();
        assert!(!probe.is_released());
        batch.release();
        probes.push(probe);
    }

    assert_eq!(probes.len(), 3);
    assert!(probes.iter().all(ReleaseProbe::is_released));
    assert_eq!(reader.pool().stats().outstanding_bytes, 0);
    reader.close()
}

#[test]
fn dropping_a_batch_does_not_mark_it_released() -> Result<()> {
    let reader = BatchReader::open(MockSource::new(sample_parquet_bytes()?), &ReadOptions::new())
        .map_err(|e| e.error)?;

    let mut records = reader.records(&CancelToken::new(), Selection::all());
    let batch = records.next().expect("one batch")?;
    let probe = batch.probe();
    assert!(batch.reserved_bytes() > 0);
    assert!(reader.pool().stats().outstanding_bytes > 0);
    drop(batch);

    assert!(!probe.is_released());
    assert_eq!(reader.pool().stats().outstanding_bytes, 0);
    reader.close()
}

#[test]
fn sinks_return_the_stream_error() -> Result<()> {
    let mut rows = 0;
    let err = convert(
        &CancelToken::new(),
        MockSource::new(sample_parquet_bytes()?).fail_reads_below(8),
        Count::new(&mut rows, SinkOptions::new()),
    )
    .unwrap_err();
    assert!(!err.to_string().is_empty());

    let err = convert(
        &CancelToken::new(),
        MockSource::new(sample_parquet_bytes()?).fail_reads_below(8),
        Discard::new(SinkOptions::new().with_release_records(true)),
    );
    assert!(err.is_err());
    Ok(())
}
