//! Parquet snapshots: one Arrow `RecordBatch` in the classified-review schema.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Date32Array, Float32Array, StringArray, UInt8Array};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use reviewpulse_core::schema::classified_review_schema;
use reviewpulse_core::{ClassifiedReview, SnapshotRecord};
use tracing::info;

use crate::StoreError;
use crate::json::persist_atomically;

/// Days from 0001-01-01 (CE) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub struct ParquetSnapshot;

impl ParquetSnapshot {
    pub fn write(path: &Path, reviews: &[ClassifiedReview]) -> Result<(), StoreError> {
        let batch = to_record_batch(reviews)?;
        persist_atomically(path, |file| {
            let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
            writer.write(&batch)?;
            writer.close()?;
            Ok(())
        })?;
        info!(path = %path.display(), count = reviews.len(), "wrote parquet snapshot");
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Vec<ClassifiedReview>, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut reviews = Vec::new();
        for batch in reader {
            from_record_batch(&batch?, &mut reviews)?;
        }
        info!(path = %path.display(), count = reviews.len(), "read parquet snapshot");
        Ok(reviews)
    }
}

pub fn to_record_batch(reviews: &[ClassifiedReview]) -> Result<RecordBatch, StoreError> {
    let records: Vec<SnapshotRecord> =
        reviews.iter().cloned().map(SnapshotRecord::from).collect();

    let title = StringArray::from_iter_values(records.iter().map(|r| r.title.as_str()));
    let body = StringArray::from_iter_values(records.iter().map(|r| r.body.as_str()));
    let date = Date32Array::from_iter_values(
        records
            .iter()
            .map(|r| r.date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
    );
    let month = UInt8Array::from_iter_values(records.iter().map(|r| r.month as u8));
    let label = StringArray::from_iter_values(records.iter().map(|r| r.label.as_str()));
    let confidence = Float32Array::from_iter_values(records.iter().map(|r| r.confidence));
    let id: StringArray = records.iter().map(|r| r.id.as_deref()).collect();
    let rating: UInt8Array = records.iter().map(|r| r.rating).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(title),
        Arc::new(body),
        Arc::new(date),
        Arc::new(month),
        Arc::new(label),
        Arc::new(confidence),
        Arc::new(id),
        Arc::new(rating),
    ];
    Ok(RecordBatch::try_new(Arc::new(classified_review_schema()), columns)?)
}

fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a T, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| StoreError::Invalid(format!("missing or mistyped column {name:?}")))
}

fn from_record_batch(
    batch: &RecordBatch,
    out: &mut Vec<ClassifiedReview>,
) -> Result<(), StoreError> {
    let title = column::<StringArray>(batch, "title")?;
    let body = column::<StringArray>(batch, "body")?;
    let date = column::<Date32Array>(batch, "date")?;
    let month = column::<UInt8Array>(batch, "month")?;
    let label = column::<StringArray>(batch, "label")?;
    let confidence = column::<Float32Array>(batch, "confidence")?;
    let id = column::<StringArray>(batch, "id")?;
    let rating = column::<UInt8Array>(batch, "rating")?;

    for i in 0..batch.num_rows() {
        let days = date.value(i);
        let day = days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .ok_or_else(|| StoreError::Invalid(format!("row {i}: date out of range ({days})")))?;
        let record = SnapshotRecord {
            title: title.value(i).to_string(),
            body: body.value(i).to_string(),
            date: day,
            month: month.value(i) as u32,
            label: label.value(i).to_string(),
            confidence: confidence.value(i),
            id: (!id.is_null(i)).then(|| id.value(i).to_string()),
            rating: (!rating.is_null(i)).then(|| rating.value(i)),
        };
        let review = ClassifiedReview::try_from(record)
            .map_err(|e| StoreError::Invalid(format!("row {i}: {e}")))?;
        out.push(review);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewpulse_core::{Label, Review};
    use tempfile::TempDir;

    fn sample() -> Vec<ClassifiedReview> {
        let d = |m, day| NaiveDate::from_ymd_opt(2023, m, day).unwrap();
        vec![
            ClassifiedReview::new(
                Review::new("Box Review", "Tasty", d(1, 5)).with_rating(Some(4)),
                Label::Positive,
                0.93,
            ),
            ClassifiedReview::new(
                Review::new("", "Stale", d(12, 31)).with_id(Some("cookie-tin-2".into())),
                Label::Negative,
                0.71,
            ),
        ]
    }

    #[test]
    fn record_batch_matches_schema() {
        let batch = to_record_batch(&sample()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().as_ref(), &classified_review_schema());
        let id = column::<StringArray>(&batch, "id").unwrap();
        assert!(id.is_null(0));
        assert_eq!(id.value(1), "cookie-tin-2");
    }

    #[test]
    fn parquet_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.parquet");
        let reviews = sample();
        ParquetSnapshot::write(&path, &reviews).unwrap();
        assert_eq!(ParquetSnapshot::read(&path).unwrap(), reviews);
    }

    #[test]
    fn empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.parquet");
        ParquetSnapshot::write(&path, &[]).unwrap();
        assert!(ParquetSnapshot::read(&path).unwrap().is_empty());
    }

    #[test]
    fn far_future_date_is_invalid() {
        let batch = to_record_batch(&sample()[..1]).unwrap();
        let date_index = batch.schema().index_of("date").unwrap();
        let mut columns = batch.columns().to_vec();
        columns[date_index] = Arc::new(Date32Array::from(vec![i32::MAX]));
        let batch = RecordBatch::try_new(batch.schema(), columns).unwrap();

        let mut out = Vec::new();
        match from_record_batch(&batch, &mut out) {
            Err(StoreError::Invalid(msg)) => assert!(msg.contains("date out of range"), "{msg}"),
            other => panic!("expected Invalid, got {other:?}"),
        }
        assert!(out.is_empty());
    }
}
