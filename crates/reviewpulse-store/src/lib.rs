//! Storage layer: classified-review snapshots as JSON (always) or Parquet (feature `parquet`).

mod error;
mod json;

#[cfg(feature = "parquet")]
mod columnar;

use std::path::Path;

use reviewpulse_core::ClassifiedReview;

pub use error::StoreError;
pub use json::{JsonSnapshot, read_reviews, write_reviews};

#[cfg(feature = "parquet")]
pub use columnar::{ParquetSnapshot, to_record_batch};

/// On-disk snapshot format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Parquet,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Result<Self, StoreError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("parquet") if cfg!(feature = "parquet") => Ok(Self::Parquet),
            _ => Err(StoreError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Write a snapshot in the format implied by `path`'s extension.
pub fn write_snapshot(path: &Path, reviews: &[ClassifiedReview]) -> Result<(), StoreError> {
    match SnapshotFormat::from_path(path)? {
        SnapshotFormat::Json => JsonSnapshot::write(path, reviews),
        #[cfg(feature = "parquet")]
        SnapshotFormat::Parquet => ParquetSnapshot::write(path, reviews),
        #[cfg(not(feature = "parquet"))]
        SnapshotFormat::Parquet => Err(StoreError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Read a snapshot in the format implied by `path`'s extension.
pub fn read_snapshot(path: &Path) -> Result<Vec<ClassifiedReview>, StoreError> {
    match SnapshotFormat::from_path(path)? {
        SnapshotFormat::Json => JsonSnapshot::read(path),
        #[cfg(feature = "parquet")]
        SnapshotFormat::Parquet => ParquetSnapshot::read(path),
        #[cfg(not(feature = "parquet"))]
        SnapshotFormat::Parquet => Err(StoreError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use reviewpulse_core::{Label, Review};
    use tempfile::TempDir;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            SnapshotFormat::from_path(Path::new("out/snap.JSON")).unwrap(),
            SnapshotFormat::Json
        );
        assert!(matches!(
            SnapshotFormat::from_path(Path::new("snap.csv")),
            Err(StoreError::UnsupportedFormat(_))
        ));
        assert!(SnapshotFormat::from_path(Path::new("snap")).is_err());
    }

    #[cfg(feature = "parquet")]
    #[test]
    fn parquet_extension_selects_parquet() {
        assert_eq!(
            SnapshotFormat::from_path(Path::new("snap.parquet")).unwrap(),
            SnapshotFormat::Parquet
        );
    }

    #[test]
    fn dispatch_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        let review = Review::new("", "Fine", NaiveDate::from_ymd_opt(2023, 6, 1).unwrap());
        let reviews = vec![ClassifiedReview::new(review, Label::Positive, 0.8)];
        write_snapshot(&path, &reviews).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), reviews);
    }
}
