//! JSON files: classified-review snapshots and unclassified review lists.
//!
//! Both are a pretty-printed array of flat records. Writes go to a temp file
//! in the target directory and are renamed into place.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use reviewpulse_core::{ClassifiedReview, Review};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::StoreError;

/// Classified-review snapshot as a JSON array of
/// `{title, body, date, month, label, confidence}` records.
pub struct JsonSnapshot;

impl JsonSnapshot {
    pub fn write(path: &Path, reviews: &[ClassifiedReview]) -> Result<(), StoreError> {
        write_records(path, reviews)?;
        info!(path = %path.display(), count = reviews.len(), "wrote snapshot");
        Ok(())
    }

    /// Read and validate a snapshot. Any invalid record fails the whole read.
    pub fn read(path: &Path) -> Result<Vec<ClassifiedReview>, StoreError> {
        let reviews = read_records(path)?;
        info!(path = %path.display(), count = reviews.len(), "read snapshot");
        Ok(reviews)
    }
}

/// Write normalised but unclassified reviews.
pub fn write_reviews(path: &Path, reviews: &[Review]) -> Result<(), StoreError> {
    write_records(path, reviews)?;
    info!(path = %path.display(), count = reviews.len(), "wrote reviews");
    Ok(())
}

pub fn read_reviews(path: &Path) -> Result<Vec<Review>, StoreError> {
    let reviews = read_records(path)?;
    info!(path = %path.display(), count = reviews.len(), "read reviews");
    Ok(reviews)
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    persist_atomically(path, |file| {
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, records)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    })
}

/// Parse the array first, then each element, so a syntax error is
/// [`StoreError::Json`] and a bad record is [`StoreError::Invalid`] with its index.
fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    let values: Vec<serde_json::Value> = serde_json::from_reader(reader)?;

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            serde_json::from_value(value).map_err(|e| {
                StoreError::Invalid(format!("record {i} in {}: {e}", path.display()))
            })
        })
        .collect()
}

/// Run `write` against a temp file next to `path`, then rename it over `path`.
pub(crate) fn persist_atomically<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut File) -> Result<(), StoreError>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
