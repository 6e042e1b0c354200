//! Raw record → [`Review`] normalisation.
//!
//! Text fields are trimmed and records without a body are dropped. Dates go
//! through two parsers, first success wins:
//!
//! 1. ISO-8601 date portion (`2023-01-05`, `2023-01-05T10:00:00Z`); any
//!    time-of-day suffix is ignored.
//! 2. Human-readable month-day-year (`Jan 5, 2023`, `January 5, 2023`).
//!
//! A record whose date resolves under neither is dropped and counted. Drops
//! are never errors.

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

use crate::config::NormalizeConfig;
use crate::model::{RawRecord, Review};

const HUMAN_DATE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%b %d %Y", "%d %b %Y"];

/// Why a record did not become a [`Review`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    EmptyBody,
    /// Date missing, or neither parser accepted it.
    UnparseableDate,
    /// Date parsed but falls outside the configured year.
    OutOfRange,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyBody => "empty_body",
            Self::UnparseableDate => "unparseable_date",
            Self::OutOfRange => "out_of_range",
        }
    }
}

/// Per-reason drop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub empty_body: usize,
    pub unparseable_date: usize,
    pub out_of_range: usize,
}

impl DropCounts {
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::EmptyBody => self.empty_body += 1,
            DropReason::UnparseableDate => self.unparseable_date += 1,
            DropReason::OutOfRange => self.out_of_range += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.empty_body + self.unparseable_date + self.out_of_range
    }
}

/// Output of [`Normalizer::normalize_all`].
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub reviews: Vec<Review>,
    pub drops: DropCounts,
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    year: Option<i32>,
}

impl Normalizer {
    pub fn new(config: &NormalizeConfig) -> Self {
        Self { year: config.year }
    }

    /// Normalise one record, or say why it was dropped.
    pub fn normalize(&self, raw: RawRecord) -> Result<Review, DropReason> {
        let body = raw.body.trim();
        if body.is_empty() {
            return Err(DropReason::EmptyBody);
        }

        let date = raw
            .date
            .as_deref()
            .and_then(parse_date)
            .ok_or(DropReason::UnparseableDate)?;

        if let Some(year) = self.year
            && date.year() != year
        {
            return Err(DropReason::OutOfRange);
        }

        Ok(Review::new(raw.title.trim(), body, date)
            .with_id(raw.id)
            .with_rating(raw.rating))
    }

    /// Normalise a sequence, keeping input order and counting drops.
    pub fn normalize_all(&self, records: impl IntoIterator<Item = RawRecord>) -> Normalized {
        let mut out = Normalized::default();
        for raw in records {
            let page = raw.page;
            match self.normalize(raw) {
                Ok(review) => out.reviews.push(review),
                Err(reason) => {
                    debug!(page, reason = reason.as_str(), "dropped record");
                    out.drops.record(reason);
                }
            }
        }
        info!(
            kept = out.reviews.len(),
            dropped = out.drops.total(),
            empty_body = out.drops.empty_body,
            unparseable_date = out.drops.unparseable_date,
            out_of_range = out.drops.out_of_range,
            "normalised records"
        );
        out
    }
}

/// Normalise with no year restriction. `None` means the record was dropped.
pub fn normalize(raw: RawRecord) -> Option<Review> {
    Normalizer::default().normalize(raw).ok()
}

/// Resolve a date string using the ISO parser, then the human-readable one.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    parse_iso_date(s).or_else(|| parse_human_date(s))
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let date_part = s.split(['T', 't', ' ']).next()?;
    if date_part.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn parse_human_date(s: &str) -> Option<NaiveDate> {
    HUMAN_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
