//! Review records as they move through the pipeline.
//!
//! `RawRecord` is what a page source hands back. The normalizer turns it into a
//! [`Review`] with a resolved calendar date, and the classifier wraps that in a
//! [`ClassifiedReview`]. Both are immutable once built; accessors only.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::CoreError;

// ── Label ──

/// Binary sentiment outcome. There is no neutral class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "POSITIVE",
            Self::Negative => "NEGATIVE",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = CoreError;

    /// Case-insensitive; also accepts the short `POS`/`NEG` forms some models emit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POSITIVE" | "POS" => Ok(Self::Positive),
            "NEGATIVE" | "NEG" => Ok(Self::Negative),
            _ => Err(CoreError::UnknownLabel(s.to_string())),
        }
    }
}

// ── RawRecord ──

/// One scraped review before normalisation.
///
/// `date` is whatever the source sent: ISO-8601, "Jan 5, 2023", or nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub title: String,
    pub body: String,
    pub date: Option<String>,
    /// Page index the record was found on.
    pub page: u32,
    pub id: Option<String>,
    pub rating: Option<u8>,
}

// ── Review ──

/// A normalised review with a concrete calendar date.
///
/// `month` is derived from `date` at construction and cannot drift from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReviewRecord", into = "ReviewRecord")]
pub struct Review {
    title: String,
    body: String,
    date: NaiveDate,
    month: u32,
    id: Option<String>,
    rating: Option<u8>,
}

impl Review {
    pub fn new(title: impl Into<String>, body: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            date,
            month: date.month(),
            id: None,
            rating: None,
        }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    pub fn with_rating(mut self, rating: Option<u8>) -> Self {
        self.rating = rating;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Calendar month, 1–12.
    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn rating(&self) -> Option<u8> {
        self.rating
    }
}

/// Flat serialised form of a [`Review`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReviewRecord {
    title: String,
    body: String,
    date: NaiveDate,
    month: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating: Option<u8>,
}

impl From<Review> for ReviewRecord {
    fn from(r: Review) -> Self {
        Self {
            title: r.title,
            body: r.body,
            date: r.date,
            month: r.month,
            id: r.id,
            rating: r.rating,
        }
    }
}

impl TryFrom<ReviewRecord> for Review {
    type Error = CoreError;

    fn try_from(rec: ReviewRecord) -> Result<Self, Self::Error> {
        validate_review_fields(&rec.body, rec.date, rec.month)?;
        Ok(Review::new(rec.title, rec.body, rec.date)
            .with_id(rec.id)
            .with_rating(rec.rating))
    }
}

fn validate_review_fields(body: &str, date: NaiveDate, month: u32) -> Result<(), CoreError> {
    if body.trim().is_empty() {
        return Err(CoreError::EmptyBody);
    }
    if date.month() != month {
        return Err(CoreError::InconsistentMonth { date, month });
    }
    Ok(())
}

// ── ClassifiedReview ──

/// A [`Review`] plus the classifier's label and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecord", into = "SnapshotRecord")]
pub struct ClassifiedReview {
    review: Review,
    label: Label,
    confidence: f32,
}

impl ClassifiedReview {
    /// Confidence is clamped to `[0, 1]`; NaN becomes 0.
    pub fn new(review: Review, label: Label, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            review,
            label,
            confidence,
        }
    }

    pub fn review(&self) -> &Review {
        &self.review
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn month(&self) -> u32 {
        self.review.month()
    }

    pub fn date(&self) -> NaiveDate {
        self.review.date()
    }

    pub fn body(&self) -> &str {
        self.review.body()
    }
}

/// Flat snapshot record: `{title, body, date, month, label, confidence}`.
///
/// This is the persisted shape of a [`ClassifiedReview`]. Converting back
/// validates the record rather than clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub title: String,
    pub body: String,
    pub date: NaiveDate,
    pub month: u32,
    pub label: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

impl From<ClassifiedReview> for SnapshotRecord {
    fn from(c: ClassifiedReview) -> Self {
        let ClassifiedReview {
            review,
            label,
            confidence,
        } = c;
        Self {
            title: review.title,
            body: review.body,
            date: review.date,
            month: review.month,
            label: label.as_str().to_string(),
            confidence,
            id: review.id,
            rating: review.rating,
        }
    }
}

impl TryFrom<SnapshotRecord> for ClassifiedReview {
    type Error = CoreError;

    fn try_from(rec: SnapshotRecord) -> Result<Self, Self::Error> {
        validate_review_fields(&rec.body, rec.date, rec.month)?;
        if !(0.0..=1.0).contains(&rec.confidence) {
            return Err(CoreError::InvalidConfidence(rec.confidence));
        }
        let label: Label = rec.label.parse()?;
        let review = Review::new(rec.title, rec.body, rec.date)
            .with_id(rec.id)
            .with_rating(rec.rating);
        Ok(Self::new(review, label, rec.confidence))
    }
}
