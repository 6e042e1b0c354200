//! Per-month aggregation of classified reviews.
//!
//! [`summarize`] filters to one calendar month and derives label counts,
//! confidence statistics, and a capped term-frequency table. Every function
//! here is pure: the same input always produces the same summary, and an
//! empty month is a valid all-zero summary rather than an error.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::config::SummaryConfig;
use crate::model::{ClassifiedReview, Label};
use crate::text::content_words;
use crate::CoreError;

/// One entry of the term-frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

/// Aggregate view over all classified reviews in one calendar month.
///
/// Always satisfies `total == positive + negative`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    pub month: u32,
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    /// Arithmetic mean over all records; 0 when `total == 0`.
    pub mean_confidence: f32,
    pub positive_mean_confidence: f32,
    pub negative_mean_confidence: f32,
    /// Records with confidence strictly below `low_confidence_threshold`.
    pub low_confidence: usize,
    pub low_confidence_threshold: f32,
    /// Most frequent content words, descending; ties keep first-seen order.
    pub words: Vec<WordCount>,
    /// Equal-width confidence bins over `[0, 1]`; the last bin is closed.
    pub confidence_histogram: Vec<usize>,
    /// Day of month → number of reviews.
    pub daily_counts: BTreeMap<u32, usize>,
}

impl MonthSummary {
    pub fn positive_ratio(&self) -> f32 {
        ratio(self.positive, self.total)
    }

    pub fn negative_ratio(&self) -> f32 {
        ratio(self.negative, self.total)
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Dataset coverage, used to explain an empty month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub total: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// Review count per month, January first.
    pub per_month: [usize; 12],
}

/// Summarise `month` with the default [`SummaryConfig`].
pub fn summarize(reviews: &[ClassifiedReview], month: u32) -> Result<MonthSummary, CoreError> {
    summarize_with(reviews, month, &SummaryConfig::default())
}

pub fn summarize_with(
    reviews: &[ClassifiedReview],
    month: u32,
    config: &SummaryConfig,
) -> Result<MonthSummary, CoreError> {
    if !(1..=12).contains(&month) {
        return Err(CoreError::InvalidMonth(month));
    }

    let in_month: Vec<&ClassifiedReview> =
        reviews.iter().filter(|r| r.month() == month).collect();

    let mut pos = Accum::default();
    let mut neg = Accum::default();
    let mut low_confidence = 0;
    let mut histogram = vec![0usize; config.histogram_bins];
    let mut daily_counts = BTreeMap::new();

    for r in &in_month {
        let c = r.confidence();
        match r.label() {
            Label::Positive => pos.add(c),
            Label::Negative => neg.add(c),
        }
        if c < config.low_confidence_threshold {
            low_confidence += 1;
        }
        if let Some(bin) = histogram_bin(c, config.histogram_bins) {
            histogram[bin] += 1;
        }
        *daily_counts.entry(r.date().day()).or_insert(0) += 1;
    }

    let total = pos.count + neg.count;
    let mean_confidence = if total == 0 {
        0.0
    } else {
        ((pos.sum + neg.sum) / total as f64) as f32
    };

    let words = top_words(in_month.iter().map(|r| r.body()), config.top_k_words);

    Ok(MonthSummary {
        month,
        total,
        positive: pos.count,
        negative: neg.count,
        mean_confidence,
        positive_mean_confidence: pos.mean(),
        negative_mean_confidence: neg.mean(),
        low_confidence,
        low_confidence_threshold: config.low_confidence_threshold,
        words,
        confidence_histogram: histogram,
        daily_counts,
    })
}

/// Term frequencies over `texts`, capped to the `k` most frequent.
///
/// Ties are broken by the position at which a term first appeared.
pub fn top_words<'a>(texts: impl IntoIterator<Item = &'a str>, k: usize) -> Vec<WordCount> {
    // word → (count, first-seen index)
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut seen = 0usize;

    for text in texts {
        for word in content_words(text) {
            let entry = counts.entry(word).or_insert_with(|| {
                let first = seen;
                seen += 1;
                (0, first)
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.truncate(k);

    ranked
        .into_iter()
        .map(|(word, count, _)| WordCount { word, count })
        .collect()
}

pub fn overview(reviews: &[ClassifiedReview]) -> Overview {
    let mut per_month = [0usize; 12];
    for r in reviews {
        per_month[(r.month() - 1) as usize] += 1;
    }
    Overview {
        total: reviews.len(),
        first_date: reviews.iter().map(|r| r.date()).min(),
        last_date: reviews.iter().map(|r| r.date()).max(),
        per_month,
    }
}

// ── Helpers ──

#[derive(Default)]
struct Accum {
    count: usize,
    sum: f64,
}

impl Accum {
    fn add(&mut self, confidence: f32) {
        self.count += 1;
        self.sum += confidence as f64;
    }

    fn mean(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum / self.count as f64) as f32
        }
    }
}

fn histogram_bin(confidence: f32, bins: usize) -> Option<usize> {
    if bins == 0 {
        return None;
    }
    let idx = (confidence.clamp(0.0, 1.0) * bins as f32) as usize;
    Some(idx.min(bins - 1))
}

fn ratio(part: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        part as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Review;

    fn classified(date: &str, body: &str, label: Label, confidence: f32) -> ClassifiedReview {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        ClassifiedReview::new(Review::new("", body, date), label, confidence)
    }

    #[test]
    fn two_reviews_one_each() {
        let reviews = vec![
            classified("2023-01-05", "Great taste", Label::Positive, 0.9),
            classified("2023-01-20", "Arrived broken", Label::Negative, 0.8),
            classified("2023-02-01", "Other month", Label::Positive, 0.99),
        ];
        let s = summarize(&reviews, 1).unwrap();
        assert_eq!(s.month, 1);
        assert_eq!(s.total, 2);
        assert_eq!(s.positive, 1);
        assert_eq!(s.negative, 1);
        assert!((s.mean_confidence - 0.85).abs() < 1e-6);
        assert!((s.positive_mean_confidence - 0.9).abs() < 1e-6);
        assert!((s.negative_mean_confidence - 0.8).abs() < 1e-6);
        assert_eq!(s.daily_counts.get(&5), Some(&1));
        assert_eq!(s.daily_counts.get(&20), Some(&1));
    }

    #[test]
    fn empty_month_is_all_zero() {
        let reviews = vec![classified("2023-03-01", "x y", Label::Positive, 0.9)];
        let s = summarize(&reviews, 7).unwrap();
        assert!(s.is_empty());
        assert_eq!(s.positive + s.negative, 0);
        assert_eq!(s.mean_confidence, 0.0);
        assert_eq!(s.low_confidence, 0);
        assert!(s.words.is_empty());
        assert!(s.daily_counts.is_empty());
        assert_eq!(s.confidence_histogram.iter().sum::<usize>(), 0);
        assert_eq!(s.positive_ratio(), 0.0);
    }

    #[test]
    fn invalid_month_rejected() {
        assert_eq!(summarize(&[], 0), Err(CoreError::InvalidMonth(0)));
        assert_eq!(summarize(&[], 13), Err(CoreError::InvalidMonth(13)));
    }

    #[test]
    fn low_confidence_is_strictly_below_threshold() {
        let reviews = vec![
            classified("2023-05-01", "a", Label::Positive, 0.69),
            classified("2023-05-02", "b", Label::Negative, 0.70),
            classified("2023-05-03", "c", Label::Positive, 0.95),
        ];
        let s = summarize(&reviews, 5).unwrap();
        assert_eq!(s.low_confidence, 1);

        let strict = SummaryConfig {
            low_confidence_threshold: 0.99,
            ..Default::default()
        };
        assert_eq!(summarize_with(&reviews, 5, &strict).unwrap().low_confidence, 3);
    }

    #[test]
    fn histogram_edges() {
        let reviews = vec![
            classified("2023-06-01", "a", Label::Positive, 0.0),
            classified("2023-06-01", "b", Label::Positive, 1.0),
            classified("2023-06-01", "c", Label::Positive, 0.5),
        ];
        let s = summarize(&reviews, 6).unwrap();
        assert_eq!(s.confidence_histogram.len(), 20);
        assert_eq!(s.confidence_histogram[0], 1);
        assert_eq!(s.confidence_histogram[10], 1);
        assert_eq!(s.confidence_histogram[19], 1);
    }

    #[test]
    fn words_ranked_with_first_seen_ties() {
        let reviews = vec![
            classified("2023-04-01", "Chocolate tastes stale", Label::Negative, 0.9),
            classified("2023-04-02", "Stale box, stale chocolate", Label::Negative, 0.9),
        ];
        let s = summarize(&reviews, 4).unwrap();
        let words: Vec<(&str, usize)> = s
            .words
            .iter()
            .map(|w| (w.word.as_str(), w.count))
            .collect();
        assert_eq!(
            words,
            [("stale", 3), ("chocolate", 2), ("tastes", 1), ("box", 1)]
        );
    }

    #[test]
    fn top_words_capped() {
        let text = "alpha beta gamma delta epsilon";
        let words = top_words([text], 2);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word, "alpha");
        assert_eq!(words[1].word, "beta");
    }

    #[test]
    fn summarize_is_idempotent() {
        let reviews = vec![
            classified("2023-08-01", "Lovely soft texture", Label::Positive, 0.97),
            classified("2023-08-09", "Too sweet honestly", Label::Negative, 0.61),
            classified("2023-08-09", "Lovely", Label::Positive, 0.88),
        ];
        let a = summarize(&reviews, 8).unwrap();
        let b = summarize(&reviews, 8).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.total, a.positive + a.negative);
        assert!((0.0..=1.0).contains(&a.mean_confidence));
    }

    #[test]
    fn overview_covers_dataset() {
        let reviews = vec![
            classified("2023-03-10", "a", Label::Positive, 0.9),
            classified("2023-01-02", "b", Label::Negative, 0.9),
            classified("2023-03-30", "c", Label::Positive, 0.9),
        ];
        let o = overview(&reviews);
        assert_eq!(o.total, 3);
        assert_eq!(o.first_date, NaiveDate::from_ymd_opt(2023, 1, 2));
        assert_eq!(o.last_date, NaiveDate::from_ymd_opt(2023, 3, 30));
        assert_eq!(o.per_month[0], 1);
        assert_eq!(o.per_month[2], 2);

        let empty = overview(&[]);
        assert_eq!(empty.total, 0);
        assert!(empty.first_date.is_none());
    }
}
