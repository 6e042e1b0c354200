//! Terminal rendering of monthly summaries.
//!
//! A month card is grouped into sections (counts, confidence, words, daily
//! activity). Empty months print the dataset overview instead so the reader
//! can see which months do have data.

use std::fmt::Write;

use chrono::Month;
use reviewpulse_core::{MonthSummary, Overview};

const MAX_WORDS: usize = 15;
const BAR_WIDTH: usize = 30;

// ── Public API ──

pub fn render_month_card(summary: &MonthSummary) -> String {
    let mut out = String::new();
    let _ = write_month_card(&mut out, summary);
    out
}

pub fn render_overview(month: u32, overview: &Overview) -> String {
    let mut out = String::new();
    let _ = write_overview(&mut out, month, overview);
    out
}

pub fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map_or("?", |m| m.name())
}

// ── Sections ──

fn write_month_card(out: &mut String, s: &MonthSummary) -> std::fmt::Result {
    writeln!(out, "=== {} ===", month_name(s.month))?;
    writeln!(out)?;

    writeln!(out, "Sentiment")?;
    writeln!(out, "  {:<26} {}", "reviews", s.total)?;
    writeln!(out, "  {:<26} {} ({:.1}%)", "positive", s.positive, s.positive_ratio() * 100.0)?;
    writeln!(out, "  {:<26} {} ({:.1}%)", "negative", s.negative, s.negative_ratio() * 100.0)?;
    writeln!(out)?;

    writeln!(out, "Confidence")?;
    writeln!(out, "  {:<26} {:.3}", "mean", s.mean_confidence)?;
    if s.positive > 0 {
        writeln!(out, "  {:<26} {:.3}", "mean (positive)", s.positive_mean_confidence)?;
    }
    if s.negative > 0 {
        writeln!(out, "  {:<26} {:.3}", "mean (negative)", s.negative_mean_confidence)?;
    }
    writeln!(
        out,
        "  {:<26} {}",
        format!("below {:.2}", s.low_confidence_threshold),
        s.low_confidence
    )?;
    write_histogram(out, &s.confidence_histogram)?;
    writeln!(out)?;

    if !s.words.is_empty() {
        writeln!(out, "Top words ({})", s.words.len())?;
        let show = s.words.len().min(MAX_WORDS);
        for w in &s.words[..show] {
            writeln!(out, "  {:<26} {}", w.word, w.count)?;
        }
        if s.words.len() > show {
            writeln!(out, "  ... and {} more", s.words.len() - show)?;
        }
        writeln!(out)?;
    }

    if !s.daily_counts.is_empty() {
        writeln!(out, "Daily")?;
        let peak = s.daily_counts.values().copied().max().unwrap_or(0);
        for (day, count) in &s.daily_counts {
            writeln!(out, "  {:>2}  {:<BAR_WIDTH$} {}", day, bar(*count, peak), count)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_histogram(out: &mut String, bins: &[usize]) -> std::fmt::Result {
    if bins.is_empty() || bins.iter().all(|&b| b == 0) {
        return Ok(());
    }
    let width = 1.0 / bins.len() as f32;
    let peak = bins.iter().copied().max().unwrap_or(0);
    writeln!(out, "  distribution")?;
    for (i, &count) in bins.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let lo = i as f32 * width;
        writeln!(
            out,
            "    {:.2}-{:.2}  {:<BAR_WIDTH$} {}",
            lo,
            lo + width,
            bar(count, peak),
            count
        )?;
    }
    Ok(())
}

fn write_overview(out: &mut String, month: u32, o: &Overview) -> std::fmt::Result {
    writeln!(out, "No reviews for {}.", month_name(month))?;
    writeln!(out)?;
    writeln!(out, "Dataset")?;
    writeln!(out, "  {:<26} {}", "reviews", o.total)?;
    if let (Some(first), Some(last)) = (o.first_date, o.last_date) {
        writeln!(out, "  {:<26} {} to {}", "date range", first, last)?;
    }
    let months: Vec<String> = o
        .per_month
        .iter()
        .enumerate()
        .filter(|(_, n)| **n > 0)
        .map(|(i, n)| format!("{} {}", &month_name(i as u32 + 1)[..3], n))
        .collect();
    if !months.is_empty() {
        writeln!(out, "  {:<26} {}", "by month", months.join(", "))?;
    }
    Ok(())
}

fn bar(count: usize, peak: usize) -> String {
    if peak == 0 {
        return String::new();
    }
    let len = (count * BAR_WIDTH).div_ceil(peak);
    "#".repeat(len.min(BAR_WIDTH))
}
