//! Lexicon-based sentiment model.
//!
//! Scores each word against a small polarity table, with intensifiers scaling
//! the next polar word and negations flipping it. Needs no model files, so it
//! stands in when ONNX Runtime is not available.

use std::collections::HashMap;

use reviewpulse_core::Label;

use crate::model::{Prediction, SentimentModel};
use crate::ClassifyError;

const POSITIVE: &[(&str, f64)] = &[
    ("amazing", 0.9),
    ("awesome", 0.8),
    ("best", 0.8),
    ("delicious", 0.8),
    ("excellent", 0.9),
    ("fantastic", 0.9),
    ("favorite", 0.7),
    ("favourite", 0.7),
    ("fresh", 0.4),
    ("good", 0.5),
    ("great", 0.7),
    ("happy", 0.6),
    ("impressed", 0.6),
    ("love", 0.8),
    ("loved", 0.8),
    ("lovely", 0.7),
    ("nice", 0.5),
    ("perfect", 0.9),
    ("pleased", 0.6),
    ("recommend", 0.6),
    ("satisfied", 0.5),
    ("tasty", 0.6),
    ("wonderful", 0.8),
    ("worth", 0.4),
];

const NEGATIVE: &[(&str, f64)] = &[
    ("awful", -0.9),
    ("bad", -0.6),
    ("bitter", -0.4),
    ("broken", -0.7),
    ("cheap", -0.3),
    ("damaged", -0.7),
    ("disappointed", -0.7),
    ("disappointing", -0.7),
    ("disgusting", -0.9),
    ("hate", -0.8),
    ("horrible", -0.9),
    ("mediocre", -0.4),
    ("overpriced", -0.5),
    ("poor", -0.6),
    ("refund", -0.5),
    ("stale", -0.6),
    ("terrible", -0.9),
    ("waste", -0.7),
    ("worse", -0.6),
    ("worst", -0.9),
    ("wrong", -0.5),
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("absolutely", 1.5),
    ("extremely", 1.5),
    ("highly", 1.5),
    ("really", 1.3),
    ("so", 1.2),
    ("super", 1.4),
    ("totally", 1.3),
    ("very", 1.3),
    ("slightly", 0.6),
    ("somewhat", 0.7),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "nothing", "hardly", "don't", "dont", "didn't", "didnt", "doesn't",
    "doesnt", "isn't", "isnt", "wasn't", "wasnt", "won't", "wont", "can't", "cant", "cannot",
];

/// How many tokens a negation keeps flipping polarity for.
const NEGATION_WINDOW: usize = 3;

#[derive(Debug, Clone)]
pub struct LexiconModel {
    polarity: HashMap<&'static str, f64>,
    intensifiers: HashMap<&'static str, f64>,
}

impl Default for LexiconModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconModel {
    pub fn new() -> Self {
        Self {
            polarity: POSITIVE.iter().chain(NEGATIVE).copied().collect(),
            intensifiers: INTENSIFIERS.iter().copied().collect(),
        }
    }

    /// Raw polarity score; positive means positive sentiment.
    pub fn score(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let mut score = 0.0;
        let mut multiplier = 1.0;
        let mut negate_for = 0usize;

        for token in lower
            .split(|c: char| !(c.is_alphabetic() || c == '\''))
            .filter(|t| !t.is_empty())
        {
            if NEGATIONS.contains(&token) {
                negate_for = NEGATION_WINDOW;
                continue;
            }
            if let Some(&m) = self.intensifiers.get(token) {
                multiplier *= m;
                continue;
            }
            if let Some(&p) = self.polarity.get(token) {
                let sign = if negate_for > 0 { -1.0 } else { 1.0 };
                score += sign * p * multiplier;
                negate_for = 0;
            } else {
                negate_for = negate_for.saturating_sub(1);
            }
            multiplier = 1.0;
        }
        score
    }

    /// Map a score to a binary prediction. Confidence is in `[0.5, 1.0)`.
    pub fn predict(&self, text: &str) -> Prediction {
        let score = self.score(text);
        let label = if score < 0.0 {
            Label::Negative
        } else {
            Label::Positive
        };
        Prediction {
            label,
            confidence: (0.5 + 0.5 * score.abs().tanh()) as f32,
        }
    }
}

impl SentimentModel for LexiconModel {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn predict_batch(&mut self, texts: &[&str]) -> Result<Vec<Prediction>, ClassifyError> {
        Ok(texts.iter().map(|t| self.predict(t)).collect())
    }
}
