//! Word tokenisation for term-frequency tables.
//!
//! Lowercase, split on anything that is not alphabetic, then discard
//! stopwords and single-character tokens.

use std::collections::HashSet;
use std::sync::LazyLock;

/// English stopwords plus a few review-boilerplate terms.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "cannot", "could", "couldn", "did", "didn", "do", "does",
    "doesn", "doing", "don", "down", "during", "each", "else", "ever", "few", "for", "from",
    "further", "get", "got", "had", "hadn", "has", "hasn", "have", "haven", "having", "he",
    "her", "here", "hers", "herself", "him", "himself", "his", "how", "however", "if", "in",
    "into", "is", "isn", "it", "its", "itself", "just", "let", "ll", "me", "more", "most",
    "mustn", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or",
    "other", "otherwise", "ought", "our", "ours", "ourselves", "out", "over", "own", "re",
    "same", "shall", "shan", "she", "should", "shouldn", "since", "so", "some", "such", "than",
    "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "under", "until", "up", "ve", "very", "was",
    "wasn", "we", "were", "weren", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "won", "would", "wouldn", "you", "your", "yours", "yourself",
    "yourselves",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

pub fn is_stopword(word: &str) -> bool {
    STOPWORD_SET.contains(word)
}

/// Content words of `text`, in order of appearance.
pub fn content_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().nth(1).is_some())
        .map(str::to_lowercase)
        .filter(|w| !is_stopword(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_non_alphabetic() {
        let words: Vec<String> =
            content_words("Amazing product, highly-recommend! 10/10").collect();
        assert_eq!(words, ["amazing", "product", "highly", "recommend"]);
    }

    #[test]
    fn drops_stopwords_and_single_chars() {
        let words: Vec<String> = content_words("It is a box of X and I love it").collect();
        assert_eq!(words, ["box", "love"]);
    }

    #[test]
    fn contractions_leave_no_fragments() {
        let words: Vec<String> = content_words("I don't think it's worth it").collect();
        assert_eq!(words, ["think", "worth"]);
    }

    #[test]
    fn non_ascii_letters_kept() {
        let words: Vec<String> = content_words("Très bon café").collect();
        assert_eq!(words, ["très", "bon", "café"]);
    }
}
