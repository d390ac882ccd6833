use std::collections::HashSet;

use ahash::RandomState;

use crate::{config::TokenizerConfig, profile::term::TermFrequency, utils::markup::strip_markup};

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him",
    "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more",
    "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours",
];

/// Tokenizer
/// Turns raw (possibly HTML) content into a multiset of normalized terms.
///
/// Normalization: markup removal, lowercase, apostrophes removed inside a
/// word (`don't` -> `dont`), every other non-alphanumeric char splits terms.
/// It never fails; odd input only yields fewer terms.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    config: TokenizerConfig,
    stopwords: HashSet<Box<str>, RandomState>,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        let mut stopwords = HashSet::with_hasher(RandomState::new());
        if config.stopwords {
            stopwords.extend(ENGLISH_STOPWORDS.iter().map(|&w| Box::<str>::from(w)));
        }
        // 追加分も語と同じ正規化をかける
        for extra in &config.extra_stopwords {
            stopwords.extend(split_terms(extra).map(String::into_boxed_str));
        }
        Self { config, stopwords }
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Tokenize content into a term multiset
    ///
    /// # Arguments
    /// * `content` - raw text, may be empty
    ///
    /// # Returns
    /// * `TermFrequency` - empty for empty input
    pub fn tokenize(&self, content: &str) -> TermFrequency {
        let mut freq = TermFrequency::new();
        if content.is_empty() {
            return freq;
        }
        let text = if self.config.strip_markup {
            strip_markup(content)
        } else {
            content.to_string()
        };
        for term in split_terms(&text) {
            if self.accept(&term) {
                freq.add_term(&term);
            }
        }
        freq
    }

    #[inline]
    fn accept(&self, term: &str) -> bool {
        let len = term.chars().count();
        if len < self.config.min_term_len || len > self.config.max_term_len {
            return false;
        }
        if self.config.drop_numeric && term.chars().all(|c| c.is_numeric()) {
            return false;
        }
        !self.stopwords.contains(term)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}

/// lowercase words, apostrophes joined, everything else separates
fn split_terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || is_apostrophe(c)))
        .map(|raw| {
            raw.chars()
                .filter(|&c| !is_apostrophe(c))
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|term| !term.is_empty())
}

#[inline]
fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '\u{2019}'
}
