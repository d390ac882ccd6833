use std::collections::HashMap;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

/// TermFrequency struct
/// The multiset of normalized terms produced by the tokenizer for one
/// recipient's new content.
/// Counts the number of times each term appears.
///
/// # Examples
/// ```
/// use tf_idf_profiler::TermFrequency;
/// let mut term_freq = TermFrequency::new();
/// term_freq.add_term("cat");
/// term_freq.add_term("dog");
/// term_freq.add_term("cat");
///
/// assert_eq!(term_freq.term_count("cat"), 2);
/// assert_eq!(term_freq.term_sum(), 3);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TermFrequency {
    term_count: HashMap<Box<str>, u64, RandomState>,
    total_term_count: u64,
}

/// Implementation for adding terms
/// There is no subtraction: profile counts only ever grow.
impl TermFrequency {
    /// Create a new TermFrequency
    pub fn new() -> Self {
        TermFrequency {
            term_count: HashMap::with_hasher(RandomState::new()),
            total_term_count: 0,
        }
    }

    /// Add a term
    ///
    /// # Arguments
    /// * `term` - term to add
    #[inline]
    pub fn add_term(&mut self, term: &str) -> &mut Self {
        self.add_term_n(term, 1)
    }

    /// Add a term `n` times
    /// `n == 0` is ignored so the multiset never holds zero-count entries.
    ///
    /// # Arguments
    /// * `term` - term to add
    /// * `n` - multiplicity
    #[inline]
    pub fn add_term_n(&mut self, term: &str, n: u64) -> &mut Self {
        if n == 0 {
            return self;
        }
        match self.term_count.get_mut(term) {
            Some(count) => *count += n,
            None => {
                self.term_count.insert(term.into(), n);
            }
        }
        self.total_term_count += n;
        self
    }

    /// Add multiple terms
    ///
    /// # Arguments
    /// * `terms` - Slice of terms to add
    #[inline]
    pub fn add_terms<T>(&mut self, terms: &[T]) -> &mut Self
    where
        T: AsRef<str>,
    {
        for term in terms {
            self.add_term(term.as_ref());
        }
        self
    }

    /// Merge with another TermFrequency
    ///
    /// # Arguments
    /// * `other` - Another TermFrequency to merge with
    pub fn add_terms_from_freq(&mut self, other: &TermFrequency) -> &mut Self {
        for (term, count) in other.iter() {
            self.add_term_n(term, count);
        }
        self
    }
}

impl<T> From<&[T]> for TermFrequency
where
    T: AsRef<str>,
{
    fn from(terms: &[T]) -> Self {
        let mut tf = TermFrequency::new();
        tf.add_terms(terms);
        tf
    }
}

/// Implementation for retrieving information from TermFrequency
impl TermFrequency {
    /// Get iterator over all terms and their counts
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.term_count
            .iter()
            .map(|(term, &count)| (&**term, count))
    }

    /// Get the total count of all terms
    #[inline]
    pub fn term_sum(&self) -> u64 {
        self.total_term_count
    }

    /// Get the occurrence count for a specific term
    ///
    /// # Arguments
    /// * `term` - term
    ///
    /// # Returns
    /// * `u64` - Occurrence count for the term, 0 when absent
    #[inline]
    pub fn term_count(&self, term: &str) -> u64 {
        self.term_count.get(term).copied().unwrap_or(0)
    }

    /// Check if a term exists
    #[inline]
    pub fn contains_term(&self, term: &str) -> bool {
        self.term_count.contains_key(term)
    }

    /// Number of distinct terms
    #[inline]
    pub fn term_num(&self) -> usize {
        self.term_count.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.term_count.is_empty()
    }

    /// Terms sorted by count (desc), then dictionary order
    pub fn sorted_frequency_vector(&self) -> Vec<(&str, u64)> {
        let mut list: Vec<(&str, u64)> = self.iter().collect();
        list.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_terms_counts_multiplicity() {
        let mut tf = TermFrequency::new();
        tf.add_terms(&["cat", "cat", "dog"]);
        assert_eq!(tf.term_count("cat"), 2);
        assert_eq!(tf.term_count("dog"), 1);
        assert_eq!(tf.term_count("bird"), 0);
        assert_eq!(tf.term_sum(), 3);
        assert_eq!(tf.term_num(), 2);
    }

    #[test]
    fn zero_multiplicity_is_not_stored() {
        let mut tf = TermFrequency::new();
        tf.add_term_n("ghost", 0);
        assert!(tf.is_empty());
        assert!(!tf.contains_term("ghost"));
        assert_eq!(tf.term_sum(), 0);
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = TermFrequency::from(&["x", "y"][..]);
        let b = TermFrequency::from(&["y", "z", "z"][..]);
        a.add_terms_from_freq(&b);
        assert_eq!(a.sorted_frequency_vector(), vec![("y", 2), ("z", 2), ("x", 1)]);
        assert_eq!(a.term_sum(), 5);
    }
}
