use ahash::RandomState;
use indexmap::IndexMap;

use crate::profile::{
    corpus::CorpusStats,
    store::{Profile, TermVector},
};

/// TF-IDF calculation strategy
/// Plug a different strategy into the engine as its `E` parameter.
pub trait TFIDFEngine {
    /// IDFを計算する
    /// # Arguments
    /// * `stats` - コーパス統計のスナップショット
    /// * `term` - 対象の語
    /// # Returns
    /// * `f64` - finite, non-negative idf
    fn idf(stats: &CorpusStats, term: &str) -> f64;

    /// tf-idf weight of one term
    /// # Arguments
    /// * `count` - raw count of the term in the profile
    /// * `idf` - idf of the term
    #[inline]
    fn weight(count: u64, idf: f64) -> f64 {
        count as f64 * idf
    }

    /// Weight vector of a whole profile
    /// Zero-count terms are skipped.
    fn weight_vec(profile: &Profile, stats: &CorpusStats) -> TermVector<f64> {
        let mut weights =
            IndexMap::with_capacity_and_hasher(profile.term_num(), RandomState::new());
        for (term, &count) in profile.raw_counts() {
            if count == 0 {
                continue;
            }
            let idf = Self::idf(stats, term);
            weights.insert(term.clone(), Self::weight(count, idf));
        }
        weights
    }
}

/// デフォルトのTF-IDFエンジン
/// Raw count tf with smoothed idf:
/// `idf = ln((profile_count + 1) / (df + 1)) + 1`
///
/// Unseen terms (df = 0) get a finite idf, and since `df <= profile_count`
/// the idf never drops below 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTFIDFEngine;

impl TFIDFEngine for DefaultTFIDFEngine {
    #[inline]
    fn idf(stats: &CorpusStats, term: &str) -> f64 {
        let n = stats.profile_count() as f64;
        let df = stats.document_frequency(term) as f64;
        ((n + 1.0) / (df + 1.0)).ln() + 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TermFrequency;

    fn profile(terms: &[&str]) -> Profile {
        let mut p = Profile::new();
        p.fold_counts(&TermFrequency::from(terms));
        p
    }

    #[test]
    fn idf_matches_smoothed_formula() {
        let profiles = [profile(&["cat"]), profile(&["dog"]), profile(&["cat", "dog"])];
        let stats = CorpusStats::recompute(&profiles);
        let cat = DefaultTFIDFEngine::idf(&stats, "cat");
        assert!((cat - ((4.0f64 / 3.0).ln() + 1.0)).abs() < 1e-12);
        let unseen = DefaultTFIDFEngine::idf(&stats, "zzz");
        assert!((unseen - (4.0f64.ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn idf_is_finite_on_empty_corpus() {
        let idf = DefaultTFIDFEngine::idf(&CorpusStats::new(), "anything");
        assert!(idf.is_finite());
        assert_eq!(idf, 1.0);
    }

    #[test]
    fn weight_vec_scales_by_count() {
        let p = profile(&["cat", "cat", "dog"]);
        let stats = CorpusStats::recompute([&p]);
        let weights = DefaultTFIDFEngine::weight_vec(&p, &stats);
        assert_eq!(weights.len(), 2);
        assert!(weights["cat"] > 0.0);
        assert!((weights["cat"] - 2.0 * weights["dog"]).abs() < 1e-12);
    }
}
