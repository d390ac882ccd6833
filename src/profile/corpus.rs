use std::collections::HashMap;

use ahash::RandomState;

use crate::{
    error::StoreError,
    profile::store::{Profile, ProfileStore},
};

/// Corpus statistics snapshot
/// Document frequency of every term across all recipient profiles, plus the
/// number of profiles counted.
///
/// This is an immutable value: a batch computes it once after every fold is
/// committed and hands the same snapshot to every weight derivation, so all
/// recipients of one batch see the same idf.
///
/// Terms trimmed away from a profile no longer count toward its document
/// frequency. The drift this causes is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusStats {
    document_frequency: HashMap<Box<str>, u64, RandomState>,
    profile_count: u64,
}

impl Default for CorpusStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusStats {
    /// Empty corpus
    pub fn new() -> Self {
        Self {
            document_frequency: HashMap::with_hasher(RandomState::new()),
            profile_count: 0,
        }
    }

    /// Build statistics from a set of profiles
    /// Empty profiles still count toward `profile_count`.
    pub fn recompute<'a, I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = &'a Profile>,
    {
        let mut stats = Self::new();
        for profile in profiles {
            stats.add_profile(profile);
        }
        stats
    }

    /// Build statistics with one scan over a store
    pub fn scan<S>(store: &S) -> Result<Self, StoreError>
    where
        S: ProfileStore + ?Sized,
    {
        let mut stats = Self::new();
        store.for_each_profile(&mut |_, profile| stats.add_profile(profile))?;
        Ok(stats)
    }

    fn add_profile(&mut self, profile: &Profile) {
        self.profile_count += 1;
        for (term, &count) in profile.raw_counts() {
            if count == 0 {
                continue;
            }
            match self.document_frequency.get_mut(&**term) {
                Some(df) => *df += 1,
                None => {
                    self.document_frequency.insert(term.clone(), 1);
                }
            }
        }
    }

    /// Number of profiles containing the term
    #[inline]
    pub fn document_frequency(&self, term: &str) -> u64 {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    #[inline]
    pub fn profile_count(&self) -> u64 {
        self.profile_count
    }

    /// Number of distinct terms in the corpus
    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.document_frequency.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{profile::store::InMemoryProfileStore, RecipientId, TermFrequency};

    fn profile(terms: &[&str]) -> Profile {
        let mut p = Profile::new();
        p.fold_counts(&TermFrequency::from(terms));
        p
    }

    #[test]
    fn counts_profiles_not_occurrences() {
        let profiles = [profile(&["cat", "cat", "dog"]), profile(&["cat"]), Profile::new()];
        let stats = CorpusStats::recompute(&profiles);
        assert_eq!(stats.profile_count(), 3);
        assert_eq!(stats.document_frequency("cat"), 2);
        assert_eq!(stats.document_frequency("dog"), 1);
        assert_eq!(stats.document_frequency("bird"), 0);
        assert_eq!(stats.vocab_size(), 2);
    }

    #[test]
    fn scan_matches_recompute() {
        let store = InMemoryProfileStore::new();
        for (id, terms) in [("a", &["x", "y"][..]), ("b", &["y"][..]), ("c", &[][..])] {
            let id = RecipientId::from(id);
            store.get_or_create(&id).unwrap();
            store.fold_counts(&id, &TermFrequency::from(terms)).unwrap();
        }
        let scanned = CorpusStats::scan(&store).unwrap();
        let profiles: Vec<Profile> = store.profiles.iter().map(|e| e.value().clone()).collect();
        assert_eq!(scanned, CorpusStats::recompute(&profiles));
        assert_eq!(scanned.profile_count(), 3);
        assert_eq!(scanned.document_frequency("y"), 2);
    }
}
