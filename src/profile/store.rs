use std::{collections::HashSet, fmt, hash::BuildHasher};

use ahash::RandomState;
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{error::StoreError, profile::term::TermFrequency};

/// Opaque, stable recipient identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(Box<str>);

impl RecipientId {
    pub fn new(id: impl Into<Box<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecipientId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Sparse term vector of a profile
pub type TermVector<V> = IndexMap<Box<str>, V, RandomState>;

/// Profile
/// A recipient's accumulated raw term counts and the tf-idf weights derived
/// from them.
///
/// `raw_counts` is the source of truth. `weights` is a cache: every fold that
/// adds terms bumps `revision`, and the weights are fresh only while
/// `weighted_revision == revision`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    raw_counts: TermVector<u64>,
    weights: TermVector<f64>,
    revision: u64,
    weighted_revision: u64,
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

impl Profile {
    pub fn new() -> Self {
        Self {
            raw_counts: IndexMap::with_hasher(RandomState::new()),
            weights: IndexMap::with_hasher(RandomState::new()),
            revision: 0,
            weighted_revision: 0,
        }
    }

    #[inline]
    pub fn raw_counts(&self) -> &TermVector<u64> {
        &self.raw_counts
    }

    #[inline]
    pub fn weights(&self) -> &TermVector<f64> {
        &self.weights
    }

    #[inline]
    pub fn raw_count(&self, term: &str) -> u64 {
        self.raw_counts.get(term).copied().unwrap_or(0)
    }

    #[inline]
    pub fn weight(&self, term: &str) -> Option<f64> {
        self.weights.get(term).copied()
    }

    #[inline]
    pub fn term_num(&self) -> usize {
        self.raw_counts.len()
    }

    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// weights were derived from an older `raw_counts`
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.revision != self.weighted_revision
    }

    /// Fold a term multiset into the raw counts
    /// Returns false (and leaves the profile untouched) for an empty multiset.
    pub fn fold_counts(&mut self, terms: &TermFrequency) -> bool {
        if terms.is_empty() {
            return false;
        }
        for (term, n) in terms.iter() {
            match self.raw_counts.get_mut(term) {
                Some(count) => *count += n,
                None => {
                    self.raw_counts.insert(term.into(), n);
                }
            }
        }
        self.revision += 1;
        true
    }

    /// Replace the weight vector
    /// Terms missing from `raw_counts` (or with a zero count) are dropped so
    /// the weight keys stay a subset of the count keys.
    ///
    /// # Arguments
    /// * `weights` - new weight map
    /// * `derived_from` - the `revision` the weights were computed against
    pub fn set_weights(&mut self, mut weights: TermVector<f64>, derived_from: u64) {
        weights.retain(|term, _| self.raw_counts.get(term).is_some_and(|&c| c > 0));
        self.weights = weights;
        self.weighted_revision = derived_from;
    }

    /// Drop every term not in `keep` from both vectors
    pub fn retain_terms<S: BuildHasher>(&mut self, keep: &HashSet<Box<str>, S>) {
        self.raw_counts.retain(|term, _| keep.contains(term));
        self.weights.retain(|term, _| keep.contains(term));
    }
}

/// Persistence seam of the engine
///
/// Every method may block on I/O. Mutations of one profile must be atomic
/// with respect to readers of that profile; the engine serializes batches
/// per recipient on top of this.
pub trait ProfileStore: Send + Sync {
    /// Return the profile, creating an empty one on first access
    fn get_or_create(&self, recipient: &RecipientId) -> Result<Profile, StoreError>;

    /// Return the profile if it exists
    fn load(&self, recipient: &RecipientId) -> Result<Option<Profile>, StoreError>;

    /// Increment raw counts by the multiset; returns whether anything changed
    fn fold_counts(&self, recipient: &RecipientId, terms: &TermFrequency) -> Result<bool, StoreError>;

    /// Atomically replace the weights of a profile
    fn set_weights(
        &self,
        recipient: &RecipientId,
        weights: TermVector<f64>,
        derived_from: u64,
    ) -> Result<(), StoreError>;

    /// Atomically drop every term outside `keep`
    fn retain_terms(
        &self,
        recipient: &RecipientId,
        keep: &HashSet<Box<str>, RandomState>,
    ) -> Result<(), StoreError>;

    /// Visit every profile (statistics scan)
    fn for_each_profile(&self, f: &mut dyn FnMut(&RecipientId, &Profile)) -> Result<(), StoreError>;

    fn profile_num(&self) -> Result<usize, StoreError>;
}

/// In-memory profile store
/// Sharded map, one entry lock per profile. Durable through
/// [`InMemoryProfileStore::save`] / [`InMemoryProfileStore::open`].
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    pub(crate) profiles: DashMap<RecipientId, Profile, RandomState>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::with_hasher(RandomState::new()),
        }
    }

    fn missing(recipient: &RecipientId) -> StoreError {
        StoreError::Unavailable(format!("no profile for `{recipient}`"))
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn get_or_create(&self, recipient: &RecipientId) -> Result<Profile, StoreError> {
        Ok(self
            .profiles
            .entry(recipient.clone())
            .or_insert_with(Profile::new)
            .value()
            .clone())
    }

    fn load(&self, recipient: &RecipientId) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.get(recipient).map(|p| p.value().clone()))
    }

    fn fold_counts(&self, recipient: &RecipientId, terms: &TermFrequency) -> Result<bool, StoreError> {
        let mut profile = self
            .profiles
            .get_mut(recipient)
            .ok_or_else(|| Self::missing(recipient))?;
        Ok(profile.fold_counts(terms))
    }

    fn set_weights(
        &self,
        recipient: &RecipientId,
        weights: TermVector<f64>,
        derived_from: u64,
    ) -> Result<(), StoreError> {
        let mut profile = self
            .profiles
            .get_mut(recipient)
            .ok_or_else(|| Self::missing(recipient))?;
        profile.set_weights(weights, derived_from);
        Ok(())
    }

    fn retain_terms(
        &self,
        recipient: &RecipientId,
        keep: &HashSet<Box<str>, RandomState>,
    ) -> Result<(), StoreError> {
        let mut profile = self
            .profiles
            .get_mut(recipient)
            .ok_or_else(|| Self::missing(recipient))?;
        profile.retain_terms(keep);
        Ok(())
    }

    fn for_each_profile(&self, f: &mut dyn FnMut(&RecipientId, &Profile)) -> Result<(), StoreError> {
        for entry in self.profiles.iter() {
            f(entry.key(), entry.value());
        }
        Ok(())
    }

    fn profile_num(&self) -> Result<usize, StoreError> {
        Ok(self.profiles.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep(terms: &[&str]) -> HashSet<Box<str>, RandomState> {
        terms.iter().map(|&t| Box::<str>::from(t)).collect()
    }

    fn weights(pairs: &[(&str, f64)]) -> TermVector<f64> {
        pairs.iter().map(|&(t, w)| (Box::<str>::from(t), w)).collect()
    }

    #[test]
    fn get_or_create_starts_empty_and_persists() {
        let store = InMemoryProfileStore::new();
        let id = RecipientId::from("a@example.org");
        assert!(store.load(&id).unwrap().is_none());

        let profile = store.get_or_create(&id).unwrap();
        assert!(profile.raw_counts().is_empty());
        assert!(profile.weights().is_empty());
        assert!(!profile.is_stale());
        assert_eq!(store.profile_num().unwrap(), 1);
        assert!(store.load(&id).unwrap().is_some());
    }

    #[test]
    fn fold_is_additive_and_marks_stale() {
        let mut profile = Profile::new();
        assert!(profile.fold_counts(&TermFrequency::from(&["cat", "cat", "dog"][..])));
        assert!(profile.fold_counts(&TermFrequency::from(&["cat"][..])));
        assert_eq!(profile.raw_count("cat"), 3);
        assert_eq!(profile.raw_count("dog"), 1);
        assert_eq!(profile.revision(), 2);
        assert!(profile.is_stale());
    }

    #[test]
    fn empty_fold_is_noop() {
        let mut profile = Profile::new();
        let before = profile.clone();
        assert!(!profile.fold_counts(&TermFrequency::new()));
        assert_eq!(profile, before);
    }

    #[test]
    fn set_weights_keeps_subset_and_clears_stale() {
        let mut profile = Profile::new();
        profile.fold_counts(&TermFrequency::from(&["a", "b"][..]));
        profile.set_weights(weights(&[("a", 1.0), ("b", 2.0), ("zz", 3.0)]), profile.revision());
        assert!(!profile.is_stale());
        assert_eq!(profile.weight("b"), Some(2.0));
        assert_eq!(profile.weight("zz"), None);
    }

    #[test]
    fn retain_terms_drops_both_vectors() {
        let store = InMemoryProfileStore::new();
        let id = RecipientId::from("r");
        store.get_or_create(&id).unwrap();
        store.fold_counts(&id, &TermFrequency::from(&["a", "b", "c"][..])).unwrap();
        store
            .set_weights(&id, weights(&[("a", 0.9), ("b", 0.5), ("c", 0.7)]), 1)
            .unwrap();
        store.retain_terms(&id, &keep(&["a", "c"])).unwrap();

        let profile = store.load(&id).unwrap().unwrap();
        assert_eq!(profile.term_num(), 2);
        assert_eq!(profile.raw_count("b"), 0);
        assert_eq!(profile.weight("b"), None);
        assert_eq!(profile.weight("c"), Some(0.7));
    }

    #[test]
    fn mutating_a_missing_profile_is_an_error() {
        let store = InMemoryProfileStore::new();
        let err = store
            .fold_counts(&RecipientId::from("ghost"), &TermFrequency::from(&["x"][..]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
