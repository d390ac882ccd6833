/// This crate maintains per-recipient tf-idf content profiles, updated
/// incrementally as shared content reaches recipients.
pub mod config;
pub mod error;
pub mod profile;
pub mod utils;

/// Profile Update Engine
/// The top-level struct of this crate. For every share event it takes the
/// affected recipients and their newly visible content and runs three phases:
/// - tokenize each recipient's content once and fold the counts into its profile
/// - scan all profiles into one corpus statistics snapshot and derive tf-idf weights
/// - trim each profile to the configured number of terms
///
/// No phase starts for any recipient until the previous phase finished for
/// all of them, so every recipient of a batch is scored against the same idf.
///
/// `ProfileUpdateEngine<S, E>` has the following generic parameters:
/// - `S`: profile store (e.g., `InMemoryProfileStore`)
/// - `E`: TF-IDF calculation engine (e.g., `DefaultTFIDFEngine`)
///
/// # Examples
/// ```
/// use std::collections::HashMap;
/// use tf_idf_profiler::{EngineConfig, ProfileUpdateEngine, RecipientId};
///
/// let engine = ProfileUpdateEngine::in_memory(EngineConfig::default()).unwrap();
/// let alice = RecipientId::from("alice@example.org");
/// let content = HashMap::from([(alice.clone(), "<p>Rust borrow checker tips</p>".to_string())]);
///
/// let report = engine.update_batch(&[alice.clone()], &content).unwrap();
/// assert_eq!(report.recipients, vec![alice.clone()]);
///
/// let weights = engine.weights(&alice).unwrap().unwrap();
/// assert!(weights.contains_key("borrow"));
/// ```
///
/// # Thread Safety
/// The engine is `Sync`. Batches over disjoint recipients run concurrently,
/// batches over overlapping recipients are serialized per recipient.
pub use profile::ProfileUpdateEngine;

/// Profile
/// A recipient's raw term counts (source of truth) and derived weights
/// (cache, stale after every fold until re-derived).
pub use profile::store::{Profile, RecipientId, TermVector};

/// Profile Store
/// Persistence seam of the engine. `InMemoryProfileStore` is a sharded
/// in-memory store that can be saved to and opened from a CBOR snapshot.
pub use profile::store::{InMemoryProfileStore, ProfileStore};

/// Serializable snapshot of an `InMemoryProfileStore`
pub use profile::serde::ProfileStoreData;

/// Corpus statistics
/// Document frequency per term and the number of profiles, computed once per
/// batch as an immutable snapshot.
pub use profile::corpus::CorpusStats;

/// Term Frequency structure
/// The multiset of normalized terms extracted from one piece of content.
pub use profile::term::TermFrequency;

/// Tokenizer
/// Pure, never failing conversion of raw content into a `TermFrequency`.
pub use profile::tokenizer::Tokenizer;

/// TF IDF Calculation Engine Trait
/// A trait that defines how idf and weights are computed.
/// `DefaultTFIDFEngine` uses raw counts with smoothed idf
/// `ln((N + 1) / (df + 1)) + 1`.
pub use profile::tfidf::{DefaultTFIDFEngine, TFIDFEngine};

/// Batch results
pub use profile::batch::{BatchReport, PhaseTimings};

pub use config::{EngineConfig, TokenizerConfig};
pub use error::{BatchProgress, Phase, ProfileError, StoreError};
