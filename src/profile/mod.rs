pub mod batch;
pub mod corpus;
pub mod serde;
pub mod store;
pub mod term;
pub mod tfidf;
pub mod tokenizer;
pub mod trim;

use std::{
    collections::{BTreeSet, HashMap},
    hash::BuildHasher,
    marker::PhantomData,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::EngineConfig,
    error::{BatchProgress, Phase, ProfileError, StoreError},
    profile::{
        batch::{abort, run_phase, BatchReport, Folded, PhaseTimings, Tokenized, Weighted},
        corpus::CorpusStats,
        store::{InMemoryProfileStore, Profile, ProfileStore, RecipientId, TermVector},
        tfidf::{DefaultTFIDFEngine, TFIDFEngine},
        tokenizer::Tokenizer,
    },
};

/// Profile update engine
/// Maintains per-recipient tf-idf profiles as share events arrive.
///
/// Each batch runs three phases with a barrier between them:
/// 1. tokenize every recipient's new content once and fold the counts
/// 2. scan the store once into a [`CorpusStats`] snapshot and derive every
///    stale recipient's weights from it
/// 3. trim every recipient to `max_terms`
///
/// Batches lock their recipients (in sorted order) for their whole run, so
/// batches over overlapping recipients are serialized and disjoint ones run
/// concurrently.
///
/// `ProfileUpdateEngine<S, E>`:
/// - `S`: persistence ([`InMemoryProfileStore`] by default)
/// - `E`: tf-idf calculation ([`DefaultTFIDFEngine`] by default)
#[derive(Debug)]
pub struct ProfileUpdateEngine<S = InMemoryProfileStore, E = DefaultTFIDFEngine>
where
    S: ProfileStore,
    E: TFIDFEngine,
{
    store: Arc<S>,
    tokenizer: Tokenizer,
    config: EngineConfig,
    /// per-recipient mutual exclusion
    recipient_locks: DashMap<RecipientId, Arc<Mutex<()>>, RandomState>,
    /// batches share it, checkpoints take it exclusively
    checkpoint_gate: RwLock<()>,
    batch_seq: AtomicU64,
    _marker: PhantomData<fn() -> E>,
}

impl ProfileUpdateEngine<InMemoryProfileStore, DefaultTFIDFEngine> {
    /// Engine over a fresh in-memory store
    pub fn in_memory(config: EngineConfig) -> Result<Self, ProfileError> {
        Self::new(Arc::new(InMemoryProfileStore::new()), config)
    }
}

impl<S, E> ProfileUpdateEngine<S, E>
where
    S: ProfileStore,
    E: TFIDFEngine,
{
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self, ProfileError> {
        config.validate()?;
        Ok(Self {
            store,
            tokenizer: Tokenizer::new(config.tokenizer.clone()),
            config,
            recipient_locks: DashMap::with_hasher(RandomState::new()),
            checkpoint_gate: RwLock::new(()),
            batch_seq: AtomicU64::new(0),
            _marker: PhantomData,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Fold new content into the profiles of the affected recipients and
    /// re-derive their weights against one corpus snapshot
    ///
    /// # Arguments
    /// * `affected_recipients` - recipients touched by the share event; duplicates are ignored
    /// * `content_by_recipient` - the new content of each recipient (may be empty text)
    ///
    /// # Errors
    /// * `UnknownRecipient` - content without a matching recipient or the reverse; nothing is mutated
    /// * `StoreUnavailable` - the store failed; the error carries what was committed
    ///
    /// Content must not be resubmitted after a fold committed, it would be counted twice.
    #[instrument(skip_all, fields(recipients = affected_recipients.len()))]
    pub fn update_batch<C, H>(
        &self,
        affected_recipients: &[RecipientId],
        content_by_recipient: &HashMap<RecipientId, C, H>,
    ) -> Result<BatchReport, ProfileError>
    where
        C: AsRef<str> + Sync,
        H: BuildHasher + Sync,
    {
        let recipients = resolve_recipients(affected_recipients, content_by_recipient)?;
        let batch = self.batch_seq.fetch_add(1, Ordering::Relaxed);
        if recipients.is_empty() {
            debug!(batch, "empty batch");
            return Ok(self.empty_report(batch));
        }
        info!(batch, recipients = recipients.len(), "profile batch started");

        let _gate = self.checkpoint_gate.read();
        let locks = self.recipient_locks(&recipients);
        let _guards: Vec<_> = locks.iter().map(|lock| lock.lock()).collect();

        let mut timings = PhaseTimings::default();
        let mut progress = BatchProgress::default();

        let started = Instant::now();
        let tokenized = self.tokenize_phase(recipients, content_by_recipient);
        timings.tokenize = started.elapsed();
        debug!(batch, elapsed = ?timings.tokenize, "tokenized");

        let started = Instant::now();
        let folded = self.fold_phase(batch, tokenized, &mut progress)?;
        timings.fold = started.elapsed();
        debug!(batch, elapsed = ?timings.fold, "folded");

        self.finish_batch(batch, folded, false, timings, progress)
    }

    /// Re-run phases 2 and 3 for existing profiles, without new content
    /// Repairs profiles left stale by an aborted batch; weights are
    /// re-derived even when the profile is not marked stale.
    #[instrument(skip_all, fields(recipients = recipients.len()))]
    pub fn rederive(&self, recipients: &[RecipientId]) -> Result<BatchReport, ProfileError> {
        let recipients: Vec<RecipientId> = recipients
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for id in &recipients {
            if self.store.load(id)?.is_none() {
                return Err(ProfileError::UnknownRecipient(id.clone()));
            }
        }
        let batch = self.batch_seq.fetch_add(1, Ordering::Relaxed);
        if recipients.is_empty() {
            return Ok(self.empty_report(batch));
        }
        info!(batch, recipients = recipients.len(), "profile re-derivation started");

        let _gate = self.checkpoint_gate.read();
        let locks = self.recipient_locks(&recipients);
        let _guards: Vec<_> = locks.iter().map(|lock| lock.lock()).collect();

        let folded = Folded::without_new_content(recipients);
        self.finish_batch(batch, folded, true, PhaseTimings::default(), BatchProgress::default())
    }

    /// Current weights of a recipient, `None` if it has no profile
    pub fn weights(&self, recipient: &RecipientId) -> Result<Option<TermVector<f64>>, ProfileError> {
        Ok(self.store.load(recipient)?.map(|p| p.weights().clone()))
    }

    /// The `n` highest weighted terms of a recipient, best first
    pub fn top_terms(&self, recipient: &RecipientId, n: usize) -> Result<Vec<(Box<str>, f64)>, ProfileError> {
        let Some(profile) = self.store.load(recipient)? else {
            return Ok(Vec::new());
        };
        Ok(trim::top_terms(&profile, n)
            .into_iter()
            .map(|ranked| (Box::<str>::from(ranked.term), ranked.weight))
            .collect())
    }

    /// Full profile of a recipient
    pub fn profile(&self, recipient: &RecipientId) -> Result<Option<Profile>, ProfileError> {
        Ok(self.store.load(recipient)?)
    }

    /// Phases 2 and 3, shared by `update_batch` and `rederive`
    fn finish_batch(
        &self,
        batch: u64,
        folded: Folded,
        force: bool,
        mut timings: PhaseTimings,
        mut progress: BatchProgress,
    ) -> Result<BatchReport, ProfileError> {
        // 全員のfoldが終わってから一度だけスキャンする
        let started = Instant::now();
        let stats = CorpusStats::scan(self.store.as_ref())
            .map_err(|e| self.aborted(batch, Phase::Statistics, &mut progress, e))?;
        timings.statistics = started.elapsed();
        debug!(
            batch,
            profiles = stats.profile_count(),
            vocab = stats.vocab_size(),
            elapsed = ?timings.statistics,
            "corpus statistics"
        );

        let started = Instant::now();
        let weighted = self.weigh_phase(batch, folded, &stats, force, &mut progress)?;
        timings.weigh = started.elapsed();
        debug!(batch, reweighted = weighted.reweighted, elapsed = ?timings.weigh, "weighed");

        let started = Instant::now();
        let recipients = weighted.recipients.clone();
        let reweighted = weighted.reweighted;
        let trimmed_terms = self.trim_phase(batch, weighted, &mut progress)?;
        timings.trim = started.elapsed();
        debug!(batch, trimmed_terms, elapsed = ?timings.trim, "trimmed");

        info!(batch, recipients = recipients.len(), reweighted, trimmed_terms, "profile batch finished");
        Ok(BatchReport {
            batch,
            recipients,
            reweighted,
            trimmed_terms,
            profile_count: stats.profile_count(),
            vocab_size: stats.vocab_size(),
            timings,
        })
    }

    /// Phase 1a: tokenize each recipient's content once
    fn tokenize_phase<C, H>(
        &self,
        recipients: Vec<RecipientId>,
        content_by_recipient: &HashMap<RecipientId, C, H>,
    ) -> Tokenized
    where
        C: AsRef<str> + Sync,
        H: BuildHasher + Sync,
    {
        use rayon::prelude::*;

        let entries = recipients
            .into_par_iter()
            .map(|id| {
                // resolve_recipients で存在は確認済み
                let terms = content_by_recipient
                    .get(&id)
                    .map(|content| self.tokenizer.tokenize(content.as_ref()))
                    .unwrap_or_default();
                (id, terms)
            })
            .collect();
        Tokenized { entries }
    }

    /// Phase 1b: create missing profiles and fold the cached terms
    fn fold_phase(
        &self,
        batch: u64,
        tokenized: Tokenized,
        progress: &mut BatchProgress,
    ) -> Result<Folded, ProfileError> {
        let store = self.store.as_ref();
        let (done, err) = run_phase(tokenized.entries, |(id, terms)| {
            store.get_or_create(&id)?;
            store.fold_counts(&id, &terms)?;
            Ok(id)
        });
        progress.folded.extend(done.iter().cloned());
        if let Some(e) = err {
            return Err(self.aborted(batch, Phase::Fold, progress, e));
        }
        let mut recipients = done;
        recipients.sort();
        Ok(Folded { recipients })
    }

    /// Phase 2: derive weights from one snapshot
    fn weigh_phase(
        &self,
        batch: u64,
        folded: Folded,
        stats: &CorpusStats,
        force: bool,
        progress: &mut BatchProgress,
    ) -> Result<Weighted, ProfileError> {
        let store = self.store.as_ref();
        let (done, err) = run_phase(folded.recipients, |id| {
            let profile = store.load(&id)?.ok_or_else(|| missing_profile(&id))?;
            if !force && !profile.is_stale() {
                return Ok((id, false));
            }
            let weights = E::weight_vec(&profile, stats);
            store.set_weights(&id, weights, profile.revision())?;
            Ok((id, true))
        });
        let reweighted = done.iter().filter(|(_, changed)| *changed).count();
        let mut recipients: Vec<RecipientId> = done.into_iter().map(|(id, _)| id).collect();
        progress.weighted.extend(recipients.iter().cloned());
        if let Some(e) = err {
            return Err(self.aborted(batch, Phase::Weigh, progress, e));
        }
        recipients.sort();
        Ok(Weighted { recipients, reweighted })
    }

    /// Phase 3: trim every recipient to the configured cap
    /// Returns the number of removed terms.
    fn trim_phase(&self, batch: u64, weighted: Weighted, progress: &mut BatchProgress) -> Result<usize, ProfileError> {
        let store = self.store.as_ref();
        let max_terms = self.config.max_terms;
        let (done, err) = run_phase(weighted.recipients, |id| {
            let profile = store.load(&id)?.ok_or_else(|| missing_profile(&id))?;
            if profile.is_stale() {
                // 重みが古いまま刈り込むと誤った語を捨てる
                return Err(StoreError::Unavailable(format!(
                    "weights of `{id}` did not persist, refusing to trim"
                )));
            }
            let dropped = match trim::retained_terms(&profile, max_terms) {
                Some(keep) => {
                    store.retain_terms(&id, &keep)?;
                    profile.term_num() - keep.len()
                }
                None => 0,
            };
            Ok((id, dropped))
        });
        let trimmed_terms = done.iter().map(|(_, dropped)| dropped).sum();
        progress.trimmed.extend(done.into_iter().map(|(id, _)| id));
        if let Some(e) = err {
            return Err(self.aborted(batch, Phase::Trim, progress, e));
        }
        Ok(trimmed_terms)
    }

    fn recipient_locks(&self, recipients: &[RecipientId]) -> Vec<Arc<Mutex<()>>> {
        // recipients はソート済みなので取得順が全バッチで一致しデッドロックしない
        recipients
            .iter()
            .map(|id| {
                self.recipient_locks
                    .entry(id.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .value()
                    .clone()
            })
            .collect()
    }

    fn aborted(&self, batch: u64, phase: Phase, progress: &mut BatchProgress, source: StoreError) -> ProfileError {
        warn!(batch, %phase, error = %source, "profile batch aborted");
        abort(phase, progress, source)
    }

    fn empty_report(&self, batch: u64) -> BatchReport {
        BatchReport {
            batch,
            recipients: Vec::new(),
            reweighted: 0,
            trimmed_terms: 0,
            profile_count: 0,
            vocab_size: 0,
            timings: PhaseTimings::default(),
        }
    }
}

impl<E> ProfileUpdateEngine<InMemoryProfileStore, E>
where
    E: TFIDFEngine,
{
    /// Write a consistent snapshot of every profile
    /// Waits for in-flight batches and holds new ones off while writing.
    pub fn checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), ProfileError> {
        let _gate = self.checkpoint_gate.write();
        self.store.save(path)?;
        info!(profiles = self.store.profiles.len(), "profile checkpoint written");
        Ok(())
    }
}

fn missing_profile(id: &RecipientId) -> StoreError {
    StoreError::Unavailable(format!("profile of `{id}` disappeared mid-batch"))
}

/// Distinct, sorted recipients of a batch
/// Every recipient needs content and every content needs a recipient.
fn resolve_recipients<C, H>(
    affected: &[RecipientId],
    content_by_recipient: &HashMap<RecipientId, C, H>,
) -> Result<Vec<RecipientId>, ProfileError>
where
    H: BuildHasher,
{
    let recipients: BTreeSet<&RecipientId> = affected.iter().collect();
    if let Some(missing) = recipients.iter().find(|id| !content_by_recipient.contains_key(**id)) {
        return Err(ProfileError::UnknownRecipient((*missing).clone()));
    }
    if let Some(stray) = content_by_recipient
        .keys()
        .filter(|id| !recipients.contains(id))
        .min()
    {
        return Err(ProfileError::UnknownRecipient(stray.clone()));
    }
    Ok(recipients.into_iter().cloned().collect())
}
