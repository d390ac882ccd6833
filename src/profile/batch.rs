use std::time::Duration;

use rayon::prelude::*;

use crate::{
    error::{BatchProgress, Phase, ProfileError, StoreError},
    profile::{store::RecipientId, term::TermFrequency},
};

// Phase completion tokens.
// Each token is only produced once its phase finished for every recipient of
// the batch, and the next phase takes it by value, so phase N+1 cannot start
// before phase N is complete.

/// Phase 1a output: each recipient's content tokenized exactly once
#[derive(Debug)]
pub struct Tokenized {
    pub(crate) entries: Vec<(RecipientId, TermFrequency)>,
}

/// Phase 1 complete: every fold of the batch is committed
#[derive(Debug)]
pub struct Folded {
    pub(crate) recipients: Vec<RecipientId>,
}

impl Folded {
    /// Token for re-deriving profiles without new content
    pub(crate) fn without_new_content(recipients: Vec<RecipientId>) -> Self {
        Self { recipients }
    }
}

/// Phase 2 complete: every recipient of the batch has fresh weights
#[derive(Debug)]
pub struct Weighted {
    pub(crate) recipients: Vec<RecipientId>,
    pub(crate) reweighted: usize,
}

/// Elapsed time per phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub tokenize: Duration,
    pub fold: Duration,
    pub statistics: Duration,
    pub weigh: Duration,
    pub trim: Duration,
}

/// Result of a completed batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// engine-local batch sequence number
    pub batch: u64,
    /// distinct recipients, sorted
    pub recipients: Vec<RecipientId>,
    /// recipients whose weights were re-derived
    pub reweighted: usize,
    /// terms removed by trimming, summed over recipients
    pub trimmed_terms: usize,
    /// profile count of the corpus snapshot the batch was scored against
    pub profile_count: u64,
    /// vocabulary size of that snapshot
    pub vocab_size: usize,
    pub timings: PhaseTimings,
}

/// Run one phase's per-recipient work in parallel.
/// Every item is attempted; successes are returned even when some fail.
pub(crate) fn run_phase<T, R, F>(items: Vec<T>, work: F) -> (Vec<R>, Option<StoreError>)
where
    T: Send,
    R: Send,
    F: Fn(T) -> Result<R, StoreError> + Sync + Send,
{
    let results: Vec<Result<R, StoreError>> = items.into_par_iter().map(work).collect();
    let mut done = Vec::with_capacity(results.len());
    let mut first_err = None;
    for result in results {
        match result {
            Ok(r) => done.push(r),
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }
    (done, first_err)
}

/// Abort a batch with what was committed so far
pub(crate) fn abort(phase: Phase, progress: &mut BatchProgress, source: StoreError) -> ProfileError {
    for list in [&mut progress.folded, &mut progress.weighted, &mut progress.trimmed] {
        list.sort();
    }
    ProfileError::StoreUnavailable {
        phase,
        progress: std::mem::take(progress),
        source,
    }
}
