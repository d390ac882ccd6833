use std::fmt;

use thiserror::Error;

use crate::profile::store::RecipientId;

/// Failure of the persistence layer behind a [`crate::ProfileStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile store is unavailable: {0}")]
    Unavailable(String),
    #[error("profile store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("profile store codec error: {0}")]
    Codec(#[from] serde_cbor::Error),
}

/// Engine phase a batch was in when it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// tokenize + fold new counts
    Fold,
    /// corpus statistics scan
    Statistics,
    /// tf-idf weight derivation
    Weigh,
    Trim,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Fold => "fold",
            Phase::Statistics => "statistics",
            Phase::Weigh => "weigh",
            Phase::Trim => "trim",
        };
        f.write_str(name)
    }
}

/// Which recipients made it through which phase before a batch stopped.
/// A recipient listed in `folded` has its new counts committed; re-folding
/// the same content would count it twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub folded: Vec<RecipientId>,
    pub weighted: Vec<RecipientId>,
    pub trimmed: Vec<RecipientId>,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    /// The batch names a recipient it cannot resolve.
    /// Raised before any mutation.
    #[error("unknown recipient `{0}`")]
    UnknownRecipient(RecipientId),
    /// The store failed mid-batch; `progress` tells what was committed.
    #[error("profile store unavailable during {phase} phase")]
    StoreUnavailable {
        phase: Phase,
        progress: BatchProgress,
        #[source]
        source: StoreError,
    },
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    /// Store failure outside of a batch (reads, checkpoints)
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProfileError {
    /// Progress of the failed batch, if it got past validation
    pub fn progress(&self) -> Option<&BatchProgress> {
        match self {
            ProfileError::StoreUnavailable { progress, .. } => Some(progress),
            _ => None,
        }
    }
}
