use crate::core::cluster::{cluster, ClusterRoster};
use crate::core::hash::EntryId;
use crate::core::signature::SignatureIndex;
use crate::store::{ContentStore, StoreError};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Clustered,
    Reviewing,
    Purging,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Operation not allowed in {actual:?} state (requires {expected:?})")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    #[error("No entry with id {id}")]
    UnknownEntry { id: EntryId },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct PurgeFailure {
    pub id: EntryId,
    pub error: StoreError,
}

#[derive(Debug, Default)]
pub struct PurgeReport {
    pub purged: usize,
    /// Entries whose bytes could not be removed; they stay live in both the
    /// store and the manifest.
    pub failures: Vec<PurgeFailure>,
}

/// One interactive pass over the collection:
///
/// ```text
/// Idle -> Clustered -> Reviewing -> Purging -> Clustered
///                          \-> Idle (abort, nothing deleted)
/// ```
///
/// Clustering output is a transient view; the signature cache lives for the
/// whole session and survives purges (purged ids are evicted, surviving
/// entries are not recomputed).
pub struct ReviewSession<'a, S: ContentStore> {
    store: &'a S,
    signatures: SignatureIndex,
    threshold: u32,
    state: SessionState,
    roster: Option<ClusterRoster>,
    marked: BTreeSet<EntryId>,
}

impl<'a, S: ContentStore> ReviewSession<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            signatures: SignatureIndex::new(),
            threshold: 0,
            state: SessionState::Idle,
            roster: None,
            marked: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn roster(&self) -> Option<&ClusterRoster> {
        self.roster.as_ref()
    }

    pub fn marked(&self) -> &BTreeSet<EntryId> {
        &self.marked
    }

    /// Compute signatures and the cluster roster for the current entry
    /// list. Callable from Idle, or from Clustered to re-run with a
    /// different threshold.
    pub fn start(&mut self, threshold: u32) -> Result<&ClusterRoster, SessionError> {
        match self.state {
            SessionState::Idle | SessionState::Clustered => {}
            actual => {
                return Err(SessionError::InvalidState {
                    expected: SessionState::Idle,
                    actual,
                })
            }
        }

        self.threshold = threshold;
        self.recluster();
        Ok(self.roster.get_or_insert_with(ClusterRoster::default))
    }

    /// Transition into Reviewing, enabling mark/unmark/purge.
    pub fn begin_review(&mut self) -> Result<(), SessionError> {
        self.expect(SessionState::Clustered)?;
        self.state = SessionState::Reviewing;
        Ok(())
    }

    /// Add an entry to the deletion set. In-memory only; nothing is
    /// persisted until [`ReviewSession::purge`].
    pub fn mark(&mut self, id: &EntryId) -> Result<(), SessionError> {
        self.expect(SessionState::Reviewing)?;
        if !self.store.contains(id) {
            return Err(SessionError::UnknownEntry { id: id.clone() });
        }
        self.marked.insert(id.clone());
        Ok(())
    }

    pub fn unmark(&mut self, id: &EntryId) -> Result<(), SessionError> {
        self.expect(SessionState::Reviewing)?;
        self.marked.remove(id);
        Ok(())
    }

    /// Leave review with no deletions. Clears the deletion set and the
    /// roster.
    pub fn abort(&mut self) -> Result<(), SessionError> {
        self.expect(SessionState::Reviewing)?;
        self.marked.clear();
        self.roster = None;
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Apply the deletion set: remove each marked entry's bytes, then
    /// persist the manifest once after the whole batch, so an interruption
    /// can only leave manifest records pointing at missing bytes (repaired
    /// at next open), never the reverse. Individual removal failures leave
    /// that entry live and are reported in the [`PurgeReport`]; they do not
    /// stop the batch.
    ///
    /// Membership changed, so the session re-clusters at the current
    /// threshold and returns to Clustered. If the manifest rewrite itself
    /// fails, the error is surfaced and the session falls back to Idle so a
    /// fresh pass can be started; durable consistency is re-derived by the
    /// store's open-time repair.
    pub fn purge(&mut self) -> Result<PurgeReport, SessionError> {
        self.expect(SessionState::Reviewing)?;
        self.state = SessionState::Purging;

        let mut report = PurgeReport::default();
        for id in std::mem::take(&mut self.marked) {
            match self.store.remove(&id) {
                Ok(()) => {
                    self.signatures.evict(&id);
                    report.purged += 1;
                }
                Err(error) => {
                    log::warn!("failed to purge {id}: {error}");
                    report.failures.push(PurgeFailure { id, error });
                }
            }
        }
        if let Err(error) = self.store.persist() {
            self.roster = None;
            self.state = SessionState::Idle;
            return Err(error.into());
        }
        log::info!(
            "purged {} entries ({} failed), {} remain",
            report.purged,
            report.failures.len(),
            self.store.len()
        );

        self.recluster();
        Ok(report)
    }

    fn recluster(&mut self) {
        let ids = self.store.ids();
        self.signatures.prime(self.store, &ids);
        self.roster = Some(cluster(&ids, &self.signatures, self.threshold));
        self.state = SessionState::Clustered;
    }

    fn expect(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}
