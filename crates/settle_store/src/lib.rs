//! Settlement persistence with per-settlement transactional isolation.
//!
//! The tick scheduler loads a settlement snapshot, simulates it off to the
//! side, and commits the result back with an optimistic version check. A
//! commit either lands whole or not at all; a settlement whose commit fails
//! keeps its previous state and is retried on a later pass.

use ahash::AHashMap;
use parking_lot::RwLock;
use settle_core::{
    DisasterEvent, DisasterId, DisasterRecord, DisasterStatus, SettlementId, SettlementState,
    WorldId,
};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Hard cap on retained disaster history per settlement.
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },
    #[error("world {0} already has an unresolved disaster")]
    WorldBusy(WorldId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A settlement snapshot together with the version it was read at.
#[derive(Debug, Clone)]
pub struct VersionedSettlement {
    pub state: SettlementState,
    pub version: u64,
}

/// Storage operations the scheduler and transport layer depend on.
///
/// Methods return futures so implementations can be backed by a remote
/// database later; the in-memory implementation completes immediately.
pub trait SettlementStore: Send + Sync + 'static {
    fn insert_settlement(
        &self,
        state: SettlementState,
        now_ms: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn load_settlement(
        &self,
        id: &SettlementId,
    ) -> impl Future<Output = Result<VersionedSettlement, StoreError>> + Send;

    /// Writes the full settlement state if `expected_version` still matches,
    /// returning the new version. All-or-nothing: on conflict the stored
    /// state is untouched.
    fn commit_settlement(
        &self,
        state: SettlementState,
        expected_version: u64,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Records player activity so the scheduler keeps the settlement hot.
    fn touch(
        &self,
        id: &SettlementId,
        now_ms: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_settlements(&self) -> impl Future<Output = Vec<SettlementId>> + Send;

    /// Settlements touched within `horizon_ms` of `now_ms`. Idle settlements
    /// fall out of the tick rotation and catch up on their next load.
    fn active_settlements(
        &self,
        now_ms: u64,
        horizon_ms: u64,
    ) -> impl Future<Output = Vec<SettlementId>> + Send;

    fn settlements_in_world(
        &self,
        world: &WorldId,
    ) -> impl Future<Output = Vec<SettlementId>> + Send;

    /// Registers a new disaster. Fails with [`StoreError::WorldBusy`] if the
    /// world already has a disaster that has not reached RESOLVED.
    fn insert_disaster(
        &self,
        event: DisasterEvent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn unresolved_disasters(
        &self,
    ) -> impl Future<Output = Vec<(DisasterEvent, u64)>> + Send;

    /// The unresolved disaster affecting `world`, if any. At most one exists
    /// per world at a time.
    fn active_disaster_for_world(
        &self,
        world: &WorldId,
    ) -> impl Future<Output = Option<DisasterEvent>> + Send;

    fn update_disaster(
        &self,
        event: DisasterEvent,
        expected_version: u64,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Appends a disaster outcome to the settlement's history. History is
    /// append-only and capped at [`MAX_HISTORY`] entries (oldest dropped).
    fn append_history(
        &self,
        settlement: &SettlementId,
        record: DisasterRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Most recent history entries, newest first. `limit` is clamped to
    /// [`MAX_HISTORY`].
    fn recent_history(
        &self,
        settlement: &SettlementId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DisasterRecord>, StoreError>> + Send;
}

struct StoredSettlement {
    state: SettlementState,
    version: u64,
    last_touched_ms: u64,
}

struct StoredDisaster {
    event: DisasterEvent,
    version: u64,
}

#[derive(Default)]
struct Inner {
    settlements: AHashMap<SettlementId, StoredSettlement>,
    disasters: AHashMap<DisasterId, StoredDisaster>,
    history: AHashMap<SettlementId, Vec<DisasterRecord>>,
}

/// In-memory store. The lock is held only for the duration of each map
/// operation; simulation work happens outside it on a cloned snapshot.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    // Test hook: makes the next N commits fail as Unavailable.
    fail_next_commits: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` settlement commits fail with
    /// [`StoreError::Unavailable`]. Used to exercise scheduler failure
    /// isolation.
    pub fn fail_next_commits(&self, n: u32) {
        self.fail_next_commits.store(n, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_next_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl SettlementStore for MemoryStore {
    async fn insert_settlement(
        &self,
        state: SettlementState,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.settlements.insert(
            state.id.clone(),
            StoredSettlement {
                state,
                version: 1,
                last_touched_ms: now_ms,
            },
        );
        Ok(())
    }

    async fn load_settlement(&self, id: &SettlementId) -> Result<VersionedSettlement, StoreError> {
        let inner = self.inner.read();
        let stored = inner
            .settlements
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.0.clone()))?;
        Ok(VersionedSettlement {
            state: stored.state.clone(),
            version: stored.version,
        })
    }

    async fn commit_settlement(
        &self,
        state: SettlementState,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        if self.take_injected_failure() {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        let mut inner = self.inner.write();
        let stored = inner
            .settlements
            .get_mut(&state.id)
            .ok_or_else(|| StoreError::NotFound(state.id.0.clone()))?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: stored.version,
            });
        }
        stored.state = state;
        stored.version += 1;
        Ok(stored.version)
    }

    async fn touch(&self, id: &SettlementId, now_ms: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let stored = inner
            .settlements
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.0.clone()))?;
        stored.last_touched_ms = stored.last_touched_ms.max(now_ms);
        Ok(())
    }

    async fn list_settlements(&self) -> Vec<SettlementId> {
        let inner = self.inner.read();
        let mut ids: Vec<_> = inner.settlements.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn active_settlements(&self, now_ms: u64, horizon_ms: u64) -> Vec<SettlementId> {
        let inner = self.inner.read();
        let mut ids: Vec<_> = inner
            .settlements
            .values()
            .filter(|s| now_ms.saturating_sub(s.last_touched_ms) <= horizon_ms)
            .map(|s| s.state.id.clone())
            .collect();
        ids.sort();
        ids
    }

    async fn settlements_in_world(&self, world: &WorldId) -> Vec<SettlementId> {
        let inner = self.inner.read();
        let mut ids: Vec<_> = inner
            .settlements
            .values()
            .filter(|s| &s.state.world == world)
            .map(|s| s.state.id.clone())
            .collect();
        ids.sort();
        ids
    }

    async fn insert_disaster(&self, event: DisasterEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let busy = inner
            .disasters
            .values()
            .any(|d| d.event.world == event.world && d.event.status != DisasterStatus::Resolved);
        if busy {
            return Err(StoreError::WorldBusy(event.world));
        }
        inner
            .disasters
            .insert(event.id.clone(), StoredDisaster { event, version: 1 });
        Ok(())
    }

    async fn unresolved_disasters(&self) -> Vec<(DisasterEvent, u64)> {
        let inner = self.inner.read();
        let mut events: Vec<_> = inner
            .disasters
            .values()
            .filter(|d| d.event.status != DisasterStatus::Resolved)
            .map(|d| (d.event.clone(), d.version))
            .collect();
        events.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        events
    }

    async fn active_disaster_for_world(&self, world: &WorldId) -> Option<DisasterEvent> {
        let inner = self.inner.read();
        inner
            .disasters
            .values()
            .find(|d| &d.event.world == world && d.event.status != DisasterStatus::Resolved)
            .map(|d| d.event.clone())
    }

    async fn update_disaster(
        &self,
        event: DisasterEvent,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write();
        let stored = inner
            .disasters
            .get_mut(&event.id)
            .ok_or_else(|| StoreError::NotFound(event.id.0.clone()))?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: stored.version,
            });
        }
        stored.event = event;
        stored.version += 1;
        Ok(stored.version)
    }

    async fn append_history(
        &self,
        settlement: &SettlementId,
        record: DisasterRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.settlements.contains_key(settlement) {
            return Err(StoreError::NotFound(settlement.0.clone()));
        }
        let rows = inner.history.entry(settlement.clone()).or_default();
        rows.push(record);
        if rows.len() > MAX_HISTORY {
            let excess = rows.len() - MAX_HISTORY;
            rows.drain(..excess);
        }
        Ok(())
    }

    async fn recent_history(
        &self,
        settlement: &SettlementId,
        limit: usize,
    ) -> Result<Vec<DisasterRecord>, StoreError> {
        let inner = self.inner.read();
        if !inner.settlements.contains_key(settlement) {
            return Err(StoreError::NotFound(settlement.0.clone()));
        }
        let limit = limit.min(MAX_HISTORY);
        Ok(inner
            .history
            .get(settlement)
            .map(|rows| rows.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
