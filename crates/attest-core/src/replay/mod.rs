//! Replay guard: single-use nonce enforcement for nonce-guarded
//! capabilities.
//!
//! # Strategy Trade-off
//!
//! Two replay strategies exist in this engine, chosen per capability by
//! effect idempotence:
//!
//! 1. **Nonce ledger** (this module) — strict single-use regardless of
//!    timing, at the cost of shared mutable state. Used for wallet links.
//! 2. **Window-only** — no shared state; the freshness bounds alone limit
//!    the replay surface. Used for social links and badge batches, whose
//!    application is idempotent (single-slot overwrite, no-downgrade
//!    merge).
//!
//! # Sharding
//!
//! A single global consumed-nonce set would serialize every nonce-guarded
//! operation against every other. [`ShardedNonceLedger`] splits the set by
//! nonce prefix so contention and pruning localize to one shard; the
//! check-then-insert remains atomic because both happen under the shard
//! lock.
//!
//! The set grows unboundedly unless pruned: consumption times are recorded
//! so [`ShardedNonceLedger::prune`] can drop entries older than any
//! plausible validity window, after which the freshness guard alone rejects
//! the matching attestations.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::ReplayError;
use crate::types::Nonce;

/// Number of shards in the in-memory ledger.
const NUM_SHARDS: usize = 16;

/// Abstraction over consumed-nonce tracking.
///
/// Implementations must make `consume` atomic: a nonce is either recorded
/// exactly once or rejected, never both, even under concurrent callers.
pub trait NonceLedger: Send + Sync {
    /// Record consumption of `nonce` at `now_ms`.
    ///
    /// # Errors
    ///
    /// [`ReplayError::NonceAlreadyConsumed`] if the nonce was consumed by
    /// any earlier operation.
    fn consume(&self, nonce: Nonce, now_ms: i64) -> Result<(), ReplayError>;

    /// Whether `nonce` has been consumed.
    fn is_consumed(&self, nonce: &Nonce) -> bool;

    /// Drop entries consumed more than `max_age_ms` before `now_ms`.
    /// Returns the number of entries removed.
    fn prune(&self, now_ms: i64, max_age_ms: i64) -> usize;
}

/// In-memory consumed-nonce ledger sharded by nonce prefix.
pub struct ShardedNonceLedger {
    /// `nonce → consumption time (ms)`, split across shards.
    shards: [Mutex<HashMap<Nonce, i64>>; NUM_SHARDS],
}

impl ShardedNonceLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| Mutex::new(HashMap::new())),
        }
    }

    /// Total number of recorded nonces across all shards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().expect("nonce shard poisoned").len())
            .sum()
    }

    /// Whether no nonces are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard(&self, nonce: &Nonce) -> &Mutex<HashMap<Nonce, i64>> {
        &self.shards[nonce.as_bytes()[0] as usize % NUM_SHARDS]
    }
}

impl Default for ShardedNonceLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShardedNonceLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedNonceLedger")
            .field("consumed_count", &self.len())
            .finish_non_exhaustive()
    }
}

impl NonceLedger for ShardedNonceLedger {
    fn consume(&self, nonce: Nonce, now_ms: i64) -> Result<(), ReplayError> {
        let mut shard = self.shard(&nonce).lock().expect("nonce shard poisoned");
        if shard.contains_key(&nonce) {
            tracing::warn!(%nonce, "replay denied: nonce already consumed");
            return Err(ReplayError::NonceAlreadyConsumed { nonce });
        }
        shard.insert(nonce, now_ms);
        Ok(())
    }

    fn is_consumed(&self, nonce: &Nonce) -> bool {
        self.shard(nonce)
            .lock()
            .expect("nonce shard poisoned")
            .contains_key(nonce)
    }

    fn prune(&self, now_ms: i64, max_age_ms: i64) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock().expect("nonce shard poisoned");
            let before = shard.len();
            shard.retain(|_, consumed_at| now_ms.saturating_sub(*consumed_at) <= max_age_ms);
            removed += before - shard.len();
        }
        removed
    }
}
