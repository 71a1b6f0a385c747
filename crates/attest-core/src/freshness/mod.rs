//! Freshness guard: two-bound timestamp validation.
//!
//! Every attested timestamp is checked against the host-supplied current
//! time, never a caller-supplied wall clock:
//!
//! - **Backward bound**: `now − timestamp ≤ validity_window` — the
//!   attestation has not expired.
//! - **Forward bound**: `timestamp ≤ now + max_clock_skew` — the timestamp
//!   is not from the future beyond a seconds-scale issuer-clock tolerance.
//!
//! Both bounds are inclusive and both are mandatory. Enforcing only the
//! backward bound would let an attacker-chosen future timestamp extend the
//! effective replay window arbitrarily.
//!
//! Windows are minutes-scale and capability-dependent; skew is
//! seconds-scale. The evaluator is deterministic and side-effect-free.

use serde::{Deserialize, Serialize};

use crate::error::FreshnessError;
use crate::message::{Capability, NUM_CAPABILITIES};

/// Default backward validity window (10 minutes).
pub const DEFAULT_VALIDITY_WINDOW_MS: i64 = 600_000;

/// Default forward clock-skew tolerance (5 seconds).
pub const DEFAULT_MAX_CLOCK_SKEW_MS: i64 = 5_000;

/// Default backward validity window for badge batches (1 hour). Batches are
/// issued in bulk and their merge is idempotent, so a wider window is safe.
pub const DEFAULT_BADGE_VALIDITY_WINDOW_MS: i64 = 3_600_000;

/// Acceptance window for a single capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityWindow {
    /// Backward bound: maximum age of an attestation in milliseconds.
    pub validity_window_ms: i64,

    /// Forward bound: maximum clock skew tolerated in milliseconds.
    pub max_clock_skew_ms: i64,
}

impl Default for CapabilityWindow {
    fn default() -> Self {
        Self {
            validity_window_ms: DEFAULT_VALIDITY_WINDOW_MS,
            max_clock_skew_ms: DEFAULT_MAX_CLOCK_SKEW_MS,
        }
    }
}

/// Per-capability freshness policy.
///
/// Indexed by capability ordinal. The defaults give wallet and social links
/// a 10-minute window and badge batches a 1-hour window, all with 5-second
/// skew tolerance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    windows: [CapabilityWindow; NUM_CAPABILITIES],
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            windows: [
                // WalletLink
                CapabilityWindow::default(),
                // SocialLink
                CapabilityWindow::default(),
                // BadgeSet
                CapabilityWindow {
                    validity_window_ms: DEFAULT_BADGE_VALIDITY_WINDOW_MS,
                    max_clock_skew_ms: DEFAULT_MAX_CLOCK_SKEW_MS,
                },
            ],
        }
    }
}

impl FreshnessPolicy {
    /// Build a policy with explicit per-capability windows, in
    /// [`Capability::ALL`] order.
    #[must_use]
    pub const fn new(windows: [CapabilityWindow; NUM_CAPABILITIES]) -> Self {
        Self { windows }
    }

    /// Build a policy applying one window to every capability.
    #[must_use]
    pub const fn uniform(window: CapabilityWindow) -> Self {
        Self {
            windows: [window; NUM_CAPABILITIES],
        }
    }

    /// The window configured for `capability`.
    #[must_use]
    pub const fn window(&self, capability: Capability) -> &CapabilityWindow {
        &self.windows[capability as usize]
    }

    /// Check `timestamp_ms` against both bounds for `capability`.
    ///
    /// Accepts iff `now − window ≤ t ≤ now + skew`, both ends inclusive.
    ///
    /// # Errors
    ///
    /// [`FreshnessError::Expired`] when the backward bound fails,
    /// [`FreshnessError::FromFuture`] when the forward bound fails.
    pub fn check(
        &self,
        capability: Capability,
        now_ms: i64,
        timestamp_ms: i64,
    ) -> Result<(), FreshnessError> {
        let window = self.window(capability);

        // Forward bound first: a future timestamp is the more suspicious
        // signal and must never be masked by the age computation.
        if timestamp_ms.saturating_sub(now_ms) > window.max_clock_skew_ms {
            return Err(FreshnessError::FromFuture {
                timestamp_ms,
                now_ms,
                max_clock_skew_ms: window.max_clock_skew_ms,
            });
        }

        if now_ms.saturating_sub(timestamp_ms) > window.validity_window_ms {
            return Err(FreshnessError::Expired {
                timestamp_ms,
                now_ms,
                validity_window_ms: window.validity_window_ms,
            });
        }

        Ok(())
    }
}
