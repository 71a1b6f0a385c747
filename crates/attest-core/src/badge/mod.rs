//! Tiered achievement badges and the no-downgrade merge engine.
//!
//! A [`BadgeCollection`] is owned by exactly one subject, created lazily on
//! first mint, and mutated only through [`BadgeCollection::merge`]. The
//! merge folds verified, fresh facts into the collection under one rule:
//!
//! - unseen category → insert, emit [`BadgeEvent::Minted`];
//! - higher rank than stored → replace in place, emit
//!   [`BadgeEvent::Upgraded`];
//! - equal or lower rank → discard silently, no mutation, no event.
//!
//! The silent discard is intentional, not a failure: the ledger is the
//! backstop against stale-tier batches even when the oracle is expected
//! never to issue downgrades, and a validly signed stale batch must not
//! regress state.
//!
//! Category cardinality is small, so lookup is a linear scan and the
//! collection preserves insertion order.

pub mod codec;

use serde::{Deserialize, Serialize};

pub use codec::{decode_batch, encode_batch, BatchDecodeError, BatchEncodeError};

/// A decoded achievement fact from an attested batch: the unit of input to
/// the merge engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeFact {
    /// Category: unique key within a collection (e.g. `"streak"`).
    pub category: String,
    /// Human-readable tier label (e.g. `"gold"`).
    pub tier_label: String,
    /// Ordinal rank of the tier; the no-downgrade rule compares these.
    pub tier_rank: u16,
    /// Display name for the badge at this tier.
    pub display_name: String,
    /// Description for the badge at this tier.
    pub description: String,
    /// Optional image URL.
    pub image_url: Option<String>,
}

/// A badge held by a subject: one per category, at the highest attested
/// tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    /// Category: unique key within the collection.
    pub category: String,
    /// Tier label at the current rank.
    pub tier_label: String,
    /// Ordinal tier rank; never decreases for a given category.
    pub tier_rank: u16,
    /// Display name.
    pub display_name: String,
    /// Description.
    pub description: String,
    /// Optional image URL.
    pub image_url: Option<String>,
    /// Host time (ms) at which the badge was first minted. Preserved across
    /// upgrades.
    pub minted_at: i64,
}

impl Badge {
    fn from_fact(fact: BadgeFact, minted_at: i64) -> Self {
        Self {
            category: fact.category,
            tier_label: fact.tier_label,
            tier_rank: fact.tier_rank,
            display_name: fact.display_name,
            description: fact.description,
            image_url: fact.image_url,
            minted_at,
        }
    }
}

/// Event emitted by the merge engine for each state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BadgeEvent {
    /// A badge was minted for a previously unseen category.
    Minted {
        /// The full minted badge.
        badge: Badge,
    },

    /// An existing badge moved to a strictly higher rank.
    Upgraded {
        /// Category that was upgraded.
        category: String,
        /// Tier label before the upgrade.
        previous_tier_label: String,
        /// Tier rank before the upgrade.
        previous_tier_rank: u16,
        /// Tier label after the upgrade.
        tier_label: String,
        /// Tier rank after the upgrade.
        tier_rank: u16,
    },
}

impl BadgeEvent {
    /// Static event kind label for structured logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Minted { .. } => "badge.minted",
            Self::Upgraded { .. } => "badge.upgraded",
        }
    }
}

/// Ordered set of badges owned by one subject, keyed by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeCollection {
    badges: Vec<Badge>,
}

impl BadgeCollection {
    /// Create an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { badges: Vec::new() }
    }

    /// The badge for `category`, if minted.
    #[must_use]
    pub fn get(&self, category: &str) -> Option<&Badge> {
        self.badges.iter().find(|badge| badge.category == category)
    }

    /// Number of badges held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.badges.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }

    /// Iterate badges in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Badge> {
        self.badges.iter()
    }

    /// Fold a batch of verified facts into the collection under the
    /// no-downgrade rule, returning the emitted events in batch order.
    ///
    /// `minted_at` stamps newly minted badges with the host time of this
    /// operation. Per-fact application cannot fail, so a fully decoded
    /// batch always commits as a whole.
    pub fn merge(&mut self, facts: Vec<BadgeFact>, minted_at: i64) -> Vec<BadgeEvent> {
        let mut events = Vec::new();
        for fact in facts {
            match self
                .badges
                .iter_mut()
                .find(|badge| badge.category == fact.category)
            {
                None => {
                    let badge = Badge::from_fact(fact, minted_at);
                    tracing::debug!(
                        category = %badge.category,
                        tier = %badge.tier_label,
                        rank = badge.tier_rank,
                        "badge minted"
                    );
                    events.push(BadgeEvent::Minted {
                        badge: badge.clone(),
                    });
                    self.badges.push(badge);
                }
                Some(stored) if fact.tier_rank > stored.tier_rank => {
                    let previous_tier_label =
                        std::mem::replace(&mut stored.tier_label, fact.tier_label);
                    let previous_tier_rank = stored.tier_rank;
                    stored.tier_rank = fact.tier_rank;
                    stored.display_name = fact.display_name;
                    stored.description = fact.description;
                    stored.image_url = fact.image_url;
                    tracing::debug!(
                        category = %stored.category,
                        from_rank = previous_tier_rank,
                        to_rank = stored.tier_rank,
                        "badge upgraded"
                    );
                    events.push(BadgeEvent::Upgraded {
                        category: stored.category.clone(),
                        previous_tier_label,
                        previous_tier_rank,
                        tier_label: stored.tier_label.clone(),
                        tier_rank: stored.tier_rank,
                    });
                }
                // Equal or lower rank: the intentional silent discard.
                Some(_) => {}
            }
        }
        events
    }
}

impl<'a> IntoIterator for &'a BadgeCollection {
    type Item = &'a Badge;
    type IntoIter = std::slice::Iter<'a, Badge>;

    fn into_iter(self) -> Self::IntoIter {
        self.badges.iter()
    }
}
