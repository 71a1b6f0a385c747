//! Linked-identity state: wallet links, social links, and the profile
//! store they live in.
//!
//! Links are single-slot per key: a subject holds at most one wallet link
//! per network and one social link per platform, and recording a link for
//! an occupied key overwrites the slot. Overwrite is the re-link path, so
//! replaying a verified link statement is idempotent at the state layer.
//!
//! Address validation is table-driven: [`NetworkTable`] maps a network key
//! to its [`AddressFamily`], which fixes the address length and the
//! signature scheme wallets of that network produce. Unknown networks are
//! rejected before any cryptography runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::badge::BadgeCollection;
use crate::error::FormatError;
use crate::types::SubjectId;

/// Address family of an external network: fixes address length and the
/// wallet signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressFamily {
    /// 32-byte addresses that are Ed25519 public keys; wallets sign with
    /// Ed25519 directly.
    Ed25519,

    /// 20-byte account addresses derived from a secp256k1 key by Keccak-256;
    /// wallets sign with recoverable secp256k1 ECDSA.
    Account,
}

impl AddressFamily {
    /// Exact address length for this family.
    #[must_use]
    pub const fn expected_len(self) -> usize {
        match self {
            Self::Ed25519 => 32,
            Self::Account => 20,
        }
    }

    /// Static label for structured logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::Account => "account",
        }
    }
}

/// Map from network key to address family.
///
/// Keys are exact strings ("SOL" and "sol" are distinct networks). The
/// default table covers the two launch networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkTable {
    networks: BTreeMap<String, AddressFamily>,
}

impl Default for NetworkTable {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert("SOL".to_string(), AddressFamily::Ed25519);
        networks.insert("ETH".to_string(), AddressFamily::Account);
        Self { networks }
    }
}

impl NetworkTable {
    /// An empty table with no networks configured.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            networks: BTreeMap::new(),
        }
    }

    /// Configure `network` with `family`, replacing any previous entry.
    pub fn insert(&mut self, network: impl Into<String>, family: AddressFamily) {
        self.networks.insert(network.into(), family);
    }

    /// The address family configured for `network`.
    ///
    /// # Errors
    ///
    /// [`FormatError::UnknownNetwork`] if the network is not configured.
    pub fn family_of(&self, network: &str) -> Result<AddressFamily, FormatError> {
        self.networks
            .get(network)
            .copied()
            .ok_or_else(|| FormatError::UnknownNetwork {
                network: network.to_string(),
            })
    }

    /// Check `address` against the length fixed by `network`'s family.
    ///
    /// # Errors
    ///
    /// [`FormatError::UnknownNetwork`] for an unconfigured network;
    /// [`FormatError::AddressLength`] on a length mismatch.
    pub fn check_address(&self, network: &str, address: &[u8]) -> Result<AddressFamily, FormatError> {
        let family = self.family_of(network)?;
        if address.len() != family.expected_len() {
            return Err(FormatError::AddressLength {
                network: network.to_string(),
                expected: family.expected_len(),
                got: address.len(),
            });
        }
        Ok(family)
    }
}

/// A stored wallet link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletLink {
    /// Raw address bytes, length fixed by the network's family.
    pub address: Vec<u8>,
    /// Host time (ms) at which the current slot value was recorded.
    pub linked_at: i64,
}

/// A stored social link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    /// Platform-scoped username, stored verbatim.
    pub username: String,
    /// Host time (ms) at which the current slot value was recorded.
    pub linked_at: i64,
}

/// State backend the engine applies verified facts to.
///
/// The engine performs every check before calling a mutator, so
/// implementations only store: mutators are called for existing subjects
/// with already-validated values. `badge_collection_mut` creates the
/// collection lazily on first access.
pub trait Profile: Send + Sync {
    /// Controller of `subject`'s record, or `None` if the subject has no
    /// record.
    fn owner_of(&self, subject: &SubjectId) -> Option<SubjectId>;

    /// Stored wallet link for `subject` on `network`.
    fn wallet_link(&self, subject: &SubjectId, network: &str) -> Option<&WalletLink>;

    /// Record (or overwrite) `subject`'s wallet link on `network`.
    fn put_wallet_link(&mut self, subject: &SubjectId, network: &str, link: WalletLink);

    /// Remove `subject`'s wallet link on `network`, returning the old slot
    /// value if one was stored.
    fn remove_wallet_link(&mut self, subject: &SubjectId, network: &str) -> Option<WalletLink>;

    /// Stored social link for `subject` on `platform`.
    fn social_link(&self, subject: &SubjectId, platform: &str) -> Option<&SocialLink>;

    /// Record (or overwrite) `subject`'s social link on `platform`.
    fn put_social_link(&mut self, subject: &SubjectId, platform: &str, link: SocialLink);

    /// Remove `subject`'s social link on `platform`, returning the old slot
    /// value if one was stored.
    fn remove_social_link(&mut self, subject: &SubjectId, platform: &str) -> Option<SocialLink>;

    /// Badge collection of `subject`, if any badge has been minted.
    fn badge_collection(&self, subject: &SubjectId) -> Option<&BadgeCollection>;

    /// Mutable badge collection of `subject`, created empty on first access.
    fn badge_collection_mut(&mut self, subject: &SubjectId) -> &mut BadgeCollection;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SubjectRecord {
    controller: SubjectId,
    wallets: BTreeMap<String, WalletLink>,
    socials: BTreeMap<String, SocialLink>,
    badges: Option<BadgeCollection>,
}

impl SubjectRecord {
    fn new(controller: SubjectId) -> Self {
        Self {
            controller,
            wallets: BTreeMap::new(),
            socials: BTreeMap::new(),
            badges: None,
        }
    }
}

/// In-memory profile store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryProfile {
    subjects: BTreeMap<SubjectId, SubjectRecord>,
}

impl MemoryProfile {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record for `subject` controlled by `controller`. Replaces
    /// any existing record.
    pub fn create_subject(&mut self, subject: SubjectId, controller: SubjectId) {
        self.subjects.insert(subject, SubjectRecord::new(controller));
    }

    /// Number of subject records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    /// Whether no subjects are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    fn record_mut(&mut self, subject: &SubjectId) -> &mut SubjectRecord {
        self.subjects
            .get_mut(subject)
            .expect("mutator called for unknown subject")
    }
}

impl Profile for MemoryProfile {
    fn owner_of(&self, subject: &SubjectId) -> Option<SubjectId> {
        self.subjects.get(subject).map(|record| record.controller)
    }

    fn wallet_link(&self, subject: &SubjectId, network: &str) -> Option<&WalletLink> {
        self.subjects.get(subject)?.wallets.get(network)
    }

    fn put_wallet_link(&mut self, subject: &SubjectId, network: &str, link: WalletLink) {
        self.record_mut(subject)
            .wallets
            .insert(network.to_string(), link);
    }

    fn remove_wallet_link(&mut self, subject: &SubjectId, network: &str) -> Option<WalletLink> {
        self.record_mut(subject).wallets.remove(network)
    }

    fn social_link(&self, subject: &SubjectId, platform: &str) -> Option<&SocialLink> {
        self.subjects.get(subject)?.socials.get(platform)
    }

    fn put_social_link(&mut self, subject: &SubjectId, platform: &str, link: SocialLink) {
        self.record_mut(subject)
            .socials
            .insert(platform.to_string(), link);
    }

    fn remove_social_link(&mut self, subject: &SubjectId, platform: &str) -> Option<SocialLink> {
        self.record_mut(subject).socials.remove(platform)
    }

    fn badge_collection(&self, subject: &SubjectId) -> Option<&BadgeCollection> {
        self.subjects.get(subject)?.badges.as_ref()
    }

    fn badge_collection_mut(&mut self, subject: &SubjectId) -> &mut BadgeCollection {
        self.record_mut(subject)
            .badges
            .get_or_insert_with(BadgeCollection::new)
    }
}
