//! Engine entry points: the fixed check pipeline in front of every state
//! change.
//!
//! Each linking operation runs the same gauntlet, in order:
//!
//! 1. **Authorization** — the subject has a record and the caller is its
//!    controller.
//! 2. **Format** — network/address shape, identifier bounds, batch decode.
//! 3. **Freshness** — attested timestamp inside the capability window.
//! 4. **Cryptography** — signature over the re-derived canonical message.
//! 5. **Replay** — nonce consumption for nonce-guarded capabilities.
//!
//! Only after every gate passes does the profile store change, and the
//! nonce is consumed in the same step as the apply so a failed apply can
//! never strand a consumed nonce. Unlink operations are local facts: they
//! stop at the authorization gate and carry no attestation.
//!
//! # Security Model
//!
//! The engine never parses attacker-controlled structure before a
//! signature check: badge batches are verified as opaque signed bytes
//! first and decoded second, and every other payload is re-encoded from
//! the submitted fields rather than parsed.

use crate::badge::{decode_batch, BadgeEvent};
use crate::error::{AuthorizationError, EngineError, FormatError};
use crate::freshness::FreshnessPolicy;
use crate::link::{AddressFamily, NetworkTable, Profile, SocialLink, WalletLink};
use crate::message::{
    badge_set_message, social_link_message, wallet_link_message, Capability,
};
use crate::registry::OracleRegistry;
use crate::replay::{NonceLedger, ShardedNonceLedger};
use crate::types::{Nonce, SubjectId};
use crate::verify::{verify_ed25519, verify_secp256k1_recoverable, ACCOUNT_ADDRESS_LEN};

/// Proof accompanying a wallet-link statement.
///
/// Both variants sign the same canonical message; they differ in who holds
/// the key and which scheme the signature uses.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub enum WalletProof<'a> {
    /// Oracle attestation: Ed25519 under the registry key. The oracle has
    /// verified wallet ownership off-engine.
    Oracle {
        /// 64-byte Ed25519 signature.
        signature: &'a [u8],
    },

    /// Wallet self-signature: the scheme is fixed by the network's address
    /// family. Ed25519 networks sign with the address key itself;
    /// account-based networks sign with recoverable secp256k1 and the
    /// recovered address must match the claimed one.
    Wallet {
        /// 64-byte Ed25519 or 65-byte recoverable secp256k1 signature.
        signature: &'a [u8],
    },
}

/// Attestation verification and state-merge engine.
///
/// Holds the verification configuration (oracle key registry, freshness
/// policy, network table, nonce ledger); profile state is passed into each
/// entry point so one engine can front any number of stores.
pub struct AttestationEngine {
    registry: OracleRegistry,
    freshness: FreshnessPolicy,
    networks: NetworkTable,
    nonces: Box<dyn NonceLedger>,
}

impl std::fmt::Debug for AttestationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationEngine")
            .field("registry", &self.registry)
            .field("freshness", &self.freshness)
            .field("networks", &self.networks)
            .finish_non_exhaustive()
    }
}

impl AttestationEngine {
    /// Build an engine with explicit configuration.
    #[must_use]
    pub fn new(
        registry: OracleRegistry,
        freshness: FreshnessPolicy,
        networks: NetworkTable,
        nonces: Box<dyn NonceLedger>,
    ) -> Self {
        Self {
            registry,
            freshness,
            networks,
            nonces,
        }
    }

    /// Build an engine with the default policy, network table, and an empty
    /// in-memory nonce ledger.
    #[must_use]
    pub fn with_defaults(registry: OracleRegistry) -> Self {
        Self::new(
            registry,
            FreshnessPolicy::default(),
            NetworkTable::default(),
            Box::new(ShardedNonceLedger::new()),
        )
    }

    /// The oracle key registry.
    #[must_use]
    pub const fn registry(&self) -> &OracleRegistry {
        &self.registry
    }

    /// The freshness policy.
    #[must_use]
    pub const fn freshness(&self) -> &FreshnessPolicy {
        &self.freshness
    }

    /// The network table.
    #[must_use]
    pub const fn networks(&self) -> &NetworkTable {
        &self.networks
    }

    fn authorize(
        store: &impl Profile,
        caller: &SubjectId,
        subject: &SubjectId,
    ) -> Result<(), AuthorizationError> {
        let controller =
            store
                .owner_of(subject)
                .ok_or(AuthorizationError::UnknownSubject { subject: *subject })?;
        if controller != *caller {
            tracing::warn!(%subject, %caller, "caller is not the subject controller");
            return Err(AuthorizationError::NotSubjectController {
                subject: *subject,
                caller: *caller,
            });
        }
        Ok(())
    }

    /// Record a wallet link for `subject` on `network`.
    ///
    /// The full pipeline applies, including nonce consumption: a wallet
    /// link overwrites state unconditionally, so without the nonce ledger a
    /// replayed old statement could resurrect a since-replaced address.
    ///
    /// # Errors
    ///
    /// Any gate of the pipeline; see [`EngineError`].
    #[allow(clippy::too_many_arguments)]
    pub fn link_chain_wallet(
        &self,
        store: &mut impl Profile,
        caller: &SubjectId,
        subject: &SubjectId,
        network: &str,
        address: &[u8],
        timestamp_ms: i64,
        nonce: Nonce,
        proof: WalletProof<'_>,
        now_ms: i64,
    ) -> Result<(), EngineError> {
        Self::authorize(store, caller, subject)?;
        let family = self.networks.check_address(network, address)?;
        self.freshness
            .check(Capability::WalletLink, now_ms, timestamp_ms)?;

        let message = wallet_link_message(subject, network, address, timestamp_ms, &nonce)?;
        match proof {
            WalletProof::Oracle { signature } => {
                verify_ed25519(&message, self.registry.public_key(), signature)?;
            }
            WalletProof::Wallet { signature } => match family {
                AddressFamily::Ed25519 => verify_ed25519(&message, address, signature)?,
                AddressFamily::Account => {
                    // check_address has fixed the length.
                    let claimed: &[u8; ACCOUNT_ADDRESS_LEN] = address
                        .try_into()
                        .map_err(|_| FormatError::AddressLength {
                            network: network.to_string(),
                            expected: ACCOUNT_ADDRESS_LEN,
                            got: address.len(),
                        })?;
                    verify_secp256k1_recoverable(&message, claimed, signature)?;
                }
            },
        }

        self.nonces.consume(nonce, now_ms)?;
        store.put_wallet_link(
            subject,
            network,
            WalletLink {
                address: address.to_vec(),
                linked_at: now_ms,
            },
        );
        tracing::info!(
            capability = %Capability::WalletLink,
            %subject,
            network,
            family = family.as_str(),
            "wallet link recorded"
        );
        Ok(())
    }

    /// Record a social link for `subject` on `platform`.
    ///
    /// Window-only replay protection: recording is single-slot overwrite,
    /// so a replayed statement inside the window re-asserts the same fact.
    ///
    /// # Errors
    ///
    /// Any gate of the pipeline except replay; see [`EngineError`].
    #[allow(clippy::too_many_arguments)]
    pub fn link_social_account(
        &self,
        store: &mut impl Profile,
        caller: &SubjectId,
        subject: &SubjectId,
        platform: &str,
        username: &str,
        timestamp_ms: i64,
        signature: &[u8],
        now_ms: i64,
    ) -> Result<(), EngineError> {
        Self::authorize(store, caller, subject)?;
        self.freshness
            .check(Capability::SocialLink, now_ms, timestamp_ms)?;

        let message = social_link_message(subject, platform, username, timestamp_ms)?;
        verify_ed25519(&message, self.registry.public_key(), signature)?;

        store.put_social_link(
            subject,
            platform,
            SocialLink {
                username: username.to_string(),
                linked_at: now_ms,
            },
        );
        tracing::info!(
            capability = %Capability::SocialLink,
            %subject,
            platform,
            "social link recorded"
        );
        Ok(())
    }

    /// Merge an attested badge batch into `subject`'s collection, returning
    /// the emitted events.
    ///
    /// The signature covers the encoded batch verbatim and is checked
    /// before the batch is decoded; a decode defect rejects the whole batch
    /// with no state change. Window-only replay protection: the
    /// no-downgrade merge makes re-application a no-op.
    ///
    /// # Errors
    ///
    /// Any gate of the pipeline except replay; see [`EngineError`].
    #[allow(clippy::too_many_arguments)]
    pub fn mint_or_update_badges(
        &self,
        store: &mut impl Profile,
        caller: &SubjectId,
        subject: &SubjectId,
        encoded_batch: &[u8],
        timestamp_ms: i64,
        signature: &[u8],
        now_ms: i64,
    ) -> Result<Vec<BadgeEvent>, EngineError> {
        Self::authorize(store, caller, subject)?;
        self.freshness
            .check(Capability::BadgeSet, now_ms, timestamp_ms)?;

        let message = badge_set_message(subject, encoded_batch, timestamp_ms);
        verify_ed25519(&message, self.registry.public_key(), signature)?;

        let facts = decode_batch(encoded_batch)?;
        let events = store.badge_collection_mut(subject).merge(facts, now_ms);
        tracing::info!(
            capability = %Capability::BadgeSet,
            %subject,
            events = events.len(),
            "badge batch merged"
        );
        Ok(events)
    }

    /// Remove `subject`'s wallet link on `network`, returning the removed
    /// slot value.
    ///
    /// A local fact: authorization only, no attestation.
    ///
    /// # Errors
    ///
    /// [`AuthorizationError`] from the first gate;
    /// [`FormatError::LinkNotFound`] if the slot is empty.
    pub fn unlink_wallet(
        &self,
        store: &mut impl Profile,
        caller: &SubjectId,
        subject: &SubjectId,
        network: &str,
    ) -> Result<WalletLink, EngineError> {
        Self::authorize(store, caller, subject)?;
        let removed = store
            .remove_wallet_link(subject, network)
            .ok_or_else(|| FormatError::LinkNotFound {
                key: network.to_string(),
            })?;
        tracing::info!(%subject, network, "wallet link removed");
        Ok(removed)
    }

    /// Remove `subject`'s social link on `platform`, returning the removed
    /// slot value.
    ///
    /// # Errors
    ///
    /// [`AuthorizationError`] from the first gate;
    /// [`FormatError::LinkNotFound`] if the slot is empty.
    pub fn unlink_social_account(
        &self,
        store: &mut impl Profile,
        caller: &SubjectId,
        subject: &SubjectId,
        platform: &str,
    ) -> Result<SocialLink, EngineError> {
        Self::authorize(store, caller, subject)?;
        let removed = store
            .remove_social_link(subject, platform)
            .ok_or_else(|| FormatError::LinkNotFound {
                key: platform.to_string(),
            })?;
        tracing::info!(%subject, platform, "social link removed");
        Ok(removed)
    }

    /// Rotate the oracle public key. Admin-gated; see
    /// [`OracleRegistry::rotate_public_key`].
    ///
    /// # Errors
    ///
    /// [`AuthorizationError::NotRegistryAdmin`] or
    /// [`FormatError::OracleKeyLength`].
    pub fn rotate_oracle_key(
        &mut self,
        caller: &SubjectId,
        new_key: &[u8],
    ) -> Result<(), EngineError> {
        self.registry.rotate_public_key(caller, new_key)
    }

    /// Transfer registry admin rights. Admin-gated.
    ///
    /// # Errors
    ///
    /// [`AuthorizationError::NotRegistryAdmin`].
    pub fn transfer_oracle_admin(
        &mut self,
        caller: &SubjectId,
        new_admin: SubjectId,
    ) -> Result<(), EngineError> {
        self.registry.transfer_admin(caller, new_admin)
    }

    /// Drop consumed nonces old enough that the freshness guard alone
    /// rejects their statements. Returns the number of entries removed.
    pub fn prune_nonces(&self, now_ms: i64) -> usize {
        let window = self.freshness.window(Capability::WalletLink);
        let max_age = window.validity_window_ms + window.max_clock_skew_ms;
        let removed = self.nonces.prune(now_ms, max_age);
        if removed > 0 {
            tracing::debug!(removed, "pruned consumed nonces");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::Signer as _;

    use super::*;
    use crate::badge::{encode_batch, BadgeFact};
    use crate::error::{CryptographicError, FreshnessError, ReplayError};
    use crate::link::MemoryProfile;
    use crate::verify::{account_address, keccak256};

    const NOW: i64 = 1_000_000;

    fn oracle_key() -> ed25519_dalek::SigningKey {
        ed25519_dalek::SigningKey::from_bytes(&[0x42; 32])
    }

    fn subject() -> SubjectId {
        SubjectId::new([0x11; 32])
    }

    fn controller() -> SubjectId {
        SubjectId::new([0x22; 32])
    }

    fn engine() -> AttestationEngine {
        let registry = OracleRegistry::new(
            *oracle_key().verifying_key().as_bytes(),
            SubjectId::new([0xAD; 32]),
        );
        AttestationEngine::with_defaults(registry)
    }

    fn store() -> MemoryProfile {
        let mut store = MemoryProfile::new();
        store.create_subject(subject(), controller());
        store
    }

    fn fact(category: &str, tier_rank: u16) -> BadgeFact {
        BadgeFact {
            category: category.to_string(),
            tier_label: format!("tier{tier_rank}"),
            tier_rank,
            display_name: category.to_string(),
            description: String::new(),
            image_url: None,
        }
    }

    // =========================================================================
    // Social links
    // =========================================================================

    fn signed_social(
        platform: &str,
        username: &str,
        timestamp_ms: i64,
    ) -> Vec<u8> {
        let message =
            social_link_message(&subject(), platform, username, timestamp_ms).unwrap();
        oracle_key().sign(&message).to_bytes().to_vec()
    }

    #[test]
    fn social_link_happy_path() {
        let engine = engine();
        let mut store = store();
        let signature = signed_social("twitter", "alice", NOW - 100);
        engine
            .link_social_account(
                &mut store,
                &controller(),
                &subject(),
                "twitter",
                "alice",
                NOW - 100,
                &signature,
                NOW,
            )
            .unwrap();
        assert_eq!(
            store.social_link(&subject(), "twitter").unwrap().username,
            "alice"
        );
    }

    #[test]
    fn social_link_rejects_non_controller() {
        let engine = engine();
        let mut store = store();
        let signature = signed_social("twitter", "alice", NOW);
        let err = engine
            .link_social_account(
                &mut store,
                &subject(), // the subject itself, not its controller
                &subject(),
                "twitter",
                "alice",
                NOW,
                &signature,
                NOW,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Authorization(AuthorizationError::NotSubjectController { .. })
        ));
        assert!(store.social_link(&subject(), "twitter").is_none());
    }

    #[test]
    fn social_link_rejects_unknown_subject() {
        let engine = engine();
        let mut store = MemoryProfile::new();
        let err = engine
            .link_social_account(
                &mut store,
                &controller(),
                &subject(),
                "twitter",
                "alice",
                NOW,
                &[0u8; 64],
                NOW,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Authorization(AuthorizationError::UnknownSubject { .. })
        ));
    }

    #[test]
    fn social_link_rejects_tampered_username() {
        let engine = engine();
        let mut store = store();
        let signature = signed_social("twitter", "alice", NOW);
        let err = engine
            .link_social_account(
                &mut store,
                &controller(),
                &subject(),
                "twitter",
                "mallory",
                NOW,
                &signature,
                NOW,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Cryptographic(_)));
    }

    #[test]
    fn social_link_rejects_expired_before_verifying() {
        let engine = engine();
        let mut store = store();
        let t = NOW - 600_001;
        let signature = signed_social("twitter", "alice", t);
        let err = engine
            .link_social_account(
                &mut store,
                &controller(),
                &subject(),
                "twitter",
                "alice",
                t,
                &signature,
                NOW,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Freshness(FreshnessError::Expired { .. })
        ));
    }

    #[test]
    fn social_link_overwrites_slot() {
        let engine = engine();
        let mut store = store();
        for username in ["alice", "alice_renamed"] {
            let signature = signed_social("twitter", username, NOW);
            engine
                .link_social_account(
                    &mut store,
                    &controller(),
                    &subject(),
                    "twitter",
                    username,
                    NOW,
                    &signature,
                    NOW,
                )
                .unwrap();
        }
        assert_eq!(
            store.social_link(&subject(), "twitter").unwrap().username,
            "alice_renamed"
        );
    }

    // =========================================================================
    // Wallet links
    // =========================================================================

    #[test]
    fn wallet_link_oracle_proof_happy_path() {
        let engine = engine();
        let mut store = store();
        let address = [0xAA; 20];
        let nonce = Nonce::new([0x01; 32]);
        let message =
            wallet_link_message(&subject(), "ETH", &address, NOW, &nonce).unwrap();
        let signature = oracle_key().sign(&message).to_bytes();

        engine
            .link_chain_wallet(
                &mut store,
                &controller(),
                &subject(),
                "ETH",
                &address,
                NOW,
                nonce,
                WalletProof::Oracle {
                    signature: &signature,
                },
                NOW,
            )
            .unwrap();
        assert_eq!(
            store.wallet_link(&subject(), "ETH").unwrap().address,
            address.to_vec()
        );
    }

    #[test]
    fn wallet_link_nonce_replay_rejected() {
        let engine = engine();
        let mut store = store();
        let address = [0xAA; 20];
        let nonce = Nonce::new([0x01; 32]);
        let message =
            wallet_link_message(&subject(), "ETH", &address, NOW, &nonce).unwrap();
        let signature = oracle_key().sign(&message).to_bytes();

        let mut submit = || {
            engine.link_chain_wallet(
                &mut store,
                &controller(),
                &subject(),
                "ETH",
                &address,
                NOW,
                nonce,
                WalletProof::Oracle {
                    signature: &signature,
                },
                NOW,
            )
        };
        submit().unwrap();
        let err = submit().unwrap_err();
        assert!(matches!(
            err,
            EngineError::Replay(ReplayError::NonceAlreadyConsumed { .. })
        ));
    }

    #[test]
    fn wallet_link_ed25519_self_signature() {
        let engine = engine();
        let mut store = store();
        // On Ed25519 networks the address is the wallet's verifying key.
        let wallet = ed25519_dalek::SigningKey::from_bytes(&[0x77; 32]);
        let address = *wallet.verifying_key().as_bytes();
        let nonce = Nonce::new([0x02; 32]);
        let message =
            wallet_link_message(&subject(), "SOL", &address, NOW, &nonce).unwrap();
        let signature = wallet.sign(&message).to_bytes();

        engine
            .link_chain_wallet(
                &mut store,
                &controller(),
                &subject(),
                "SOL",
                &address,
                NOW,
                nonce,
                WalletProof::Wallet {
                    signature: &signature,
                },
                NOW,
            )
            .unwrap();
        assert!(store.wallet_link(&subject(), "SOL").is_some());
    }

    #[test]
    fn wallet_link_secp256k1_self_signature() {
        let engine = engine();
        let mut store = store();
        let wallet = k256::ecdsa::SigningKey::from_slice(&[0x66; 32]).unwrap();
        let address = account_address(wallet.verifying_key());
        let nonce = Nonce::new([0x03; 32]);
        let message =
            wallet_link_message(&subject(), "ETH", &address, NOW, &nonce).unwrap();
        let prehash = keccak256(&message);
        let (signature, recovery) = wallet.sign_prehash_recoverable(&prehash).unwrap();
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery.to_byte());

        engine
            .link_chain_wallet(
                &mut store,
                &controller(),
                &subject(),
                "ETH",
                &address,
                NOW,
                nonce,
                WalletProof::Wallet { signature: &bytes },
                NOW,
            )
            .unwrap();
        assert!(store.wallet_link(&subject(), "ETH").is_some());
    }

    #[test]
    fn wallet_link_rejects_foreign_wallet_signature() {
        let engine = engine();
        let mut store = store();
        let wallet = k256::ecdsa::SigningKey::from_slice(&[0x66; 32]).unwrap();
        // Claim an address the signing wallet does not control.
        let address = [0xEE; 20];
        let nonce = Nonce::new([0x04; 32]);
        let message =
            wallet_link_message(&subject(), "ETH", &address, NOW, &nonce).unwrap();
        let prehash = keccak256(&message);
        let (signature, recovery) = wallet.sign_prehash_recoverable(&prehash).unwrap();
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery.to_byte());

        let err = engine
            .link_chain_wallet(
                &mut store,
                &controller(),
                &subject(),
                "ETH",
                &address,
                NOW,
                nonce,
                WalletProof::Wallet { signature: &bytes },
                NOW,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Cryptographic(CryptographicError::AddressMismatch { .. })
        ));
        assert!(store.wallet_link(&subject(), "ETH").is_none());
    }

    #[test]
    fn wallet_link_rejects_unknown_network() {
        let engine = engine();
        let mut store = store();
        let err = engine
            .link_chain_wallet(
                &mut store,
                &controller(),
                &subject(),
                "DOGE",
                &[0u8; 20],
                NOW,
                Nonce::new([0x05; 32]),
                WalletProof::Oracle { signature: &[] },
                NOW,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Format(FormatError::UnknownNetwork { .. })
        ));
    }

    #[test]
    fn wallet_link_rejects_wrong_address_length() {
        let engine = engine();
        let mut store = store();
        let err = engine
            .link_chain_wallet(
                &mut store,
                &controller(),
                &subject(),
                "ETH",
                &[0u8; 32],
                NOW,
                Nonce::new([0x06; 32]),
                WalletProof::Oracle { signature: &[] },
                NOW,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Format(FormatError::AddressLength {
                expected: 20,
                got: 32,
                ..
            })
        ));
    }

    #[test]
    fn failed_verification_does_not_consume_nonce() {
        let engine = engine();
        let mut store = store();
        let address = [0xAA; 20];
        let nonce = Nonce::new([0x07; 32]);

        let err = engine
            .link_chain_wallet(
                &mut store,
                &controller(),
                &subject(),
                "ETH",
                &address,
                NOW,
                nonce,
                WalletProof::Oracle {
                    signature: &[0u8; 64],
                },
                NOW,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Cryptographic(_)));

        // The same nonce still works with a valid signature.
        let message =
            wallet_link_message(&subject(), "ETH", &address, NOW, &nonce).unwrap();
        let signature = oracle_key().sign(&message).to_bytes();
        engine
            .link_chain_wallet(
                &mut store,
                &controller(),
                &subject(),
                "ETH",
                &address,
                NOW,
                nonce,
                WalletProof::Oracle {
                    signature: &signature,
                },
                NOW,
            )
            .unwrap();
    }

    // =========================================================================
    // Badge batches
    // =========================================================================

    fn signed_badges(facts: &[BadgeFact], timestamp_ms: i64) -> (Vec<u8>, Vec<u8>) {
        let encoded = encode_batch(facts).unwrap();
        let message = badge_set_message(&subject(), &encoded, timestamp_ms);
        let signature = oracle_key().sign(&message).to_bytes().to_vec();
        (encoded, signature)
    }

    #[test]
    fn badge_batch_mints_and_reports_events() {
        let engine = engine();
        let mut store = store();
        let (encoded, signature) =
            signed_badges(&[fact("streak", 1), fact("volume", 2)], NOW);

        let events = engine
            .mint_or_update_badges(
                &mut store,
                &controller(),
                &subject(),
                &encoded,
                NOW,
                &signature,
                NOW,
            )
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(store.badge_collection(&subject()).unwrap().len(), 2);
    }

    #[test]
    fn badge_batch_replay_within_window_is_noop() {
        let engine = engine();
        let mut store = store();
        let (encoded, signature) = signed_badges(&[fact("streak", 1)], NOW);

        let first = engine
            .mint_or_update_badges(
                &mut store,
                &controller(),
                &subject(),
                &encoded,
                NOW,
                &signature,
                NOW,
            )
            .unwrap();
        let second = engine
            .mint_or_update_badges(
                &mut store,
                &controller(),
                &subject(),
                &encoded,
                NOW,
                &signature,
                NOW + 1,
            )
            .unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn badge_batch_rejects_tampered_bytes() {
        let engine = engine();
        let mut store = store();
        let (mut encoded, signature) = signed_badges(&[fact("streak", 1)], NOW);
        encoded[2] ^= 0x01;

        let err = engine
            .mint_or_update_badges(
                &mut store,
                &controller(),
                &subject(),
                &encoded,
                NOW,
                &signature,
                NOW,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Cryptographic(_)));
        assert!(store.badge_collection(&subject()).is_none());
    }

    #[test]
    fn badge_batch_rejects_undecodable_signed_bytes() {
        let engine = engine();
        let mut store = store();
        // Validly signed, but not a well-formed batch.
        let encoded = vec![0xFF, 0xFF];
        let message = badge_set_message(&subject(), &encoded, NOW);
        let signature = oracle_key().sign(&message).to_bytes();

        let err = engine
            .mint_or_update_badges(
                &mut store,
                &controller(),
                &subject(),
                &encoded,
                NOW,
                &signature,
                NOW,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Format(FormatError::Batch(_))));
        assert!(store.badge_collection(&subject()).is_none());
    }

    #[test]
    fn badge_batch_uses_wider_window() {
        let engine = engine();
        let mut store = store();
        // Past the link window but inside the badge window.
        let t = NOW - 1_000_000;
        let (encoded, signature) = signed_badges(&[fact("streak", 1)], t);
        engine
            .mint_or_update_badges(
                &mut store,
                &controller(),
                &subject(),
                &encoded,
                t,
                &signature,
                NOW,
            )
            .unwrap();
    }

    // =========================================================================
    // Unlink
    // =========================================================================

    #[test]
    fn unlink_social_returns_removed_slot() {
        let engine = engine();
        let mut store = store();
        let signature = signed_social("twitter", "alice", NOW);
        engine
            .link_social_account(
                &mut store,
                &controller(),
                &subject(),
                "twitter",
                "alice",
                NOW,
                &signature,
                NOW,
            )
            .unwrap();

        let removed = engine
            .unlink_social_account(&mut store, &controller(), &subject(), "twitter")
            .unwrap();
        assert_eq!(removed.username, "alice");

        let err = engine
            .unlink_social_account(&mut store, &controller(), &subject(), "twitter")
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Format(FormatError::LinkNotFound { .. })
        ));
    }

    #[test]
    fn unlink_wallet_requires_controller() {
        let engine = engine();
        let mut store = store();
        let err = engine
            .unlink_wallet(&mut store, &subject(), &subject(), "ETH")
            .unwrap_err();
        assert!(matches!(err, EngineError::Authorization(_)));
    }

    // =========================================================================
    // Registry administration
    // =========================================================================

    #[test]
    fn rotation_invalidates_old_key_signatures() {
        let mut engine = engine();
        let mut store = store();
        let admin = SubjectId::new([0xAD; 32]);
        let new_oracle = ed25519_dalek::SigningKey::from_bytes(&[0x99; 32]);
        engine
            .rotate_oracle_key(&admin, new_oracle.verifying_key().as_bytes())
            .unwrap();

        let old_signature = signed_social("twitter", "alice", NOW);
        let err = engine
            .link_social_account(
                &mut store,
                &controller(),
                &subject(),
                "twitter",
                "alice",
                NOW,
                &old_signature,
                NOW,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Cryptographic(_)));

        let message = social_link_message(&subject(), "twitter", "alice", NOW).unwrap();
        let new_signature = new_oracle.sign(&message).to_bytes();
        engine
            .link_social_account(
                &mut store,
                &controller(),
                &subject(),
                "twitter",
                "alice",
                NOW,
                &new_signature,
                NOW,
            )
            .unwrap();
    }

    // =========================================================================
    // Nonce pruning
    // =========================================================================

    #[test]
    fn prune_drops_nonces_outside_any_window() {
        let engine = engine();
        let mut store = store();
        let address = [0xAA; 20];
        let nonce = Nonce::new([0x08; 32]);
        let message =
            wallet_link_message(&subject(), "ETH", &address, NOW, &nonce).unwrap();
        let signature = oracle_key().sign(&message).to_bytes();
        engine
            .link_chain_wallet(
                &mut store,
                &controller(),
                &subject(),
                "ETH",
                &address,
                NOW,
                nonce,
                WalletProof::Oracle {
                    signature: &signature,
                },
                NOW,
            )
            .unwrap();

        // Inside window + skew: retained.
        assert_eq!(engine.prune_nonces(NOW + 605_000), 0);
        // Past it: dropped.
        assert_eq!(engine.prune_nonces(NOW + 605_001), 1);
    }
}
