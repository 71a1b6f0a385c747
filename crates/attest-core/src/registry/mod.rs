//! Oracle key registry: the single root of trust for attestations.
//!
//! One registry exists per deployment. It holds the oracle's current
//! Ed25519 public key and the admin identity allowed to mutate it.
//!
//! # Rotation Semantics
//!
//! Rotation is atomic and immediate: attestations signed under the old key
//! become unverifiable the instant rotation commits. There is no multi-key
//! overlap window — issuance and verification must be coordinated around
//! rotation events.

use crate::error::{AuthorizationError, FormatError, RegistryResult};
use crate::types::SubjectId;

/// Required length of the oracle public key.
pub const ORACLE_KEY_LEN: usize = 32;

/// Domain separator for the audit fingerprint of the oracle key.
const KEY_FINGERPRINT_DOMAIN: &[u8] = b"attest:oracle-key:v1\0";

/// The oracle's current public key and the admin identity.
///
/// Created at bootstrap, mutated only by the admin, never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRegistry {
    public_key: [u8; ORACLE_KEY_LEN],
    admin: SubjectId,
}

impl OracleRegistry {
    /// Bootstrap the registry with the initial oracle key and admin.
    #[must_use]
    pub const fn new(public_key: [u8; ORACLE_KEY_LEN], admin: SubjectId) -> Self {
        Self { public_key, admin }
    }

    /// The current oracle public key. Verification always uses this key and
    /// only this key.
    #[must_use]
    pub const fn public_key(&self) -> &[u8; ORACLE_KEY_LEN] {
        &self.public_key
    }

    /// The current admin identity.
    #[must_use]
    pub const fn admin(&self) -> &SubjectId {
        &self.admin
    }

    /// Rotate the oracle key. Admin-only; the new key must be exactly
    /// 32 bytes. Takes effect for all subsequent verifications immediately.
    ///
    /// # Errors
    ///
    /// [`AuthorizationError::NotRegistryAdmin`] if `caller` is not the
    /// admin; [`FormatError::OracleKeyLength`] if `new_key` is not 32 bytes.
    pub fn rotate_public_key(&mut self, caller: &SubjectId, new_key: &[u8]) -> RegistryResult<()> {
        self.check_admin(caller)?;
        let key: [u8; ORACLE_KEY_LEN] =
            new_key
                .try_into()
                .map_err(|_| FormatError::OracleKeyLength {
                    got: new_key.len(),
                })?;
        let old_fingerprint = self.key_fingerprint();
        self.public_key = key;
        tracing::debug!(
            old_key = %hex::encode(old_fingerprint),
            new_key = %hex::encode(self.key_fingerprint()),
            "oracle key rotated"
        );
        Ok(())
    }

    /// Transfer the admin role. Admin-only.
    ///
    /// # Errors
    ///
    /// [`AuthorizationError::NotRegistryAdmin`] if `caller` is not the
    /// admin.
    pub fn transfer_admin(&mut self, caller: &SubjectId, new_admin: SubjectId) -> RegistryResult<()> {
        self.check_admin(caller)?;
        self.admin = new_admin;
        Ok(())
    }

    /// Domain-separated BLAKE3 fingerprint of the current key, for audit
    /// logging. Never log raw key material paths through this instead.
    #[must_use]
    pub fn key_fingerprint(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(KEY_FINGERPRINT_DOMAIN);
        hasher.update(&self.public_key);
        *hasher.finalize().as_bytes()
    }

    fn check_admin(&self, caller: &SubjectId) -> Result<(), AuthorizationError> {
        if caller == &self.admin {
            Ok(())
        } else {
            Err(AuthorizationError::NotRegistryAdmin { caller: *caller })
        }
    }
}
