//! Signature verification: Ed25519 and secp256k1-with-recovery.
//!
//! Two families, selected per capability:
//!
//! - **Ed25519** — oracle attestations and Solana-style wallet proofs.
//!   Public key exactly 32 bytes, signature exactly 64 bytes.
//! - **secp256k1 + Keccak-256 pre-hash** — externally supplied
//!   wallet-ownership proofs from account-based chains, never oracle
//!   attestations. Signature exactly 65 bytes (`r ‖ s ‖ recovery`); the
//!   message is Keccak-256-hashed, the signer's key recovered, reduced to a
//!   20-byte account address, and compared against the claimed address in
//!   constant time.
//!
//! # Error Discipline
//!
//! Length mismatches are [`FormatError`]s; everything that fails *after*
//! the shape checks is a [`CryptographicError`]. The distinction drives
//! client retry logic and audit signal, so the two categories never share a
//! variant.

use ed25519_dalek::Verifier as _;
use subtle::ConstantTimeEq as _;
use tiny_keccak::{Hasher as _, Keccak};

use crate::error::{CryptographicError, FormatError, VerifyError};

/// Ed25519 public key length.
pub const ED25519_KEY_LEN: usize = 32;

/// Ed25519 signature length.
pub const ED25519_SIGNATURE_LEN: usize = 64;

/// secp256k1 recoverable signature length (`r ‖ s ‖ recovery`).
pub const SECP256K1_SIGNATURE_LEN: usize = 65;

/// Account address length on secp256k1 chains.
pub const ACCOUNT_ADDRESS_LEN: usize = 20;

/// Verify an Ed25519 signature over `message`.
///
/// # Errors
///
/// [`FormatError::SignatureLength`] / [`FormatError::OracleKeyLength`] on
/// shape mismatch; [`CryptographicError`] when well-formed bytes fail
/// verification.
pub fn verify_ed25519(message: &[u8], public_key: &[u8], signature: &[u8]) -> Result<(), VerifyError> {
    let key_bytes: &[u8; ED25519_KEY_LEN] =
        public_key
            .try_into()
            .map_err(|_| FormatError::OracleKeyLength {
                got: public_key.len(),
            })?;
    if signature.len() != ED25519_SIGNATURE_LEN {
        return Err(FormatError::SignatureLength {
            algorithm: "ed25519",
            expected: ED25519_SIGNATURE_LEN,
            got: signature.len(),
        }
        .into());
    }

    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(key_bytes)
        .map_err(|_| CryptographicError::InvalidPublicKey)?;
    let signature = ed25519_dalek::Signature::from_slice(signature).map_err(|_| {
        CryptographicError::MalformedSignature {
            algorithm: "ed25519",
        }
    })?;

    verifying_key
        .verify(message, &signature)
        .map_err(|_| {
            tracing::warn!(algorithm = "ed25519", "signature verification failed");
            CryptographicError::VerificationFailed {
                algorithm: "ed25519",
            }
            .into()
        })
}

/// Keccak-256 of `data`.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Reduce an uncompressed secp256k1 public key to its 20-byte account
/// address: the low 20 bytes of `keccak256(x ‖ y)`.
#[must_use]
pub fn account_address(verifying_key: &k256::ecdsa::VerifyingKey) -> [u8; ACCOUNT_ADDRESS_LEN] {
    let point = verifying_key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point marker.
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; ACCOUNT_ADDRESS_LEN];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Verify a 65-byte recoverable secp256k1 signature over `message` for the
/// claimed 20-byte account address.
///
/// The message is Keccak-256 pre-hashed; the signer's key is recovered from
/// the prehash and its derived address compared against `claimed_address`.
///
/// # Errors
///
/// [`FormatError::SignatureLength`] if the signature is not 65 bytes, and
/// [`FormatError::InvalidRecoveryId`] if the recovery byte is outside
/// {0, 1, 27, 28}. Scalar parse failures, recovery failures, verification
/// failures, and address mismatches are [`CryptographicError`]s.
pub fn verify_secp256k1_recoverable(
    message: &[u8],
    claimed_address: &[u8; ACCOUNT_ADDRESS_LEN],
    signature: &[u8],
) -> Result<(), VerifyError> {
    if signature.len() != SECP256K1_SIGNATURE_LEN {
        return Err(FormatError::SignatureLength {
            algorithm: "secp256k1",
            expected: SECP256K1_SIGNATURE_LEN,
            got: signature.len(),
        }
        .into());
    }

    // Accept both raw (0/1) and offset (27/28) recovery bytes; anything
    // else is out of domain.
    let recovery_byte = signature[SECP256K1_SIGNATURE_LEN - 1];
    let recovery = match recovery_byte {
        0 | 1 => recovery_byte,
        27 | 28 => recovery_byte - 27,
        other => return Err(FormatError::InvalidRecoveryId { byte: other }.into()),
    };
    let recovery_id = k256::ecdsa::RecoveryId::from_byte(recovery)
        .ok_or(FormatError::InvalidRecoveryId {
            byte: recovery_byte,
        })?;

    let mut parsed = k256::ecdsa::Signature::from_slice(&signature[..64]).map_err(|_| {
        CryptographicError::MalformedSignature {
            algorithm: "secp256k1",
        }
    })?;
    // Recovery requires the low-s normal form.
    if let Some(normalized) = parsed.normalize_s() {
        parsed = normalized;
    }

    let prehash = keccak256(message);
    let recovered =
        k256::ecdsa::VerifyingKey::recover_from_prehash(&prehash, &parsed, recovery_id)
            .map_err(|_| CryptographicError::KeyRecoveryFailed)?;

    let recovered_address = account_address(&recovered);
    if bool::from(recovered_address.ct_eq(claimed_address)) {
        Ok(())
    } else {
        tracing::warn!(
            algorithm = "secp256k1",
            claimed = %hex::encode(claimed_address),
            "recovered address does not match claimed address"
        );
        Err(CryptographicError::AddressMismatch {
            claimed: hex::encode(claimed_address),
            recovered: hex::encode(recovered_address),
        }
        .into())
    }
}
