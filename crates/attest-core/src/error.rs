//! Error taxonomy for the verification + merge pipeline.
//!
//! Five categories, each its own enum, aggregated by [`EngineError`]:
//!
//! - [`AuthorizationError`] — caller is not the subject controller or not
//!   the registry admin.
//! - [`FormatError`] — key/signature/payload length or shape mismatch,
//!   malformed batch. Signals a client defect; the input must not be
//!   retried as-is.
//! - [`CryptographicError`] — a well-formed signature fails against the
//!   reconstructed message and current key. May signal an attack.
//! - [`FreshnessError`] — timestamp outside the backward validity window or
//!   beyond the forward clock-skew tolerance.
//! - [`ReplayError`] — nonce already consumed.
//!
//! [`FormatError`] and [`CryptographicError`] are deliberately distinct
//! types so they can never be reported identically. The silent no-downgrade
//! discard in the merge engine is not an error and does not appear here.

use thiserror::Error;

use crate::badge::codec::BatchDecodeError;
use crate::types::{Nonce, SubjectId};

/// Caller lacks the right to record the fact.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthorizationError {
    /// The caller is not the controller of the subject's record.
    #[error("caller {caller} is not the controller of subject {subject}")]
    NotSubjectController {
        /// Subject whose record was targeted.
        subject: SubjectId,
        /// Identity that attempted the write.
        caller: SubjectId,
    },

    /// The subject has no profile record.
    #[error("subject {subject} has no profile record")]
    UnknownSubject {
        /// Subject that was looked up.
        subject: SubjectId,
    },

    /// The caller is not the oracle registry admin.
    #[error("caller {caller} is not the registry admin")]
    NotRegistryAdmin {
        /// Identity that attempted the administrative action.
        caller: SubjectId,
    },
}

/// Input has the wrong length or shape. A client defect, never retryable
/// as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormatError {
    /// An oracle public key must be exactly 32 bytes.
    #[error("oracle public key must be 32 bytes, got {got}")]
    OracleKeyLength {
        /// Length of the rejected key.
        got: usize,
    },

    /// A signature has the wrong length for its algorithm.
    #[error("{algorithm} signature must be {expected} bytes, got {got}")]
    SignatureLength {
        /// Algorithm name.
        algorithm: &'static str,
        /// Required length.
        expected: usize,
        /// Length of the rejected signature.
        got: usize,
    },

    /// A wallet address has the wrong length for its network's family.
    #[error("address for network {network} must be {expected} bytes, got {got}")]
    AddressLength {
        /// Network key whose family fixes the length.
        network: String,
        /// Required length.
        expected: usize,
        /// Length of the rejected address.
        got: usize,
    },

    /// The recovery byte of a secp256k1 signature is out of domain.
    #[error("secp256k1 recovery byte out of domain: {byte:#04x}")]
    InvalidRecoveryId {
        /// The rejected byte. In-domain values are 0, 1, 27, 28.
        byte: u8,
    },

    /// The network key is not configured with an address family.
    #[error("unknown network: {network}")]
    UnknownNetwork {
        /// The unconfigured network key.
        network: String,
    },

    /// A text field exceeds the canonical-encoding bound.
    #[error("field {field} is {len} bytes, max {max}")]
    FieldTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Length submitted.
        len: usize,
        /// Maximum accepted.
        max: usize,
    },

    /// An unlink targeted a key with no matching stored link.
    #[error("no stored link for key {key}")]
    LinkNotFound {
        /// The network or platform key.
        key: String,
    },

    /// The badge batch failed to decode.
    #[error(transparent)]
    Batch(#[from] BatchDecodeError),
}

/// A well-formed signature failed cryptographic verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CryptographicError {
    /// The signature does not verify against the reconstructed message and
    /// the expected key.
    #[error("{algorithm} signature verification failed")]
    VerificationFailed {
        /// Algorithm name.
        algorithm: &'static str,
    },

    /// Signature bytes of the correct length do not encode valid scalars.
    #[error("{algorithm} signature bytes do not encode a valid signature")]
    MalformedSignature {
        /// Algorithm name.
        algorithm: &'static str,
    },

    /// A 32-byte key is not a valid Curve25519 point.
    #[error("public key bytes are not a valid Ed25519 key")]
    InvalidPublicKey,

    /// secp256k1 public-key recovery failed for the given prehash and
    /// signature.
    #[error("secp256k1 key recovery failed")]
    KeyRecoveryFailed,

    /// The recovered account address does not match the claimed address.
    #[error("recovered address {recovered} does not match claimed address {claimed}")]
    AddressMismatch {
        /// Hex-encoded claimed address.
        claimed: String,
        /// Hex-encoded recovered address.
        recovered: String,
    },
}

/// Timestamp outside the acceptance window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FreshnessError {
    /// The attestation is older than the validity window.
    #[error(
        "attestation expired: timestamp {timestamp_ms} is more than {validity_window_ms} ms \
         before current time {now_ms}"
    )]
    Expired {
        /// Attested timestamp (ms).
        timestamp_ms: i64,
        /// Host-supplied current time (ms).
        now_ms: i64,
        /// Configured backward window (ms).
        validity_window_ms: i64,
    },

    /// The attested timestamp is further in the future than the clock-skew
    /// tolerance. Mandatory bound: a forward-dated timestamp would otherwise
    /// extend the replay window arbitrarily.
    #[error(
        "attestation from the future: timestamp {timestamp_ms} exceeds current time {now_ms} \
         by more than {max_clock_skew_ms} ms"
    )]
    FromFuture {
        /// Attested timestamp (ms).
        timestamp_ms: i64,
        /// Host-supplied current time (ms).
        now_ms: i64,
        /// Configured forward tolerance (ms).
        max_clock_skew_ms: i64,
    },
}

/// Nonce already consumed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReplayError {
    /// The nonce was consumed by an earlier operation, possibly under a
    /// different but otherwise-valid signature.
    #[error("nonce already consumed: {nonce}")]
    NonceAlreadyConsumed {
        /// The rejected nonce.
        nonce: Nonce,
    },
}

/// Aggregate error for the engine entry points.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    /// Caller lacks the right to record the fact.
    #[error("authorization: {0}")]
    Authorization(#[from] AuthorizationError),

    /// Input length or shape mismatch.
    #[error("format: {0}")]
    Format(#[from] FormatError),

    /// Signature failed cryptographic verification.
    #[error("cryptographic: {0}")]
    Cryptographic(#[from] CryptographicError),

    /// Timestamp outside the acceptance window.
    #[error("freshness: {0}")]
    Freshness(#[from] FreshnessError),

    /// Nonce already consumed.
    #[error("replay: {0}")]
    Replay(#[from] ReplayError),
}

/// Result alias for registry operations, which fail with either an
/// authorization or a format error.
pub type RegistryResult<T> = Result<T, EngineError>;

/// Outcome of a signature check: either a format defect or a cryptographic
/// failure, kept distinct end to end.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Wrong length or shape.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Well-formed input failed verification.
    #[error(transparent)]
    Cryptographic(#[from] CryptographicError),
}

impl From<VerifyError> for EngineError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Format(e) => Self::Format(e),
            VerifyError::Cryptographic(e) => Self::Cryptographic(e),
        }
    }
}

impl From<BatchDecodeError> for EngineError {
    fn from(err: BatchDecodeError) -> Self {
        Self::Format(FormatError::Batch(err))
    }
}
