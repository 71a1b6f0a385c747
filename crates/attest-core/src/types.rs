//! Core identifier types shared across the engine.

use std::fmt;

/// Length of a subject identifier in bytes.
pub const SUBJECT_ID_LEN: usize = 32;

/// Length of a replay nonce in bytes.
pub const NONCE_LEN: usize = 32;

/// A ledger identity: the 32-byte address of a subject or controller.
///
/// Subjects own their profile record; controllers authorize writes to it.
/// Both are plain ledger identities, so one type covers both roles.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId([u8; SUBJECT_ID_LEN]);

impl SubjectId {
    /// Construct from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; SUBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SUBJECT_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectId({})", hex::encode(self.0))
    }
}

impl From<[u8; SUBJECT_ID_LEN]> for SubjectId {
    fn from(bytes: [u8; SUBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }
}

/// A single-use replay nonce supplied by the caller for nonce-guarded
/// capabilities.
///
/// The nonce participates in the canonical signed message and is consumed
/// exactly once by the [`crate::replay`] ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Construct from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

impl From<[u8; NONCE_LEN]> for Nonce {
    fn from(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }
}
