//! Canonical message encoder: the exact bytes the oracle (or wallet) signs.
//!
//! Verification never parses attacker-controlled structure. The verifier
//! re-derives the message from the submitted fields and checks the signature
//! against those bytes, so the encoding only has to be deterministic and
//! collision-free, not reversible.
//!
//! # Layout
//!
//! ```text
//! subject_id (32) || statement_tag || SEP || payload || SEP ||
//! timestamp_le (8) [|| nonce (32)]
//! ```
//!
//! - The statement tag is a short versioned per-capability constant
//!   (`wallet-link:v2`, `social-link:v1`, `badge-set:v1`), giving domain
//!   separation: a signature for one capability can never be replayed as
//!   another, and a format revision retires the old tag instead of relying
//!   on structural differences.
//! - [`FIELD_SEPARATOR`] is a fixed two-byte sequence bracketing the
//!   payload, preventing concatenation-collision forgeries between the tag,
//!   payload, and timestamp regions.
//! - Text fields inside the payload are `u16`-length-prefixed, so adjacent
//!   fields cannot trade bytes (`("ab","c")` and `("a","bc")` encode
//!   differently).
//! - Numeric fields are fixed-width little-endian, never textual.

use crate::error::FormatError;
use crate::types::{Nonce, SubjectId};

/// Number of capabilities with a statement tag.
pub const NUM_CAPABILITIES: usize = 3;

/// Maximum byte length of a text field in a canonical message (network,
/// platform, username).
pub const MAX_IDENTIFIER_LEN: usize = 256;

/// Separator bracketing the payload region. Unit separator + NUL; the
/// length-prefixed payload encoding never places field contents against a
/// region boundary, so the sequence cannot be forged by field shifting.
pub const FIELD_SEPARATOR: [u8; 2] = [0x1F, 0x00];

/// A capability verified by this engine. Each maps to one versioned
/// statement tag and one freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Capability {
    /// External-chain wallet linking (nonce-guarded).
    WalletLink = 0,
    /// Social-platform handle linking (window-only).
    SocialLink = 1,
    /// Tiered achievement batch (window-only).
    BadgeSet = 2,
}

impl Capability {
    /// All capabilities, in tag order.
    pub const ALL: [Self; NUM_CAPABILITIES] = [Self::WalletLink, Self::SocialLink, Self::BadgeSet];

    /// The versioned statement tag bytes for this capability.
    #[must_use]
    pub const fn statement_tag(self) -> &'static [u8] {
        match self {
            Self::WalletLink => b"wallet-link:v2",
            Self::SocialLink => b"social-link:v1",
            Self::BadgeSet => b"badge-set:v1",
        }
    }

    /// Static label for structured logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WalletLink => "wallet-link",
            Self::SocialLink => "social-link",
            Self::BadgeSet => "badge-set",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a text field against [`MAX_IDENTIFIER_LEN`].
fn check_identifier(field: &'static str, value: &str) -> Result<(), FormatError> {
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(FormatError::FieldTooLong {
            field,
            len: value.len(),
            max: MAX_IDENTIFIER_LEN,
        });
    }
    Ok(())
}

/// Append a `u16`-length-prefixed UTF-8 string. Caller has bounded the
/// length to [`MAX_IDENTIFIER_LEN`], which fits in a `u16`.
fn put_str(buf: &mut Vec<u8>, value: &str) {
    #[allow(clippy::cast_possible_truncation)] // bounded by MAX_IDENTIFIER_LEN
    let len = value.len() as u16;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

/// Shared frame: `subject || tag || SEP || payload || SEP || timestamp [|| nonce]`.
fn frame(
    subject: &SubjectId,
    capability: Capability,
    payload: &[u8],
    timestamp_ms: i64,
    nonce: Option<&Nonce>,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        32 + capability.statement_tag().len() + 2 * FIELD_SEPARATOR.len() + payload.len() + 8 + 32,
    );
    buf.extend_from_slice(subject.as_bytes());
    buf.extend_from_slice(capability.statement_tag());
    buf.extend_from_slice(&FIELD_SEPARATOR);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&FIELD_SEPARATOR);
    buf.extend_from_slice(&timestamp_ms.to_le_bytes());
    if let Some(nonce) = nonce {
        buf.extend_from_slice(nonce.as_bytes());
    }
    buf
}

/// Canonical message for a `wallet-link:v2` statement.
///
/// Payload: `str(network) || address_bytes`. The address length is fixed by
/// the network's family, so it needs no prefix.
///
/// # Errors
///
/// Returns [`FormatError::FieldTooLong`] if `network` exceeds
/// [`MAX_IDENTIFIER_LEN`].
pub fn wallet_link_message(
    subject: &SubjectId,
    network: &str,
    address: &[u8],
    timestamp_ms: i64,
    nonce: &Nonce,
) -> Result<Vec<u8>, FormatError> {
    check_identifier("network", network)?;
    let mut payload = Vec::with_capacity(2 + network.len() + address.len());
    put_str(&mut payload, network);
    payload.extend_from_slice(address);
    Ok(frame(
        subject,
        Capability::WalletLink,
        &payload,
        timestamp_ms,
        Some(nonce),
    ))
}

/// Canonical message for a `social-link:v1` statement.
///
/// Payload: `str(platform) || str(username)`.
///
/// # Errors
///
/// Returns [`FormatError::FieldTooLong`] if `platform` or `username`
/// exceeds [`MAX_IDENTIFIER_LEN`].
pub fn social_link_message(
    subject: &SubjectId,
    platform: &str,
    username: &str,
    timestamp_ms: i64,
) -> Result<Vec<u8>, FormatError> {
    check_identifier("platform", platform)?;
    check_identifier("username", username)?;
    let mut payload = Vec::with_capacity(4 + platform.len() + username.len());
    put_str(&mut payload, platform);
    put_str(&mut payload, username);
    Ok(frame(
        subject,
        Capability::SocialLink,
        &payload,
        timestamp_ms,
        None,
    ))
}

/// Canonical message for a `badge-set:v1` statement.
///
/// Payload: the encoded badge batch verbatim. The batch codec is
/// self-delimiting, so the signed bytes and the decoded facts cannot
/// diverge.
#[must_use]
pub fn badge_set_message(subject: &SubjectId, encoded_batch: &[u8], timestamp_ms: i64) -> Vec<u8> {
    frame(
        subject,
        Capability::BadgeSet,
        encoded_batch,
        timestamp_ms,
        None,
    )
}
