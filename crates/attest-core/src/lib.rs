//! Attestation verification and state-merge engine for the identity ledger.
//!
//! A trusted off-ledger verifier (the oracle) asserts facts about a subject:
//! ownership of a social-media handle, control of an external-chain wallet,
//! or eligibility for an achievement tier. This crate is the on-ledger side:
//! it accepts such a fact only when it is cryptographically authentic, fresh,
//! and non-regressive, then merges it into the subject's record.
//!
//! # Pipeline
//!
//! ```text
//! caller --(fields, signature, timestamp[, nonce])-->
//!     authorization (subject controller)
//!   → freshness guard (backward window + forward skew)
//!   → canonical message encoder (re-derive the signed bytes)
//!   → signature verifier (Ed25519 / secp256k1-recovery)
//!   → replay guard (nonce ledger, nonce-guarded capabilities only)
//!   → applier (link maps) / tiered merge engine (badges)
//! ```
//!
//! # Security Model
//!
//! - **Fail-closed**: every check aborts the whole operation; there is no
//!   partial application and no automatic retry at this layer.
//! - **Single root of trust**: verification always uses the *current*
//!   oracle key. Rotation is atomic with no overlap window.
//! - **Format vs. cryptographic failure**: a length or shape mismatch is a
//!   [`FormatError`]; a well-formed signature that fails verification is a
//!   [`CryptographicError`]. The two are never conflated — the former is a
//!   client defect, the latter may be an attack.
//! - **No-downgrade merge**: a badge's tier rank never decreases for a given
//!   (subject, category), even against a validly signed stale batch.
//!
//! # Concurrency
//!
//! Every verify-and-apply operation is synchronous and atomic from the
//! caller's perspective. Per-subject state never contends across subjects;
//! the sharded nonce ledger is the one piece of intentionally shared state.
//! "Current time" is supplied by the host on every call — the engine never
//! reads a wall clock.

pub mod badge;
pub mod engine;
pub mod error;
pub mod freshness;
pub mod link;
pub mod message;
pub mod registry;
pub mod replay;
pub mod types;
pub mod verify;

pub use badge::{Badge, BadgeCollection, BadgeEvent, BadgeFact};
pub use engine::{AttestationEngine, WalletProof};
pub use error::{
    AuthorizationError, CryptographicError, EngineError, FormatError, FreshnessError, ReplayError,
};
pub use freshness::{CapabilityWindow, FreshnessPolicy};
pub use link::{AddressFamily, MemoryProfile, NetworkTable, Profile, SocialLink, WalletLink};
pub use message::Capability;
pub use registry::OracleRegistry;
pub use replay::{NonceLedger, ShardedNonceLedger};
pub use types::{Nonce, SubjectId};
