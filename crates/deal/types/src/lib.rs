//! Deal Domain Types for Crestline
//!
//! A deal moves through a regulated lifecycle (intake → underwriting →
//! investment-committee approval → contract → diligence → financing →
//! close) while every fact and decision that led there is captured in a
//! tamper-evident, hash-chained event ledger.
//!
//! # Key Concepts
//!
//! - **DealState**: The single mutable record per deal. Only the lifecycle
//!   engine may advance it, and always in lock-step with a
//!   `StateTransition` ledger event.
//! - **DealEvent**: An immutable, hash-chained ledger entry. Each event
//!   commits to its predecessor's hash, so any later tampering is
//!   detectable by replaying the chain.
//! - **ExtractionClaim**: An AI-proposed value for a field, untrusted
//!   until a human verifies or rejects it exactly once.
//! - **ApprovalRecord**: A captured human approval decision; transition
//!   rules are gated on sets of approved roles.
//! - **DocumentVersion**: A versioned generated document with a
//!   forward-only promotion lifecycle (DRAFT → BINDING → EXECUTED →
//!   EFFECTIVE) and a field-level provenance map.
//! - **EvidencePack**: An immutable, integrity-checked export bundle for
//!   a deal at a point in time.
//!
//! # Design Principles
//!
//! 1. Every mutation is expressed as a ledger append. No component writes
//!    around the ledger.
//! 2. Payloads are closed sum types, never stringly-typed blobs.
//! 3. Actor identity is threaded explicitly through every call; there is
//!    no ambient "current user" state.

#![deny(unsafe_code)]

mod actor;
mod approval;
mod claim;
mod document;
mod event;
mod evidence;
mod hash;
mod ids;
mod intake;
mod provenance;
mod rule;
mod snapshot;
mod state;

pub use actor::*;
pub use approval::*;
pub use claim::*;
pub use document::*;
pub use event::*;
pub use evidence::*;
pub use hash::*;
pub use ids::*;
pub use intake::*;
pub use provenance::*;
pub use rule::*;
pub use snapshot::*;
pub use state::*;
