//! Deal service: the single entry point over the deal lifecycle core.
//!
//! Wires the ledger, lifecycle engine, claim queue, provenance store,
//! document manager, and evidence builder together, serializes all
//! mutation per deal, and fans committed events out to a [`Notifier`].

#![deny(unsafe_code)]

mod config;
mod error;
mod notify;
mod service;

pub use config::*;
pub use error::*;
pub use notify::*;
pub use service::*;

pub use deal_documents::ContentRef;
pub use deal_ledger::IntegrityReport;
