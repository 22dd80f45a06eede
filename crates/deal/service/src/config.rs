//! Service configuration.

use serde::Deserialize;

/// Tunables for the deal service.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Attempts for a ledger append that loses the optimistic sequence
    /// race before the operation is surfaced as failed.
    pub max_append_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_append_retries: 3,
        }
    }
}
