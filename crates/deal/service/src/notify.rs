//! Outbound notifications.
//!
//! Fired after a mutation commits. Delivery is best-effort: a failing
//! notifier is logged and never rolls back or blocks the operation.

use deal_types::DealEvent;

/// Receives committed ledger events for fan-out (email, chat, webhooks).
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &DealEvent) -> anyhow::Result<()>;
}

/// Default notifier: drops everything.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &DealEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Notifier that emits each event to the tracing pipeline, useful as a
/// development sink.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &DealEvent) -> anyhow::Result<()> {
        tracing::info!(
            deal = %event.deal_id,
            sequence = event.sequence_number,
            kind = ?event.payload.kind(),
            "notification"
        );
        Ok(())
    }
}
