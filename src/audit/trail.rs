//! In-memory audit trail.

use parking_lot::Mutex;

use super::{AuditEvent, AuditOutcome};

/// Records audit events in arrival order.
///
/// Shared between concurrently running requests, so it locks internally.
/// Production deployments forward the `tracing` output instead; the trail
/// exists for tests and for embedders that want to inspect decisions.
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }

    /// Snapshot of every recorded event.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Snapshot of the events with the given outcome.
    pub fn with_outcome(&self, outcome: AuditOutcome) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.outcome() == outcome)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEventKind;

    fn event(outcome: AuditOutcome) -> AuditEvent {
        AuditEvent::new(Some("u1"), AuditEventKind::Authorization, outcome)
    }

    #[test]
    fn records_in_order_and_filters_by_outcome() {
        let trail = AuditTrail::new();
        assert!(trail.is_empty());

        trail.record(event(AuditOutcome::Admitted));
        trail.record(event(AuditOutcome::Denied));
        trail.record(event(AuditOutcome::Admitted));

        assert_eq!(trail.len(), 3);
        assert_eq!(trail.events()[1].outcome(), AuditOutcome::Denied);
        assert_eq!(trail.with_outcome(AuditOutcome::Admitted).len(), 2);
    }

    #[test]
    fn clear_empties_the_trail() {
        let trail = AuditTrail::default();
        trail.record(event(AuditOutcome::Error));
        trail.clear();
        assert!(trail.is_empty());
    }

    #[test]
    fn trail_is_shareable_across_threads() {
        let trail = std::sync::Arc::new(AuditTrail::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let trail = trail.clone();
                std::thread::spawn(move || trail.record(event(AuditOutcome::Denied)))
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }

        assert_eq!(trail.len(), 4);
    }
}
