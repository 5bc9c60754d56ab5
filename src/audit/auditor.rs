//! Emits audit events through `tracing`.

use std::sync::Arc;

use super::{AuditEvent, AuditTrail};

/// `tracing` target audit events are logged under.
pub const AUDIT_TARGET: &str = "trip_access::audit";

/// Audit event emitter shared by the gate, the ledger and the account service.
///
/// Cloning is cheap; clones share the attached trail.
#[derive(Debug, Clone, Default)]
pub struct Auditor {
    trail: Option<Arc<AuditTrail>>,
}

impl Auditor {
    /// An auditor that only logs.
    pub fn new() -> Self {
        Self::default()
    }

    /// An auditor that logs and also records into `trail`.
    pub fn with_trail(trail: Arc<AuditTrail>) -> Self {
        Self { trail: Some(trail) }
    }

    pub fn trail(&self) -> Option<&Arc<AuditTrail>> {
        self.trail.as_ref()
    }

    /// Logs the event and records it to the attached trail, if any.
    pub fn emit(&self, event: AuditEvent) {
        tracing::info!(
            target: AUDIT_TARGET,
            principal = ?event.principal(),
            kind = %event.kind(),
            outcome = %event.outcome(),
            action = ?event.action(),
            resource_id = ?event.resource_id(),
            trip_id = ?event.trip_id(),
            reason = ?event.reason(),
            "audit event"
        );

        if let Some(trail) = &self.trail {
            trail.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEventKind, AuditOutcome};

    #[test]
    fn emit_records_to_attached_trail() {
        let trail = Arc::new(AuditTrail::new());
        let auditor = Auditor::with_trail(trail.clone());

        auditor.emit(
            AuditEvent::new(Some("u1"), AuditEventKind::ShareChange, AuditOutcome::Admitted)
                .with_action("share:create"),
        );

        assert_eq!(trail.len(), 1);
        assert_eq!(trail.events()[0].action(), Some("share:create"));
    }

    #[test]
    fn emit_without_trail_only_logs() {
        let auditor = Auditor::new();
        auditor.emit(AuditEvent::new(
            None::<String>,
            AuditEventKind::Authentication,
            AuditOutcome::Denied,
        ));
        assert!(auditor.trail().is_none());
    }

    #[test]
    fn clones_share_the_trail() {
        let trail = Arc::new(AuditTrail::new());
        let auditor = Auditor::with_trail(trail.clone());
        let clone = auditor.clone();

        clone.emit(AuditEvent::new(
            Some("u2"),
            AuditEventKind::AccountChange,
            AuditOutcome::Admitted,
        ));

        assert_eq!(trail.len(), 1);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn emit_logs_under_the_audit_target() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            Auditor::new().emit(
                AuditEvent::new(Some("u7"), AuditEventKind::Authorization, AuditOutcome::Denied)
                    .with_action("expense:delete")
                    .with_reason("access_denied"),
            );
        });

        let output = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert!(output.contains(AUDIT_TARGET), "{output}");
        assert!(output.contains("outcome=denied"), "{output}");
        assert!(output.contains("expense:delete"), "{output}");
        assert!(output.contains("u7"), "{output}");
    }
}
