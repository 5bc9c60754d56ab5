//! Audit event schema.
//!
//! Events carry identifiers and decisions only: no tokens, no credential
//! hashes, no row contents.

use std::fmt;

/// Category of an audited decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    /// Bearer credential resolution or login
    Authentication,
    /// Gate decision on a resource
    Authorization,
    /// Share grant recorded or revoked
    ShareChange,
    /// Account status or role changed by an admin
    AccountChange,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEventKind::Authentication => write!(f, "authentication"),
            AuditEventKind::Authorization => write!(f, "authorization"),
            AuditEventKind::ShareChange => write!(f, "share_change"),
            AuditEventKind::AccountChange => write!(f, "account_change"),
        }
    }
}

/// Outcome of an audited decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Admitted,
    Denied,
    /// A collaborator failed before a decision could be reached
    Error,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Admitted => write!(f, "admitted"),
            AuditOutcome::Denied => write!(f, "denied"),
            AuditOutcome::Error => write!(f, "error"),
        }
    }
}

/// One audited decision.
///
/// # Example
///
/// ```
/// use trip_access::audit::{AuditEvent, AuditEventKind, AuditOutcome};
///
/// let event = AuditEvent::new(
///     Some("7d1f6a3e-0000-4000-8000-000000000001"),
///     AuditEventKind::Authorization,
///     AuditOutcome::Denied,
/// )
/// .with_action("expense:delete")
/// .with_resource_id("9b2c...")
/// .with_reason("access denied");
///
/// assert_eq!(event.action(), Some("expense:delete"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Acting principal id; `None` before authentication succeeds
    principal: Option<String>,
    kind: AuditEventKind,
    outcome: AuditOutcome,
    /// `<resource kind>:<operation>`, e.g. `trip:update`
    action: Option<String>,
    /// Identifier named in the request
    resource_id: Option<String>,
    /// Trip the decision was derived from, when one was resolved
    trip_id: Option<String>,
    /// Error code or admission path
    reason: Option<String>,
}

impl AuditEvent {
    pub fn new(
        principal: Option<impl Into<String>>,
        kind: AuditEventKind,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            principal: principal.map(Into::into),
            kind,
            outcome,
            action: None,
            resource_id: None,
            trip_id: None,
            reason: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_trip_id(mut self, trip_id: impl Into<String>) -> Self {
        self.trip_id = Some(trip_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn kind(&self) -> AuditEventKind {
        self.kind
    }

    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    pub fn trip_id(&self) -> Option<&str> {
        self.trip_id.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuditEvent[kind={}, outcome={}, principal={}",
            self.kind,
            self.outcome,
            self.principal.as_deref().unwrap_or("<none>")
        )?;

        if let Some(action) = &self.action {
            write!(f, ", action={}", action)?;
        }
        if let Some(resource_id) = &self.resource_id {
            write!(f, ", resource_id={}", resource_id)?;
        }
        if let Some(trip_id) = &self.trip_id {
            write!(f, ", trip_id={}", trip_id)?;
        }
        if let Some(reason) = &self.reason {
            write!(f, ", reason={}", reason)?;
        }

        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_outcome_display() {
        assert_eq!(AuditEventKind::ShareChange.to_string(), "share_change");
        assert_eq!(AuditOutcome::Admitted.to_string(), "admitted");
        assert_eq!(AuditOutcome::Denied.to_string(), "denied");
    }

    #[test]
    fn builder_sets_optional_fields() {
        let event = AuditEvent::new(
            Some("u1"),
            AuditEventKind::Authorization,
            AuditOutcome::Admitted,
        )
        .with_action("packing:update")
        .with_resource_id("r1")
        .with_trip_id("t1")
        .with_reason("owner");

        assert_eq!(event.action(), Some("packing:update"));
        assert_eq!(event.resource_id(), Some("r1"));
        assert_eq!(event.trip_id(), Some("t1"));
        assert_eq!(event.reason(), Some("owner"));
    }

    #[test]
    fn display_marks_anonymous_events() {
        let event = AuditEvent::new(
            None::<String>,
            AuditEventKind::Authentication,
            AuditOutcome::Denied,
        )
        .with_reason("TOKEN_EXPIRED");

        let out = event.to_string();
        assert!(out.contains("principal=<none>"));
        assert!(out.contains("reason=TOKEN_EXPIRED"));
    }
}
