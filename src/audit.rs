//! Decision auditing.
//!
//! Every admission, denial and account or share change is emitted as a
//! structured `tracing` event under the `trip_access::audit` target. An
//! [`AuditTrail`] can be attached to keep the events in memory as well.
//!
//! Events never contain tokens, credential hashes or row contents.

mod auditor;
mod event;
mod trail;

pub use auditor::{Auditor, AUDIT_TARGET};
pub use event::{AuditEvent, AuditEventKind, AuditOutcome};
pub use trail::AuditTrail;
