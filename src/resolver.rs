//! Turns a bearer credential into an active [`Principal`].

use std::sync::Arc;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, Auditor};
use crate::error::{AccessError, AccessResult};
use crate::model::Principal;
use crate::store::PrincipalStore;
use crate::token::CredentialVerifier;

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. A missing header, another scheme
/// or an empty token is [`AccessError::Unauthenticated`].
///
/// ```
/// use trip_access::bearer_token;
///
/// assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
/// assert!(bearer_token(Some("Basic Zm9v")).is_err());
/// assert!(bearer_token(None).is_err());
/// ```
pub fn bearer_token(header: Option<&str>) -> AccessResult<&str> {
    let header = header.ok_or(AccessError::Unauthenticated)?.trim();
    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AccessError::Unauthenticated)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AccessError::Unauthenticated);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AccessError::Unauthenticated);
    }
    Ok(token)
}

/// Resolves credentials to principals.
///
/// Every request re-reads the principal record, so a deactivation takes
/// effect on the next request rather than when the token expires.
pub struct PrincipalResolver {
    verifier: Arc<dyn CredentialVerifier>,
    principals: Arc<dyn PrincipalStore>,
    auditor: Auditor,
}

impl PrincipalResolver {
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        principals: Arc<dyn PrincipalStore>,
        auditor: Auditor,
    ) -> Self {
        Self {
            verifier,
            principals,
            auditor,
        }
    }

    /// Verifies `token` and loads its subject.
    ///
    /// # Errors
    ///
    /// - [`AccessError::Unauthenticated`] for a malformed or badly signed token
    /// - [`AccessError::Expired`] for a well-formed token past its expiry
    /// - [`AccessError::PrincipalNotFound`] when the subject no longer exists
    /// - [`AccessError::AccountDisabled`] when the subject is deactivated
    /// - [`AccessError::UpstreamFailure`] when the principal lookup fails
    pub async fn resolve(&self, token: &str) -> AccessResult<Principal> {
        let result = self.resolve_inner(token).await;

        match &result {
            Ok(principal) => {
                tracing::debug!(principal = %principal.id, "credential resolved");
                self.auditor.emit(
                    AuditEvent::new(
                        Some(principal.id.to_string()),
                        AuditEventKind::Authentication,
                        AuditOutcome::Admitted,
                    )
                    .with_action("credential:resolve"),
                );
            }
            Err(err) => {
                tracing::warn!(reason = err.code(), "credential refused");
                let outcome = if err.is_denial() {
                    AuditOutcome::Denied
                } else {
                    AuditOutcome::Error
                };
                self.auditor.emit(
                    AuditEvent::new(None::<String>, AuditEventKind::Authentication, outcome)
                        .with_action("credential:resolve")
                        .with_reason(err.code()),
                );
            }
        }

        result
    }

    /// [`bearer_token`] followed by [`resolve`](Self::resolve).
    pub async fn resolve_header(&self, header: Option<&str>) -> AccessResult<Principal> {
        let token = match bearer_token(header) {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(reason = err.code(), "missing bearer credential");
                return Err(err);
            }
        };
        self.resolve(token).await
    }

    async fn resolve_inner(&self, token: &str) -> AccessResult<Principal> {
        let credential = self.verifier.verify(token)?;

        let principal = self
            .principals
            .principal_by_id(credential.subject)
            .await?
            .ok_or(AccessError::PrincipalNotFound)?;

        if !principal.is_active {
            return Err(AccessError::AccountDisabled);
        }
        Ok(principal)
    }
}
