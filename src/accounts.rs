//! Account lifecycle: registration, password login and admin management.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, Auditor};
use crate::error::{AccessError, AccessResult, StoreError};
use crate::gate::require_role;
use crate::model::{normalize_email, Principal, PrincipalId, Role};
use crate::secret::Secret;
use crate::store::PrincipalStore;
use crate::token::JwtCredentials;

pub const MIN_PASSWORD_LEN: usize = 6;
/// Minimum length when a password is changed.
pub const MIN_NEW_PASSWORD_LEN: usize = 8;

/// A principal together with a freshly signed access token.
#[derive(Debug)]
pub struct Session {
    pub principal: Principal,
    pub token: Secret<String>,
}

pub struct Accounts {
    principals: Arc<dyn PrincipalStore>,
    credentials: Arc<JwtCredentials>,
    hasher: Argon2<'static>,
    auditor: Auditor,
}

impl Accounts {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        credentials: Arc<JwtCredentials>,
        auditor: Auditor,
    ) -> Self {
        Self {
            principals,
            credentials,
            hasher: Argon2::default(),
            auditor,
        }
    }

    /// Replaces the default argon2 parameters.
    pub fn with_hasher(mut self, hasher: Argon2<'static>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Creates an active `user` account and signs a token for it.
    ///
    /// # Errors
    ///
    /// [`AccessError::ValidationFailed`] for a missing field, a password
    /// shorter than [`MIN_PASSWORD_LEN`], or an email that is already
    /// registered.
    pub async fn register(
        &self,
        email: &str,
        full_name: &str,
        password: &str,
    ) -> AccessResult<Session> {
        let email = normalize_email(email);
        let full_name = full_name.trim();

        if email.is_empty() || full_name.is_empty() || password.is_empty() {
            return Err(AccessError::ValidationFailed(
                "email, name and password are required".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccessError::ValidationFailed(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.principals.principal_by_email(&email).await?.is_some() {
            return Err(email_taken());
        }

        let hash = self.hash(password).await?;
        let principal = Principal {
            id: PrincipalId::new(),
            email,
            full_name: full_name.to_string(),
            role: Role::User,
            is_active: true,
        };

        match self.principals.insert_principal(principal.clone(), hash).await {
            Ok(()) => {}
            Err(StoreError::Constraint(_)) => return Err(email_taken()),
            Err(err) => return Err(err.into()),
        }

        tracing::info!(principal = %principal.id, "account registered");
        let token = self.credentials.issue(principal.id)?;
        Ok(Session { principal, token })
    }

    /// Checks a password and signs a token.
    ///
    /// Unknown email and wrong password are indistinguishable. The password
    /// is checked before the account status, so a deactivated account is
    /// only reported to someone who knows its password.
    pub async fn login(&self, email: &str, password: &str) -> AccessResult<Session> {
        let result = self.login_inner(email, password).await;

        let event = match &result {
            Ok(session) => AuditEvent::new(
                Some(session.principal.id.to_string()),
                AuditEventKind::Authentication,
                AuditOutcome::Admitted,
            ),
            Err(err) => {
                tracing::warn!(reason = err.code(), "login refused");
                AuditEvent::new(
                    None::<String>,
                    AuditEventKind::Authentication,
                    refusal_outcome(err),
                )
                .with_reason(err.code())
            }
        };
        self.auditor.emit(event.with_action("account:login"));

        result
    }

    async fn login_inner(&self, email: &str, password: &str) -> AccessResult<Session> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AccessError::ValidationFailed(
                "email and password are required".to_string(),
            ));
        }

        let principal = self
            .principals
            .principal_by_email(&email)
            .await?
            .ok_or(AccessError::Unauthenticated)?;
        let hash = self
            .principals
            .credential_hash(principal.id)
            .await?
            .ok_or(AccessError::Unauthenticated)?;

        if !self.verify(password, hash).await? {
            return Err(AccessError::Unauthenticated);
        }
        if !principal.is_active {
            return Err(AccessError::AccountDisabled);
        }

        tracing::debug!(principal = %principal.id, "login accepted");
        let token = self.credentials.issue(principal.id)?;
        Ok(Session { principal, token })
    }

    /// Activates or deactivates `target`. Admin only.
    ///
    /// A deactivated principal is refused by the resolver on their next
    /// request, whatever tokens they still hold.
    pub async fn set_active(
        &self,
        admin: &Principal,
        target: PrincipalId,
        active: bool,
    ) -> AccessResult<Principal> {
        self.update(admin, target, "account:set_active", |p| p.is_active = active)
            .await
    }

    /// Changes the role of `target`. Admin only.
    pub async fn set_role(
        &self,
        admin: &Principal,
        target: PrincipalId,
        role: Role,
    ) -> AccessResult<Principal> {
        self.update(admin, target, "account:set_role", move |p| p.role = role)
            .await
    }

    /// Replaces the password of `principal` after checking the current one.
    ///
    /// Tokens issued before the change stay valid until they expire.
    ///
    /// # Errors
    ///
    /// [`AccessError::ValidationFailed`] when either password is missing, the
    /// new one is shorter than [`MIN_NEW_PASSWORD_LEN`] or equal to the
    /// current one, or the current one is wrong.
    pub async fn change_password(
        &self,
        principal: &Principal,
        current: &str,
        new: &str,
    ) -> AccessResult<()> {
        let result = self.change_password_inner(principal, current, new).await;

        let event = |outcome| {
            AuditEvent::new(
                Some(principal.id.to_string()),
                AuditEventKind::AccountChange,
                outcome,
            )
            .with_action("account:change_password")
            .with_resource_id(principal.id.to_string())
        };
        match &result {
            Ok(()) => {
                tracing::info!(principal = %principal.id, "password changed");
                self.auditor.emit(event(AuditOutcome::Admitted));
            }
            Err(err) => {
                tracing::warn!(
                    principal = %principal.id,
                    reason = err.code(),
                    "password change refused"
                );
                self.auditor
                    .emit(event(refusal_outcome(err)).with_reason(err.code()));
            }
        }

        result
    }

    async fn change_password_inner(
        &self,
        principal: &Principal,
        current: &str,
        new: &str,
    ) -> AccessResult<()> {
        if !principal.is_active {
            return Err(AccessError::AccountDisabled);
        }
        if current.is_empty() || new.is_empty() {
            return Err(AccessError::ValidationFailed(
                "current and new password are required".to_string(),
            ));
        }
        if new.chars().count() < MIN_NEW_PASSWORD_LEN {
            return Err(AccessError::ValidationFailed(format!(
                "new password must be at least {MIN_NEW_PASSWORD_LEN} characters"
            )));
        }
        if current == new {
            return Err(AccessError::ValidationFailed(
                "new password must differ from the current one".to_string(),
            ));
        }

        let hash = self
            .principals
            .credential_hash(principal.id)
            .await?
            .ok_or(AccessError::PrincipalNotFound)?;
        if !self.verify(current, hash).await? {
            return Err(AccessError::ValidationFailed(
                "current password is incorrect".to_string(),
            ));
        }

        let hash = self.hash(new).await?;
        self.principals.set_credential_hash(principal.id, hash).await?;
        Ok(())
    }

    /// Sets the display name of `principal` and returns the stored record.
    pub async fn update_profile(
        &self,
        principal: &Principal,
        full_name: &str,
    ) -> AccessResult<Principal> {
        if !principal.is_active {
            return Err(AccessError::AccountDisabled);
        }
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(AccessError::ValidationFailed(
                "name cannot be empty".to_string(),
            ));
        }

        let mut stored = self
            .principals
            .principal_by_id(principal.id)
            .await?
            .ok_or(AccessError::PrincipalNotFound)?;
        stored.full_name = full_name.to_string();
        self.principals.update_principal(&stored).await?;

        tracing::debug!(principal = %principal.id, "profile updated");
        Ok(stored)
    }

    /// Every account, ordered by email. Admin only.
    pub async fn list_principals(&self, admin: &Principal) -> AccessResult<Vec<Principal>> {
        let event = |outcome| {
            AuditEvent::new(
                Some(admin.id.to_string()),
                AuditEventKind::AccountChange,
                outcome,
            )
            .with_action("account:list")
        };

        if !admin.is_active {
            return Err(AccessError::AccountDisabled);
        }
        if let Err(err) = require_role(admin, &[Role::Admin]) {
            self.auditor.emit(event(AuditOutcome::Denied).with_reason(err.code()));
            return Err(err);
        }

        let principals = self.principals.principals().await?;
        self.auditor.emit(event(AuditOutcome::Admitted));
        Ok(principals)
    }

    async fn update(
        &self,
        admin: &Principal,
        target: PrincipalId,
        action: &'static str,
        change: impl FnOnce(&mut Principal),
    ) -> AccessResult<Principal> {
        let event = |outcome| {
            AuditEvent::new(
                Some(admin.id.to_string()),
                AuditEventKind::AccountChange,
                outcome,
            )
            .with_action(action)
            .with_resource_id(target.to_string())
        };

        if !admin.is_active {
            return Err(AccessError::AccountDisabled);
        }
        if let Err(err) = require_role(admin, &[Role::Admin]) {
            self.auditor.emit(event(AuditOutcome::Denied).with_reason(err.code()));
            return Err(err);
        }

        let mut principal = self
            .principals
            .principal_by_id(target)
            .await?
            .ok_or(AccessError::NotFound)?;
        change(&mut principal);
        self.principals.update_principal(&principal).await?;

        tracing::info!(
            principal = %admin.id,
            account = %target,
            action,
            "account updated"
        );
        self.auditor.emit(event(AuditOutcome::Admitted));
        Ok(principal)
    }

    async fn hash(&self, password: &str) -> AccessResult<Secret<String>> {
        let hasher = self.hasher.clone();
        let password = Secret::new(password.to_string());

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut rand::thread_rng());
            hasher
                .hash_password(password.expose_secret().as_bytes(), &salt)
                .map(|hash| Secret::new(hash.to_string()))
                .map_err(|err| {
                    tracing::warn!(error = %err, "password hashing failed");
                    AccessError::UpstreamFailure
                })
        })
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "password hashing task failed");
            AccessError::UpstreamFailure
        })?
    }

    async fn verify(&self, password: &str, hash: Secret<String>) -> AccessResult<bool> {
        let hasher = self.hasher.clone();
        let password = Secret::new(password.to_string());

        tokio::task::spawn_blocking(move || match PasswordHash::new(hash.expose_secret()) {
            Ok(parsed) => hasher
                .verify_password(password.expose_secret().as_bytes(), &parsed)
                .is_ok(),
            Err(err) => {
                tracing::warn!(error = %err, "stored credential hash is malformed");
                false
            }
        })
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "password verification task failed");
            AccessError::UpstreamFailure
        })
    }
}

fn refusal_outcome(err: &AccessError) -> AuditOutcome {
    if err.is_denial() {
        AuditOutcome::Denied
    } else {
        AuditOutcome::Error
    }
}

fn email_taken() -> AccessError {
    AccessError::ValidationFailed("email already registered".to_string())
}
