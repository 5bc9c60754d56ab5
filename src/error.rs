use thiserror::Error;

/// Result alias used by every access-control operation.
pub type AccessResult<T> = Result<T, AccessError>;

/// Errors returned to the route layer.
///
/// The variants are deliberately coarse. A caller learns *that* a request was
/// refused, never which stored row made it so: a trip that does not exist and
/// a trip owned by someone else both surface as [`AccessError::AccessDenied`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Missing, malformed, or unsigned credential
    #[error("unauthenticated")]
    Unauthenticated,
    /// Credential was well formed but its validity window has passed
    #[error("token expired")]
    Expired,
    /// Credential subject no longer resolves to a principal
    #[error("principal not found")]
    PrincipalNotFound,
    /// Principal exists but has been deactivated
    #[error("account disabled")]
    AccountDisabled,
    /// Authenticated but not permitted, or the target does not resolve
    #[error("access denied")]
    AccessDenied,
    /// Lookup of something with no ownership concept came back empty
    #[error("not found")]
    NotFound,
    /// Caller supplied input the core refuses to act on
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// A collaborator failed; detail is logged, never returned
    #[error("upstream failure")]
    UpstreamFailure,
}

impl AccessError {
    /// True for every variant that means "the caller has no usable identity".
    ///
    /// `Expired` and `PrincipalNotFound` are kept distinct so a client can be
    /// told to re-authenticate, but they belong to the same class.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AccessError::Unauthenticated | AccessError::Expired | AccessError::PrincipalNotFound
        )
    }

    /// True when the request was refused for a reason other than a failure.
    pub fn is_denial(&self) -> bool {
        !matches!(self, AccessError::UpstreamFailure)
    }

    /// HTTP status the route layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AccessError::Unauthenticated
            | AccessError::Expired
            | AccessError::PrincipalNotFound => 401,
            AccessError::AccountDisabled | AccessError::AccessDenied => 403,
            AccessError::NotFound => 404,
            AccessError::ValidationFailed(_) => 400,
            AccessError::UpstreamFailure => 500,
        }
    }

    /// Short machine-readable code, e.g. `TOKEN_EXPIRED`.
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::Unauthenticated => "UNAUTHENTICATED",
            AccessError::Expired => "TOKEN_EXPIRED",
            AccessError::PrincipalNotFound => "PRINCIPAL_NOT_FOUND",
            AccessError::AccountDisabled => "ACCOUNT_DISABLED",
            AccessError::AccessDenied => "ACCESS_DENIED",
            AccessError::NotFound => "NOT_FOUND",
            AccessError::ValidationFailed(_) => "VALIDATION_FAILED",
            AccessError::UpstreamFailure => "UPSTREAM_FAILURE",
        }
    }
}

/// Failure reported by a persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the query
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A write violated a store-level constraint
    #[error("constraint violated: {0}")]
    Constraint(String),
    /// A write targeted a row that does not exist (e.g. a vanished parent)
    #[error("row missing: {0}")]
    Missing(String),
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        tracing::warn!(error = %err, "store collaborator failed");
        AccessError::UpstreamFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_class_covers_expired_and_missing_principal() {
        assert!(AccessError::Unauthenticated.is_unauthenticated());
        assert!(AccessError::Expired.is_unauthenticated());
        assert!(AccessError::PrincipalNotFound.is_unauthenticated());
        assert!(!AccessError::AccountDisabled.is_unauthenticated());
        assert!(!AccessError::AccessDenied.is_unauthenticated());
    }

    #[test]
    fn status_codes_follow_route_conventions() {
        assert_eq!(AccessError::Expired.status_code(), 401);
        assert_eq!(AccessError::AccountDisabled.status_code(), 403);
        assert_eq!(AccessError::AccessDenied.status_code(), 403);
        assert_eq!(AccessError::NotFound.status_code(), 404);
        assert_eq!(
            AccessError::ValidationFailed("x".to_string()).status_code(),
            400
        );
        assert_eq!(AccessError::UpstreamFailure.status_code(), 500);
    }

    #[test]
    fn store_error_detail_is_not_surfaced() {
        let err: AccessError = StoreError::Unavailable("connection refused to 10.0.0.3".into()).into();

        assert_eq!(err, AccessError::UpstreamFailure);
        assert!(!err.to_string().contains("10.0.0.3"));
        assert!(!err.is_denial());
    }

    #[test]
    fn expired_has_its_own_code() {
        assert_eq!(AccessError::Expired.code(), "TOKEN_EXPIRED");
        assert_eq!(AccessError::Expired.to_string(), "token expired");
    }
}
