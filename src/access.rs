//! One handle over every access-control component.

use std::sync::Arc;

use crate::accounts::Accounts;
use crate::audit::Auditor;
use crate::config::AccessConfig;
use crate::error::AccessResult;
use crate::gate::{AuthorizationGate, Target, TripRef};
use crate::ledger::ShareLedger;
use crate::model::{Principal, TripId};
use crate::ownership::OwnershipVerifier;
use crate::policy::Operation;
use crate::report::{Reporter, TripStats};
use crate::resolver::PrincipalResolver;
use crate::store::{PrincipalStore, ShareStore, TripStore};
use crate::token::JwtCredentials;

/// The access-control core, wired from one configuration and three store
/// handles.
///
/// Components share the store handles; nothing is held in process-wide state.
/// Route handlers typically keep one `AccessControl` behind an `Arc`.
///
/// ```
/// use std::sync::Arc;
/// use trip_access::{AccessConfig, AccessControl, AccessError, MemoryStore};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// let access = AccessControl::new(
///     AccessConfig::new("change-me"),
///     store.clone(),
///     store.clone(),
///     store,
/// );
///
/// assert_eq!(
///     access.authenticate("not-a-token").await,
///     Err(AccessError::Unauthenticated)
/// );
/// # });
/// ```
pub struct AccessControl {
    credentials: Arc<JwtCredentials>,
    resolver: PrincipalResolver,
    ownership: OwnershipVerifier,
    gate: Arc<AuthorizationGate>,
    ledger: ShareLedger,
    reporter: Reporter,
    accounts: Accounts,
    auditor: Auditor,
}

impl AccessControl {
    pub fn new(
        config: AccessConfig,
        principals: Arc<dyn PrincipalStore>,
        trips: Arc<dyn TripStore>,
        shares: Arc<dyn ShareStore>,
    ) -> Self {
        Self::with_auditor(config, principals, trips, shares, Auditor::new())
    }

    pub fn with_auditor(
        config: AccessConfig,
        principals: Arc<dyn PrincipalStore>,
        trips: Arc<dyn TripStore>,
        shares: Arc<dyn ShareStore>,
        auditor: Auditor,
    ) -> Self {
        let credentials = Arc::new(JwtCredentials::from_config(&config));
        let ownership = OwnershipVerifier::new(trips.clone());
        let gate = Arc::new(AuthorizationGate::new(
            trips.clone(),
            shares.clone(),
            config.share_enforcement,
            auditor.clone(),
        ));

        tracing::debug!(
            share_enforcement = ?config.share_enforcement,
            token_ttl_secs = config.token_ttl.as_secs(),
            "access control initialized"
        );

        Self {
            resolver: PrincipalResolver::new(
                credentials.clone(),
                principals.clone(),
                auditor.clone(),
            ),
            ledger: ShareLedger::new(gate.clone(), trips.clone(), shares, auditor.clone()),
            reporter: Reporter::new(gate.clone(), trips),
            accounts: Accounts::new(principals, credentials.clone(), auditor.clone()),
            credentials,
            ownership,
            gate,
            auditor,
        }
    }

    /// Resolves a raw bearer token to an active principal.
    pub async fn authenticate(&self, token: &str) -> AccessResult<Principal> {
        self.resolver.resolve(token).await
    }

    /// Resolves the value of an `Authorization` header.
    pub async fn authenticate_header(&self, header: Option<&str>) -> AccessResult<Principal> {
        self.resolver.resolve_header(header).await
    }

    /// Authorizes `operation` on `target` and returns the trip it belongs to.
    pub async fn authorize_and_load_parent_trip(
        &self,
        principal: &Principal,
        operation: Operation,
        target: Target,
    ) -> AccessResult<TripRef> {
        self.gate
            .authorize_and_load_parent_trip(principal, operation, target)
            .await
    }

    pub async fn trip_stats(&self, trip_id: TripId, principal: &Principal) -> AccessResult<TripStats> {
        self.reporter.trip_stats(trip_id, principal).await
    }

    pub fn credentials(&self) -> &JwtCredentials {
        &self.credentials
    }

    pub fn resolver(&self) -> &PrincipalResolver {
        &self.resolver
    }

    pub fn ownership(&self) -> &OwnershipVerifier {
        &self.ownership
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn ledger(&self) -> &ShareLedger {
        &self.ledger
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn auditor(&self) -> &Auditor {
        &self.auditor
    }
}
