//! Share grant ledger.
//!
//! Grants are keyed by `(trip, collaborator email)`. Recording a second grant
//! for the same pair replaces the first. Every ledger operation is reserved
//! to the owner of the trip the grant belongs to.

use std::sync::Arc;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, Auditor};
use crate::error::{AccessError, AccessResult};
use crate::gate::{AuthorizationGate, Target};
use crate::model::{normalize_email, GrantId, NewShareGrant, Permission, Principal, ShareGrant, TripId};
use crate::policy::Operation;
use crate::store::{ShareStore, TripStore};

pub struct ShareLedger {
    gate: Arc<AuthorizationGate>,
    trips: Arc<dyn TripStore>,
    shares: Arc<dyn ShareStore>,
    auditor: Auditor,
}

impl ShareLedger {
    pub fn new(
        gate: Arc<AuthorizationGate>,
        trips: Arc<dyn TripStore>,
        shares: Arc<dyn ShareStore>,
        auditor: Auditor,
    ) -> Self {
        Self {
            gate,
            trips,
            shares,
            auditor,
        }
    }

    /// Marks `trip_id` shared, then records (or replaces) the grant of
    /// `permission` for `email`.
    ///
    /// A stored grant always sits on a trip flagged shared. If the grant write
    /// fails the flag may be left set with no grant behind it.
    ///
    /// # Errors
    ///
    /// [`AccessError::AccessDenied`] unless `owner` owns the trip;
    /// [`AccessError::ValidationFailed`] for an empty or malformed email.
    pub async fn grant(
        &self,
        trip_id: TripId,
        owner: &Principal,
        email: &str,
        permission: Permission,
    ) -> AccessResult<ShareGrant> {
        self.gate
            .authorize(owner, Operation::Create, Target::TripShares(trip_id))
            .await?;

        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AccessError::ValidationFailed(
                "a collaborator email is required".to_string(),
            ));
        }

        self.trips.set_shared(trip_id, true).await?;
        let grant = self
            .shares
            .upsert_grant(NewShareGrant {
                trip_id,
                shared_by: owner.id,
                shared_with_email: email,
                permission,
            })
            .await?;

        tracing::info!(
            trip = %trip_id,
            principal = %owner.id,
            permission = %grant.permission,
            "trip shared"
        );
        self.auditor.emit(
            AuditEvent::new(
                Some(owner.id.to_string()),
                AuditEventKind::ShareChange,
                AuditOutcome::Admitted,
            )
            .with_action("share:grant")
            .with_resource_id(grant.id.to_string())
            .with_trip_id(trip_id.to_string())
            .with_reason(grant.permission.as_str()),
        );

        Ok(grant)
    }

    /// All grants recorded on `trip_id`.
    pub async fn list_grants(
        &self,
        trip_id: TripId,
        requester: &Principal,
    ) -> AccessResult<Vec<ShareGrant>> {
        self.gate
            .authorize(requester, Operation::Read, Target::TripShares(trip_id))
            .await?;

        Ok(self.shares.grants_for_trip(trip_id).await?)
    }

    /// Removes a grant. Only the owner of the grant's trip may do this; an
    /// unknown grant id is denied like a foreign one.
    pub async fn revoke(&self, grant_id: GrantId, requester: &Principal) -> AccessResult<()> {
        let admission = self
            .gate
            .authorize(requester, Operation::Delete, Target::Share(grant_id))
            .await?;

        self.shares.delete_grant(grant_id).await?;

        tracing::info!(principal = %requester.id, grant = %grant_id, "share revoked");
        let mut event = AuditEvent::new(
            Some(requester.id.to_string()),
            AuditEventKind::ShareChange,
            AuditOutcome::Admitted,
        )
        .with_action("share:revoke")
        .with_resource_id(grant_id.to_string());
        if let Some(trip) = admission.trip() {
            event = event.with_trip_id(trip.id.to_string());
        }
        self.auditor.emit(event);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditTrail;
    use crate::config::ShareEnforcement;
    use crate::memory::{MemoryStore, Table};
    use crate::model::{PrincipalId, Role, Trip};

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: ShareLedger,
        trail: Arc<AuditTrail>,
        owner: Principal,
        other: Principal,
        trip: Trip,
    }

    fn principal(email: &str) -> Principal {
        Principal {
            id: PrincipalId::new(),
            email: email.to_string(),
            full_name: email.to_string(),
            role: Role::User,
            is_active: true,
        }
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let trail = Arc::new(AuditTrail::new());
        let auditor = Auditor::with_trail(trail.clone());
        let owner = principal("owner@example.com");
        let other = principal("u2@example.com");
        let trip = Trip {
            id: TripId::new(),
            owner_id: owner.id,
            title: "Oslo".to_string(),
            destination_country: Some("Norway".to_string()),
            budget: None,
            is_shared: false,
        };
        store.insert_trip(trip.clone()).await.unwrap();

        let gate = Arc::new(AuthorizationGate::new(
            store.clone(),
            store.clone(),
            ShareEnforcement::RecordOnly,
            auditor.clone(),
        ));
        let ledger = ShareLedger::new(gate, store.clone(), store.clone(), auditor);

        Fixture {
            store,
            ledger,
            trail,
            owner,
            other,
            trip,
        }
    }

    #[tokio::test]
    async fn grant_normalizes_email_and_marks_trip_shared() {
        let f = fixture().await;

        let grant = f
            .ledger
            .grant(f.trip.id, &f.owner, "  U2@Example.com ", Permission::View)
            .await
            .unwrap();

        assert_eq!(grant.shared_with_email, "u2@example.com");
        assert_eq!(grant.shared_by, f.owner.id);
        let stored = f.store.trip(f.trip.id).await.unwrap().unwrap();
        assert!(stored.is_shared);
    }

    #[tokio::test]
    async fn failed_grant_write_stores_nothing() {
        let f = fixture().await;
        f.store.fail(Table::Grants);

        assert_eq!(
            f.ledger
                .grant(f.trip.id, &f.owner, "u2@example.com", Permission::View)
                .await,
            Err(AccessError::UpstreamFailure)
        );

        f.store.recover(Table::Grants);
        assert!(f.store.grants_for_trip(f.trip.id).await.unwrap().is_empty());
        // The flag goes first and is not rolled back.
        assert!(f.store.trip(f.trip.id).await.unwrap().unwrap().is_shared);
    }

    #[tokio::test]
    async fn regrant_replaces_permission() {
        let f = fixture().await;
        let first = f
            .ledger
            .grant(f.trip.id, &f.owner, "u2@example.com", Permission::View)
            .await
            .unwrap();
        let second = f
            .ledger
            .grant(f.trip.id, &f.owner, "U2@example.com", Permission::Edit)
            .await
            .unwrap();

        let grants = f.ledger.list_grants(f.trip.id, &f.owner).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].permission, Permission::Edit);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn non_owner_cannot_grant_or_list() {
        let f = fixture().await;

        assert_eq!(
            f.ledger
                .grant(f.trip.id, &f.other, "x@example.com", Permission::Edit)
                .await,
            Err(AccessError::AccessDenied)
        );
        assert_eq!(
            f.ledger.list_grants(f.trip.id, &f.other).await,
            Err(AccessError::AccessDenied)
        );
        assert!(!f.store.trip(f.trip.id).await.unwrap().unwrap().is_shared);
    }

    #[tokio::test]
    async fn grant_requires_an_email() {
        let f = fixture().await;
        assert!(matches!(
            f.ledger.grant(f.trip.id, &f.owner, "   ", Permission::View).await,
            Err(AccessError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn only_the_trip_owner_revokes() {
        let f = fixture().await;
        let grant = f
            .ledger
            .grant(f.trip.id, &f.owner, "u2@example.com", Permission::View)
            .await
            .unwrap();

        assert_eq!(
            f.ledger.revoke(grant.id, &f.other).await,
            Err(AccessError::AccessDenied)
        );
        assert_eq!(f.ledger.revoke(grant.id, &f.owner).await, Ok(()));
        assert!(f.ledger.list_grants(f.trip.id, &f.owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn revoking_unknown_grant_is_denied() {
        let f = fixture().await;
        assert_eq!(
            f.ledger.revoke(GrantId::new(), &f.owner).await,
            Err(AccessError::AccessDenied)
        );
    }

    #[tokio::test]
    async fn ledger_outage_surfaces_as_upstream_failure() {
        let f = fixture().await;
        f.store.fail(Table::Grants);

        assert_eq!(
            f.ledger
                .grant(f.trip.id, &f.owner, "u2@example.com", Permission::View)
                .await,
            Err(AccessError::UpstreamFailure)
        );
    }

    #[tokio::test]
    async fn share_changes_are_audited() {
        let f = fixture().await;
        let grant = f
            .ledger
            .grant(f.trip.id, &f.owner, "u2@example.com", Permission::View)
            .await
            .unwrap();
        f.ledger.revoke(grant.id, &f.owner).await.unwrap();

        let changes: Vec<_> = f
            .trail
            .events()
            .into_iter()
            .filter(|e| e.kind() == AuditEventKind::ShareChange)
            .collect();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].action(), Some("share:grant"));
        assert_eq!(changes[1].action(), Some("share:revoke"));
    }
}
