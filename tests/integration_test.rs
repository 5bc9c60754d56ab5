use std::sync::Arc;

use trip_access::{
    AccessConfig, AccessControl, AccessError, AuditOutcome, AuditTrail, Auditor, ChildKind,
    ChildRecord, Expense, MemoryStore, Operation, Permission, Principal, PrincipalId,
    PrincipalStore, RecordId, Role, Secret, ShareEnforcement, Table, Target, Trip, TripId,
    TripStore,
};

struct World {
    store: Arc<MemoryStore>,
    access: AccessControl,
    trail: Arc<AuditTrail>,
}

fn world(mode: ShareEnforcement) -> World {
    let store = Arc::new(MemoryStore::new());
    let trail = Arc::new(AuditTrail::new());
    let access = AccessControl::with_auditor(
        AccessConfig::new("integration-secret").with_share_enforcement(mode),
        store.clone(),
        store.clone(),
        store.clone(),
        Auditor::with_trail(trail.clone()),
    );
    World {
        store,
        access,
        trail,
    }
}

impl World {
    async fn principal(&self, email: &str, role: Role) -> (Principal, Secret<String>) {
        let principal = Principal {
            id: PrincipalId::new(),
            email: email.to_string(),
            full_name: email.to_string(),
            role,
            is_active: true,
        };
        self.store
            .insert_principal(principal.clone(), Secret::new("unused".to_string()))
            .await
            .unwrap();
        let token = self.access.credentials().issue(principal.id).unwrap();
        (principal, token)
    }

    async fn trip(&self, owner: &Principal, budget: Option<f64>) -> Trip {
        let trip = Trip {
            id: TripId::new(),
            owner_id: owner.id,
            title: "Trip".to_string(),
            destination_country: Some("Spain".to_string()),
            budget,
            is_shared: false,
        };
        self.store.insert_trip(trip.clone()).await.unwrap();
        trip
    }

    async fn expense(&self, trip: &Trip, user: &Principal, category: &str, amount: f64) -> RecordId {
        let id = RecordId::new();
        self.store
            .insert_expense(Expense {
                id,
                trip_id: trip.id,
                user_id: user.id,
                category: category.to_string(),
                amount: Some(amount),
            })
            .await
            .unwrap();
        id
    }
}

#[tokio::test]
async fn stats_scenario_owner_sees_totals_and_stranger_is_denied() {
    let w = world(ShareEnforcement::RecordOnly);
    let (u1, token) = w.principal("u1@example.com", Role::User).await;
    let (u2, _) = w.principal("u2@example.com", Role::User).await;
    let t1 = w.trip(&u1, Some(1000.0)).await;

    let u1 = w.access.authenticate(token.expose_secret()).await.unwrap();
    w.expense(&t1, &u1, "food", 250.0).await;
    w.expense(&t1, &u1, "transit", 100.0).await;

    let stats = w.access.trip_stats(t1.id, &u1).await.unwrap();
    assert_eq!(stats.total_spent, 350.0);
    assert_eq!(stats.budget, 1000.0);
    assert_eq!(stats.remaining, 650.0);

    assert_eq!(
        w.access.trip_stats(t1.id, &u2).await,
        Err(AccessError::AccessDenied)
    );

    let summary = w.access.reporter().expense_summary(t1.id, &u1).await.unwrap();
    assert_eq!(summary.get("food"), Some(&250.0));
    assert_eq!(summary.get("transit"), Some(&100.0));
}

#[tokio::test]
async fn share_scenario_regrant_leaves_one_edit_grant() {
    let w = world(ShareEnforcement::RecordOnly);
    let (u1, _) = w.principal("u1@example.com", Role::User).await;
    let t1 = w.trip(&u1, None).await;

    w.access
        .ledger()
        .grant(t1.id, &u1, "u2@example.com", Permission::View)
        .await
        .unwrap();
    w.access
        .ledger()
        .grant(t1.id, &u1, "u2@example.com", Permission::Edit)
        .await
        .unwrap();

    let grants = w.access.ledger().list_grants(t1.id, &u1).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].permission, Permission::Edit);
    assert_eq!(grants[0].shared_with_email, "u2@example.com");
}

#[tokio::test]
async fn recorded_grant_admits_only_when_enforced() {
    for (mode, expected) in [
        (ShareEnforcement::RecordOnly, Err(AccessError::AccessDenied)),
        (ShareEnforcement::Enforced, Ok(())),
    ] {
        let w = world(mode);
        let (u1, _) = w.principal("u1@example.com", Role::User).await;
        let (u2, _) = w.principal("u2@example.com", Role::User).await;
        let t1 = w.trip(&u1, None).await;
        w.access
            .ledger()
            .grant(t1.id, &u1, "u2@example.com", Permission::View)
            .await
            .unwrap();

        let outcome = w
            .access
            .gate()
            .authorize(&u2, Operation::Read, Target::Trip(t1.id))
            .await
            .map(|_| ());
        assert_eq!(outcome, expected, "{mode:?}");

        // Stats stay owner-only either way.
        assert_eq!(
            w.access.trip_stats(t1.id, &u2).await,
            Err(AccessError::AccessDenied)
        );
    }
}

#[tokio::test]
async fn deactivation_disables_a_still_valid_token() {
    let w = world(ShareEnforcement::RecordOnly);
    let (admin, _) = w.principal("admin@example.com", Role::Admin).await;
    let (user, token) = w.principal("user@example.com", Role::User).await;

    assert!(w.access.authenticate(token.expose_secret()).await.is_ok());

    w.access
        .accounts()
        .set_active(&admin, user.id, false)
        .await
        .unwrap();

    assert_eq!(
        w.access.authenticate(token.expose_secret()).await,
        Err(AccessError::AccountDisabled)
    );
    let header = format!("Bearer {}", token.expose_secret());
    assert_eq!(
        w.access.authenticate_header(Some(&header)).await,
        Err(AccessError::AccountDisabled)
    );
}

#[tokio::test]
async fn non_owner_child_mutation_is_denied_whether_or_not_the_row_exists() {
    let w = world(ShareEnforcement::RecordOnly);
    let (owner, _) = w.principal("owner@example.com", Role::User).await;
    let (intruder, _) = w.principal("intruder@example.com", Role::User).await;
    let trip = w.trip(&owner, Some(300.0)).await;
    let existing = w.expense(&trip, &owner, "food", 20.0).await;

    for kind in ChildKind::ALL {
        for id in [existing, RecordId::new()] {
            for op in [Operation::Update, Operation::Delete] {
                assert_eq!(
                    w.access
                        .gate()
                        .authorize(&intruder, op, Target::Child { kind, id })
                        .await,
                    Err(AccessError::AccessDenied),
                    "{kind} {op}"
                );
            }
        }
    }
}

#[tokio::test]
async fn only_the_stored_trip_id_is_consulted() {
    let w = world(ShareEnforcement::RecordOnly);
    let (victim, _) = w.principal("victim@example.com", Role::User).await;
    let (attacker, _) = w.principal("attacker@example.com", Role::User).await;
    let victims_trip = w.trip(&victim, None).await;
    let attackers_trip = w.trip(&attacker, None).await;

    let row = RecordId::new();
    w.store
        .insert_child(ChildRecord {
            id: row,
            kind: ChildKind::Itinerary,
            trip_id: victims_trip.id,
            user_id: None,
        })
        .await
        .unwrap();

    // The attacker may write under their own trip...
    assert!(w
        .access
        .gate()
        .authorize(
            &attacker,
            Operation::Create,
            Target::TripChildren { kind: ChildKind::Itinerary, trip_id: attackers_trip.id }
        )
        .await
        .is_ok());

    // ...but an existing row is judged by the trip it is stored under.
    assert_eq!(
        w.access
            .authorize_and_load_parent_trip(
                &attacker,
                Operation::Update,
                Target::Child { kind: ChildKind::Itinerary, id: row }
            )
            .await,
        Err(AccessError::AccessDenied)
    );
    let parent = w
        .access
        .authorize_and_load_parent_trip(
            &victim,
            Operation::Update,
            Target::Child { kind: ChildKind::Itinerary, id: row },
        )
        .await
        .unwrap();
    assert_eq!(parent.id, victims_trip.id);
}

#[tokio::test]
async fn failing_sub_fetch_fails_stats_without_partial_result() {
    let w = world(ShareEnforcement::RecordOnly);
    let (owner, _) = w.principal("owner@example.com", Role::User).await;
    let trip = w.trip(&owner, Some(100.0)).await;
    w.expense(&trip, &owner, "food", 10.0).await;

    for table in [Table::Expenses, Table::Children, Table::Packing] {
        w.store.fail(table);
        assert_eq!(
            w.access.trip_stats(trip.id, &owner).await,
            Err(AccessError::UpstreamFailure),
            "{table:?}"
        );
        w.store.recover(table);
    }

    assert!(w.access.trip_stats(trip.id, &owner).await.is_ok());
}

#[tokio::test]
async fn deleting_a_trip_cascades_to_its_grants() {
    let w = world(ShareEnforcement::RecordOnly);
    let (owner, _) = w.principal("owner@example.com", Role::User).await;
    let trip = w.trip(&owner, None).await;
    let grant = w
        .access
        .ledger()
        .grant(trip.id, &owner, "friend@example.com", Permission::View)
        .await
        .unwrap();

    w.access
        .gate()
        .authorize(&owner, Operation::Delete, Target::Trip(trip.id))
        .await
        .unwrap();
    w.store.delete_trip(trip.id).await.unwrap();

    assert_eq!(
        w.access.ledger().revoke(grant.id, &owner).await,
        Err(AccessError::AccessDenied)
    );
    assert_eq!(
        w.access.ownership().is_owner(trip.id, owner.id).await,
        Ok(false)
    );
}

#[tokio::test]
async fn register_login_and_authenticate() {
    let w = world(ShareEnforcement::RecordOnly);

    let registered = w
        .access
        .accounts()
        .register("New.User@Example.com", "New User", "s3cret-pass")
        .await
        .unwrap();
    let session = w
        .access
        .accounts()
        .login("new.user@example.com", "s3cret-pass")
        .await
        .unwrap();

    let principal = w
        .access
        .authenticate(session.token.expose_secret())
        .await
        .unwrap();
    assert_eq!(principal, registered.principal);
    assert_eq!(principal.email, "new.user@example.com");

    let stored = w.store.principal_by_email("new.user@example.com").await.unwrap();
    assert_eq!(stored.map(|p| p.id), Some(principal.id));
}

#[tokio::test]
async fn denials_and_admissions_reach_the_audit_trail() {
    let w = world(ShareEnforcement::RecordOnly);
    let (owner, _) = w.principal("owner@example.com", Role::User).await;
    let (other, _) = w.principal("other@example.com", Role::User).await;
    let trip = w.trip(&owner, None).await;

    let _ = w
        .access
        .gate()
        .authorize(&owner, Operation::Read, Target::Trip(trip.id))
        .await;
    let _ = w
        .access
        .gate()
        .authorize(&other, Operation::Update, Target::Trip(trip.id))
        .await;
    let _ = w.access.authenticate("forged").await;

    assert_eq!(w.trail.with_outcome(AuditOutcome::Admitted).len(), 1);
    let denied = w.trail.with_outcome(AuditOutcome::Denied);
    assert_eq!(denied.len(), 2);
    assert!(denied
        .iter()
        .all(|e| !e.to_string().contains("integration-secret")));
}
