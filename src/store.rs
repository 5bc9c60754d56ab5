//! Persistence collaborators.
//!
//! The core never talks to a database directly. Each component receives the
//! store handles it needs at construction, as `Arc<dyn Trait>`, so a request
//! handler can share one set of handles across tasks without process-wide
//! state.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{
    ChildKind, ChildRecord, Expense, GrantId, NewShareGrant, PackingItem, Principal, PrincipalId,
    Recommendation, RecordId, ShareGrant, Trip, TripId,
};
use crate::secret::Secret;

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed access to principal records.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn principal_by_id(&self, id: PrincipalId) -> StoreResult<Option<Principal>>;

    /// `email` is already normalized by the caller.
    async fn principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>>;

    /// Fails with [`StoreError::Constraint`] when the email is taken.
    async fn insert_principal(
        &self,
        principal: Principal,
        credential_hash: Secret<String>,
    ) -> StoreResult<()>;

    async fn credential_hash(&self, id: PrincipalId) -> StoreResult<Option<Secret<String>>>;

    /// Replaces the stored credential hash; [`StoreError::Missing`] if absent.
    async fn set_credential_hash(
        &self,
        id: PrincipalId,
        credential_hash: Secret<String>,
    ) -> StoreResult<()>;

    /// Every principal, ordered by email.
    async fn principals(&self) -> StoreResult<Vec<Principal>>;

    /// Replaces the stored record; [`StoreError::Missing`] if absent.
    async fn update_principal(&self, principal: &Principal) -> StoreResult<()>;
}

/// Trips and the rows nested under them.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn trip(&self, id: TripId) -> StoreResult<Option<Trip>>;

    async fn insert_trip(&self, trip: Trip) -> StoreResult<()>;

    /// Removes the trip together with every row that references it.
    async fn delete_trip(&self, id: TripId) -> StoreResult<()>;

    async fn set_shared(&self, id: TripId, shared: bool) -> StoreResult<()>;

    /// Ownership projection of a single child row.
    async fn child(&self, kind: ChildKind, id: RecordId) -> StoreResult<Option<ChildRecord>>;

    async fn children(&self, trip_id: TripId, kind: ChildKind) -> StoreResult<Vec<ChildRecord>>;

    async fn expenses(&self, trip_id: TripId) -> StoreResult<Vec<Expense>>;

    async fn packing_items(&self, trip_id: TripId) -> StoreResult<Vec<PackingItem>>;

    async fn recommendation(&self, id: RecordId) -> StoreResult<Option<Recommendation>>;

    async fn trip_recommendations(&self, trip_id: TripId) -> StoreResult<Vec<Recommendation>>;

    /// Global (trip-less) recommendations whose destination contains
    /// `destination`, compared case-insensitively.
    async fn global_recommendations(&self, destination: &str)
        -> StoreResult<Vec<Recommendation>>;
}

/// Share grant rows.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Inserts or replaces the grant for `(trip_id, shared_with_email)`.
    async fn upsert_grant(&self, grant: NewShareGrant) -> StoreResult<ShareGrant>;

    async fn grants_for_trip(&self, trip_id: TripId) -> StoreResult<Vec<ShareGrant>>;

    async fn grant(&self, id: GrantId) -> StoreResult<Option<ShareGrant>>;

    async fn grant_for(&self, trip_id: TripId, email: &str) -> StoreResult<Option<ShareGrant>>;

    async fn delete_grant(&self, id: GrantId) -> StoreResult<()>;
}
