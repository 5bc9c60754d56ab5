//! In-process store implementing every collaborator trait.
//!
//! Intended for tests and local runs. Tables can be switched into a failing
//! state to exercise upstream-failure paths.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::model::{
    ChildKind, ChildRecord, Expense, GrantId, NewShareGrant, PackingItem, Principal, PrincipalId,
    Recommendation, RecordId, ShareGrant, Trip, TripId,
};
use crate::secret::Secret;
use crate::store::{PrincipalStore, ShareStore, StoreResult, TripStore};

/// Tables that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Principals,
    Trips,
    Children,
    Expenses,
    Packing,
    Recommendations,
    Grants,
}

#[derive(Default)]
struct Tables {
    principals: HashMap<PrincipalId, Principal>,
    credentials: HashMap<PrincipalId, String>,
    trips: HashMap<TripId, Trip>,
    children: HashMap<RecordId, ChildRecord>,
    expenses: HashMap<RecordId, Expense>,
    packing: HashMap<RecordId, PackingItem>,
    recommendations: Vec<Recommendation>,
    grants: Vec<ShareGrant>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing: Mutex<HashSet<Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call touching `table` fail until [`recover`](Self::recover).
    pub fn fail(&self, table: Table) {
        self.failing.lock().insert(table);
    }

    pub fn recover(&self, table: Table) {
        self.failing.lock().remove(&table);
    }

    fn check(&self, table: Table) -> StoreResult<()> {
        if self.failing.lock().contains(&table) {
            Err(StoreError::Unavailable(format!("{table:?} table offline")))
        } else {
            Ok(())
        }
    }

    /// Seeds a child row of a kind with no richer representation.
    pub async fn insert_child(&self, record: ChildRecord) -> StoreResult<()> {
        self.check(Table::Children)?;
        let mut tables = self.tables.write().await;
        if !tables.trips.contains_key(&record.trip_id) {
            return Err(StoreError::Missing(format!("trip {}", record.trip_id)));
        }
        tables.children.insert(record.id, record);
        Ok(())
    }

    pub async fn insert_expense(&self, expense: Expense) -> StoreResult<()> {
        self.check(Table::Expenses)?;
        let mut tables = self.tables.write().await;
        if !tables.trips.contains_key(&expense.trip_id) {
            return Err(StoreError::Missing(format!("trip {}", expense.trip_id)));
        }
        tables.children.insert(
            expense.id,
            ChildRecord {
                id: expense.id,
                kind: ChildKind::Expense,
                trip_id: expense.trip_id,
                user_id: Some(expense.user_id),
            },
        );
        tables.expenses.insert(expense.id, expense);
        Ok(())
    }

    pub async fn insert_packing_item(&self, item: PackingItem) -> StoreResult<()> {
        self.check(Table::Packing)?;
        let mut tables = self.tables.write().await;
        if !tables.trips.contains_key(&item.trip_id) {
            return Err(StoreError::Missing(format!("trip {}", item.trip_id)));
        }
        tables.children.insert(
            item.id,
            ChildRecord {
                id: item.id,
                kind: ChildKind::Packing,
                trip_id: item.trip_id,
                user_id: None,
            },
        );
        tables.packing.insert(item.id, item);
        Ok(())
    }

    pub async fn insert_recommendation(&self, rec: Recommendation) -> StoreResult<()> {
        self.check(Table::Recommendations)?;
        self.tables.write().await.recommendations.push(rec);
        Ok(())
    }

    /// Removes a child row of any kind.
    pub async fn delete_child(&self, id: RecordId) -> StoreResult<()> {
        self.check(Table::Children)?;
        let mut tables = self.tables.write().await;
        tables.children.remove(&id);
        tables.expenses.remove(&id);
        tables.packing.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn principal_by_id(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        self.check(Table::Principals)?;
        Ok(self.tables.read().await.principals.get(&id).cloned())
    }

    async fn principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        self.check(Table::Principals)?;
        let tables = self.tables.read().await;
        Ok(tables
            .principals
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_principal(
        &self,
        principal: Principal,
        credential_hash: Secret<String>,
    ) -> StoreResult<()> {
        self.check(Table::Principals)?;
        let mut tables = self.tables.write().await;
        if tables
            .principals
            .values()
            .any(|p| p.email.eq_ignore_ascii_case(&principal.email))
        {
            return Err(StoreError::Constraint("users.email unique".to_string()));
        }
        tables
            .credentials
            .insert(principal.id, credential_hash.expose_secret().clone());
        tables.principals.insert(principal.id, principal);
        Ok(())
    }

    async fn credential_hash(&self, id: PrincipalId) -> StoreResult<Option<Secret<String>>> {
        self.check(Table::Principals)?;
        Ok(self
            .tables
            .read()
            .await
            .credentials
            .get(&id)
            .cloned()
            .map(Secret::new))
    }

    async fn set_credential_hash(
        &self,
        id: PrincipalId,
        credential_hash: Secret<String>,
    ) -> StoreResult<()> {
        self.check(Table::Principals)?;
        let mut tables = self.tables.write().await;
        if !tables.principals.contains_key(&id) {
            return Err(StoreError::Missing(format!("principal {id}")));
        }
        tables
            .credentials
            .insert(id, credential_hash.expose_secret().clone());
        Ok(())
    }

    async fn principals(&self) -> StoreResult<Vec<Principal>> {
        self.check(Table::Principals)?;
        let mut principals: Vec<_> =
            self.tables.read().await.principals.values().cloned().collect();
        principals.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(principals)
    }

    async fn update_principal(&self, principal: &Principal) -> StoreResult<()> {
        self.check(Table::Principals)?;
        let mut tables = self.tables.write().await;
        match tables.principals.get_mut(&principal.id) {
            Some(slot) => {
                *slot = principal.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(format!("principal {}", principal.id))),
        }
    }
}

#[async_trait]
impl TripStore for MemoryStore {
    async fn trip(&self, id: TripId) -> StoreResult<Option<Trip>> {
        self.check(Table::Trips)?;
        Ok(self.tables.read().await.trips.get(&id).cloned())
    }

    async fn insert_trip(&self, trip: Trip) -> StoreResult<()> {
        self.check(Table::Trips)?;
        self.tables.write().await.trips.insert(trip.id, trip);
        Ok(())
    }

    async fn delete_trip(&self, id: TripId) -> StoreResult<()> {
        self.check(Table::Trips)?;
        let mut tables = self.tables.write().await;
        if tables.trips.remove(&id).is_none() {
            return Err(StoreError::Missing(format!("trip {id}")));
        }
        tables.children.retain(|_, c| c.trip_id != id);
        tables.expenses.retain(|_, e| e.trip_id != id);
        tables.packing.retain(|_, p| p.trip_id != id);
        tables.recommendations.retain(|r| r.trip_id != Some(id));
        tables.grants.retain(|g| g.trip_id != id);
        Ok(())
    }

    async fn set_shared(&self, id: TripId, shared: bool) -> StoreResult<()> {
        self.check(Table::Trips)?;
        let mut tables = self.tables.write().await;
        match tables.trips.get_mut(&id) {
            Some(trip) => {
                trip.is_shared = shared;
                Ok(())
            }
            None => Err(StoreError::Missing(format!("trip {id}"))),
        }
    }

    async fn child(&self, kind: ChildKind, id: RecordId) -> StoreResult<Option<ChildRecord>> {
        self.check(Table::Children)?;
        Ok(self
            .tables
            .read()
            .await
            .children
            .get(&id)
            .filter(|c| c.kind == kind)
            .cloned())
    }

    async fn children(&self, trip_id: TripId, kind: ChildKind) -> StoreResult<Vec<ChildRecord>> {
        self.check(Table::Children)?;
        let tables = self.tables.read().await;
        let mut rows: Vec<ChildRecord> = tables
            .children
            .values()
            .filter(|c| c.trip_id == trip_id && c.kind == kind)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.id);
        Ok(rows)
    }

    async fn expenses(&self, trip_id: TripId) -> StoreResult<Vec<Expense>> {
        self.check(Table::Expenses)?;
        let tables = self.tables.read().await;
        let mut rows: Vec<Expense> = tables
            .expenses
            .values()
            .filter(|e| e.trip_id == trip_id)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.id);
        Ok(rows)
    }

    async fn packing_items(&self, trip_id: TripId) -> StoreResult<Vec<PackingItem>> {
        self.check(Table::Packing)?;
        let tables = self.tables.read().await;
        let mut rows: Vec<PackingItem> = tables
            .packing
            .values()
            .filter(|p| p.trip_id == trip_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.id);
        Ok(rows)
    }

    async fn recommendation(&self, id: RecordId) -> StoreResult<Option<Recommendation>> {
        self.check(Table::Recommendations)?;
        Ok(self
            .tables
            .read()
            .await
            .recommendations
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn trip_recommendations(&self, trip_id: TripId) -> StoreResult<Vec<Recommendation>> {
        self.check(Table::Recommendations)?;
        Ok(self
            .tables
            .read()
            .await
            .recommendations
            .iter()
            .filter(|r| r.trip_id == Some(trip_id))
            .cloned()
            .collect())
    }

    async fn global_recommendations(
        &self,
        destination: &str,
    ) -> StoreResult<Vec<Recommendation>> {
        self.check(Table::Recommendations)?;
        let needle = destination.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .recommendations
            .iter()
            .filter(|r| r.trip_id.is_none())
            .filter(|r| {
                r.destination
                    .as_deref()
                    .map(|d| d.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn upsert_grant(&self, grant: NewShareGrant) -> StoreResult<ShareGrant> {
        self.check(Table::Grants)?;
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.grants.iter_mut().find(|g| {
            g.trip_id == grant.trip_id && g.shared_with_email == grant.shared_with_email
        }) {
            existing.shared_by = grant.shared_by;
            existing.permission = grant.permission;
            return Ok(existing.clone());
        }

        let row = ShareGrant {
            id: GrantId::new(),
            trip_id: grant.trip_id,
            shared_by: grant.shared_by,
            shared_with_email: grant.shared_with_email,
            permission: grant.permission,
        };
        tables.grants.push(row.clone());
        Ok(row)
    }

    async fn grants_for_trip(&self, trip_id: TripId) -> StoreResult<Vec<ShareGrant>> {
        self.check(Table::Grants)?;
        Ok(self
            .tables
            .read()
            .await
            .grants
            .iter()
            .filter(|g| g.trip_id == trip_id)
            .cloned()
            .collect())
    }

    async fn grant(&self, id: GrantId) -> StoreResult<Option<ShareGrant>> {
        self.check(Table::Grants)?;
        Ok(self
            .tables
            .read()
            .await
            .grants
            .iter()
            .find(|g| g.id == id)
            .cloned())
    }

    async fn grant_for(&self, trip_id: TripId, email: &str) -> StoreResult<Option<ShareGrant>> {
        self.check(Table::Grants)?;
        Ok(self
            .tables
            .read()
            .await
            .grants
            .iter()
            .find(|g| g.trip_id == trip_id && g.shared_with_email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn delete_grant(&self, id: GrantId) -> StoreResult<()> {
        self.check(Table::Grants)?;
        self.tables.write().await.grants.retain(|g| g.id != id);
        Ok(())
    }
}
