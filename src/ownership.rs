//! Trip ownership.
//!
//! [`OwnedByPrincipal`] is the row-level check the gate applies once a record
//! is loaded. [`OwnershipVerifier`] answers the same question for a bare trip
//! id.

use std::sync::Arc;

use crate::error::AccessResult;
use crate::model::{PrincipalId, Recommendation, Trip, TripId};
use crate::store::TripStore;

/// A record with a single owning principal.
pub trait OwnedByPrincipal {
    fn owner_id(&self) -> PrincipalId;

    fn is_owned_by(&self, principal: PrincipalId) -> bool {
        self.owner_id() == principal
    }
}

impl OwnedByPrincipal for Trip {
    fn owner_id(&self) -> PrincipalId {
        self.owner_id
    }
}

/// A recommendation belongs to whoever created it.
impl OwnedByPrincipal for Recommendation {
    fn owner_id(&self) -> PrincipalId {
        self.created_by
    }
}

/// Answers "does this principal own this trip?" against the trip store.
///
/// A trip that does not exist is treated exactly like a trip owned by someone
/// else.
#[derive(Clone)]
pub struct OwnershipVerifier {
    trips: Arc<dyn TripStore>,
}

impl OwnershipVerifier {
    pub fn new(trips: Arc<dyn TripStore>) -> Self {
        Self { trips }
    }

    /// `Ok(true)` iff the trip exists and its owner is `principal`.
    ///
    /// Only a store failure produces an error.
    pub async fn is_owner(&self, trip_id: TripId, principal: PrincipalId) -> AccessResult<bool> {
        let trip = self.trips.trip(trip_id).await?;
        Ok(trip.is_some_and(|t| t.is_owned_by(principal)))
    }
}
