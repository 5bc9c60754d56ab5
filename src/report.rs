//! Read-only aggregation over a trip's children.
//!
//! Nothing here runs before the requester has been admitted for the trip.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{AccessError, AccessResult};
use crate::gate::{AuthorizationGate, Target};
use crate::model::{ChildKind, Expense, Principal, Recommendation, TripId};
use crate::policy::Operation;
use crate::store::TripStore;

/// Spend and progress figures for one trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStats {
    pub total_spent: f64,
    /// Trip budget, zero when unset
    pub budget: f64,
    /// `budget - total_spent`; negative when over budget
    pub remaining: f64,
    /// Number of itinerary items
    pub activity_count: usize,
    pub packing_total: usize,
    pub packing_packed: usize,
}

/// Sums of effective expense amounts, keyed by category.
pub fn spend_by_category(expenses: &[Expense]) -> BTreeMap<String, f64> {
    let mut summary = BTreeMap::new();
    for expense in expenses {
        *summary.entry(expense.category.clone()).or_insert(0.0) += expense.effective_amount();
    }
    summary
}

fn total_spent(expenses: &[Expense]) -> f64 {
    expenses.iter().map(Expense::effective_amount).sum()
}

pub struct Reporter {
    gate: Arc<AuthorizationGate>,
    trips: Arc<dyn TripStore>,
}

impl Reporter {
    pub fn new(gate: Arc<AuthorizationGate>, trips: Arc<dyn TripStore>) -> Self {
        Self { gate, trips }
    }

    /// Statistics for `trip_id`, owner only. Share grants never admit this,
    /// whatever the enforcement mode.
    ///
    /// The trip, expense, itinerary and packing fetches run concurrently; if
    /// any of them fails the whole call fails and no partial figures are
    /// returned.
    pub async fn trip_stats(&self, trip_id: TripId, requester: &Principal) -> AccessResult<TripStats> {
        self.gate
            .authorize(requester, Operation::Read, Target::TripStats(trip_id))
            .await?;

        let (trip, expenses, activities, packing) = tokio::try_join!(
            self.trips.trip(trip_id),
            self.trips.expenses(trip_id),
            self.trips.children(trip_id, ChildKind::Itinerary),
            self.trips.packing_items(trip_id),
        )?;
        // Deleted between admission and the fetch.
        let trip = trip.ok_or(AccessError::AccessDenied)?;

        let total_spent = total_spent(&expenses);
        let budget = trip.budget.filter(|b| b.is_finite()).unwrap_or(0.0);

        tracing::debug!(
            trip = %trip_id,
            principal = %requester.id,
            expenses = expenses.len(),
            "trip stats computed"
        );

        Ok(TripStats {
            total_spent,
            budget,
            remaining: budget - total_spent,
            activity_count: activities.len(),
            packing_total: packing.len(),
            packing_packed: packing.iter().filter(|p| p.is_packed).count(),
        })
    }

    /// Spend per expense category for `trip_id`.
    pub async fn expense_summary(
        &self,
        trip_id: TripId,
        requester: &Principal,
    ) -> AccessResult<BTreeMap<String, f64>> {
        self.gate
            .authorize(
                requester,
                Operation::Read,
                Target::TripChildren {
                    kind: ChildKind::Expense,
                    trip_id,
                },
            )
            .await?;

        let expenses = self.trips.expenses(trip_id).await?;
        Ok(spend_by_category(&expenses))
    }

    /// Trip-scoped recommendations followed by global ones for the trip's
    /// destination, each id listed once.
    pub async fn recommendations(
        &self,
        trip_id: TripId,
        requester: &Principal,
    ) -> AccessResult<Vec<Recommendation>> {
        self.gate
            .authorize(requester, Operation::Read, Target::TripRecommendations(trip_id))
            .await?;

        // Admission already proved the trip exists; a concurrent delete leaves
        // nothing to recommend.
        let Some(trip) = self.trips.trip(trip_id).await? else {
            return Ok(Vec::new());
        };

        let destination = trip
            .destination_country
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        let (scoped, global) = match destination {
            Some(destination) => tokio::try_join!(
                self.trips.trip_recommendations(trip_id),
                self.trips.global_recommendations(destination),
            )?,
            None => (self.trips.trip_recommendations(trip_id).await?, Vec::new()),
        };

        let mut seen = HashSet::new();
        Ok(scoped
            .into_iter()
            .chain(global)
            .filter(|rec| seen.insert(rec.id))
            .collect())
    }
}
