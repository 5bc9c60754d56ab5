use std::fmt;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, Auditor};
use crate::config::ShareEnforcement;
use crate::error::{AccessError, AccessResult};
use crate::model::{
    normalize_email, ChildKind, GrantId, Permission, Principal, PrincipalId, Recommendation,
    RecordId, Role, Trip, TripId,
};
use crate::ownership::OwnedByPrincipal;
use crate::policy::{action_label, rule_for, share_admits, Operation, ResourceKind, Rule};
use crate::store::{ShareStore, TripStore};

/// What a request points at, as named by the caller.
///
/// Existing child rows, recommendations and grants are addressed by their own
/// id only. Their trip is always re-derived from the stored row, so a caller
/// cannot steer a mutation through a trip they own onto a row they do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A trip about to be created
    NewTrip,
    Trip(TripId),
    /// Aggregated figures of a trip
    TripStats(TripId),
    /// The collection of `kind` rows under a trip (list, create)
    TripChildren { kind: ChildKind, trip_id: TripId },
    /// One existing child row
    Child { kind: ChildKind, id: RecordId },
    /// Recommendations scoped to a trip (list, create)
    TripRecommendations(TripId),
    /// Global recommendations (list, create)
    Recommendations,
    /// One existing recommendation, trip-scoped or global
    Recommendation(RecordId),
    /// Grants recorded on a trip (list, create)
    TripShares(TripId),
    /// One existing grant
    Share(GrantId),
}

impl Target {
    /// Resource kind as far as it is known before any lookup.
    ///
    /// A single recommendation only turns out to be trip-scoped once loaded.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Target::NewTrip | Target::Trip(_) => ResourceKind::Trip,
            Target::TripStats(_) => ResourceKind::TripStats,
            Target::TripChildren { kind, .. } | Target::Child { kind, .. } => {
                ResourceKind::Child(*kind)
            }
            Target::TripRecommendations(_) => ResourceKind::TripRecommendation,
            Target::Recommendations | Target::Recommendation(_) => {
                ResourceKind::GlobalRecommendation
            }
            Target::TripShares(_) | Target::Share(_) => ResourceKind::ShareGrant,
        }
    }

    /// Identifier the caller named, if any.
    pub fn resource_id(&self) -> Option<String> {
        match self {
            Target::NewTrip | Target::Recommendations => None,
            Target::Trip(id)
            | Target::TripStats(id)
            | Target::TripChildren { trip_id: id, .. }
            | Target::TripRecommendations(id)
            | Target::TripShares(id) => Some(id.to_string()),
            Target::Child { id, .. } | Target::Recommendation(id) => Some(id.to_string()),
            Target::Share(id) => Some(id.to_string()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::NewTrip => write!(f, "new trip"),
            Target::Trip(id) => write!(f, "trip {id}"),
            Target::TripStats(id) => write!(f, "stats of trip {id}"),
            Target::TripChildren { kind, trip_id } => write!(f, "{kind} rows of trip {trip_id}"),
            Target::Child { kind, id } => write!(f, "{kind} {id}"),
            Target::TripRecommendations(id) => write!(f, "recommendations of trip {id}"),
            Target::Recommendations => write!(f, "global recommendations"),
            Target::Recommendation(id) => write!(f, "recommendation {id}"),
            Target::TripShares(id) => write!(f, "shares of trip {id}"),
            Target::Share(id) => write!(f, "share {id}"),
        }
    }
}

/// The trip an admitted request was authorized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripRef {
    pub id: TripId,
    pub owner_id: PrincipalId,
}

impl From<&Trip> for TripRef {
    fn from(trip: &Trip) -> Self {
        Self {
            id: trip.id,
            owner_id: trip.owner_id,
        }
    }
}

/// Which path admitted a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmittedVia {
    /// The rule admits every active principal
    AnyPrincipal,
    /// Requester owns the trip (and the row, where the rule asks for it)
    Owner,
    /// A recorded share grant stood in for trip ownership
    Share(Permission),
    /// Requester created the row
    Creator,
    Admin,
}

impl fmt::Display for AdmittedVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmittedVia::AnyPrincipal => write!(f, "any_principal"),
            AdmittedVia::Owner => write!(f, "owner"),
            AdmittedVia::Share(permission) => write!(f, "share_{permission}"),
            AdmittedVia::Creator => write!(f, "creator"),
            AdmittedVia::Admin => write!(f, "admin"),
        }
    }
}

/// Proof that the gate admitted a request.
///
/// Only [`AuthorizationGate`] can construct one, so a data operation that
/// takes an `&Admission` cannot run before the decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    principal: PrincipalId,
    kind: ResourceKind,
    operation: Operation,
    trip: Option<TripRef>,
    via: AdmittedVia,
    _private: (),
}

impl Admission {
    pub fn principal(&self) -> PrincipalId {
        self.principal
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Trip the decision was derived from; `None` for new trips and global
    /// recommendations.
    pub fn trip(&self) -> Option<TripRef> {
        self.trip
    }

    pub fn via(&self) -> AdmittedVia {
        self.via
    }
}

/// Rejects `principal` unless their role is one of `roles`.
pub fn require_role(principal: &Principal, roles: &[Role]) -> AccessResult<()> {
    if roles.contains(&principal.role) {
        Ok(())
    } else {
        tracing::warn!(
            principal = %principal.id,
            role = %principal.role,
            "role not permitted"
        );
        Err(AccessError::AccessDenied)
    }
}

fn unsupported(kind: ResourceKind, operation: Operation) -> AccessResult<()> {
    if rule_for(kind, operation) == Rule::Unsupported {
        return Err(AccessError::ValidationFailed(format!(
            "{} is not supported",
            action_label(kind, operation)
        )));
    }
    Ok(())
}

/// The resource authorization gate.
///
/// Every request touching a trip or anything nested under it passes through
/// [`authorize`](Self::authorize). The decision is a pure function of the
/// principal, the operation and the stored ownership fields at the time of
/// the call; nothing is cached between requests.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use trip_access::{
///     AccessError, Auditor, AuthorizationGate, MemoryStore, Operation, Principal,
///     PrincipalId, Role, ShareEnforcement, Target, Trip, TripId, TripStore,
/// };
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// let owner = Principal {
///     id: PrincipalId::new(),
///     email: "owner@example.com".into(),
///     full_name: "Owner".into(),
///     role: Role::User,
///     is_active: true,
/// };
/// let trip = Trip {
///     id: TripId::new(),
///     owner_id: owner.id,
///     title: "Kyoto".into(),
///     destination_country: Some("Japan".into()),
///     budget: Some(2500.0),
///     is_shared: false,
/// };
/// store.insert_trip(trip.clone()).await.unwrap();
///
/// let gate = AuthorizationGate::new(
///     store.clone(),
///     store.clone(),
///     ShareEnforcement::RecordOnly,
///     Auditor::new(),
/// );
///
/// let admission = gate
///     .authorize(&owner, Operation::Update, Target::Trip(trip.id))
///     .await
///     .unwrap();
/// assert_eq!(admission.trip().map(|t| t.id), Some(trip.id));
///
/// let stranger = Principal { id: PrincipalId::new(), ..owner.clone() };
/// assert_eq!(
///     gate.authorize(&stranger, Operation::Update, Target::Trip(trip.id)).await,
///     Err(AccessError::AccessDenied)
/// );
/// # });
/// ```
pub struct AuthorizationGate {
    trips: Arc<dyn TripStore>,
    shares: Arc<dyn ShareStore>,
    share_enforcement: ShareEnforcement,
    auditor: Auditor,
}

/// Target after its stored rows have been looked up.
struct Resolved {
    kind: ResourceKind,
    /// False when the named row does not exist
    exists: bool,
    trip: Option<Trip>,
    /// `user_id` of a principal-owned child row
    item_owner: Option<PrincipalId>,
    recommendation: Option<Recommendation>,
}

impl Resolved {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            exists: true,
            trip: None,
            item_owner: None,
            recommendation: None,
        }
    }

    fn missing(kind: ResourceKind) -> Self {
        Self {
            exists: false,
            ..Self::new(kind)
        }
    }

    fn with_trip(mut self, trip: Option<Trip>) -> Self {
        self.exists = trip.is_some();
        self.trip = trip;
        self
    }
}

impl AuthorizationGate {
    pub fn new(
        trips: Arc<dyn TripStore>,
        shares: Arc<dyn ShareStore>,
        share_enforcement: ShareEnforcement,
        auditor: Auditor,
    ) -> Self {
        Self {
            trips,
            shares,
            share_enforcement,
            auditor,
        }
    }

    pub fn share_enforcement(&self) -> ShareEnforcement {
        self.share_enforcement
    }

    /// Decides whether `principal` may perform `operation` on `target`.
    ///
    /// # Errors
    ///
    /// - [`AccessError::AccountDisabled`] for a deactivated principal
    /// - [`AccessError::AccessDenied`] when the rule is not met or the named
    ///   row does not exist
    /// - [`AccessError::ValidationFailed`] when the operation does not exist
    ///   for the target kind
    /// - [`AccessError::UpstreamFailure`] when a lookup fails
    pub async fn authorize(
        &self,
        principal: &Principal,
        operation: Operation,
        target: Target,
    ) -> AccessResult<Admission> {
        let result = self.decide(principal, operation, target).await;
        self.record(principal, operation, &target, &result);
        result
    }

    /// [`authorize`](Self::authorize), then returns the trip the decision was
    /// derived from.
    ///
    /// For a child, recommendation or grant target this is the trip named by
    /// the stored row. Targets without a parent trip are refused with
    /// [`AccessError::ValidationFailed`].
    pub async fn authorize_and_load_parent_trip(
        &self,
        principal: &Principal,
        operation: Operation,
        target: Target,
    ) -> AccessResult<TripRef> {
        let admission = self.authorize(principal, operation, target).await?;
        admission
            .trip()
            .ok_or_else(|| AccessError::ValidationFailed(format!("{target} has no parent trip")))
    }

    async fn decide(
        &self,
        principal: &Principal,
        operation: Operation,
        target: Target,
    ) -> AccessResult<Admission> {
        if !principal.is_active {
            return Err(AccessError::AccountDisabled);
        }
        // A single recommendation's kind is only known once it is loaded.
        if !matches!(target, Target::Recommendation(_)) {
            unsupported(target.kind(), operation)?;
        }

        let resolved = self.resolve(target).await?;
        unsupported(resolved.kind, operation)?;
        let rule = rule_for(resolved.kind, operation);

        if !resolved.exists {
            return Err(AccessError::AccessDenied);
        }

        let via = match rule {
            Rule::AnyPrincipal => Some(AdmittedVia::AnyPrincipal),
            Rule::TripOwner => self.trip_access(principal, operation, &resolved).await?,
            Rule::TripAndItemOwner => {
                if resolved.item_owner == Some(principal.id) {
                    self.trip_access(principal, operation, &resolved).await?
                } else {
                    None
                }
            }
            Rule::CreatorOrAdmin => {
                let created = resolved
                    .recommendation
                    .as_ref()
                    .is_some_and(|rec| rec.is_owned_by(principal.id));
                if created {
                    Some(AdmittedVia::Creator)
                } else if principal.role == Role::Admin {
                    Some(AdmittedVia::Admin)
                } else {
                    None
                }
            }
            Rule::Unsupported => None,
        };

        match via {
            Some(via) => Ok(Admission {
                principal: principal.id,
                kind: resolved.kind,
                operation,
                trip: resolved.trip.as_ref().map(TripRef::from),
                via,
                _private: (),
            }),
            None => Err(AccessError::AccessDenied),
        }
    }

    /// Owner check on the resolved trip, with the share ledger as a second
    /// path when enforcement is on.
    async fn trip_access(
        &self,
        principal: &Principal,
        operation: Operation,
        resolved: &Resolved,
    ) -> AccessResult<Option<AdmittedVia>> {
        let Some(trip) = &resolved.trip else {
            return Ok(None);
        };

        if trip.is_owned_by(principal.id) {
            return Ok(Some(AdmittedVia::Owner));
        }
        if self.share_enforcement != ShareEnforcement::Enforced {
            return Ok(None);
        }

        let grant = self
            .shares
            .grant_for(trip.id, &normalize_email(&principal.email))
            .await?;

        Ok(grant
            .filter(|g| share_admits(resolved.kind, operation, g.permission))
            .map(|g| AdmittedVia::Share(g.permission)))
    }

    async fn resolve(&self, target: Target) -> AccessResult<Resolved> {
        let resolved = match target {
            Target::NewTrip => Resolved::new(ResourceKind::Trip),
            Target::Trip(id) => {
                Resolved::new(ResourceKind::Trip).with_trip(self.trips.trip(id).await?)
            }
            Target::TripStats(id) => {
                Resolved::new(ResourceKind::TripStats).with_trip(self.trips.trip(id).await?)
            }
            Target::TripChildren { kind, trip_id } => {
                Resolved::new(ResourceKind::Child(kind)).with_trip(self.trips.trip(trip_id).await?)
            }
            Target::Child { kind, id } => match self.trips.child(kind, id).await? {
                Some(row) => {
                    let mut resolved = Resolved::new(ResourceKind::Child(kind))
                        .with_trip(self.trips.trip(row.trip_id).await?);
                    resolved.item_owner = row.user_id;
                    resolved
                }
                None => Resolved::missing(ResourceKind::Child(kind)),
            },
            Target::TripRecommendations(trip_id) => Resolved::new(ResourceKind::TripRecommendation)
                .with_trip(self.trips.trip(trip_id).await?),
            Target::Recommendations => Resolved::new(ResourceKind::GlobalRecommendation),
            Target::Recommendation(id) => match self.trips.recommendation(id).await? {
                Some(rec) => {
                    let mut resolved = match rec.trip_id {
                        Some(trip_id) => Resolved::new(ResourceKind::TripRecommendation)
                            .with_trip(self.trips.trip(trip_id).await?),
                        None => Resolved::new(ResourceKind::GlobalRecommendation),
                    };
                    resolved.recommendation = Some(rec);
                    resolved
                }
                None => Resolved::missing(ResourceKind::GlobalRecommendation),
            },
            Target::TripShares(trip_id) => {
                Resolved::new(ResourceKind::ShareGrant).with_trip(self.trips.trip(trip_id).await?)
            }
            Target::Share(id) => match self.shares.grant(id).await? {
                Some(grant) => Resolved::new(ResourceKind::ShareGrant)
                    .with_trip(self.trips.trip(grant.trip_id).await?),
                None => Resolved::missing(ResourceKind::ShareGrant),
            },
        };
        Ok(resolved)
    }

    fn record(
        &self,
        principal: &Principal,
        operation: Operation,
        target: &Target,
        result: &AccessResult<Admission>,
    ) {
        let mut event = match result {
            Ok(admission) => {
                tracing::debug!(
                    principal = %principal.id,
                    kind = %admission.kind,
                    operation = %operation,
                    via = %admission.via,
                    "request admitted"
                );
                let mut event = AuditEvent::new(
                    Some(principal.id.to_string()),
                    AuditEventKind::Authorization,
                    AuditOutcome::Admitted,
                )
                .with_action(action_label(admission.kind, operation))
                .with_reason(admission.via.to_string());
                if let Some(trip) = admission.trip {
                    event = event.with_trip_id(trip.id.to_string());
                }
                event
            }
            Err(err) => {
                tracing::warn!(
                    principal = %principal.id,
                    operation = %operation,
                    resource = %target,
                    reason = err.code(),
                    "request refused"
                );
                let outcome = if err.is_denial() {
                    AuditOutcome::Denied
                } else {
                    AuditOutcome::Error
                };
                AuditEvent::new(
                    Some(principal.id.to_string()),
                    AuditEventKind::Authorization,
                    outcome,
                )
                .with_action(action_label(target.kind(), operation))
                .with_reason(err.code())
            }
        };

        if let Some(resource_id) = target.resource_id() {
            event = event.with_resource_id(resource_id);
        }
        self.auditor.emit(event);
    }
}
