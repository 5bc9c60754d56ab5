//! Ownership-based access control for a multi-tenant trip planning backend.
//!
//! Principals own trips; trips own nested rows (itinerary items, packing
//! items, expenses, documents, reviews, reminders), recommendations and share
//! grants. Every request goes through the same steps:
//!
//! 1. [`PrincipalResolver`] turns a bearer credential into an active
//!    [`Principal`].
//! 2. [`AuthorizationGate`] looks up the stored ownership fields of the
//!    [`Target`] and applies the rule [`rule_for`] assigns to the resource
//!    kind and [`Operation`].
//! 3. On admission the caller receives an [`Admission`] and may run the data
//!    operation; on denial nothing is touched.
//!
//! # Core Types
//!
//! - [`AccessControl`]: every component wired from one [`AccessConfig`]
//! - [`OwnershipVerifier`]: "does this principal own this trip?"
//! - [`ShareLedger`]: per-trip, per-email view/edit grants
//! - [`Reporter`]: trip statistics and spend summaries, admitted first
//! - [`Accounts`]: registration, login and admin account management
//! - [`Secret<T>`]: wrapper that redacts credential material in logs
//!
//! Persistence is reached through the [`PrincipalStore`], [`TripStore`] and
//! [`ShareStore`] traits. [`MemoryStore`] implements all three.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use trip_access::{
//!     AccessConfig, AccessControl, AccessError, ChildKind, MemoryStore, Operation, Target,
//!     Trip, TripId, TripStore,
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let access = AccessControl::new(
//!     AccessConfig::new("signing-key"),
//!     store.clone(),
//!     store.clone(),
//!     store.clone(),
//! );
//!
//! let session = access
//!     .accounts()
//!     .register("ana@example.com", "Ana", "correct horse")
//!     .await
//!     .unwrap();
//! let ana = access.authenticate(session.token.expose_secret()).await.unwrap();
//!
//! let trip = Trip {
//!     id: TripId::new(),
//!     owner_id: ana.id,
//!     title: "Andes".into(),
//!     destination_country: Some("Peru".into()),
//!     budget: Some(1200.0),
//!     is_shared: false,
//! };
//! store.insert_trip(trip.clone()).await.unwrap();
//!
//! let parent = access
//!     .authorize_and_load_parent_trip(
//!         &ana,
//!         Operation::Create,
//!         Target::TripChildren { kind: ChildKind::Packing, trip_id: trip.id },
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(parent.owner_id, ana.id);
//!
//! let stats = access.trip_stats(trip.id, &ana).await.unwrap();
//! assert_eq!(stats.remaining, 1200.0);
//!
//! assert_eq!(
//!     access.trip_stats(TripId::new(), &ana).await,
//!     Err(AccessError::AccessDenied)
//! );
//! # });
//! ```

#![forbid(unsafe_code)]

mod access;
mod accounts;
pub mod audit;
mod config;
mod error;
mod gate;
mod ledger;
mod memory;
mod model;
mod ownership;
mod policy;
mod report;
mod resolver;
mod secret;
mod store;
mod token;

pub use access::AccessControl;
pub use accounts::{Accounts, Session, MIN_NEW_PASSWORD_LEN, MIN_PASSWORD_LEN};
pub use audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail, Auditor};
pub use config::{AccessConfig, ConfigError, ShareEnforcement};
pub use error::{AccessError, AccessResult, StoreError};
pub use gate::{require_role, Admission, AdmittedVia, AuthorizationGate, Target, TripRef};
pub use ledger::ShareLedger;
pub use memory::{MemoryStore, Table};
pub use model::{
    normalize_email, ChildKind, ChildOwnership, ChildRecord, Expense, GrantId, NewShareGrant,
    PackingItem, Permission, Principal, PrincipalId, Recommendation, RecordId, Role, ShareGrant,
    Trip, TripId,
};
pub use ownership::{OwnedByPrincipal, OwnershipVerifier};
pub use policy::{action_label, rule_for, share_admits, Operation, ResourceKind, Rule};
pub use report::{spend_by_category, Reporter, TripStats};
pub use resolver::{bearer_token, PrincipalResolver};
pub use secret::Secret;
pub use store::{PrincipalStore, ShareStore, StoreResult, TripStore};
pub use token::{Claims, CredentialError, CredentialVerifier, JwtCredentials, VerifiedCredential};
