//! The authorization table.
//!
//! Every `(resource kind, operation)` pair maps to exactly one [`Rule`]. The
//! gate evaluates the rule; nothing else decides access.

use std::fmt;

use crate::model::{ChildKind, ChildOwnership, Permission};

/// What kind of resource a request touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Trip,
    /// Spend and progress figures of a trip
    TripStats,
    Child(ChildKind),
    /// Recommendations scoped to one trip
    TripRecommendation,
    /// Recommendations with no trip
    GlobalRecommendation,
    ShareGrant,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Trip => f.write_str("trip"),
            ResourceKind::TripStats => f.write_str("trip_stats"),
            ResourceKind::Child(kind) => f.write_str(kind.as_str()),
            ResourceKind::TripRecommendation => f.write_str("trip_recommendation"),
            ResourceKind::GlobalRecommendation => f.write_str("recommendation"),
            ResourceKind::ShareGrant => f.write_str("share"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition a request must meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Any authenticated, active principal
    AnyPrincipal,
    /// Requester owns the trip the target belongs to
    TripOwner,
    /// Requester owns the trip *and* the row's `user_id` is the requester
    TripAndItemOwner,
    /// Requester created the row, or is an admin
    CreatorOrAdmin,
    /// The operation does not exist for this kind
    Unsupported,
}

/// Looks up the rule for `kind` and `operation`.
///
/// Creating a trip is open to anyone; the new trip's owner is always the
/// requester. Share grants are replaced rather than updated.
pub fn rule_for(kind: ResourceKind, operation: Operation) -> Rule {
    use Operation::*;

    match (kind, operation) {
        (ResourceKind::Trip, Create) => Rule::AnyPrincipal,
        (ResourceKind::Trip, Read | Update | Delete) => Rule::TripOwner,

        (ResourceKind::TripStats, Read) => Rule::TripOwner,
        (ResourceKind::TripStats, Create | Update | Delete) => Rule::Unsupported,

        (ResourceKind::Child(child), op) => match (child.ownership(), op) {
            (ChildOwnership::TripOwned, _) => Rule::TripOwner,
            (ChildOwnership::PrincipalOwned, Create | Read) => Rule::TripOwner,
            (ChildOwnership::PrincipalOwned, Update | Delete) => Rule::TripAndItemOwner,
        },

        (ResourceKind::TripRecommendation, Read) => Rule::TripOwner,
        (ResourceKind::TripRecommendation, Create) => Rule::AnyPrincipal,
        (ResourceKind::TripRecommendation, Delete) => Rule::CreatorOrAdmin,
        (ResourceKind::TripRecommendation, Update) => Rule::Unsupported,

        (ResourceKind::GlobalRecommendation, Read | Create) => Rule::AnyPrincipal,
        (ResourceKind::GlobalRecommendation, Delete) => Rule::CreatorOrAdmin,
        (ResourceKind::GlobalRecommendation, Update) => Rule::Unsupported,

        (ResourceKind::ShareGrant, Create | Read | Delete) => Rule::TripOwner,
        (ResourceKind::ShareGrant, Update) => Rule::Unsupported,
    }
}

/// Whether a share grant with `permission` may stand in for trip ownership.
///
/// Only consulted when share enforcement is switched on. Any grant reads the
/// trip and what hangs off it. `edit` adds creating rows and updating
/// trip-owned rows. Deletes, changes to principal-owned rows, stats and
/// grants stay with the owner.
pub fn share_admits(kind: ResourceKind, operation: Operation, permission: Permission) -> bool {
    use Operation::*;

    match (kind, operation) {
        (ResourceKind::Trip, Read) => true,
        (ResourceKind::TripRecommendation, Read) => true,
        (ResourceKind::Child(_), Read) => true,
        (ResourceKind::Child(_), Create) => permission == Permission::Edit,
        (ResourceKind::Child(child), Update) => {
            permission == Permission::Edit && child.ownership() == ChildOwnership::TripOwned
        }
        _ => false,
    }
}

/// The `<kind>:<operation>` label used in logs and audit events.
pub fn action_label(kind: ResourceKind, operation: Operation) -> String {
    format!("{kind}:{operation}")
}
