//! Records the access-control core reads from its collaborators.
//!
//! Only the fields that take part in an authorization decision or an
//! aggregation are modelled; everything else a row carries belongs to the
//! route layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// Identifier of a [`Principal`].
    PrincipalId
);
id_type!(
    /// Identifier of a [`Trip`].
    TripId
);
id_type!(
    /// Identifier of a child record (itinerary item, expense, ...).
    RecordId
);
id_type!(
    /// Identifier of a [`ShareGrant`].
    GrantId
);

/// Lowercases and trims an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Role of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Regular account
    User,
    /// May manage other accounts
    Admin,
    /// Any other role string the store carries
    Other(String),
}

impl Role {
    /// Returns the role's wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Other(name) => name,
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "user" => Role::User,
            "admin" => Role::Admin,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account that can authenticate.
///
/// The password hash is not part of this record; it is fetched separately by
/// [`Accounts`](crate::accounts::Accounts) so that a resolved principal can be
/// handed around and logged without carrying credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier
    pub id: PrincipalId,
    /// Login email, stored normalized
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Account role
    pub role: Role,
    /// Deactivated accounts cannot authenticate
    pub is_active: bool,
}

/// Top-level owned resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    /// Set at creation, never transferred
    pub owner_id: PrincipalId,
    pub title: String,
    pub destination_country: Option<String>,
    pub budget: Option<f64>,
    /// Flipped on when the first share grant is recorded
    pub is_shared: bool,
}

/// How a child kind derives its authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOwnership {
    /// Only the parent trip's owner matters
    TripOwned,
    /// The row carries its own `user_id` which must match as well
    PrincipalOwned,
}

/// Kinds of records nested under a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    Itinerary,
    Packing,
    Expense,
    Document,
    Review,
    Reminder,
}

impl ChildKind {
    /// All child kinds.
    pub const ALL: [ChildKind; 6] = [
        ChildKind::Itinerary,
        ChildKind::Packing,
        ChildKind::Expense,
        ChildKind::Document,
        ChildKind::Review,
        ChildKind::Reminder,
    ];

    pub fn ownership(self) -> ChildOwnership {
        match self {
            ChildKind::Itinerary | ChildKind::Packing => ChildOwnership::TripOwned,
            ChildKind::Expense | ChildKind::Document | ChildKind::Review | ChildKind::Reminder => {
                ChildOwnership::PrincipalOwned
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChildKind::Itinerary => "itinerary",
            ChildKind::Packing => "packing",
            ChildKind::Expense => "expense",
            ChildKind::Document => "document",
            ChildKind::Review => "review",
            ChildKind::Reminder => "reminder",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ownership-relevant projection of any child row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRecord {
    pub id: RecordId,
    pub kind: ChildKind,
    /// Parent trip as stored; the only trip id trusted for existing rows
    pub trip_id: TripId,
    /// Present on principal-owned kinds
    pub user_id: Option<PrincipalId>,
}

/// Expense row as read by the reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: RecordId,
    pub trip_id: TripId,
    pub user_id: PrincipalId,
    pub category: String,
    /// Missing or non-finite amounts count as zero
    pub amount: Option<f64>,
}

impl Expense {
    /// Amount used in sums.
    pub fn effective_amount(&self) -> f64 {
        match self.amount {
            Some(value) if value.is_finite() => value,
            _ => 0.0,
        }
    }
}

/// Packing-list row as read by the reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingItem {
    pub id: RecordId,
    pub trip_id: TripId,
    pub is_packed: bool,
}

/// Activity recommendation, either tied to a trip or global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecordId,
    /// `None` for a global recommendation
    pub trip_id: Option<TripId>,
    pub title: String,
    pub destination: Option<String>,
    pub created_by: PrincipalId,
}

/// Level of access a share grant records.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    View,
    Edit,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Edit => "edit",
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "view" => Ok(Permission::View),
            "edit" => Ok(Permission::Edit),
            other => Err(format!("unknown permission '{other}'")),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded grant of access to a trip for a collaborator email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub id: GrantId,
    pub trip_id: TripId,
    /// Owner who recorded the grant
    pub shared_by: PrincipalId,
    /// Normalized collaborator email
    pub shared_with_email: String,
    pub permission: Permission,
}

/// Grant to upsert; keyed by `(trip_id, shared_with_email)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShareGrant {
    pub trip_id: TripId,
    pub shared_by: PrincipalId,
    pub shared_with_email: String,
    pub permission: Permission,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_kinds_split_into_two_ownership_models() {
        let trip_owned: Vec<_> = ChildKind::ALL
            .iter()
            .filter(|k| k.ownership() == ChildOwnership::TripOwned)
            .collect();

        assert_eq!(trip_owned, vec![&ChildKind::Itinerary, &ChildKind::Packing]);
        assert_eq!(ChildKind::Reminder.ownership(), ChildOwnership::PrincipalOwned);
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(Role::from("Admin"), Role::Admin);
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("Planner"), Role::Other("planner".to_string()));
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  U2@Example.COM "), "u2@example.com");
    }

    #[test]
    fn non_numeric_amounts_count_as_zero() {
        let mut expense = Expense {
            id: RecordId::new(),
            trip_id: TripId::new(),
            user_id: PrincipalId::new(),
            category: "food".to_string(),
            amount: None,
        };
        assert_eq!(expense.effective_amount(), 0.0);

        expense.amount = Some(f64::NAN);
        assert_eq!(expense.effective_amount(), 0.0);

        expense.amount = Some(12.5);
        assert_eq!(expense.effective_amount(), 12.5);
    }

    #[test]
    fn permission_round_trips_through_strings() {
        assert_eq!("EDIT".parse::<Permission>(), Ok(Permission::Edit));
        assert!("owner".parse::<Permission>().is_err());
        assert_eq!(Permission::default(), Permission::View);
    }

    #[test]
    fn ids_parse_from_strings() {
        let id = TripId::new();
        let parsed: TripId = id.to_string().parse().expect("valid uuid");
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<TripId>().is_err());
    }
}
