//! User model and referral graph node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Platform roles. The admin is the conceptual root of the referral graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Whether a node with this role terminates a commission chain.
    ///
    /// The root absorbs base cost and never earns commission. Kept as a
    /// predicate so future root-like roles compose without touching the
    /// walker.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform user.
///
/// `referral_code` is the public traversal key; `referred_by` stores the
/// *code* of the upstream user, never an id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub role: String,
    pub approved: bool,
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Get parsed role.
    pub fn parsed_role(&self) -> Option<UserRole> {
        match self.role.as_str() {
            "admin" => Some(UserRole::Admin),
            "user" => Some(UserRole::User),
            _ => None,
        }
    }

    /// Whether this user terminates a commission chain.
    pub fn is_terminal(&self) -> bool {
        self.parsed_role().map(|r| r.is_terminal()).unwrap_or(false)
    }
}
