//! Account data model.
//!
//! This module defines:
//! - `Plan`: subscription tier, constrained by `ck_users_plan`
//! - `User`: database entity representing a registered account
//! - `NewUser`: values needed to insert an account

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use super::{UnknownVariant, try_get_parsed};

/// Subscription tier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Business,
    Enterprise,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Pro, Plan::Business, Plan::Enterprise];

    pub const fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Business => "business",
            Plan::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plan::ALL
            .into_iter()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "plan",
                value: s.to_string(),
            })
    }
}

/// Column list selected for every `User` query.
pub const USER_COLUMNS: &str = "id, email, email_verified, password_hash, name, avatar_url, plan, \
     settings, last_login_at, created_at, updated_at, deleted_at";

/// Represents an account record from the `users` table.
///
/// # Lifecycle
///
/// - Created at registration
/// - `last_login_at` touched on login, profile and settings edited in place
/// - Closed by setting `deleted_at`; the row stays
///
/// Physically deleting the row also deletes every API key and QR code it
/// owns (`ON DELETE CASCADE`).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,

    /// Unique across all rows, soft-deleted ones included
    pub email: String,

    pub email_verified: bool,

    /// Never serialized into responses
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Display name
    pub name: String,

    pub avatar_url: Option<String>,

    pub plan: Plan,

    /// Free-form user preferences
    pub settings: Map<String, Value>,

    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Set when the account is closed
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            email_verified: row.try_get("email_verified")?,
            password_hash: row.try_get("password_hash")?,
            name: row.try_get("name")?,
            avatar_url: row.try_get("avatar_url")?,
            plan: try_get_parsed(row, "plan")?,
            settings: row.try_get::<Json<Map<String, Value>>, _>("settings")?.0,
            last_login_at: row.try_get("last_login_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

/// Values for a new account.
///
/// The password must already be hashed; this layer never sees plaintext.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

/// Editable profile fields. `None` leaves the column unchanged.
///
/// `avatar_url` is nullable, so it has three states: absent (`None`),
/// cleared (`Some(None)`, JSON `null`) or set (`Some(Some(url))`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub avatar_url: Option<Option<String>>,
    pub email_verified: Option<bool>,
}

/// Wraps any value that is present, `null` included, in `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
