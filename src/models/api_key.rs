//! API Key model for programmatic access.
//!
//! API keys belong to one account. Only a SHA-256 hash of the secret and a
//! short display prefix are stored; the secret itself is shown once at issue time.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use super::{UnknownVariant, try_get_parsed};

/// Permissions granted when none are requested (mirrors the column default).
pub const DEFAULT_PERMISSIONS: [&str; 2] = ["qr:read", "qr:write"];

/// Environment a key is valid in, constrained by `ck_api_keys_environment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEnvironment {
    #[default]
    Live,
    Test,
}

impl KeyEnvironment {
    pub const fn as_str(self) -> &'static str {
        match self {
            KeyEnvironment::Live => "live",
            KeyEnvironment::Test => "test",
        }
    }
}

impl fmt::Display for KeyEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyEnvironment {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(KeyEnvironment::Live),
            "test" => Ok(KeyEnvironment::Test),
            other => Err(UnknownVariant {
                kind: "key environment",
                value: other.to_string(),
            }),
        }
    }
}

/// Column list selected for every `ApiKey` query.
pub const API_KEY_COLUMNS: &str = "id, user_id, name, key_prefix, key_hash, environment, \
     permissions, ip_allowlist, last_used_at, expires_at, created_at, revoked_at";

/// Represents an API key record from the `api_keys` table.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKey {
    pub id: Uuid,

    /// Owning account; the key is deleted with it
    pub user_id: Uuid,

    /// Human-readable label
    pub name: String,

    /// First characters of the secret, safe to display and used to narrow lookups
    pub key_prefix: String,

    /// SHA-256 hash of the secret (64 hex characters)
    #[serde(skip_serializing)]
    pub key_hash: String,

    pub environment: KeyEnvironment,

    pub permissions: Vec<String>,

    /// Source addresses allowed to use the key; `None` means any
    pub ip_allowlist: Option<Vec<String>>,

    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,

    /// Once set the key is unusable for good; the row is kept for auditing
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Neither revoked nor expired at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}

impl<'r> FromRow<'r, PgRow> for ApiKey {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            key_prefix: row.try_get("key_prefix")?,
            key_hash: row.try_get("key_hash")?,
            environment: try_get_parsed(row, "environment")?,
            permissions: row.try_get::<Json<Vec<String>>, _>("permissions")?.0,
            ip_allowlist: row.try_get("ip_allowlist")?,
            last_used_at: row.try_get("last_used_at")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
            revoked_at: row.try_get("revoked_at")?,
        })
    }
}

/// Values for a new API key. The secret is generated by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct NewApiKey {
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub environment: KeyEnvironment,
    /// `None` keeps the column default (`DEFAULT_PERMISSIONS`)
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub ip_allowlist: Option<Vec<String>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewApiKey {
    pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            environment: KeyEnvironment::default(),
            permissions: None,
            ip_allowlist: None,
            expires_at: None,
        }
    }
}

/// A freshly issued key: the stored record plus the plaintext secret.
///
/// The secret cannot be recovered later.
#[derive(Debug, Serialize)]
pub struct IssuedApiKey {
    #[serde(flatten)]
    pub key: ApiKey,
    pub secret: String,
}
