//! API key issuance and bookkeeping.
//!
//! # Key format
//!
//! `qrg_<environment>_<64 hex chars>`, e.g. `qrg_live_3f9a...`. The first
//! 16 characters are stored as `key_prefix` for display; the whole key is
//! stored only as its SHA-256 hash.

use sha2::{Digest, Sha256};
use sqlx::{PgConnection, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::api_key::{
        API_KEY_COLUMNS, ApiKey, DEFAULT_PERMISSIONS, IssuedApiKey, KeyEnvironment, NewApiKey,
    },
};

/// Number of leading secret characters kept as the display prefix.
pub const KEY_PREFIX_LEN: usize = 16;

const NAME_MAX_LEN: usize = 100;

/// Secret plus the two values derived from it.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub secret: String,
    pub prefix: String,
    pub hash: String,
}

/// Generate a new secret for `environment` (32 random bytes).
pub fn generate_key_material(environment: KeyEnvironment) -> KeyMaterial {
    let bytes: [u8; 32] = rand::random();
    let secret = format!("qrg_{}_{}", environment.as_str(), hex::encode(bytes));
    let prefix = secret[..KEY_PREFIX_LEN].to_string();
    let hash = hash_secret(&secret);

    KeyMaterial {
        secret,
        prefix,
        hash,
    }
}

/// SHA-256 of the secret, hex encoded (64 characters).
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Issue a key for an account.
///
/// Returns the stored record together with the plaintext secret; this is the
/// only time the secret is available.
///
/// # Errors
///
/// - `InvalidRequest`: name is blank or longer than 100 characters
/// - `Database`: the owning account does not exist (foreign key) or the store failed
pub async fn issue_api_key(
    conn: &mut PgConnection,
    new: NewApiKey,
) -> Result<IssuedApiKey, AppError> {
    let name = new.name.trim();
    if name.is_empty() || name.chars().count() > NAME_MAX_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Key name must be 1-{NAME_MAX_LEN} characters"
        )));
    }

    let material = generate_key_material(new.environment);
    let permissions = new
        .permissions
        .unwrap_or_else(|| DEFAULT_PERMISSIONS.map(String::from).to_vec());

    let sql = format!(
        r#"
        INSERT INTO api_keys (
            user_id,
            name,
            key_prefix,
            key_hash,
            environment,
            permissions,
            ip_allowlist,
            expires_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {API_KEY_COLUMNS}
        "#
    );

    let key = sqlx::query_as::<_, ApiKey>(&sql)
        .bind(new.user_id)
        .bind(name)
        .bind(&material.prefix)
        .bind(&material.hash)
        .bind(new.environment.as_str())
        .bind(Json(&permissions))
        .bind(&new.ip_allowlist)
        .bind(new.expires_at)
        .fetch_one(&mut *conn)
        .await?;

    tracing::info!(
        key_id = %key.id,
        user_id = %key.user_id,
        prefix = %key.key_prefix,
        "API key issued"
    );

    Ok(IssuedApiKey {
        key,
        secret: material.secret,
    })
}

/// Find the usable key matching a presented secret.
///
/// Revoked and expired keys never match, nor do keys of a closed
/// (soft-deleted) account.
pub async fn find_active_by_secret(
    conn: &mut PgConnection,
    secret: &str,
) -> Result<Option<ApiKey>, AppError> {
    let sql = format!(
        r#"
        SELECT {API_KEY_COLUMNS}
        FROM api_keys
        WHERE key_hash = $1
          AND revoked_at IS NULL
          AND (expires_at IS NULL OR expires_at > NOW())
          AND EXISTS (
              SELECT 1 FROM users
              WHERE users.id = api_keys.user_id AND users.deleted_at IS NULL
          )
        "#
    );

    let key = sqlx::query_as::<_, ApiKey>(&sql)
        .bind(hash_secret(secret))
        .fetch_optional(&mut *conn)
        .await?;

    Ok(key)
}

/// Record a use of the key.
pub async fn touch_last_used(conn: &mut PgConnection, key_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
        .bind(key_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("API key"));
    }

    Ok(())
}

/// Revoke a key owned by `user_id`.
///
/// Revocation is permanent and idempotent: revoking again keeps the first
/// `revoked_at`. The row is kept.
pub async fn revoke_api_key(
    conn: &mut PgConnection,
    user_id: Uuid,
    key_id: Uuid,
) -> Result<ApiKey, AppError> {
    let sql = format!(
        r#"
        UPDATE api_keys
        SET revoked_at = COALESCE(revoked_at, NOW())
        WHERE id = $1 AND user_id = $2
        RETURNING {API_KEY_COLUMNS}
        "#
    );

    let key = sqlx::query_as::<_, ApiKey>(&sql)
        .bind(key_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("API key"))?;

    tracing::info!(%key_id, %user_id, "API key revoked");

    Ok(key)
}

/// All keys of an account, revoked ones included, newest first.
pub async fn list_api_keys(conn: &mut PgConnection, user_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
    let sql = format!(
        "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC"
    );

    let keys = sqlx::query_as::<_, ApiKey>(&sql)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(keys)
}
