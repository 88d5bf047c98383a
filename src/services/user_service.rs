//! Account persistence.
//!
//! Reads and writes `users` rows. Closing an account is a soft delete;
//! `delete_user` is the physical delete that cascades to owned rows.

use serde_json::{Map, Value};
use sqlx::{PgConnection, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::user::{NewUser, Plan, ProfileUpdate, USER_COLUMNS, User},
};

/// Insert a new account.
///
/// # Errors
///
/// - `InvalidRequest`: email or name is blank
/// - `Conflict`: the email is already registered (`ix_users_email`)
pub async fn create_user(conn: &mut PgConnection, new: NewUser) -> Result<User, AppError> {
    if new.email.trim().is_empty() {
        return Err(AppError::InvalidRequest("Email is required".to_string()));
    }
    if new.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("Name is required".to_string()));
    }

    let sql = format!(
        r#"
        INSERT INTO users (email, password_hash, name, avatar_url, plan, settings)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "#
    );

    let user = sqlx::query_as::<_, User>(&sql)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.name)
        .bind(&new.avatar_url)
        .bind(new.plan.as_str())
        .bind(Json(&new.settings))
        .fetch_one(&mut *conn)
        .await?;

    tracing::info!(user_id = %user.id, plan = %user.plan, "account created");

    Ok(user)
}

/// Load an open (not soft-deleted) account.
pub async fn get_user(conn: &mut PgConnection, user_id: Uuid) -> Result<User, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");

    sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Look up an open account by email.
pub async fn find_user_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<Option<User>, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL");

    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(user)
}

/// Stamp `last_login_at` (and `updated_at`) with the current time.
pub async fn record_login(conn: &mut PgConnection, user_id: Uuid) -> Result<User, AppError> {
    let sql = format!(
        r#"
        UPDATE users
        SET last_login_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {USER_COLUMNS}
        "#
    );

    sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Apply the provided profile fields, leaving the others as they are.
///
/// `avatar_url: Some(None)` clears the avatar.
pub async fn update_profile(
    conn: &mut PgConnection,
    user_id: Uuid,
    update: ProfileUpdate,
) -> Result<User, AppError> {
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::InvalidRequest("Name cannot be blank".to_string()));
    }

    let sql = format!(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            avatar_url = CASE WHEN $3 THEN $4 ELSE avatar_url END,
            email_verified = COALESCE($5, email_verified),
            updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {USER_COLUMNS}
        "#
    );

    sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .bind(update.name)
        .bind(update.avatar_url.is_some())
        .bind(update.avatar_url.flatten())
        .bind(update.email_verified)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Replace the settings mapping wholesale.
pub async fn update_settings(
    conn: &mut PgConnection,
    user_id: Uuid,
    settings: &Map<String, Value>,
) -> Result<User, AppError> {
    let sql = format!(
        r#"
        UPDATE users
        SET settings = $2, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {USER_COLUMNS}
        "#
    );

    sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .bind(Json(settings))
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("User"))
}

pub async fn set_plan(conn: &mut PgConnection, user_id: Uuid, plan: Plan) -> Result<User, AppError> {
    let sql = format!(
        r#"
        UPDATE users
        SET plan = $2, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {USER_COLUMNS}
        "#
    );

    let user = sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .bind(plan.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    tracing::info!(user_id = %user.id, plan = %plan, "plan changed");

    Ok(user)
}

/// Close an account (soft delete).
///
/// The row and everything it owns stay in place. Closing an already closed
/// account keeps the original `deleted_at`. Its API keys stop matching in
/// [`find_active_by_secret`](super::api_key_service::find_active_by_secret).
pub async fn soft_delete_user(conn: &mut PgConnection, user_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE users SET deleted_at = COALESCE(deleted_at, NOW()), updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User"));
    }

    tracing::info!(%user_id, "account closed");

    Ok(())
}

/// Physically delete an account.
///
/// The database removes the account's API keys and QR codes with it
/// (`ON DELETE CASCADE`).
pub async fn delete_user(conn: &mut PgConnection, user_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User"));
    }

    tracing::warn!(%user_id, "account purged");

    Ok(())
}
