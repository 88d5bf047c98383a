//! QR code record persistence.
//!
//! Stores what a code encodes and where its renders live. Deleting is a
//! soft delete; soft-deleted records are invisible to every read here.

use sha2::{Digest, Sha256};
use sqlx::{PgConnection, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::qr_code::{NewQrCode, QR_CODE_COLUMNS, QrCode, SHORT_CODE_MAX_LEN},
};

const NAME_MAX_LEN: usize = 100;

/// SHA-256 of the payload, hex encoded.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

fn validate_new(new: &NewQrCode) -> Result<(), AppError> {
    if new.content.is_empty() {
        return Err(AppError::InvalidRequest("Content is required".to_string()));
    }
    if let Some(code) = &new.short_code {
        if code.is_empty() || code.chars().count() > SHORT_CODE_MAX_LEN {
            return Err(AppError::InvalidRequest(format!(
                "Short code must be 1-{SHORT_CODE_MAX_LEN} characters"
            )));
        }
    }
    if new
        .name
        .as_deref()
        .is_some_and(|n| n.chars().count() > NAME_MAX_LEN)
    {
        return Err(AppError::InvalidRequest(format!(
            "Name must be at most {NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

/// Insert a QR code record.
///
/// # Errors
///
/// - `InvalidRequest`: empty content, or short code / name out of bounds
/// - `Conflict`: the short code is taken (`ix_qr_codes_short_code`)
pub async fn create_qr_code(conn: &mut PgConnection, new: NewQrCode) -> Result<QrCode, AppError> {
    validate_new(&new)?;

    let sql = format!(
        r#"
        INSERT INTO qr_codes (
            user_id,
            type,
            content,
            content_hash,
            is_dynamic,
            short_code,
            options,
            name,
            folder_id,
            tags,
            expires_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {QR_CODE_COLUMNS}
        "#
    );

    let qr = sqlx::query_as::<_, QrCode>(&sql)
        .bind(new.user_id)
        .bind(new.qr_type.as_str())
        .bind(&new.content)
        .bind(content_hash(&new.content))
        .bind(new.is_dynamic)
        .bind(&new.short_code)
        .bind(Json(&new.options))
        .bind(&new.name)
        .bind(new.folder_id)
        .bind(&new.tags)
        .bind(new.expires_at)
        .fetch_one(&mut *conn)
        .await?;

    tracing::info!(qr_id = %qr.id, user_id = %qr.user_id, qr_type = %qr.qr_type, "QR code created");

    Ok(qr)
}

pub async fn get_qr_code(conn: &mut PgConnection, qr_id: Uuid) -> Result<QrCode, AppError> {
    let sql = format!("SELECT {QR_CODE_COLUMNS} FROM qr_codes WHERE id = $1 AND deleted_at IS NULL");

    sqlx::query_as::<_, QrCode>(&sql)
        .bind(qr_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("QR code"))
}

/// Look up a record by its short code.
///
/// Inactive and expired records are still returned; deciding what to do
/// with them is up to the caller.
pub async fn find_by_short_code(
    conn: &mut PgConnection,
    short_code: &str,
) -> Result<Option<QrCode>, AppError> {
    let sql = format!(
        "SELECT {QR_CODE_COLUMNS} FROM qr_codes WHERE short_code = $1 AND deleted_at IS NULL"
    );

    let qr = sqlx::query_as::<_, QrCode>(&sql)
        .bind(short_code)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(qr)
}

/// Replace the encoded payload, keeping `id` and `short_code`.
pub async fn update_content(
    conn: &mut PgConnection,
    qr_id: Uuid,
    content: &str,
) -> Result<QrCode, AppError> {
    if content.is_empty() {
        return Err(AppError::InvalidRequest("Content is required".to_string()));
    }

    let sql = format!(
        r#"
        UPDATE qr_codes
        SET content = $2, content_hash = $3, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {QR_CODE_COLUMNS}
        "#
    );

    sqlx::query_as::<_, QrCode>(&sql)
        .bind(qr_id)
        .bind(content)
        .bind(content_hash(content))
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("QR code"))
}

/// Record where the render for `format` (e.g. `png`) was stored.
///
/// Other formats already in `storage_paths` are kept.
pub async fn set_storage_path(
    conn: &mut PgConnection,
    qr_id: Uuid,
    format: &str,
    location: &str,
) -> Result<QrCode, AppError> {
    let sql = format!(
        r#"
        UPDATE qr_codes
        SET storage_paths = storage_paths || jsonb_build_object($2::text, $3::text),
            updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {QR_CODE_COLUMNS}
        "#
    );

    sqlx::query_as::<_, QrCode>(&sql)
        .bind(qr_id)
        .bind(format)
        .bind(location)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("QR code"))
}

pub async fn set_active(
    conn: &mut PgConnection,
    qr_id: Uuid,
    is_active: bool,
) -> Result<QrCode, AppError> {
    let sql = format!(
        r#"
        UPDATE qr_codes
        SET is_active = $2, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {QR_CODE_COLUMNS}
        "#
    );

    sqlx::query_as::<_, QrCode>(&sql)
        .bind(qr_id)
        .bind(is_active)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("QR code"))
}

/// Records owned by `user_id`, newest first, optionally only those tagged `tag`.
pub async fn list_qr_codes(
    conn: &mut PgConnection,
    user_id: Uuid,
    tag: Option<&str>,
) -> Result<Vec<QrCode>, AppError> {
    // tags @> ARRAY[...] can use the GIN index on tags
    let sql = format!(
        r#"
        SELECT {QR_CODE_COLUMNS}
        FROM qr_codes
        WHERE user_id = $1
          AND deleted_at IS NULL
          AND ($2::text IS NULL OR tags @> ARRAY[$2::text])
        ORDER BY created_at DESC
        "#
    );

    let codes = sqlx::query_as::<_, QrCode>(&sql)
        .bind(user_id)
        .bind(tag)
        .fetch_all(&mut *conn)
        .await?;

    Ok(codes)
}

/// Soft-delete a record. The short code stays reserved.
pub async fn soft_delete_qr_code(conn: &mut PgConnection, qr_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE qr_codes SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(qr_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("QR code"));
    }

    tracing::info!(%qr_id, "QR code deleted");

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::models::qr_code::QrType;

    use super::*;

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("https://example.com"), content_hash("https://example.com"));
        assert_ne!(content_hash("a"), content_hash("b"));
        assert_eq!(content_hash("").len(), 64);
    }

    #[test]
    fn rejects_oversized_short_code() {
        let new = NewQrCode::new(Uuid::new_v4(), QrType::Url, "https://example.com")
            .dynamic("abcdefghijk");
        assert!(matches!(validate_new(&new), Err(AppError::InvalidRequest(_))));
    }

    #[test]
    fn rejects_empty_short_code_and_content() {
        let new = NewQrCode::new(Uuid::new_v4(), QrType::Url, "https://example.com").dynamic("");
        assert!(validate_new(&new).is_err());

        let new = NewQrCode::new(Uuid::new_v4(), QrType::Text, "");
        assert!(validate_new(&new).is_err());
    }

    #[test]
    fn accepts_static_and_dynamic_codes() {
        let user_id = Uuid::new_v4();
        assert!(validate_new(&NewQrCode::new(user_id, QrType::Text, "hello")).is_ok());
        assert!(
            validate_new(&NewQrCode::new(user_id, QrType::Url, "https://x.io").dynamic("x1"))
                .is_ok()
        );
    }
}
