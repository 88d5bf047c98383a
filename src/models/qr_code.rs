//! QR code record model.
//!
//! Only the persisted shape lives here: what was encoded, how it should be
//! rendered and where rendered files were stored. Rendering itself happens elsewhere.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use super::{UnknownVariant, try_get_parsed};

/// Maximum length of a short code (`VARCHAR(10)`).
pub const SHORT_CODE_MAX_LEN: usize = 10;

/// Kind of payload a QR code carries, constrained by `ck_qr_codes_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrType {
    Url,
    Text,
    Vcard,
    Wifi,
    Email,
    Sms,
    Phone,
    Geo,
    Image,
}

impl QrType {
    pub const ALL: [QrType; 9] = [
        QrType::Url,
        QrType::Text,
        QrType::Vcard,
        QrType::Wifi,
        QrType::Email,
        QrType::Sms,
        QrType::Phone,
        QrType::Geo,
        QrType::Image,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            QrType::Url => "url",
            QrType::Text => "text",
            QrType::Vcard => "vcard",
            QrType::Wifi => "wifi",
            QrType::Email => "email",
            QrType::Sms => "sms",
            QrType::Phone => "phone",
            QrType::Geo => "geo",
            QrType::Image => "image",
        }
    }
}

impl fmt::Display for QrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QrType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QrType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "QR code type",
                value: s.to_string(),
            })
    }
}

/// Column list selected for every `QrCode` query.
pub const QR_CODE_COLUMNS: &str = "id, user_id, type, content, content_hash, is_dynamic, \
     short_code, options, storage_paths, name, folder_id, tags, is_active, expires_at, \
     created_at, updated_at, deleted_at";

/// Represents a QR code record from the `qr_codes` table.
///
/// # Dynamic codes
///
/// A dynamic code carries a `short_code`; what the short code points at
/// (`content`) may be edited later while `id` and `short_code` stay the same.
#[derive(Debug, Clone, Serialize)]
pub struct QrCode {
    pub id: Uuid,
    pub user_id: Uuid,

    #[serde(rename = "type")]
    pub qr_type: QrType,

    /// Raw encoded payload
    pub content: String,

    /// SHA-256 of `content`, for change detection and deduplication
    pub content_hash: Option<String>,

    pub is_dynamic: bool,

    /// Unique when present
    pub short_code: Option<String>,

    /// Rendering options (colors, size, error-correction level, ...)
    pub options: Map<String, Value>,

    /// Rendered format name (e.g. `png`) to storage location
    pub storage_paths: BTreeMap<String, String>,

    pub name: Option<String>,

    /// Opaque grouping reference
    pub folder_id: Option<Uuid>,

    pub tags: Vec<String>,

    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl QrCode {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl<'r> FromRow<'r, PgRow> for QrCode {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            qr_type: try_get_parsed(row, "type")?,
            content: row.try_get("content")?,
            content_hash: row.try_get("content_hash")?,
            is_dynamic: row.try_get("is_dynamic")?,
            short_code: row.try_get("short_code")?,
            options: row.try_get::<Json<Map<String, Value>>, _>("options")?.0,
            storage_paths: row
                .try_get::<Json<BTreeMap<String, String>>, _>("storage_paths")?
                .0,
            name: row.try_get("name")?,
            folder_id: row.try_get("folder_id")?,
            tags: row.try_get("tags")?,
            is_active: row.try_get("is_active")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

/// Values for a new QR code record.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQrCode {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub qr_type: QrType,
    pub content: String,
    #[serde(default)]
    pub is_dynamic: bool,
    #[serde(default)]
    pub short_code: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub folder_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewQrCode {
    pub fn new(user_id: Uuid, qr_type: QrType, content: impl Into<String>) -> Self {
        Self {
            user_id,
            qr_type,
            content: content.into(),
            is_dynamic: false,
            short_code: None,
            options: Map::new(),
            name: None,
            folder_id: None,
            tags: Vec::new(),
            expires_at: None,
        }
    }

    /// Mark the code dynamic and give it a short code.
    pub fn dynamic(mut self, short_code: impl Into<String>) -> Self {
        self.is_dynamic = true;
        self.short_code = Some(short_code.into());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_text_round_trips() {
        for t in QrType::ALL {
            assert_eq!(t.as_str().parse::<QrType>().unwrap(), t);
        }
        assert!("barcode".parse::<QrType>().is_err());
    }

    #[test]
    fn new_record_is_deserialized_with_defaults() {
        let user_id = Uuid::new_v4();
        let new: NewQrCode = serde_json::from_value(serde_json::json!({
            "user_id": user_id,
            "type": "wifi",
            "content": "WIFI:S:home;T:WPA;P:pw;;"
        }))
        .unwrap();

        assert_eq!(new.qr_type, QrType::Wifi);
        assert!(!new.is_dynamic);
        assert!(new.short_code.is_none());
        assert!(new.tags.is_empty());
        assert!(new.options.is_empty());
    }

    #[test]
    fn builder_sets_dynamic_fields() {
        let new = NewQrCode::new(Uuid::new_v4(), QrType::Url, "https://example.com")
            .dynamic("abc123")
            .with_tags(["promo", "print"]);

        assert!(new.is_dynamic);
        assert_eq!(new.short_code.as_deref(), Some("abc123"));
        assert_eq!(new.tags, vec!["promo", "print"]);
    }
}
