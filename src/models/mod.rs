//! Data models representing database entities.
//!
//! Each entity maps its row by hand (`FromRow`) and each enumerated column
//! round-trips through `as_str` / `FromStr`, so the text stored in the
//! database is spelled out in one place per type.

use std::str::FromStr;

use sqlx::{Row, postgres::PgRow};

/// QR code records
pub mod qr_code;
/// Programmatic access keys
pub mod api_key;
/// Registered accounts
pub mod user;

/// A stored or supplied value outside an enumerated column's allowed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Read a text column and parse it into an enumerated type.
pub(crate) fn try_get_parsed<T>(row: &PgRow, column: &'static str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: UnknownVariant| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
