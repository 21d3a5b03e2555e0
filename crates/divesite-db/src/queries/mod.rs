//! Queries grouped by entity. Every method lives on [`crate::Database`];
//! the free `query_*` helpers take a plain connection so they can run either
//! standalone or inside a transaction.

mod actions;
mod comments;
mod dives;
mod follows;
mod images;
mod sites;
mod stats;
mod users;

use std::str::FromStr;

use anyhow::Result;
use rusqlite::Row;
use rusqlite::types::Type;

use crate::models::{OwnerRow, ProfileImageRow};

pub(crate) use actions::record_action;

/// Columns describing the owner of a row; pair with [`owner_join`].
pub(crate) const OWNER_COLUMNS: &str = "op.user_id, op.name, opi.id, opi.asset, opi.creation_date";

/// Joins the profile and avatar of the user referenced by `column`.
pub(crate) fn owner_join(column: &str) -> String {
    format!(
        "JOIN profiles op ON op.user_id = {column} \
         LEFT JOIN profile_images opi ON opi.user_id = {column}"
    )
}

/// Reads the five [`OWNER_COLUMNS`] starting at `idx`.
pub(crate) fn read_owner(row: &Row<'_>, idx: usize) -> rusqlite::Result<OwnerRow> {
    let image = match row.get::<_, Option<uuid::Uuid>>(idx + 2)? {
        Some(id) => Some(ProfileImageRow {
            id,
            asset: row.get(idx + 3)?,
            creation_date: row.get(idx + 4)?,
        }),
        None => None,
    };

    Ok(OwnerRow {
        id: row.get(idx)?,
        name: row.get(idx + 1)?,
        image,
    })
}

/// Reads a TEXT column holding one of our enum encodings.
pub(crate) fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn get_parsed_opt<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// Reads an INTEGER column into a `u8`-backed enum such as `Level` or `Wind`.
pub(crate) fn get_small<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: TryFrom<u8>,
    T::Error: std::error::Error + Send + Sync + 'static,
{
    match row.get::<_, Option<u8>>(idx)? {
        Some(raw) => T::try_from(raw)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e))),
        None => Ok(None),
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// True when `err` is a UNIQUE/CHECK/FOREIGN KEY constraint failure.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
