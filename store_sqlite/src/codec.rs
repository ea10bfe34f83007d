//! Column encoding. Identifiers and enums are stored as text, money and
//! counters as integers, timestamps as canonical RFC3339 text.

use chama_store::StoreError;
use chama_types::{Amount, CoreError, Timestamp, VoterHash};
use rusqlite::types::Type;
use rusqlite::Row;
use std::str::FromStr;

fn conversion(
    idx: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

/// Read a text column through its `FromStr` impl.
pub(crate) fn parsed<T>(row: &Row<'_>, col: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = CoreError>,
{
    let idx = row.as_ref().column_index(col)?;
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion(idx, Type::Text, e))
}

pub(crate) fn parsed_opt<T>(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = CoreError>,
{
    let idx = row.as_ref().column_index(col)?;
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse().map_err(|e| conversion(idx, Type::Text, e)))
        .transpose()
}

pub(crate) fn unsigned(row: &Row<'_>, col: &str) -> rusqlite::Result<u64> {
    let idx = row.as_ref().column_index(col)?;
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw).map_err(|e| conversion(idx, Type::Integer, e))
}

pub(crate) fn counter(row: &Row<'_>, col: &str) -> rusqlite::Result<u32> {
    let idx = row.as_ref().column_index(col)?;
    let raw: i64 = row.get(idx)?;
    u32::try_from(raw).map_err(|e| conversion(idx, Type::Integer, e))
}

pub(crate) fn amount(row: &Row<'_>, col: &str) -> rusqlite::Result<Amount> {
    unsigned(row, col).map(Amount::new)
}

pub(crate) fn voter_hash(row: &Row<'_>, col: &str) -> rusqlite::Result<VoterHash> {
    let idx = row.as_ref().column_index(col)?;
    let raw: Vec<u8> = row.get(idx)?;
    let len = raw.len();
    let bytes: [u8; 32] = raw.try_into().map_err(|_| {
        conversion(
            idx,
            Type::Blob,
            CoreError::Validation(format!("voter hash has {len} bytes, expected 32")),
        )
    })?;
    Ok(VoterHash::new(bytes))
}

pub(crate) fn ts(t: Timestamp) -> String {
    t.to_rfc3339()
}

pub(crate) fn ts_opt(t: Option<Timestamp>) -> Option<String> {
    t.map(ts)
}

/// Bind a `u64` as an SQLite integer.
pub(crate) fn int(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Constraint(format!("{value} exceeds the integer column range")))
}

pub(crate) fn money(amount: Amount) -> Result<i64, StoreError> {
    int(amount.minor())
}
