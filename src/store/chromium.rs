//! Chromium `cookies` table variant.
//!
//! Expiry and the write timestamps use the store's native unit: microseconds
//! since 1601-01-01.

use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::types::Value;
use rusqlite::{Connection, Row};

use super::{
    insert_or_replace, read_columns, table_exists, ColumnSpec, CookieRecord, CookieSet,
};
use crate::error::{RelayError, Result};

/// Seconds between the Windows epoch (1601) and the Unix epoch (1970).
const WINDOWS_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

const TABLE: &str = "cookies";

/// Baseline schema for a database created from scratch. Matches the modern
/// column set; the uniqueness constraint is what gives `INSERT OR REPLACE`
/// its upsert semantics.
const BASELINE_SCHEMA: &str = "CREATE TABLE cookies (
    creation_utc INTEGER NOT NULL,
    host_key TEXT NOT NULL,
    top_frame_site_key TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    path TEXT NOT NULL,
    expires_utc INTEGER NOT NULL,
    is_secure INTEGER NOT NULL,
    is_httponly INTEGER NOT NULL,
    last_access_utc INTEGER NOT NULL,
    has_expires INTEGER NOT NULL DEFAULT 1,
    is_persistent INTEGER NOT NULL DEFAULT 1,
    priority INTEGER NOT NULL DEFAULT 1,
    samesite INTEGER NOT NULL DEFAULT -1,
    source_scheme INTEGER NOT NULL DEFAULT 0,
    source_port INTEGER NOT NULL DEFAULT -1,
    last_update_utc INTEGER NOT NULL DEFAULT 0,
    UNIQUE (host_key, name, path)
)";

/// Read all cookies whose host suffix matches `domain`.
pub(crate) fn query_domain(conn: &Connection, domain: &str) -> Result<CookieSet> {
    if !table_exists(conn, TABLE)? {
        return Ok(Vec::new());
    }
    let columns = read_columns(conn, TABLE)?;
    let secure_column = if columns.contains("is_secure") {
        "is_secure"
    } else {
        "secure"
    };
    let httponly_column = if columns.contains("is_httponly") {
        "is_httponly"
    } else if columns.contains("httponly") {
        "httponly"
    } else {
        "0"
    };

    let query = format!(
        "SELECT name, value, host_key, path, expires_utc, {}, {} FROM cookies WHERE host_key LIKE ?1",
        secure_column, httponly_column
    );
    let mut stmt = conn
        .prepare(&query)
        .map_err(|e| RelayError::StoreUnavailable(format!("Failed to prepare cookie query: {}", e)))?;
    let mut rows = stmt
        .query([format!("%{}", domain)])
        .map_err(|e| RelayError::StoreUnavailable(format!("Failed to query cookies: {}", e)))?;

    let mut cookies = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| RelayError::StoreUnavailable(format!("Failed to read cookie row: {}", e)))?
    {
        cookies.push(row_to_record(row)?);
    }
    Ok(cookies)
}

fn row_to_record(row: &Row<'_>) -> Result<CookieRecord> {
    let read = |e: rusqlite::Error| {
        RelayError::StoreUnavailable(format!("Failed to read cookie row: {}", e))
    };
    let secure: i64 = row.get(5).map_err(read)?;
    let http_only: i64 = row.get(6).map_err(read)?;
    Ok(CookieRecord {
        name: row.get(0).map_err(read)?,
        value: row.get(1).map_err(read)?,
        domain: row.get(2).map_err(read)?,
        path: row.get(3).map_err(read)?,
        expires_at: row.get(4).map_err(read)?,
        secure: secure != 0,
        http_only: http_only != 0,
    })
}

pub(crate) fn create_table(conn: &Connection) -> Result<()> {
    conn.execute(BASELINE_SCHEMA, []).map_err(|e| {
        RelayError::StoreUnavailable(format!("Failed to initialize cookies table: {}", e))
    })?;
    Ok(())
}

/// Insert-or-replace every valid record; a failing row is logged and skipped.
/// One commit covers the whole batch.
pub(crate) fn upsert(conn: &mut Connection, cookies: &CookieSet) -> Result<usize> {
    if !table_exists(conn, TABLE)? {
        return Err(RelayError::SchemaMismatch(
            "cookies table is missing".to_string(),
        ));
    }
    let columns = read_columns(conn, TABLE)?;
    let now_utc = now_chromium_micros();

    let tx = conn
        .transaction()
        .map_err(|e| RelayError::StoreUnavailable(format!("Failed to start transaction: {}", e)))?;
    let mut written = 0;
    for cookie in cookies {
        if !cookie.is_valid() {
            log::warn!("Skipping cookie with empty name or domain");
            continue;
        }
        match insert_or_replace(&tx, TABLE, &columns, &column_spec(cookie, now_utc)) {
            Ok(()) => written += 1,
            Err(e) => log::warn!("Failed to inject cookie {}: {}", cookie.name, e),
        }
    }
    tx.commit()
        .map_err(|e| RelayError::StoreUnavailable(format!("Failed to commit cookies: {}", e)))?;
    Ok(written)
}

fn column_spec(cookie: &CookieRecord, now_utc: i64) -> Vec<ColumnSpec> {
    let path = if cookie.path.is_empty() {
        "/".to_string()
    } else {
        cookie.path.clone()
    };
    vec![
        required("creation_utc", Value::Integer(now_utc)),
        required("host_key", Value::Text(cookie.domain.clone())),
        required("name", Value::Text(cookie.name.clone())),
        required("value", Value::Text(cookie.value.clone())),
        required("path", Value::Text(path)),
        required("expires_utc", Value::Integer(cookie.expires_at)),
        required("last_access_utc", Value::Integer(now_utc)),
        // secure/httponly spelling changed across releases
        optional("is_secure", Value::Integer(cookie.secure as i64)),
        optional("secure", Value::Integer(cookie.secure as i64)),
        optional("is_httponly", Value::Integer(cookie.http_only as i64)),
        optional("httponly", Value::Integer(cookie.http_only as i64)),
        // neutral defaults for columns newer releases added
        optional("top_frame_site_key", Value::Text(String::new())),
        optional(
            "has_expires",
            Value::Integer((cookie.expires_at != 0) as i64),
        ),
        optional("is_persistent", Value::Integer(1)),
        optional("priority", Value::Integer(1)),
        optional("samesite", Value::Integer(-1)),
        optional("source_scheme", Value::Integer(0)),
        optional("source_port", Value::Integer(-1)),
        optional("last_update_utc", Value::Integer(now_utc)),
    ]
}

fn required(name: &'static str, value: Value) -> ColumnSpec {
    ColumnSpec {
        name,
        required: true,
        value,
    }
}

fn optional(name: &'static str, value: Value) -> ColumnSpec {
    ColumnSpec {
        name,
        required: false,
        value,
    }
}

fn now_chromium_micros() -> i64 {
    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    (unix_secs + WINDOWS_EPOCH_OFFSET_SECS) * 1_000_000
}
