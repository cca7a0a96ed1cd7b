//! Gecko `moz_cookies` table variant.
//!
//! Expiry uses the store's native unit, seconds since 1970; the bookkeeping
//! timestamps are microseconds. Optional columns come and go across browser
//! releases, so the insert statement is built from the detected column set.

use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::types::Value;
use rusqlite::{Connection, Row};

use super::{
    insert_or_replace, read_columns, table_exists, ColumnSpec, CookieRecord, CookieSet,
};
use crate::error::{RelayError, Result};

const TABLE: &str = "moz_cookies";

/// Baseline schema for a database created from scratch, with the uniqueness
/// constraint the real store uses for replacement.
const BASELINE_SCHEMA: &str = "CREATE TABLE moz_cookies (
    id INTEGER PRIMARY KEY,
    originAttributes TEXT NOT NULL DEFAULT '',
    name TEXT,
    value TEXT,
    host TEXT,
    path TEXT,
    expiry INTEGER,
    lastAccessed INTEGER,
    creationTime INTEGER,
    isSecure INTEGER,
    isHttpOnly INTEGER,
    inBrowserElement INTEGER DEFAULT 0,
    sameSite INTEGER DEFAULT 0,
    rawSameSite INTEGER DEFAULT 0,
    schemeMap INTEGER DEFAULT 0,
    CONSTRAINT moz_uniqueid UNIQUE (name, host, path, originAttributes)
)";

/// Read cookies for `domain`: exact host match or a `.`-prefixed suffix
/// match. An absent table yields an empty set, not an error.
pub(crate) fn query_domain(conn: &Connection, domain: &str) -> Result<CookieSet> {
    if !table_exists(conn, TABLE)? {
        return Ok(Vec::new());
    }
    let columns = read_columns(conn, TABLE)?;
    let expiry_column = if columns.contains("expiry") {
        "expiry"
    } else if columns.contains("expires") {
        "expires"
    } else {
        return Err(RelayError::StoreUnavailable(
            "moz_cookies table missing expiry column".to_string(),
        ));
    };
    let secure_column = if columns.contains("isSecure") {
        "isSecure"
    } else if columns.contains("is_secure") {
        "is_secure"
    } else {
        "0"
    };
    let httponly_column = if columns.contains("isHttpOnly") {
        "isHttpOnly"
    } else if columns.contains("is_http_only") {
        "is_http_only"
    } else {
        "0"
    };

    let query = format!(
        "SELECT name, value, host, path, {}, {}, {} FROM moz_cookies WHERE host = ?1 OR host LIKE ?2",
        expiry_column, secure_column, httponly_column
    );
    let mut stmt = conn
        .prepare(&query)
        .map_err(|e| RelayError::StoreUnavailable(format!("Failed to prepare cookie query: {}", e)))?;
    let mut rows = stmt
        .query([domain.to_string(), format!("%.{}", domain)])
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
    let expiry: Option<i64> = row.get(4).map_err(read)?;
    let secure: i64 = row.get(5).map_err(read)?;
    let http_only: i64 = row.get(6).map_err(read)?;
    Ok(CookieRecord {
        name: row.get(0).map_err(read)?,
        value: row.get(1).map_err(read)?,
        domain: row.get(2).map_err(read)?,
        path: row.get(3).map_err(read)?,
        expires_at: expiry.unwrap_or(0),
        secure: secure != 0,
        http_only: http_only != 0,
    })
}

pub(crate) fn create_table(conn: &Connection) -> Result<()> {
    conn.execute(BASELINE_SCHEMA, []).map_err(|e| {
        RelayError::StoreUnavailable(format!("Failed to initialize moz_cookies table: {}", e))
    })?;
    Ok(())
}

/// Insert-or-replace every valid record; a failing row is logged and skipped.
/// One commit covers the whole batch.
pub(crate) fn upsert(conn: &mut Connection, cookies: &CookieSet) -> Result<usize> {
    if !table_exists(conn, TABLE)? {
        return Err(RelayError::SchemaMismatch(
            "moz_cookies table is missing".to_string(),
        ));
    }
    let columns = read_columns(conn, TABLE)?;
    let now_micros = now_unix_micros();

    let tx = conn
        .transaction()
        .map_err(|e| RelayError::StoreUnavailable(format!("Failed to start transaction: {}", e)))?;
    let mut written = 0;
    for cookie in cookies {
        if !cookie.is_valid() {
            log::warn!("Skipping cookie with empty name or domain");
            continue;
        }
        match insert_or_replace(&tx, TABLE, &columns, &column_spec(cookie, now_micros)) {
            Ok(()) => written += 1,
            Err(e) => log::warn!("Failed to inject cookie {}: {}", cookie.name, e),
        }
    }
    tx.commit()
        .map_err(|e| RelayError::StoreUnavailable(format!("Failed to commit cookies: {}", e)))?;
    Ok(written)
}

fn column_spec(cookie: &CookieRecord, now_micros: i64) -> Vec<ColumnSpec> {
    let path = if cookie.path.is_empty() {
        "/".to_string()
    } else {
        cookie.path.clone()
    };
    vec![
        ColumnSpec {
            name: "originAttributes",
            required: true,
            value: Value::Text(String::new()),
        },
        ColumnSpec {
            name: "name",
            required: true,
            value: Value::Text(cookie.name.clone()),
        },
        ColumnSpec {
            name: "value",
            required: true,
            value: Value::Text(cookie.value.clone()),
        },
        ColumnSpec {
            name: "host",
            required: true,
            value: Value::Text(cookie.domain.clone()),
        },
        ColumnSpec {
            name: "path",
            required: true,
            value: Value::Text(path),
        },
        ColumnSpec {
            name: "expiry",
            required: true,
            value: Value::Integer(cookie.expires_at),
        },
        ColumnSpec {
            name: "lastAccessed",
            required: true,
            value: Value::Integer(now_micros),
        },
        ColumnSpec {
            name: "creationTime",
            required: true,
            value: Value::Integer(now_micros),
        },
        ColumnSpec {
            name: "isSecure",
            required: true,
            value: Value::Integer(cookie.secure as i64),
        },
        ColumnSpec {
            name: "isHttpOnly",
            required: true,
            value: Value::Integer(cookie.http_only as i64),
        },
        ColumnSpec {
            name: "inBrowserElement",
            required: false,
            value: Value::Integer(0),
        },
        // optional columns across schema versions, with neutral defaults
        ColumnSpec {
            name: "baseDomain",
            required: false,
            value: Value::Text(cookie.domain.trim_start_matches('.').to_string()),
        },
        ColumnSpec {
            name: "sameSite",
            required: false,
            value: Value::Integer(0),
        },
        ColumnSpec {
            name: "rawSameSite",
            required: false,
            value: Value::Integer(0),
        },
        ColumnSpec {
            name: "schemeMap",
            required: false,
            value: Value::Integer(0),
        },
    ]
}

fn now_unix_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}
