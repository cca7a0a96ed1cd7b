//! Cookie store access for both supported database variants.
//!
//! Readers and writers never open the live database file: the browser may
//! hold an exclusive lock on it, so every operation works on a private copy
//! in a temp directory, and the writer copies its result back only after the
//! whole batch is committed.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::config::{StorePaths, StoreVariant};
use crate::error::{RelayError, Result};

pub mod chromium;
pub mod gecko;

/// One browser cookie in the canonical shape shared by both store variants.
///
/// `expires_at` keeps the source store's native unit (Chromium: microseconds
/// since 1601; Gecko: seconds since 1970). The serialized field names match
/// the backend wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(rename = "expires_utc", default)]
    pub expires_at: i64,
    #[serde(default)]
    pub secure: bool,
    #[serde(rename = "httponly", default)]
    pub http_only: bool,
}

impl CookieRecord {
    /// A record qualifies for injection only with a non-empty name and domain.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.domain.is_empty()
    }
}

/// Ordered set of cookies captured for one domain.
pub type CookieSet = Vec<CookieRecord>;

/// A concrete cookie database file, owned by one reader or writer invocation.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    pub path: PathBuf,
    pub variant: StoreVariant,
}

/// Column names introspected from a cookie table.
#[derive(Debug, Default)]
pub struct ColumnSet(Vec<String>);

impl ColumnSet {
    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|name| name == column)
    }
}

/// One candidate column of a dynamically built insert statement. Required
/// columns are always written; optional ones only when the detected schema
/// has them.
pub(crate) struct ColumnSpec {
    pub name: &'static str,
    pub required: bool,
    pub value: rusqlite::types::Value,
}

/// Database copy living in its own temp directory; removed on drop.
pub struct TempStore {
    _dir: TempDir,
    pub path: PathBuf,
}

/// Read all cookies matching `domain` from the variant's store.
///
/// An absent store file, an absent table, and zero matching rows all yield an
/// empty set; only I/O failures and malformed databases are errors.
pub fn read_cookies(
    variant: StoreVariant,
    paths: &StorePaths,
    profile: Option<&Path>,
    domain: &str,
) -> Result<CookieSet> {
    let handle = match locate(variant, paths, profile) {
        Some(handle) => handle,
        None => return Ok(Vec::new()),
    };
    let temp = copy_for_read(&handle)?;
    let conn = open_database(&temp.path)?;
    match variant {
        StoreVariant::Chromium => chromium::query_domain(&conn, domain),
        StoreVariant::Gecko => gecko::query_domain(&conn, domain),
    }
}

/// Upsert a cookie set into the variant's store, creating the profile
/// directory and a baseline database when missing. Returns the number of
/// rows written; individually malformed records are skipped, not fatal.
pub fn write_cookies(
    variant: StoreVariant,
    paths: &StorePaths,
    profile: Option<&Path>,
    cookies: &CookieSet,
) -> Result<usize> {
    let handle = locate_or_create(variant, paths, profile)?;

    let dir = tempfile::tempdir()
        .map_err(|e| RelayError::StoreUnavailable(format!("Failed to create temp dir: {}", e)))?;
    let temp_path = dir.path().join(variant.database_file_name());

    let fresh = !handle.path.is_file();
    if !fresh {
        fs::copy(&handle.path, &temp_path).map_err(|e| {
            RelayError::StoreUnavailable(format!(
                "Failed to copy cookie DB {:?}: {}",
                handle.path, e
            ))
        })?;
    }

    let mut conn = open_database(&temp_path)?;
    if fresh {
        match variant {
            StoreVariant::Chromium => chromium::create_table(&conn)?,
            StoreVariant::Gecko => gecko::create_table(&conn)?,
        }
    }

    let written = match variant {
        StoreVariant::Chromium => chromium::upsert(&mut conn, cookies)?,
        StoreVariant::Gecko => gecko::upsert(&mut conn, cookies)?,
    };
    drop(conn);

    fs::copy(&temp_path, &handle.path).map_err(|e| {
        RelayError::StoreUnavailable(format!(
            "Failed to write cookie DB back to {:?}: {}",
            handle.path, e
        ))
    })?;
    Ok(written)
}

/// Resolve the cookie database for a read: explicit profile path first, then
/// the variant's fixed well-known path, then (Gecko only) a scan of the
/// profiles root. A miss is `None`, not an error.
pub fn locate(
    variant: StoreVariant,
    paths: &StorePaths,
    profile: Option<&Path>,
) -> Option<StoreHandle> {
    let db_path = resolve_db_path(variant, paths, profile)?;
    if db_path.is_file() {
        Some(StoreHandle {
            path: db_path,
            variant,
        })
    } else {
        None
    }
}

/// Resolve the cookie database for a write, creating the parent directory
/// tree when the profile does not exist yet.
pub fn locate_or_create(
    variant: StoreVariant,
    paths: &StorePaths,
    profile: Option<&Path>,
) -> Result<StoreHandle> {
    let db_path = resolve_db_path(variant, paths, profile).unwrap_or_else(|| match variant {
        StoreVariant::Chromium => paths.chromium_db.clone(),
        StoreVariant::Gecko => paths
            .gecko_fixed_profile
            .join(StoreVariant::Gecko.database_file_name()),
    });
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            RelayError::StoreUnavailable(format!(
                "Failed to create profile dir {:?}: {}",
                parent, e
            ))
        })?;
    }
    Ok(StoreHandle {
        path: db_path,
        variant,
    })
}

fn resolve_db_path(
    variant: StoreVariant,
    paths: &StorePaths,
    profile: Option<&Path>,
) -> Option<PathBuf> {
    match profile {
        Some(path) if path.is_file() => Some(path.to_path_buf()),
        Some(path) => Some(path.join(variant.database_file_name())),
        None => match variant {
            StoreVariant::Chromium => Some(paths.chromium_db.clone()),
            StoreVariant::Gecko => {
                let file = StoreVariant::Gecko.database_file_name();
                let fixed = paths.gecko_fixed_profile.join(file);
                if fixed.is_file() {
                    return Some(fixed);
                }
                find_gecko_profile(&paths.gecko_profiles_root).map(|dir| dir.join(file))
            }
        },
    }
}

/// Scan a Gecko profiles root for a `*.default-release` directory, then any
/// `*.default*` directory. The first lexical match wins; callers must not
/// depend on ordering among further ties.
pub(crate) fn find_gecko_profile(root: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(root).ok()?;
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    dirs.iter()
        .find(|path| dir_name(path).is_some_and(|name| name.ends_with(".default-release")))
        .or_else(|| {
            dirs.iter()
                .find(|path| dir_name(path).is_some_and(|name| name.contains(".default")))
        })
        .cloned()
}

fn dir_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Copy the database into a temp directory before opening, because the live
/// browser process may hold an exclusive lock on the original.
pub fn copy_for_read(handle: &StoreHandle) -> Result<TempStore> {
    let dir = tempfile::tempdir()
        .map_err(|e| RelayError::StoreUnavailable(format!("Failed to create temp dir: {}", e)))?;
    let path = dir.path().join(handle.variant.database_file_name());
    fs::copy(&handle.path, &path).map_err(|e| {
        RelayError::StoreUnavailable(format!("Failed to copy cookie DB {:?}: {}", handle.path, e))
    })?;
    Ok(TempStore { _dir: dir, path })
}

pub(crate) fn open_database(path: &Path) -> Result<Connection> {
    Connection::open(path).map_err(|e| {
        RelayError::StoreUnavailable(format!("Failed to open cookie DB {:?}: {}", path, e))
    })
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|e| RelayError::StoreUnavailable(format!("Failed to inspect schema: {}", e)))
}

pub(crate) fn read_columns(conn: &Connection, table: &str) -> Result<ColumnSet> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", table))
        .map_err(|e| {
            RelayError::StoreUnavailable(format!("Failed to read {} schema: {}", table, e))
        })?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| {
            RelayError::StoreUnavailable(format!("Failed to read {} schema: {}", table, e))
        })?;
    let mut columns = Vec::new();
    for row in rows {
        let name = row.map_err(|e| {
            RelayError::StoreUnavailable(format!("Failed to read {} schema: {}", table, e))
        })?;
        columns.push(name);
    }
    Ok(ColumnSet(columns))
}

/// Execute one `INSERT OR REPLACE` built from the candidate columns that the
/// detected schema supports.
pub(crate) fn insert_or_replace(
    conn: &Connection,
    table: &str,
    columns: &ColumnSet,
    spec: &[ColumnSpec],
) -> rusqlite::Result<()> {
    let selected: Vec<&ColumnSpec> = spec
        .iter()
        .filter(|column| column.required || columns.contains(column.name))
        .collect();
    let names: Vec<&str> = selected.iter().map(|column| column.name).collect();
    let placeholders: Vec<String> = (1..=selected.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        placeholders.join(", ")
    );
    let params: Vec<&dyn rusqlite::ToSql> = selected
        .iter()
        .map(|column| &column.value as &dyn rusqlite::ToSql)
        .collect();
    conn.execute(&sql, params.as_slice())?;
    Ok(())
}
