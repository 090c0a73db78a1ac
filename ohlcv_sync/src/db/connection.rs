use std::path::Path;

use anyhow::Context;
use diesel::{Connection, RunQueryDsl, SqliteConnection, sql_query};

/// Open a SQLite connection and apply connection-wide PRAGMAs.
///
/// Missing parent directories of a file path are created first, so a fresh
/// checkout can point at `ohlcv_data/ohlcv_sqlite.db` directly.
pub fn connect_sqlite(database_url: &str) -> anyhow::Result<SqliteConnection> {
    ensure_parent_dir(database_url)
        .with_context(|| format!("creating directory for {database_url}"))?;
    let mut conn = SqliteConnection::establish(database_url)?;

    // concurrent readers while the puller writes
    sql_query("PRAGMA journal_mode=WAL;").execute(&mut conn)?;
    sql_query("PRAGMA busy_timeout=5000;").execute(&mut conn)?;
    Ok(conn)
}

fn ensure_parent_dir(database_url: &str) -> std::io::Result<()> {
    if database_url == ":memory:" || database_url.starts_with("file:") {
        return Ok(());
    }
    match Path::new(database_url).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}
