//! SQLite connection helpers.
//!
//! [`connect_sqlite`] opens a connection and applies the connection-wide
//! PRAGMAs every reader and writer in this crate relies on: WAL journaling,
//! `foreign_keys=ON` (fires and memberships cascade with their contact), and
//! a 5000 ms `busy_timeout` so concurrent reconciliation chunks wait for the
//! write lock instead of failing immediately.
//!
//! Example:
//! ```no_run
//! use org_assets::db::connection::connect_sqlite;
//!
//! let path = std::env::temp_dir().join("org_assets_example.db");
//! let _conn = connect_sqlite(path.to_str().unwrap()).expect("open sqlite");
//! ```

use anyhow::Context;
use diesel::{Connection, RunQueryDsl, SqliteConnection, sql_query};

/// Default lock wait for a fresh connection, in milliseconds.
pub const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Open a SQLite connection and apply connection-wide PRAGMAs.
pub fn connect_sqlite(database_url: &str) -> anyhow::Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)
        .with_context(|| format!("open sqlite database {database_url}"))?;

    sql_query("PRAGMA journal_mode=WAL;").execute(&mut conn)?;
    sql_query("PRAGMA foreign_keys=ON;").execute(&mut conn)?;
    sql_query(format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS};")).execute(&mut conn)?;
    Ok(conn)
}
