//! Pooled SQLite sessions
//!
//! A session is checked out for the length of one store call and handed
//! back when it drops. Concurrent callers never share a connection. The pool
//! holds at most `pool_size` connections and closes idle ones after
//! `idle_timeout_secs`, so bursts of callers do not leave handles behind.

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::config::StoreConfig;
use crate::Result;

pub(crate) type SessionPool = Pool<SqliteConnectionManager>;
pub(crate) type Session = PooledConnection<SqliteConnectionManager>;

/// Open a standalone connection, outside the pool
pub(crate) fn connect(path: &Path, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}

/// Build the session pool for the store file described by `config`.
///
/// No connection is opened until the first call asks for one.
pub(crate) fn build_pool(config: &StoreConfig) -> std::result::Result<SessionPool, r2d2::Error> {
    let busy_timeout = config.busy_timeout();
    let manager = SqliteConnectionManager::file(&config.database)
        .with_init(move |conn| conn.busy_timeout(busy_timeout));

    let pool = Pool::builder()
        .max_size(config.pool_size.max(1))
        .min_idle(Some(0))
        .idle_timeout(Some(config.idle_timeout()))
        .connection_timeout(config.pool_timeout())
        .build(manager)?;

    tracing::debug!(
        pool_size = config.pool_size,
        "Session pool ready for {}",
        config.database.display()
    );
    Ok(pool)
}

/// Check a session out of the pool, waiting up to the pool timeout
pub(crate) fn get_session(pool: &SessionPool) -> Result<Session> {
    Ok(pool.get()?)
}
