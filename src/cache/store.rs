// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Local SQLite cache store.
//!
//! One writer connection serializes all mutations; each batch runs in a
//! single transaction, so concurrent readers (served by a separate read-only
//! connection pool) never observe a half-written row. Statements execute on
//! the blocking thread pool so database work suspends only the calling task.

use std::{
    path::Path,
    sync::{Arc, Mutex, atomic::AtomicU64},
};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};

use super::error::CacheError;

/// Read-only SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

const READ_POOL_SIZE: u32 = 4;

/// Reference-data schema.
///
/// Numeric domain columns hold scaled fixed-point integers; the scale factor
/// per column is documented in `cache::forex`.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS forex_markets (
    epic                           TEXT PRIMARY KEY,
    base_currency                  TEXT NOT NULL,
    counter_currency               TEXT NOT NULL CHECK (counter_currency <> base_currency),
    decimal_places                 INTEGER NOT NULL CHECK (decimal_places >= 0),
    contract_size                  INTEGER NOT NULL CHECK (contract_size >= 0),
    min_normal_stop_distance       INTEGER NOT NULL CHECK (min_normal_stop_distance >= 0),
    min_limited_risk_stop_distance INTEGER NOT NULL CHECK (min_limited_risk_stop_distance >= 0),
    guaranteed_stop_premium        INTEGER NOT NULL CHECK (guaranteed_stop_premium >= 0),
    slippage_factor                INTEGER NOT NULL CHECK (slippage_factor >= 0),
    trailing_stops_allowed         INTEGER NOT NULL CHECK (trailing_stops_allowed IN (0, 1))
);

CREATE TABLE IF NOT EXISTS forex_margin_bands (
    epic          TEXT NOT NULL REFERENCES forex_markets(epic) ON DELETE CASCADE,
    lower_bound   INTEGER NOT NULL CHECK (lower_bound >= 0),
    upper_bound   INTEGER,
    margin_factor INTEGER NOT NULL CHECK (margin_factor >= 0),
    PRIMARY KEY (epic, lower_bound)
);
";

/// Local cache of server-retrieved reference and price data.
#[derive(Clone)]
pub struct CacheStore {
    writer: Arc<Mutex<Connection>>,
    readers: DbPool,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(CacheStore))
            .field("read_pool_size", &READ_POOL_SIZE)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Opens (creating if necessary) a cache database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, the schema cannot
    /// be applied, or the read pool cannot be built.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let writer = Connection::open(path)?;
        writer.pragma_update(None, "journal_mode", "WAL")?;
        Self::bootstrap(&writer)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let manager = SqliteConnectionManager::file(path).with_flags(flags);
        let readers = Pool::builder().max_size(READ_POOL_SIZE).build(manager)?;

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            readers,
        })
    }

    /// Opens a private in-memory cache, shared between the writer and the
    /// read pool through SQLite's shared-cache URI mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot
    /// be applied.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        static NEXT_DB: AtomicU64 = AtomicU64::new(1);
        let n = NEXT_DB.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let uri = format!("file:ig_cache_{n}?mode=memory&cache=shared");

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let writer = Connection::open_with_flags(&uri, flags)?;
        Self::bootstrap(&writer)?;

        let read_flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let manager = SqliteConnectionManager::file(&uri).with_flags(read_flags);
        let readers = Pool::builder().max_size(READ_POOL_SIZE).build(manager)?;

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            readers,
        })
    }

    fn bootstrap(conn: &Connection) -> Result<(), CacheError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Runs a mutation on the single writer connection.
    ///
    /// The closure executes on the blocking pool; wrap multi-row work in a
    /// transaction inside the closure.
    pub(crate) async fn with_writer<T, F>(&self, f: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, CacheError> + Send + 'static,
    {
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            // SAFETY: Lock poisoning indicates a panic in another thread, which is fatal
            let mut conn = writer.lock().expect("Lock poisoned");
            f(&mut conn)
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
    }

    /// Runs a query on a pooled read-only connection.
    pub(crate) async fn with_reader<T, F>(&self, f: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CacheError> + Send + 'static,
    {
        let pool = self.readers.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_bootstraps_schema() {
        let store = CacheStore::open_in_memory().unwrap();

        let count: i64 = store
            .with_reader(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('forex_markets', 'forex_margin_bands')",
                    [],
                    |row| row.get(0),
                )
                .map_err(Into::into)
            })
            .await
            .unwrap();

        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_reader_pool_is_read_only() {
        let store = CacheStore::open_in_memory().unwrap();

        let result = store
            .with_reader(|conn| {
                conn.execute("DELETE FROM forex_markets", [])
                    .map_err(Into::into)
            })
            .await;

        assert!(matches!(result, Err(CacheError::Sqlite { .. })));
    }

    #[rstest]
    fn test_in_memory_stores_are_isolated() {
        let a = CacheStore::open_in_memory().unwrap();
        let b = CacheStore::open_in_memory().unwrap();

        // SAFETY: test-only direct access
        let conn_a = a.writer.lock().unwrap();
        conn_a
            .execute(
                "INSERT INTO forex_markets VALUES ('X', 'EUR', 'USD', 5, 100, 0, 0, 0, 0, 1)",
                [],
            )
            .unwrap();
        drop(conn_a);

        let conn_b = b.writer.lock().unwrap();
        let count: i64 = conn_b
            .query_row("SELECT COUNT(*) FROM forex_markets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
