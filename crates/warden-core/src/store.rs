// Warden
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Backing store handle and the transaction scope
//!
//! A [`Store`] owns the SQLite connection pool. It is created once at startup, cloned into
//! every component that needs persistence and closed on shutdown. All reads and writes go
//! through [`Store::run`], which opens exactly one unit of work per call.
//!
//! Units of work are serialized by a single permit taken before `BEGIN`. Waiting for it is
//! bounded by the same acquire timeout as the pool, and running out of time is reported as
//! a retryable [`StoreError::Unavailable`].

use crate::error::StoreError;
use futures::future::BoxFuture;
use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Create SQLite database if it doesn't already exist.
pub async fn create_database(url: &str) -> Result<(), StoreError> {
    if !Sqlite::database_exists(url).await? {
        Sqlite::create_database(url).await?
    }
    Ok(())
}

/// Drop SQLite database if it exists.
pub async fn drop_database(url: &str) -> Result<(), StoreError> {
    if Sqlite::database_exists(url).await? {
        Sqlite::drop_database(url).await?
    }
    Ok(())
}

pub struct StoreBuilder {
    url: String,
    max_connections: u32,
    acquire_timeout: Duration,
    create_database: bool,
    run_migrations: bool,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".into(),
            max_connections: 16,
            acquire_timeout: Duration::from_secs(5),
            create_database: true,
            run_migrations: true,
        }
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn random_memory_url(mut self) -> Self {
        // Every in-memory database gets its own name so parallel tests stay isolated.
        self.url = format!("sqlite://wardenmem{}?mode=memory&cache=private", rand::random::<u32>());
        self
    }

    pub fn database_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn create_database(mut self, create_database: bool) -> Self {
        self.create_database = create_database;
        self
    }

    pub fn run_migrations(mut self, run_migrations: bool) -> Self {
        self.run_migrations = run_migrations;
        self
    }

    pub async fn build(self) -> Result<Store, StoreError> {
        if self.create_database {
            create_database(&self.url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.url)
            .await?;

        if self.run_migrations {
            MIGRATOR.run(&pool).await?;
        }

        info!("Store ready with up to {} connections", self.max_connections);

        Ok(Store {
            pool,
            transactions: Arc::new(Semaphore::new(1)),
            acquire_timeout: self.acquire_timeout,
        })
    }
}

/// Handle to the backing store.
///
/// Cloning is cheap and every clone shares the same pool. The pool hands out independent
/// connections, so concurrent requests never share a unit of work.
///
/// SQLite allows one writer at a time. Instead of letting a second writer spin on the
/// database lock until `SQLITE_BUSY`, units of work take a permit first and queue in order.
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
    transactions: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl Store {
    /// Shortcut building an in-memory database with a randomised name for tests.
    #[cfg(any(test, feature = "test_utils"))]
    pub async fn temporary() -> Self {
        StoreBuilder::new()
            .random_memory_url()
            .max_connections(1)
            .build()
            .await
            .expect("temporary store with migrations")
    }

    /// Run `f` inside one transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back when it returns `Err`.
    /// If the returned future is dropped before completion (the surrounding task was
    /// cancelled) the open transaction is dropped as well, which rolls it back.
    pub async fn run<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<R, StoreError>> + Send,
        R: Send,
    {
        // Held until the transaction is finished or the scope is dropped.
        let _permit = self.acquire_permit().await?;
        let mut tx = self.pool.begin().await?;

        match f(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                debug!("Rolling back transaction: {}", err);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Wait for the transaction permit, bounded by the acquire timeout like a pool connection.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, StoreError> {
        match tokio::time::timeout(self.acquire_timeout, self.transactions.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(StoreError::Unavailable(sqlx::Error::PoolClosed)),
            Err(_) => {
                warn!("Timed out waiting {:?} for a transaction permit", self.acquire_timeout);
                Err(StoreError::Unavailable(sqlx::Error::PoolTimedOut))
            }
        }
    }

    /// Check that a connection can be acquired and used.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool and wait for checked-out connections to be returned.
    pub async fn close(&self) {
        self.transactions.close();
        self.pool.close().await;
        info!("Store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Executor, query, query_as};

    async fn count(store: &Store) -> i64 {
        store
            .run(|conn| {
                Box::pin(async move {
                    let row: (i64,) = query_as("SELECT COUNT(*) FROM scratch").fetch_one(&mut *conn).await?;
                    Ok(row.0)
                })
            })
            .await
            .unwrap()
    }

    async fn scratch_store() -> Store {
        let store = Store::temporary().await;
        store
            .run(|conn| {
                Box::pin(async move {
                    conn.execute("CREATE TABLE scratch (x INTEGER NOT NULL UNIQUE)").await?;
                    Ok(())
                })
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn commits_on_success() {
        let store = scratch_store().await;

        store
            .run(|conn| {
                Box::pin(async move {
                    query("INSERT INTO scratch (x) VALUES (1)").execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .await
            .unwrap();

        assert_eq!(count(&store).await, 1);
    }

    #[tokio::test]
    async fn rolls_back_on_error() {
        let store = scratch_store().await;

        let result: Result<(), StoreError> = store
            .run(|conn| {
                Box::pin(async move {
                    query("INSERT INTO scratch (x) VALUES (1)").execute(&mut *conn).await?;
                    // Violates the unique constraint, aborting the whole unit of work.
                    query("INSERT INTO scratch (x) VALUES (1)").execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .await;

        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
        assert_eq!(count(&store).await, 0);
    }

    #[tokio::test]
    async fn cancelled_scope_leaves_no_rows() {
        let store = scratch_store().await;

        let scope = store.run(|conn| {
            Box::pin(async move {
                query("INSERT INTO scratch (x) VALUES (7)").execute(&mut *conn).await?;
                futures::future::pending::<()>().await;
                Ok(())
            })
        });

        let timed_out = tokio::time::timeout(Duration::from_millis(50), scope).await;
        assert!(timed_out.is_err());

        assert_eq!(count(&store).await, 0);
    }

    #[tokio::test]
    async fn closed_store_is_unavailable() {
        let store = Store::temporary().await;
        store.close().await;
        assert!(store.is_closed());

        let err = store.ping().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn write_lock_contention_is_retryable() {
        use sqlx::Connection;
        use sqlx::sqlite::SqliteConnectOptions;
        use std::str::FromStr;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("warden.db").display());
        let store = StoreBuilder::new().database_url(&url).max_connections(2).build().await.unwrap();

        // Two connections outside the store, neither willing to wait for the lock.
        let options = SqliteConnectOptions::from_str(&url).unwrap().busy_timeout(Duration::ZERO);
        let mut holder = SqliteConnection::connect_with(&options).await.unwrap();
        let mut contender = SqliteConnection::connect_with(&options).await.unwrap();

        holder.execute("BEGIN IMMEDIATE").await.unwrap();
        query("INSERT INTO groups (name) VALUES ('first')").execute(&mut holder).await.unwrap();

        let err = query("INSERT INTO groups (name) VALUES ('second')").execute(&mut contender).await.unwrap_err();
        let err = StoreError::from(err);
        assert!(matches!(err, StoreError::Unavailable(_)), "{err:?}");
        assert!(err.is_retryable());

        holder.execute("ROLLBACK").await.unwrap();
        holder.close().await.unwrap();
        contender.close().await.unwrap();
        store.close().await;
    }

    #[tokio::test]
    async fn writers_queue_behind_the_open_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("warden.db").display());
        let store = StoreBuilder::new()
            .database_url(&url)
            .max_connections(2)
            .acquire_timeout(Duration::from_millis(100))
            .build()
            .await
            .unwrap();

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let holder = store.clone();
        let held = tokio::spawn(async move {
            holder
                .run(move |conn| {
                    Box::pin(async move {
                        query("INSERT INTO groups (name) VALUES ('slow')").execute(&mut *conn).await?;
                        let _ = started_tx.send(());
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        Ok(())
                    })
                })
                .await
        });
        started_rx.await.unwrap();

        // Gives up after the acquire timeout instead of hitting the database lock.
        let err = store
            .run(|conn| {
                Box::pin(async move {
                    query("INSERT INTO groups (name) VALUES ('fast')").execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{err:?}");
        assert!(err.is_retryable());

        held.await.unwrap().unwrap();
        store
            .run(|conn| {
                Box::pin(async move {
                    query("INSERT INTO groups (name) VALUES ('fast')").execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .await
            .unwrap();

        let names: Vec<(String,)> = store
            .run(|conn| Box::pin(async move { Ok(query_as("SELECT name FROM groups ORDER BY id").fetch_all(&mut *conn).await?) }))
            .await
            .unwrap();
        assert_eq!(names, vec![("slow".to_string(),), ("fast".to_string(),)]);
        store.close().await;
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("warden.db").display());

        let store = StoreBuilder::new().database_url(&url).max_connections(2).build().await.unwrap();
        store
            .run(|conn| {
                Box::pin(async move {
                    query("INSERT INTO groups (name) VALUES ('persisted')").execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .await
            .unwrap();
        store.close().await;

        // Migrations already applied are skipped on the second open.
        let reopened = StoreBuilder::new().database_url(&url).build().await.unwrap();
        let names: Vec<(String,)> = reopened
            .run(|conn| Box::pin(async move { Ok(query_as("SELECT name FROM groups").fetch_all(&mut *conn).await?) }))
            .await
            .unwrap();
        assert_eq!(names, vec![("persisted".to_string(),)]);
        reopened.close().await;

        drop_database(&url).await.unwrap();
        assert!(!dir.path().join("warden.db").exists());
    }
}
