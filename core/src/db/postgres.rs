// Classbook
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! PostgreSQL backend, used in production.

use crate::db::{Db, DbError, DbResult, Executor, TxExecutor};
use crate::env::{get_optional_var, get_required_var};
use async_trait::async_trait;
use derivative::Derivative;
use log::warn;
use sqlx::Transaction;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{
    PgConnectOptions, PgConnection, PgDatabaseError, PgPool, PgPoolOptions, Postgres,
};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// Number of times to retry reaching an overloaded server when `MAX_RETRIES` is not set.
const DEFAULT_MAX_RETRIES: u16 = 60;

/// How long to wait for a pooled connection before considering the server unavailable.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Wait before the first retry, not counting jitter.
const FIRST_DELAY: Duration = Duration::from_millis(100);

/// Longest wait between two consecutive attempts.
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Converts a raw sqlx error into a `DbError`.
pub fn map_sqlx_error(e: sqlx::Error) -> DbError {
    match e {
        sqlx::Error::ColumnDecode { source, .. } => DbError::DataIntegrityError(source.to_string()),
        sqlx::Error::Database(e) => {
            let code = e.downcast_ref::<PgDatabaseError>().code().to_owned();
            match code.as_str() {
                "23503" => DbError::NotFound,
                "23505" => DbError::AlreadyExists,
                "53300" => DbError::Unavailable,
                _ => DbError::BackendError(format!("PostgreSQL error {}: {}", code, e)),
            }
        }
        sqlx::Error::PoolTimedOut => DbError::Unavailable,
        sqlx::Error::RowNotFound => DbError::NotFound,
        e => DbError::BackendError(e.to_string()),
    }
}

/// Settings to reach the PostgreSQL server.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PostgresOptions {
    /// Server hostname.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Name of the database holding the service's tables.
    pub database: String,

    /// Role to log in as.
    pub username: String,

    /// Password for `username`.
    #[derivative(Debug = "ignore")]
    pub password: String,

    /// Cap on the number of pooled connections.  Uses the sqlx default when not set.
    pub max_connections: Option<u32>,

    /// How many times to retry obtaining a connection while the server reports itself overloaded.
    pub max_retries: u16,
}

impl PostgresOptions {
    /// Loads the settings from the `<prefix>_HOST`, `<prefix>_PORT`, `<prefix>_DATABASE`,
    /// `<prefix>_USERNAME` and `<prefix>_PASSWORD` variables, plus the optional
    /// `<prefix>_MAX_CONNECTIONS` and `<prefix>_MAX_RETRIES`.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        Ok(Self {
            host: get_required_var(prefix, "HOST")?,
            port: get_required_var(prefix, "PORT")?,
            database: get_required_var(prefix, "DATABASE")?,
            username: get_required_var(prefix, "USERNAME")?,
            password: get_required_var(prefix, "PASSWORD")?,
            max_connections: get_optional_var(prefix, "MAX_CONNECTIONS")?,
            max_retries: get_optional_var(prefix, "MAX_RETRIES")?.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }

    /// Builds the sqlx description of the server to connect to.
    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
    }
}

/// Executor for the PostgreSQL backend.  Queries run against the connection it derefs to.
#[derive(Debug)]
pub enum PostgresExecutor {
    /// A connection checked out of the pool.
    PoolExec(PoolConnection<Postgres>),

    /// An open transaction.
    TxExec(Transaction<'static, Postgres>),
}

impl PostgresExecutor {
    /// Commits the transaction.  Panics if the executor is not a transaction.
    pub(super) async fn commit(self) -> DbResult<()> {
        match self {
            PostgresExecutor::PoolExec(_) => unreachable!("Do not call commit on direct executors"),
            PostgresExecutor::TxExec(tx) => tx.commit().await.map_err(map_sqlx_error),
        }
    }
}

impl Deref for PostgresExecutor {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        match self {
            PostgresExecutor::PoolExec(conn) => conn,
            PostgresExecutor::TxExec(tx) => tx,
        }
    }
}

impl DerefMut for PostgresExecutor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            PostgresExecutor::PoolExec(conn) => conn,
            PostgresExecutor::TxExec(tx) => tx,
        }
    }
}

/// Random extra wait added to every delay so that clients do not retry in lockstep.
fn jitter() -> Duration {
    Duration::from_millis(u64::from(rand::random::<u16>() % 250))
}

/// Schedule of waits between attempts to reach an overloaded server.
struct Backoff {
    /// Wait to apply before the next attempt.
    delay: Duration,

    /// Attempts left after the current one.
    remaining: u16,
}

impl Backoff {
    /// Creates a schedule that allows `retries` attempts after the first one.
    fn new(retries: u16) -> Self {
        Self { delay: FIRST_DELAY + jitter(), remaining: retries }
    }

    /// Consumes one retry and returns how long to wait before it, or `None` once exhausted.
    fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let delay = self.delay;
        self.delay = (self.delay * 2 + jitter()).min(MAX_DELAY);
        Some(delay)
    }
}

/// Runs `op` until it succeeds, fails with something other than `DbError::Unavailable`, or runs
/// out of `retries`.
async fn with_backoff<T, F, Fut>(retries: u16, op: F) -> DbResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut backoff = Backoff::new(retries);
    loop {
        let e = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => map_sqlx_error(e),
        };
        match (e, backoff.next_delay()) {
            (DbError::Unavailable, Some(delay)) => {
                warn!(
                    "Database unavailable; retrying in {}ms with {} attempts left",
                    delay.as_millis(),
                    backoff.remaining
                );
                tokio::time::sleep(delay).await;
            }
            (e, _) => return Err(e),
        }
    }
}

/// Database backed by a PostgreSQL connection pool.
pub struct PostgresDb {
    /// Pool shared by all executors handed out by this database.
    pool: PgPool,

    /// Retries allowed when obtaining a connection from an overloaded server.
    max_retries: u16,
}

impl PostgresDb {
    /// Prepares a pool for the server described by `opts`.  Connections are opened on demand.
    pub fn connect(opts: PostgresOptions) -> Self {
        let mut pool = PgPoolOptions::new().acquire_timeout(ACQUIRE_TIMEOUT);
        if let Some(max_connections) = opts.max_connections {
            pool = pool.max_connections(max_connections);
        }
        let pool = pool.connect_lazy_with(opts.connect_options());
        Self { pool, max_retries: opts.max_retries }
    }

    /// Checks out a connection from the pool.
    async fn acquire(&self) -> DbResult<PostgresExecutor> {
        let conn = with_backoff(self.max_retries, || self.pool.acquire()).await?;
        Ok(PostgresExecutor::PoolExec(conn))
    }
}

impl Drop for PostgresDb {
    fn drop(&mut self) {
        if !self.pool.is_closed() {
            warn!("Dropping connection without having called close() first");
        }
    }
}

#[async_trait]
impl Db for PostgresDb {
    async fn ex(&self) -> DbResult<Executor> {
        Ok(Executor::Postgres(self.acquire().await?))
    }

    async fn begin(&self) -> DbResult<TxExecutor> {
        let tx = with_backoff(self.max_retries, || self.pool.begin()).await?;
        Ok(TxExecutor(Executor::Postgres(PostgresExecutor::TxExec(tx))))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Runs `schema`, which may contain multiple statements.
pub async fn run_schema(e: &mut PostgresExecutor, schema: &str) -> DbResult<()> {
    sqlx::raw_sql(schema).execute(&mut **e).await.map_err(map_sqlx_error)?;
    Ok(())
}

/// Test utilities for the PostgreSQL backend.
#[cfg(any(feature = "testutils", test))]
pub mod testutils {
    use super::*;

    /// Connects to the database described by the `PGSQL_TEST_*` variables.
    ///
    /// Tables land in `pg_temp` and vanish on disconnection.  `pg_temp` is per connection, so the
    /// pool holds exactly one connection for its whole lifetime.
    pub async fn setup() -> PostgresDb {
        let _can_fail = env_logger::builder().is_test(true).try_init();

        let opts = PostgresOptions::from_env("PGSQL_TEST").unwrap();
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy_with(opts.connect_options());
        let db = PostgresDb { pool, max_retries: opts.max_retries };

        let mut ex = db.acquire().await.unwrap();
        sqlx::query("SET search_path TO pg_temp").execute(&mut *ex).await.unwrap();
        db
    }
}
