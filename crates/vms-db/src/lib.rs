//! # vms-db
//!
//! libSQL persistence gateway for vmsync.
//!
//! Holds one table, `vm_inventory`, keyed by VM identity and tagged with the
//! scope that produced each row. Workers open their own [`VmStoreSession`]
//! (one connection each) for the duration of a batch; the connection is
//! released when the session is dropped.
//!
//! Local files run in WAL mode with a busy timeout so concurrent batch
//! sessions queue for the write lock instead of failing. Remote `libsql://`
//! databases go through the Hrana protocol and need neither.

pub mod error;
mod gateway;
mod helpers;
mod migrations;
pub mod session;

use std::sync::Arc;

use libsql::Builder;
use tokio::sync::Mutex;
use vms_config::DatabaseConfig;

use error::DatabaseError;
pub use session::VmStoreSession;

/// How long a local connection waits for the write lock.
const BUSY_TIMEOUT_MS: u32 = 5_000;

enum Backing {
    /// A local file or remote database; every session gets its own connection.
    Database { db: libsql::Database, local: bool },
    /// `:memory:` only exists inside one connection, so sessions share it and
    /// take turns writing.
    Memory {
        conn: libsql::Connection,
        gate: Arc<Mutex<()>>,
    },
}

/// Handle to the inventory database.
pub struct VmStore {
    backing: Backing,
}

impl VmStore {
    /// Open the database described by `config` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.is_remote() {
            Self::open_remote(&config.url, &config.auth_token).await
        } else {
            Self::open_local(&config.url).await
        }
    }

    /// Open a local database file, or `":memory:"`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        migrations::run_migrations(&conn).await?;

        if path == ":memory:" {
            return Ok(Self {
                backing: Backing::Memory {
                    conn,
                    gate: Arc::new(Mutex::new(())),
                },
            });
        }

        // journal_mode returns a row, so it goes through query()
        conn.query("PRAGMA journal_mode = WAL", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA journal_mode: {e}")))?;
        tracing::debug!(path, "opened local inventory database");
        Ok(Self {
            backing: Backing::Database { db, local: true },
        })
    }

    /// Open a remote libSQL database.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be reached or
    /// migrations fail.
    pub async fn open_remote(url: &str, auth_token: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await?;
        let conn = db.connect()?;
        migrations::run_migrations(&conn).await?;
        tracing::debug!(url, "opened remote inventory database");
        Ok(Self {
            backing: Backing::Database { db, local: false },
        })
    }

    /// Open a session with its own connection.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a connection cannot be established.
    pub async fn session(&self) -> Result<VmStoreSession, DatabaseError> {
        match &self.backing {
            Backing::Database { db, local } => {
                let conn = db.connect()?;
                if *local {
                    conn.query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"), ())
                        .await?;
                }
                Ok(VmStoreSession::new(conn, None))
            }
            Backing::Memory { conn, gate } => {
                Ok(VmStoreSession::new(conn.clone(), Some(Arc::clone(gate))))
            }
        }
    }
}
