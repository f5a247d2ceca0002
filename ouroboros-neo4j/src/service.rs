//! Application-facing service over a driver
//!
//! Session factories, `read`/`write` passthroughs and a transaction mode that
//! owns its session from open to close.

use crate::config::Neo4jConnection;
use crate::driver::{
    AccessMode, BoltDriver, Driver, DriverRecord, DriverTransaction, QueryResult, Session,
    SessionConfig, Statement, Target, Transaction,
};
use crate::error::{Neo4jError, Result};
use crate::transaction::close_transaction;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::Display;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hook observing a failed commit
pub type CommitErrorHook<E> = Box<dyn for<'e> FnOnce(&'e E) -> BoxFuture<'e, std::result::Result<(), E>> + Send>;

/// Box a closure as a [`CommitErrorHook`]
pub fn commit_error_hook<E, F>(hook: F) -> CommitErrorHook<E>
where
    F: for<'e> FnOnce(&'e E) -> BoxFuture<'e, std::result::Result<(), E>> + Send + 'static,
{
    Box::new(hook)
}

/// Entry point for application code
///
/// # Example
/// ```no_run
/// use ouroboros_neo4j::{statement, Neo4jConnection, Neo4jService, Target};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let service = Neo4jService::connect(Neo4jConnection::from_env()?).await?;
///
///     let result = service
///         .read(statement("MATCH (p:Person) RETURN p"), Target::Default)
///         .await?;
///     println!("Found {} people", result.len());
///
///     service.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct Neo4jService<D: Driver> {
    driver: D,
    connection: Neo4jConnection,
}

impl Neo4jService<BoltDriver> {
    /// Connect a `neo4rs`-backed service
    pub async fn connect(connection: Neo4jConnection) -> Result<Self> {
        let driver = BoltDriver::connect(connection.clone()).await?;
        Ok(Self::new(driver, connection))
    }
}

impl<D: Driver> Neo4jService<D> {
    /// Wrap an already constructed driver
    pub fn new(driver: D, connection: Neo4jConnection) -> Self {
        Self { driver, connection }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &Neo4jConnection {
        &self.connection
    }

    fn session_config(&self, database: Option<&str>, access_mode: AccessMode) -> SessionConfig {
        SessionConfig {
            database: database
                .map(str::to_string)
                .or_else(|| self.connection.database.clone()),
            access_mode,
        }
    }

    /// Open a read session on `database`, or the configured default
    pub async fn read_session(&self, database: Option<&str>) -> Result<D::Session> {
        self.driver
            .session(self.session_config(database, AccessMode::Read))
            .await
    }

    /// Open a write session on `database`, or the configured default
    pub async fn write_session(&self, database: Option<&str>) -> Result<D::Session> {
        self.driver
            .session(self.session_config(database, AccessMode::Write))
            .await
    }

    /// Begin a transaction on a fresh write session
    ///
    /// The returned handle owns the session; closing the handle closes both.
    pub async fn begin_transaction(
        &self,
        database: Option<&str>,
    ) -> Result<SessionTransaction<D::Session>> {
        let session = self.write_session(database).await?;
        match session.begin_transaction().await {
            Ok(tx) => Ok(SessionTransaction {
                session,
                tx,
                closed: false,
            }),
            Err(e) => {
                close_session(&session).await;
                Err(e)
            }
        }
    }

    /// Run a read statement
    ///
    /// With [`Target::Transaction`] the statement runs on that transaction.
    /// Otherwise a read session is opened on the target database, the
    /// statement runs in a managed transaction and the session is closed.
    pub async fn read(
        &self,
        statement: Statement,
        target: Target<'_, DriverTransaction<D>>,
    ) -> Result<QueryResult<DriverRecord<D>>> {
        self.dispatch(statement, target, AccessMode::Read).await
    }

    /// Run a write statement; see [`Neo4jService::read`] for target handling
    pub async fn write(
        &self,
        statement: Statement,
        target: Target<'_, DriverTransaction<D>>,
    ) -> Result<QueryResult<DriverRecord<D>>> {
        self.dispatch(statement, target, AccessMode::Write).await
    }

    async fn dispatch(
        &self,
        statement: Statement,
        target: Target<'_, DriverTransaction<D>>,
        access_mode: AccessMode,
    ) -> Result<QueryResult<DriverRecord<D>>> {
        let database = match target {
            Target::Transaction(tx) => return tx.run(statement).await,
            Target::Database(name) => Some(name),
            Target::Default => None,
        };

        let session = self
            .driver
            .session(self.session_config(database.as_deref(), access_mode))
            .await?;
        let result = session.run(statement).await;
        close_session(&session).await;

        result
    }

    /// Run `run` in a transaction on a dedicated write session
    ///
    /// On success the transaction is committed. When the commit fails the
    /// commit-error hook is awaited and the commit error is returned (the
    /// hook's own error replaces it if the hook fails). A failing `run` is
    /// returned unchanged with no hook call; closing the uncommitted
    /// transaction rolls it back. The transaction and then the session are
    /// closed on every path.
    pub async fn transaction<E, F>(
        &self,
        run: F,
        on_commit_error: Option<CommitErrorHook<E>>,
    ) -> std::result::Result<(), E>
    where
        E: From<Neo4jError> + Display,
        F: for<'t> FnOnce(&'t mut DriverTransaction<D>) -> BoxFuture<'t, std::result::Result<(), E>>,
    {
        let tx_id = Uuid::new_v4();
        let session = self.write_session(None).await?;

        let mut tx = match session.begin_transaction().await {
            Ok(tx) => tx,
            Err(e) => {
                close_session(&session).await;
                return Err(E::from(e));
            }
        };
        debug!(%tx_id, "Write transaction begun");

        let outcome = match run(&mut tx).await {
            Ok(()) => match tx.commit().await {
                Ok(()) => {
                    debug!(%tx_id, "Write transaction committed");
                    Ok(())
                }
                Err(e) => {
                    warn!(%tx_id, "Commit failed: {}", e);
                    let err = E::from(e);
                    match on_commit_error {
                        Some(hook) => match hook(&err).await {
                            Ok(()) => Err(err),
                            Err(hook_err) => {
                                warn!(%tx_id, "Commit error hook failed ({}), commit error was: {}", hook_err, err);
                                Err(hook_err)
                            }
                        },
                        None => Err(err),
                    }
                }
            },
            Err(e) => {
                debug!(%tx_id, "Write transaction failed: {}", e);
                Err(e)
            }
        };

        close_transaction(&mut tx, tx_id).await;
        close_session(&session).await;
        outcome
    }

    /// Release the driver
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down Neo4j service");
        self.driver.close().await
    }
}

async fn close_session<S: Session>(session: &S) {
    if let Err(e) = session.close().await {
        warn!("Failed to close session: {}", e);
    }
}

/// A transaction together with the session it was begun on
pub struct SessionTransaction<S: Session> {
    session: S,
    tx: S::Transaction,
    closed: bool,
}

impl<S: Session> SessionTransaction<S> {
    pub fn session(&self) -> &S {
        &self.session
    }

    /// The inner transaction, e.g. for [`Target::Transaction`]
    pub fn transaction(&mut self) -> &mut S::Transaction {
        &mut self.tx
    }
}

#[async_trait]
impl<S: Session> Transaction for SessionTransaction<S> {
    type Record = <S::Transaction as Transaction>::Record;

    async fn run(&mut self, statement: Statement) -> Result<QueryResult<Self::Record>> {
        self.tx.run(statement).await
    }

    async fn commit(&mut self) -> Result<()> {
        self.tx.commit().await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.tx.rollback().await
    }

    /// Close the transaction, then the session
    ///
    /// The session is closed even when closing the transaction fails; the
    /// transaction's error is returned.
    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let tx_result = self.tx.close().await;
        let session_result = self.session.close().await;
        tx_result.and(session_result)
    }
}
