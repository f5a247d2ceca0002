//! Scoped transaction execution
//!
//! A unit of work runs inside a transaction begun on a caller-owned session.
//! The transaction is committed when the unit of work succeeds, rolled back
//! when it fails, and closed on every path. The session is left open.
//!
//! ```no_run
//! use ouroboros_neo4j::{statement, transaction, BoltDriver, Driver, Neo4jConnection, Neo4jError, Session, SessionConfig, Transaction};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let driver = BoltDriver::connect(Neo4jConnection::from_env()?).await?;
//!     let session = driver.session(SessionConfig::write(None)).await?;
//!
//!     let created = transaction(&session, |tx| {
//!         Box::pin(async move {
//!             let result = tx
//!                 .run(statement("CREATE (p:Person {name: $name}) RETURN p").param("name", "Ada"))
//!                 .await?;
//!             Ok::<_, Neo4jError>(result.len())
//!         })
//!     })
//!     .await?;
//!
//!     println!("Created {} node(s)", created);
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

use crate::driver::{Session, Transaction};
use crate::error::Neo4jError;
use futures::future::BoxFuture;
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Hook observing a failed unit of work before rollback
pub type ErrorHook<E> = Box<dyn for<'e> FnOnce(&'e E) -> BoxFuture<'e, Result<(), E>> + Send>;

/// Options for [`run_in_transaction`]
pub struct TransactionOptions<E> {
    on_error: Option<ErrorHook<E>>,
    throw_on_error: bool,
    timeout: Option<Duration>,
}

impl<E> Default for TransactionOptions<E> {
    fn default() -> Self {
        Self {
            on_error: None,
            throw_on_error: true,
            timeout: None,
        }
    }
}

impl<E> TransactionOptions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook awaited with the failure before the transaction is rolled back
    ///
    /// An error returned by the hook is propagated to the caller even when
    /// `throw_on_error` is off.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: for<'e> FnOnce(&'e E) -> BoxFuture<'e, Result<(), E>> + Send + 'static,
    {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Whether a failure is returned to the caller after cleanup (default `true`)
    pub fn throw_on_error(mut self, throw: bool) -> Self {
        self.throw_on_error = throw;
        self
    }

    /// Upper bound for the unit of work; exceeding it counts as a failure
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

enum Failure<E> {
    /// Unit of work, timeout or commit failure
    Work(E),
    /// The error hook itself failed
    Hook(E),
}

/// Run `uow` in a transaction on `session`
///
/// Returns `Ok(Some(value))` after a successful commit. On failure the error
/// hook (if any) is awaited, the transaction is rolled back, and then either
/// the original error is returned or, with `throw_on_error(false)`, `Ok(None)`.
/// The transaction is closed on every path; rollback and close failures are
/// logged and never replace the original error.
pub async fn run_in_transaction<S, T, E, F>(
    session: &S,
    uow: F,
    options: TransactionOptions<E>,
) -> Result<Option<T>, E>
where
    S: Session,
    E: From<Neo4jError> + Display,
    F: for<'t> FnOnce(&'t mut S::Transaction) -> BoxFuture<'t, Result<T, E>>,
{
    let TransactionOptions {
        on_error,
        throw_on_error,
        timeout,
    } = options;

    match execute(session, uow, on_error, timeout).await {
        Ok(value) => Ok(Some(value)),
        Err(Failure::Hook(e)) => Err(e),
        Err(Failure::Work(e)) if throw_on_error => Err(e),
        Err(Failure::Work(e)) => {
            debug!("Suppressing transaction failure: {}", e);
            Ok(None)
        }
    }
}

/// Run `uow` in a transaction on `session` with default options
///
/// No error hook; failures are returned after rollback and close.
pub async fn transaction<S, T, E, F>(session: &S, uow: F) -> Result<T, E>
where
    S: Session,
    E: From<Neo4jError> + Display,
    F: for<'t> FnOnce(&'t mut S::Transaction) -> BoxFuture<'t, Result<T, E>>,
{
    match execute(session, uow, None, None).await {
        Ok(value) => Ok(value),
        Err(Failure::Work(e)) | Err(Failure::Hook(e)) => Err(e),
    }
}

async fn execute<S, T, E, F>(
    session: &S,
    uow: F,
    on_error: Option<ErrorHook<E>>,
    timeout: Option<Duration>,
) -> Result<T, Failure<E>>
where
    S: Session,
    E: From<Neo4jError> + Display,
    F: for<'t> FnOnce(&'t mut S::Transaction) -> BoxFuture<'t, Result<T, E>>,
{
    let tx_id = Uuid::new_v4();
    let mut tx = session
        .begin_transaction()
        .await
        .map_err(|e| Failure::Work(E::from(e)))?;
    debug!(%tx_id, "Transaction begun");

    let work = uow(&mut tx);
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(E::from(timeout_error(limit))),
        },
        None => work.await,
    };

    let outcome = match outcome {
        Ok(value) => match tx.commit().await {
            Ok(()) => {
                debug!(%tx_id, "Transaction committed");
                Ok(value)
            }
            Err(e) => {
                warn!(%tx_id, "Commit failed: {}", e);
                Err(E::from(e))
            }
        },
        Err(e) => {
            debug!(%tx_id, "Unit of work failed: {}", e);
            Err(e)
        }
    };

    let outcome = match outcome {
        Ok(value) => Ok(value),
        Err(e) => Err(recover(&mut tx, e, on_error, tx_id).await),
    };

    close_transaction(&mut tx, tx_id).await;
    outcome
}

/// Timeout error for a unit of work; the limit saturates at `u64::MAX` ms
fn timeout_error(limit: Duration) -> Neo4jError {
    Neo4jError::TimeoutError {
        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        context: "unit of work".to_string(),
    }
}

/// Await the hook, then roll back
async fn recover<X, E>(tx: &mut X, err: E, on_error: Option<ErrorHook<E>>, tx_id: Uuid) -> Failure<E>
where
    X: Transaction,
    E: Display,
{
    let hook_failure = match on_error {
        Some(hook) => hook(&err).await.err(),
        None => None,
    };

    match tx.rollback().await {
        Ok(()) => debug!(%tx_id, "Transaction rolled back"),
        Err(e) => error!(%tx_id, "Rollback failed after '{}': {}", err, e),
    }

    match hook_failure {
        Some(hook_err) => {
            warn!(%tx_id, "Error hook failed ({}), original error was: {}", hook_err, err);
            Failure::Hook(hook_err)
        }
        None => Failure::Work(err),
    }
}

/// Close `tx`, logging instead of propagating a failure
pub(crate) async fn close_transaction<X: Transaction>(tx: &mut X, tx_id: Uuid) {
    match tx.close().await {
        Ok(()) => debug!(%tx_id, "Transaction closed"),
        Err(e) => error!(%tx_id, "Failed to close transaction: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockStep, TxEvent};
    use crate::Result;

    #[tokio::test]
    async fn test_commit_then_close() {
        let driver = MockDriver::new();
        let session = driver.mock_session();

        let value = transaction(&session, |_tx| Box::pin(async { Ok::<_, Neo4jError>(5) }))
            .await
            .unwrap();

        assert_eq!(value, 5);
        let log = driver.log();
        assert_eq!(log.count(&TxEvent::Commit), 1);
        assert_eq!(log.count(&TxEvent::Rollback), 0);
        assert_eq!(log.count(&TxEvent::Close), 1);
        assert!(log.position(&TxEvent::Commit) < log.position(&TxEvent::Close));
    }

    #[tokio::test]
    async fn test_begin_failure_skips_cleanup() {
        let driver = MockDriver::new();
        let session = driver.mock_session();
        driver.fail_on(MockStep::Begin);

        let result: Result<()> =
            transaction(&session, |_tx| Box::pin(async { Ok::<_, Neo4jError>(()) })).await;

        assert!(matches!(result, Err(Neo4jError::TransactionError { .. })));
        assert_eq!(driver.log().count(&TxEvent::Close), 0);
    }

    #[test]
    fn test_timeout_error_saturates() {
        assert!(matches!(
            timeout_error(Duration::from_millis(250)),
            Neo4jError::TimeoutError { timeout_ms: 250, .. }
        ));
        assert!(matches!(
            timeout_error(Duration::MAX),
            Neo4jError::TimeoutError { timeout_ms: u64::MAX, .. }
        ));
    }

    #[tokio::test]
    async fn test_close_failure_keeps_committed_result() {
        let driver = MockDriver::new();
        let session = driver.mock_session();
        driver.fail_on(MockStep::Close);

        let value = transaction(&session, |_tx| Box::pin(async { Ok::<_, Neo4jError>("done") }))
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(driver.log().count(&TxEvent::Close), 1);
    }
}
