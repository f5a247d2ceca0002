//! Driver capability traits
//!
//! The executor and the service only need a few things from a driver: open a
//! session, begin a transaction, run a statement, finish the transaction and
//! release resources. Those capabilities are described here as traits so the
//! lifecycle logic is independent of a concrete driver. [`bolt`] implements
//! them on top of `neo4rs`, [`crate::mock`] implements them in memory.

pub mod bolt;

use crate::error::Result;
use crate::value::Record;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::warn;

pub use bolt::{BoltDriver, BoltRecord, BoltSession, BoltTransaction};

/// A cypher statement with its parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Statement {
    /// Cypher text
    pub cypher: String,
    /// Named parameters referenced as `$name` in the cypher text
    pub params: HashMap<String, JsonValue>,
}

impl Statement {
    /// Create a statement without parameters
    pub fn new(cypher: impl Into<String>) -> Self {
        Self {
            cypher: cypher.into(),
            params: HashMap::new(),
        }
    }

    /// Attach a parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Attach every entry of a parameter map
    pub fn params<I, K>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }
}

/// Shorthand for [`Statement::new`]
pub fn statement(cypher: impl Into<String>) -> Statement {
    Statement::new(cypher)
}

/// Records returned by one statement, in driver order
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<R> {
    pub records: Vec<R>,
}

impl<R> QueryResult<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record, if any
    pub fn first(&self) -> Option<&R> {
        self.records.first()
    }
}

impl<R> IntoIterator for QueryResult<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Access mode requested for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
        }
    }
}

/// Parameters for opening a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Database name, `None` for the driver default
    pub database: Option<String>,
    /// Default access mode of the session
    pub access_mode: AccessMode,
}

impl SessionConfig {
    pub fn read(database: Option<String>) -> Self {
        Self {
            database,
            access_mode: AccessMode::Read,
        }
    }

    pub fn write(database: Option<String>) -> Self {
        Self {
            database,
            access_mode: AccessMode::Write,
        }
    }
}

/// Where a passthrough `read`/`write` call runs
///
/// A caller either names a database (a short-lived session is opened for the
/// call) or hands over a transaction it already holds.
pub enum Target<'a, T> {
    /// Short-lived session on the configured default database
    Default,
    /// Short-lived session on the named database
    Database(String),
    /// Run directly on an open transaction
    Transaction(&'a mut T),
}

impl<T> Default for Target<'_, T> {
    fn default() -> Self {
        Target::Default
    }
}

/// An open transaction
///
/// `close` must be idempotent. Closing a transaction that was neither
/// committed nor rolled back rolls it back.
#[async_trait]
pub trait Transaction: Send {
    type Record: Record + Send + Sync;

    /// Run a statement inside the transaction
    async fn run(&mut self, statement: Statement) -> Result<QueryResult<Self::Record>>;

    /// Make the transaction's effects durable
    async fn commit(&mut self) -> Result<()>;

    /// Discard the transaction's effects
    async fn rollback(&mut self) -> Result<()>;

    /// Release the transaction
    async fn close(&mut self) -> Result<()>;
}

/// A logical connection context able to begin transactions
#[async_trait]
pub trait Session: Send + Sync {
    type Transaction: Transaction;

    /// Begin an explicit transaction
    async fn begin_transaction(&self) -> Result<Self::Transaction>;

    /// Run a statement in a managed transaction
    ///
    /// Begins a transaction, runs the statement, commits and closes. The
    /// transaction is closed (and so rolled back) when the statement or the
    /// commit fails.
    async fn run(
        &self,
        statement: Statement,
    ) -> Result<QueryResult<<Self::Transaction as Transaction>::Record>> {
        let mut tx = self.begin_transaction().await?;

        let outcome = match tx.run(statement).await {
            Ok(result) => tx.commit().await.map(|_| result),
            Err(e) => Err(e),
        };

        if let Err(e) = tx.close().await {
            warn!("Failed to close managed transaction: {}", e);
        }

        outcome
    }

    /// Release the session; calling it again is a no-op
    async fn close(&self) -> Result<()>;
}

/// Factory for sessions
#[async_trait]
pub trait Driver: Send + Sync {
    type Session: Session;

    /// Open a session
    async fn session(&self, config: SessionConfig) -> Result<Self::Session>;

    /// Release every resource held by the driver
    async fn close(&self) -> Result<()>;
}

/// Transaction type produced by a driver's sessions
pub type DriverTransaction<D> = <<D as Driver>::Session as Session>::Transaction;

/// Record type produced by a driver's transactions
pub type DriverRecord<D> = <DriverTransaction<D> as Transaction>::Record;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_statement_builder() {
        let stmt = statement("MATCH (p:Person {name: $name}) RETURN p")
            .param("name", "Ada")
            .params(vec![("limit", json!(10))]);

        assert_eq!(stmt.cypher, "MATCH (p:Person {name: $name}) RETURN p");
        assert_eq!(stmt.params.get("name"), Some(&json!("Ada")));
        assert_eq!(stmt.params.get("limit"), Some(&json!(10)));
    }

    #[test]
    fn test_session_config() {
        let read = SessionConfig::read(Some("movies".to_string()));
        assert_eq!(read.access_mode, AccessMode::Read);
        assert_eq!(read.database.as_deref(), Some("movies"));

        let write = SessionConfig::write(None);
        assert_eq!(write.access_mode.as_str(), "write");
    }
}
