//! `neo4rs` implementation of the driver capabilities
//!
//! `neo4rs` binds a `Graph` (and its connection pool) to one database, so the
//! driver keeps one lazily connected graph per database name.

use crate::config::Neo4jConnection;
use crate::driver::{AccessMode, Driver, QueryResult, Session, SessionConfig, Statement, Transaction};
use crate::error::{Neo4jError, Result};
use crate::value::{FieldValue, GraphNode, GraphRelationship, Record};
use async_trait::async_trait;
use neo4rs::{
    BoltList, BoltMap, BoltNode, BoltNull, BoltRelation, BoltString, BoltType, ConfigBuilder, Graph,
    Query, Row, Txn,
};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Key under which the graph for the server's default database is cached
const DEFAULT_DATABASE_KEY: &str = "";

/// Driver backed by `neo4rs`
pub struct BoltDriver {
    connection: Neo4jConnection,
    graphs: Arc<RwLock<HashMap<String, Graph>>>,
}

impl BoltDriver {
    /// Validate the settings and connect to the default database
    ///
    /// # Example
    /// ```no_run
    /// use ouroboros_neo4j::{BoltDriver, Neo4jConnection};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let driver = BoltDriver::connect(Neo4jConnection::from_env()?).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(connection: Neo4jConnection) -> Result<Self> {
        connection.validate()?;

        let driver = Self {
            connection,
            graphs: Arc::new(RwLock::new(HashMap::new())),
        };
        let database = driver.connection.database.clone();
        driver.graph(database.as_deref()).await?;

        Ok(driver)
    }

    /// Connection settings in use
    pub fn connection(&self) -> &Neo4jConnection {
        &self.connection
    }

    /// Graph for the given database, connecting on first use
    pub async fn graph(&self, database: Option<&str>) -> Result<Graph> {
        let key = database.unwrap_or(DEFAULT_DATABASE_KEY).to_string();

        if let Some(graph) = self.graphs.read().await.get(&key) {
            return Ok(graph.clone());
        }

        let mut graphs = self.graphs.write().await;
        if let Some(graph) = graphs.get(&key) {
            return Ok(graph.clone());
        }

        info!(
            "Connecting to Neo4j at {} (database: {})",
            self.connection.uri(),
            database.unwrap_or("<default>")
        );

        let mut builder = ConfigBuilder::default()
            .uri(self.connection.uri())
            .user(self.connection.username.as_str())
            .password(self.connection.password.as_str())
            .fetch_size(self.connection.fetch_size)
            .max_connections(self.connection.max_connections);
        if let Some(db) = database {
            builder = builder.db(db);
        }

        let config = builder
            .build()
            .map_err(|e| Neo4jError::ConfigError(e.to_string()))?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| Neo4jError::ConnectionError(e.to_string()))?;

        info!("Successfully connected to Neo4j");
        graphs.insert(key, graph.clone());
        Ok(graph)
    }
}

#[async_trait]
impl Driver for BoltDriver {
    type Session = BoltSession;

    async fn session(&self, config: SessionConfig) -> Result<BoltSession> {
        let database = config.database.or_else(|| self.connection.database.clone());
        let graph = self.graph(database.as_deref()).await?;

        debug!(
            "Opened {} session (database: {})",
            config.access_mode.as_str(),
            database.as_deref().unwrap_or("<default>")
        );

        Ok(BoltSession {
            graph,
            database,
            access_mode: config.access_mode,
            closed: AtomicBool::new(false),
        })
    }

    async fn close(&self) -> Result<()> {
        let mut graphs = self.graphs.write().await;
        info!("Closing {} Neo4j connection pool(s)", graphs.len());
        graphs.clear();
        Ok(())
    }
}

/// Session over a `neo4rs` graph
///
/// `neo4rs` talks to a single server, so the access mode is informational.
pub struct BoltSession {
    graph: Graph,
    database: Option<String>,
    access_mode: AccessMode,
    closed: AtomicBool,
}

impl BoltSession {
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access_mode
    }
}

#[async_trait]
impl Session for BoltSession {
    type Transaction = BoltTransaction;

    async fn begin_transaction(&self) -> Result<BoltTransaction> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Neo4jError::transaction("begin", "session is closed"));
        }

        let txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| Neo4jError::transaction("begin", e.to_string()))?;

        Ok(BoltTransaction { inner: Some(txn) })
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed {} session", self.access_mode.as_str());
        }
        Ok(())
    }
}

/// Explicit `neo4rs` transaction
///
/// `neo4rs` consumes the transaction on commit and rollback; once finished the
/// handle is gone and `close` has nothing left to do.
pub struct BoltTransaction {
    inner: Option<Txn>,
}

impl BoltTransaction {
    fn open(&mut self, stage: &str) -> Result<&mut Txn> {
        self.inner
            .as_mut()
            .ok_or_else(|| Neo4jError::transaction(stage, "transaction is already finished"))
    }

    fn take(&mut self, stage: &str) -> Result<Txn> {
        self.inner
            .take()
            .ok_or_else(|| Neo4jError::transaction(stage, "transaction is already finished"))
    }
}

#[async_trait]
impl Transaction for BoltTransaction {
    type Record = BoltRecord;

    async fn run(&mut self, statement: Statement) -> Result<QueryResult<BoltRecord>> {
        let txn = self.open("run")?;

        let mut stream = txn
            .execute(to_query(&statement))
            .await
            .map_err(|e| Neo4jError::QueryError(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(row) = stream
            .next(txn.handle())
            .await
            .map_err(|e| Neo4jError::QueryError(format!("Failed to read row: {}", e)))?
        {
            records.push(BoltRecord { row });
        }

        Ok(QueryResult::new(records))
    }

    async fn commit(&mut self) -> Result<()> {
        self.take("commit")?
            .commit()
            .await
            .map_err(|e| Neo4jError::transaction("commit", e.to_string()))
    }

    async fn rollback(&mut self) -> Result<()> {
        self.take("rollback")?
            .rollback()
            .await
            .map_err(|e| Neo4jError::transaction("rollback", e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(txn) => {
                debug!("Closing unfinished transaction, rolling back");
                txn.rollback()
                    .await
                    .map_err(|e| Neo4jError::transaction("close", e.to_string()))
            }
            None => Ok(()),
        }
    }
}

/// A row returned by `neo4rs`, decoded field by field on access
pub struct BoltRecord {
    row: Row,
}

impl BoltRecord {
    /// The underlying `neo4rs` row
    pub fn row(&self) -> &Row {
        &self.row
    }
}

impl Record for BoltRecord {
    fn get(&self, key: &str) -> Result<FieldValue> {
        if !self.row.keys().iter().any(|k| k.value == key) {
            return Err(Neo4jError::MissingField(key.to_string()));
        }

        let value = self.row.get::<BoltType>(key).map_err(|e| {
            warn!("Failed to decode field '{}': {}", key, e);
            Neo4jError::MappingError(format!("Failed to decode field '{}': {}", key, e))
        })?;

        decode_value(value)
    }
}

/// Decode one Bolt value, telling graph entities apart element by element
fn decode_value(value: BoltType) -> Result<FieldValue> {
    match value {
        BoltType::Node(node) => decode_node(node).map(FieldValue::Node),
        BoltType::Relation(rel) => decode_relation(rel).map(FieldValue::Relationship),
        BoltType::List(list) => list
            .value
            .into_iter()
            .map(decode_value)
            .collect::<Result<Vec<_>>>()
            .map(FieldValue::List),
        other => to_json(other).map(FieldValue::Plain),
    }
}

fn decode_node(node: BoltNode) -> Result<GraphNode> {
    let labels = node
        .labels
        .value
        .into_iter()
        .map(|label| match label {
            BoltType::String(s) => Ok(s.value),
            other => Err(Neo4jError::MappingError(format!(
                "Node label is not a string: {:?}",
                other
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(GraphNode::new(
        node.id.value,
        labels,
        decode_properties(node.properties)?,
    ))
}

fn decode_relation(rel: BoltRelation) -> Result<GraphRelationship> {
    Ok(GraphRelationship::new(
        rel.id.value,
        rel.start_node_id.value,
        rel.end_node_id.value,
        rel.typ.value,
        decode_properties(rel.properties)?,
    ))
}

fn decode_properties(properties: BoltMap) -> Result<Map<String, JsonValue>> {
    properties
        .value
        .into_iter()
        .map(|(k, v)| to_json(v).map(|v| (k.value, v)))
        .collect()
}

/// Plain shape of a Bolt value
///
/// Entities nested inside maps keep their raw layout. Temporal, spatial and
/// byte values have no plain shape and are reported as mapping errors.
fn to_json(value: BoltType) -> Result<JsonValue> {
    match value {
        BoltType::Null(_) => Ok(JsonValue::Null),
        BoltType::Boolean(b) => Ok(JsonValue::Bool(b.value)),
        BoltType::Integer(i) => Ok(JsonValue::from(i.value)),
        BoltType::Float(f) => Ok(serde_json::Number::from_f64(f.value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)),
        BoltType::String(s) => Ok(JsonValue::String(s.value)),
        BoltType::List(list) => list
            .value
            .into_iter()
            .map(to_json)
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array),
        BoltType::Map(map) => decode_properties(map).map(JsonValue::Object),
        BoltType::Node(node) => decode_node(node).map(|n| FieldValue::Node(n).to_raw()),
        BoltType::Relation(rel) => {
            decode_relation(rel).map(|r| FieldValue::Relationship(r).to_raw())
        }
        other => Err(Neo4jError::MappingError(format!(
            "Value has no plain representation: {:?}",
            other
        ))),
    }
}

fn to_query(statement: &Statement) -> Query {
    statement
        .params
        .iter()
        .fold(neo4rs::query(&statement.cypher), |q, (key, value)| {
            q.param(key, to_bolt(value))
        })
}

fn to_bolt(value: &JsonValue) -> BoltType {
    match value {
        JsonValue::Null => BoltType::Null(BoltNull),
        JsonValue::Bool(b) => BoltType::from(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => BoltType::from(s.as_str()),
        JsonValue::Array(items) => {
            let mut list = BoltList::with_capacity(items.len());
            for item in items {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        }
        JsonValue::Object(entries) => {
            let mut map = BoltMap::with_capacity(entries.len());
            for (k, v) in entries {
                map.put(BoltString::from(k.as_str()), to_bolt(v));
            }
            BoltType::Map(map)
        }
    }
}
