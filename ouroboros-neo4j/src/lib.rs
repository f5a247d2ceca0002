//! # Ouroboros Neo4j (ouroboros-neo4j)
//!
//! Transaction lifecycle and result mapping for Neo4j, built on `neo4rs`.
//!
//! ## Features
//!
//! - Scoped transactions with commit on success, rollback on failure and a
//!   close that runs on every path
//! - Optional error hooks, error suppression and unit-of-work timeouts
//! - Record mapping that flattens nodes and relationships into plain DTOs
//! - Driver capabilities expressed as traits, with a `neo4rs` adapter and an
//!   in-memory mock
//!
//! ## Scoped Transactions
//!
//! ```no_run
//! use ouroboros_neo4j::{
//!     run_in_transaction, statement, Neo4jConnection, Neo4jError, Neo4jService, Session,
//!     Transaction, TransactionOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = Neo4jService::connect(Neo4jConnection::from_env()?).await?;
//!     let session = service.write_session(None).await?;
//!
//!     let options = TransactionOptions::new().on_error(|e: &Neo4jError| {
//!         let message = e.to_string();
//!         Box::pin(async move {
//!             eprintln!("rolling back: {}", message);
//!             Ok::<(), Neo4jError>(())
//!         })
//!     });
//!
//!     run_in_transaction(
//!         &session,
//!         |tx| {
//!             Box::pin(async move {
//!                 tx.run(statement("CREATE (:Person {name: $name})").param("name", "Ada"))
//!                     .await?;
//!                 Ok::<_, Neo4jError>(())
//!             })
//!         },
//!         options,
//!     )
//!     .await?;
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Result Mapping
//!
//! ```no_run
//! use ouroboros_neo4j::{map, map_array, statement, Neo4jConnection, Neo4jService, Target};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = Neo4jService::connect(Neo4jConnection::from_env()?).await?;
//!
//!     let result = service
//!         .read(
//!             statement("MATCH (p:Person)-[r:KNOWS]->() RETURN p, collect(r) AS rels"),
//!             Target::Default,
//!         )
//!         .await?;
//!
//!     for record in result.records.iter() {
//!         println!("{} -> {:?}", map(record, "p")?, map_array(record, "rels")?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod mapper;
pub mod mock;
pub mod service;
pub mod transaction;
pub mod value;

// Re-export main types for convenience
pub use config::{Neo4jConnection, Neo4jConnectionBuilder};
pub use driver::{
    statement, AccessMode, BoltDriver, BoltRecord, BoltSession, BoltTransaction, Driver,
    QueryResult, Session, SessionConfig, Statement, Target, Transaction,
};
pub use error::{Neo4jError, Result};
pub use mapper::{map, map_array, map_array_with, map_with, DtoConstructor};
pub use service::{commit_error_hook, CommitErrorHook, Neo4jService, SessionTransaction};
pub use transaction::{run_in_transaction, transaction, ErrorHook, TransactionOptions};
pub use value::{FieldValue, GraphNode, GraphRelationship, MemoryRecord, Record};
