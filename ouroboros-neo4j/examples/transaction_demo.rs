//! Transaction Demo Application
//!
//! Creates a small graph inside a scoped transaction, shows a rolled-back
//! unit of work, then reads the graph back and maps it into DTOs.
//!
//! Usage:
//!   cargo run --example transaction_demo
//!
//! Environment variables:
//!   NEO4J_SCHEME   - URI scheme (default: bolt)
//!   NEO4J_HOST     - Neo4j host (default: localhost)
//!   NEO4J_PORT     - Neo4j port (default: 7687)
//!   NEO4J_USERNAME - Neo4j username (default: neo4j)
//!   NEO4J_PASSWORD - Neo4j password (default: password)
//!   NEO4J_DATABASE - Neo4j database name (default: server default)

use ouroboros_neo4j::{
    map_array_with, map_with, run_in_transaction, statement, transaction, DtoConstructor,
    Neo4jConnection, Neo4jError, Neo4jService, Session, Target, Transaction, TransactionOptions,
};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct Person {
    id: i64,
    name: String,
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Knows {
    id: i64,
    since: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("=== Neo4j Transaction Demo ===");

    let connection = Neo4jConnection::from_env()?;
    info!("Connecting to Neo4j at {}", connection.uri());
    let service = Neo4jService::connect(connection).await?;

    info!("\n--- Committed Transaction ---");
    let session = service.write_session(None).await?;
    let ada: Person = transaction(&session, |tx| {
        Box::pin(async move {
            let result = tx
                .run(
                    statement(
                        "CREATE (a:Person:Demo {name: 'Ada'})-[:KNOWS {since: 1843}]->(:Person:Demo {name: 'Charles'}) RETURN a",
                    ),
                )
                .await?;
            map_with(&result.records[0], "a", &DtoConstructor::deserialize())
        })
    })
    .await?;
    info!("Created {} (id {}, labels {:?})", ada.name, ada.id, ada.labels);

    info!("\n--- Rolled-back Transaction ---");
    let options = TransactionOptions::new()
        .throw_on_error(false)
        .on_error(|e: &Neo4jError| {
            let message = e.to_string();
            Box::pin(async move {
                warn!("Unit of work failed, rolling back: {}", message);
                Ok::<(), Neo4jError>(())
            })
        });
    let outcome = run_in_transaction(
        &session,
        |tx| {
            Box::pin(async move {
                tx.run(statement("CREATE (:Person:Demo {name: 'Ghost'})"))
                    .await?;
                Err::<(), _>(Neo4jError::Other("validation failed".to_string()))
            })
        },
        options,
    )
    .await?;
    info!("Suppressed outcome: {:?}", outcome);
    session.close().await?;

    info!("\n--- Mapping Results ---");
    let result = service
        .read(
            statement(
                "MATCH (p:Demo)-[r:KNOWS]->(:Demo) RETURN collect(p) AS people, collect(r) AS rels",
            ),
            Target::Default,
        )
        .await?;
    if let Some(record) = result.first() {
        let people: Vec<Person> =
            map_array_with(record, "people", &DtoConstructor::deserialize())?;
        let rels: Vec<Knows> = map_array_with(record, "rels", &DtoConstructor::deserialize())?;
        for person in &people {
            info!("Person: {:?}", person);
        }
        for rel in &rels {
            info!("KNOWS {} since {}", rel.id, rel.since);
        }
    }

    service
        .write(statement("MATCH (d:Demo) DETACH DELETE d"), Target::Default)
        .await?;
    service.shutdown().await?;

    info!("\n=== Demo Complete ===");
    Ok(())
}
