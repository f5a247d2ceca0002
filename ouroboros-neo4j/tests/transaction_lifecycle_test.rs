//! Integration tests for the scoped transaction executor
//!
//! These tests run against the in-memory mock driver and assert on the
//! recorded order of lifecycle calls.

use ouroboros_neo4j::mock::{MockDriver, MockStep, TxEvent};
use ouroboros_neo4j::{
    run_in_transaction, statement, transaction, AccessMode, Neo4jError, Session, Transaction,
    TransactionOptions,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq)]
enum AppError {
    #[error("database: {0}")]
    Database(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("hook: {0}")]
    Hook(String),
}

impl From<Neo4jError> for AppError {
    fn from(e: Neo4jError) -> Self {
        AppError::Database(e.to_string())
    }
}

fn opened() -> TxEvent {
    TxEvent::SessionOpened {
        database: None,
        access_mode: AccessMode::Write,
    }
}

#[tokio::test]
async fn test_commit_on_success() {
    let driver = MockDriver::new();
    let session = driver.mock_session();

    let value = transaction(&session, |tx| {
        Box::pin(async move {
            tx.run(statement("CREATE (p:Person {name: $name})").param("name", "Ada"))
                .await?;
            Ok::<_, AppError>(7)
        })
    })
    .await
    .expect("transaction should commit");

    assert_eq!(value, 7);
    assert_eq!(
        driver.log().events(),
        vec![
            opened(),
            TxEvent::Begin,
            TxEvent::Run("CREATE (p:Person {name: $name})".to_string()),
            TxEvent::Commit,
            TxEvent::Close,
        ]
    );
}

#[tokio::test]
async fn test_rollback_on_failure() {
    let driver = MockDriver::new();
    let session = driver.mock_session();

    let result = transaction(&session, |tx| {
        Box::pin(async move {
            tx.run(statement("CREATE (p:Person)")).await?;
            Err::<(), _>(AppError::Validation("age must be positive".to_string()))
        })
    })
    .await;

    assert_eq!(
        result,
        Err(AppError::Validation("age must be positive".to_string()))
    );

    let log = driver.log();
    assert_eq!(log.count(&TxEvent::Commit), 0);
    assert_eq!(log.count(&TxEvent::Rollback), 1);
    assert_eq!(log.count(&TxEvent::Close), 1);
    assert!(log.position(&TxEvent::Rollback) < log.position(&TxEvent::Close));
}

#[tokio::test]
async fn test_error_hook_completes_before_rollback() {
    let driver = MockDriver::new();
    let session = driver.mock_session();
    let log = driver.log();
    let hook_log = log.clone();

    let options = TransactionOptions::new().on_error(move |e: &AppError| {
        let seen = e.to_string();
        Box::pin(async move {
            tokio::task::yield_now().await;
            hook_log.mark(&format!("hook:{}", seen));
            Ok::<(), AppError>(())
        })
    });

    let result = run_in_transaction(
        &session,
        |_tx| Box::pin(async { Err::<(), _>(AppError::Validation("boom".to_string())) }),
        options,
    )
    .await;

    assert!(result.is_err());
    let hook = TxEvent::Marker("hook:validation: boom".to_string());
    assert_eq!(log.count(&hook), 1);
    assert!(log.position(&hook) < log.position(&TxEvent::Rollback));
    assert!(log.position(&TxEvent::Rollback) < log.position(&TxEvent::Close));
}

#[tokio::test]
async fn test_throw_on_error_false_swallows_failure() {
    let driver = MockDriver::new();
    let session = driver.mock_session();

    let result = run_in_transaction(
        &session,
        |_tx| Box::pin(async { Err::<u32, _>(AppError::Validation("ignored".to_string())) }),
        TransactionOptions::new().throw_on_error(false),
    )
    .await;

    assert_eq!(result, Ok(None));
    let log = driver.log();
    assert_eq!(log.count(&TxEvent::Rollback), 1);
    assert_eq!(log.count(&TxEvent::Close), 1);
}

#[tokio::test]
async fn test_throw_on_error_default_propagates_original() {
    let driver = MockDriver::new();
    let session = driver.mock_session();

    let result = run_in_transaction(
        &session,
        |_tx| Box::pin(async { Err::<u32, _>(AppError::Validation("original".to_string())) }),
        TransactionOptions::default(),
    )
    .await;

    assert_eq!(result, Err(AppError::Validation("original".to_string())));
}

#[tokio::test]
async fn test_success_returns_some() {
    let driver = MockDriver::new();
    let session = driver.mock_session();

    let result = run_in_transaction(
        &session,
        |_tx| Box::pin(async { Ok::<_, AppError>("ok") }),
        TransactionOptions::new().throw_on_error(false),
    )
    .await;

    assert_eq!(result, Ok(Some("ok")));
    assert_eq!(driver.log().count(&TxEvent::Commit), 1);
}

#[tokio::test]
async fn test_commit_failure_rolls_back_and_calls_hook() {
    let driver = MockDriver::new();
    let session = driver.mock_session();
    driver.fail_on(MockStep::Commit);
    let seen = Arc::new(Mutex::new(None));
    let hook_seen = Arc::clone(&seen);

    let result = run_in_transaction(
        &session,
        |_tx| Box::pin(async { Ok::<_, AppError>(1) }),
        TransactionOptions::new().on_error(move |e: &AppError| {
            *hook_seen.lock().unwrap() = Some(e.to_string());
            Box::pin(async { Ok::<(), AppError>(()) })
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Database(ref m)) if m.contains("commit")));
    assert!(seen.lock().unwrap().is_some());

    let log = driver.log();
    assert_eq!(log.count(&TxEvent::Commit), 1);
    assert_eq!(log.count(&TxEvent::Rollback), 1);
    assert_eq!(log.count(&TxEvent::Close), 1);
}

#[tokio::test]
async fn test_hook_failure_propagates_even_when_suppressed() {
    let driver = MockDriver::new();
    let session = driver.mock_session();

    let result = run_in_transaction(
        &session,
        |_tx| Box::pin(async { Err::<(), _>(AppError::Validation("first".to_string())) }),
        TransactionOptions::new()
            .throw_on_error(false)
            .on_error(|_e: &AppError| {
                Box::pin(async { Err::<(), _>(AppError::Hook("alerting down".to_string())) })
            }),
    )
    .await;

    assert_eq!(result, Err(AppError::Hook("alerting down".to_string())));
    let log = driver.log();
    assert_eq!(log.count(&TxEvent::Rollback), 1);
    assert_eq!(log.count(&TxEvent::Close), 1);
}

#[tokio::test]
async fn test_rollback_failure_keeps_original_error() {
    let driver = MockDriver::new();
    let session = driver.mock_session();
    driver.fail_on(MockStep::Rollback);

    let result = transaction(&session, |_tx| {
        Box::pin(async { Err::<(), _>(AppError::Validation("original".to_string())) })
    })
    .await;

    assert_eq!(result, Err(AppError::Validation("original".to_string())));
    assert_eq!(driver.log().count(&TxEvent::Close), 1);
}

#[tokio::test]
async fn test_close_failure_does_not_mask_error() {
    let driver = MockDriver::new();
    let session = driver.mock_session();
    driver.fail_on(MockStep::Close);

    let result = transaction(&session, |_tx| {
        Box::pin(async { Err::<(), _>(AppError::Validation("original".to_string())) })
    })
    .await;

    assert_eq!(result, Err(AppError::Validation("original".to_string())));
}

#[tokio::test]
async fn test_query_failure_rolls_back() {
    let driver = MockDriver::new();
    let session = driver.mock_session();
    driver.fail_on(MockStep::Run);

    let result = transaction(&session, |tx| {
        Box::pin(async move {
            tx.run(statement("MATCH (n) RETURN n")).await?;
            Ok::<_, AppError>(())
        })
    })
    .await;

    assert!(matches!(result, Err(AppError::Database(_))));
    let log = driver.log();
    assert_eq!(log.count(&TxEvent::Commit), 0);
    assert_eq!(log.count(&TxEvent::Rollback), 1);
}

#[tokio::test]
async fn test_timeout_rolls_back_and_closes() {
    let driver = MockDriver::new();
    let session = driver.mock_session();

    let result = run_in_transaction(
        &session,
        |_tx| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, Neo4jError>(())
            })
        },
        TransactionOptions::new().timeout(Duration::from_millis(20)),
    )
    .await;

    assert!(matches!(
        result,
        Err(Neo4jError::TimeoutError { timeout_ms: 20, .. })
    ));
    let log = driver.log();
    assert_eq!(log.count(&TxEvent::Commit), 0);
    assert_eq!(log.count(&TxEvent::Rollback), 1);
    assert_eq!(log.count(&TxEvent::Close), 1);
}

#[tokio::test]
async fn test_queries_run_in_submission_order() {
    let driver = MockDriver::new();
    let session = driver.mock_session();

    transaction(&session, |tx| {
        Box::pin(async move {
            for cypher in ["CREATE (:A)", "CREATE (:B)", "CREATE (:C)"] {
                tx.run(statement(cypher)).await?;
            }
            Ok::<_, Neo4jError>(())
        })
    })
    .await
    .unwrap();

    let runs: Vec<TxEvent> = driver
        .log()
        .events()
        .into_iter()
        .filter(|e| matches!(e, TxEvent::Run(_)))
        .collect();
    assert_eq!(
        runs,
        vec![
            TxEvent::Run("CREATE (:A)".to_string()),
            TxEvent::Run("CREATE (:B)".to_string()),
            TxEvent::Run("CREATE (:C)".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_session_left_open() {
    let driver = MockDriver::new();
    let session = driver.mock_session();

    transaction(&session, |_tx| Box::pin(async { Ok::<_, Neo4jError>(()) }))
        .await
        .unwrap();

    assert_eq!(driver.open_sessions(), 1);
    assert_eq!(driver.log().count(&TxEvent::SessionClosed), 0);

    session.close().await.unwrap();
    assert_eq!(driver.open_sessions(), 0);
}

#[tokio::test]
async fn test_concurrent_transactions_on_separate_sessions() {
    let driver = MockDriver::new();
    let sessions: Vec<_> = (0..3).map(|_| driver.mock_session()).collect();

    let handles = sessions.iter().enumerate().map(|(i, session)| {
        transaction(session, move |tx| {
            Box::pin(async move {
                tx.run(statement(format!("CREATE (:Worker {{n: {}}})", i)))
                    .await?;
                Ok::<_, Neo4jError>(i)
            })
        })
    });
    let results = futures::future::join_all(handles).await;

    let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(values, vec![0, 1, 2]);

    let log = driver.log();
    assert_eq!(log.count(&TxEvent::Commit), 3);
    assert_eq!(log.count(&TxEvent::Close), 3);
}
