//! Mock driver for testing
//!
//! Records every lifecycle call into a shared [`EventLog`] so tests can assert
//! on ordering, and lets tests inject failures at each step.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use crate::driver::{AccessMode, Driver, QueryResult, Session, SessionConfig, Statement, Transaction};
use crate::error::{Neo4jError, Result};
use crate::value::MemoryRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One observable step of a session or transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    SessionOpened {
        database: Option<String>,
        access_mode: AccessMode,
    },
    Begin,
    Run(String),
    Commit,
    Rollback,
    Close,
    SessionClosed,
    /// Free-form marker pushed by test code, e.g. from an error hook
    Marker(String),
}

/// Shared, append-only list of events
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<TxEvent>>>,
}

impl EventLog {
    pub fn push(&self, event: TxEvent) {
        self.events.lock().unwrap().push(event);
    }

    /// Push a [`TxEvent::Marker`]
    pub fn mark(&self, label: &str) {
        self.push(TxEvent::Marker(label.to_string()));
    }

    pub fn events(&self) -> Vec<TxEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of recorded events equal to `event`
    pub fn count(&self, event: &TxEvent) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    /// Position of the first event equal to `event`
    pub fn position(&self, event: &TxEvent) -> Option<usize> {
        self.events.lock().unwrap().iter().position(|e| e == event)
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

/// Failure injection switches
#[derive(Debug, Default)]
struct MockFailures {
    begin: AtomicBool,
    run: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
    close: AtomicBool,
}

#[derive(Debug, Default)]
struct MockState {
    log: EventLog,
    failures: MockFailures,
    results: Mutex<HashMap<String, Vec<MemoryRecord>>>,
    open_sessions: AtomicUsize,
}

/// In-memory driver
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event log shared by every session and transaction of this driver
    pub fn log(&self) -> EventLog {
        self.state.log.clone()
    }

    /// Make the lifecycle step fail from now on
    pub fn fail_on(&self, step: MockStep) {
        self.flag(step).store(true, Ordering::SeqCst);
    }

    /// Make the lifecycle step succeed again
    pub fn recover(&self, step: MockStep) {
        self.flag(step).store(false, Ordering::SeqCst);
    }

    fn flag(&self, step: MockStep) -> &AtomicBool {
        let failures = &self.state.failures;
        match step {
            MockStep::Begin => &failures.begin,
            MockStep::Run => &failures.run,
            MockStep::Commit => &failures.commit,
            MockStep::Rollback => &failures.rollback,
            MockStep::Close => &failures.close,
        }
    }

    /// Records returned for a statement whose cypher text equals `cypher`
    pub fn respond(&self, cypher: &str, records: Vec<MemoryRecord>) {
        self.state
            .results
            .lock()
            .unwrap()
            .insert(cypher.to_string(), records);
    }

    /// Sessions opened and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.state.open_sessions.load(Ordering::SeqCst)
    }

    /// Open a session directly, bypassing the [`Driver`] trait
    pub fn mock_session(&self) -> MockSession {
        self.open(SessionConfig::write(None))
    }

    fn open(&self, config: SessionConfig) -> MockSession {
        self.state.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.state.log.push(TxEvent::SessionOpened {
            database: config.database.clone(),
            access_mode: config.access_mode,
        });
        MockSession {
            state: Arc::clone(&self.state),
            config,
            closed: AtomicBool::new(false),
        }
    }
}

/// Lifecycle step selector for [`MockDriver::fail_on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStep {
    Begin,
    Run,
    Commit,
    Rollback,
    Close,
}

#[async_trait]
impl Driver for MockDriver {
    type Session = MockSession;

    async fn session(&self, config: SessionConfig) -> Result<MockSession> {
        Ok(self.open(config))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory session
#[derive(Debug)]
pub struct MockSession {
    state: Arc<MockState>,
    config: SessionConfig,
    closed: AtomicBool,
}

impl MockSession {
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[async_trait]
impl Session for MockSession {
    type Transaction = MockTransaction;

    async fn begin_transaction(&self) -> Result<MockTransaction> {
        if self.state.failures.begin.load(Ordering::SeqCst) {
            return Err(Neo4jError::transaction("begin", "injected failure"));
        }
        self.state.log.push(TxEvent::Begin);
        Ok(MockTransaction {
            state: Arc::clone(&self.state),
        })
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.open_sessions.fetch_sub(1, Ordering::SeqCst);
            self.state.log.push(TxEvent::SessionClosed);
        }
        Ok(())
    }
}

/// In-memory transaction
#[derive(Debug)]
pub struct MockTransaction {
    state: Arc<MockState>,
}

impl MockTransaction {
    fn failing(&self, flag: &AtomicBool, stage: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Neo4jError::transaction(stage, "injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transaction for MockTransaction {
    type Record = MemoryRecord;

    async fn run(&mut self, statement: Statement) -> Result<QueryResult<MemoryRecord>> {
        self.state.log.push(TxEvent::Run(statement.cypher.clone()));
        if self.state.failures.run.load(Ordering::SeqCst) {
            return Err(Neo4jError::QueryError("injected failure".to_string()));
        }
        let records = self
            .state
            .results
            .lock()
            .unwrap()
            .get(&statement.cypher)
            .cloned()
            .unwrap_or_default();
        Ok(QueryResult::new(records))
    }

    async fn commit(&mut self) -> Result<()> {
        self.state.log.push(TxEvent::Commit);
        self.failing(&self.state.failures.commit, "commit")
    }

    async fn rollback(&mut self) -> Result<()> {
        self.state.log.push(TxEvent::Rollback);
        self.failing(&self.state.failures.rollback, "rollback")
    }

    async fn close(&mut self) -> Result<()> {
        self.state.log.push(TxEvent::Close);
        self.failing(&self.state.failures.close, "close")
    }
}
