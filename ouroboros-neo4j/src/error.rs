//! Error types for Neo4j operations
//!
//! This module defines the error type shared by the transaction executor,
//! the result mapper and the driver adapter.

use thiserror::Error;

/// Main error type for Neo4j operations
#[derive(Error, Debug)]
pub enum Neo4jError {
    /// Connection error - network or connection pool issues
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Authentication error - invalid credentials or permissions
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Query execution error
    #[error("Query error: {0}")]
    QueryError(String),

    /// A transaction step (begin, commit, rollback, close) failed
    #[error("Transaction {stage} failed: {message}")]
    TransactionError { stage: String, message: String },

    /// Operation timeout
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    TimeoutError { timeout_ms: u64, context: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Requested record field does not exist
    #[error("Record has no field named '{0}'")]
    MissingField(String),

    /// Field value could not be shaped into the requested DTO
    #[error("Mapping error: {0}")]
    MappingError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Neo4rs driver error (wrapper)
    #[error("Neo4rs driver error: {0}")]
    DriverError(#[from] neo4rs::Error),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl Neo4jError {
    /// Build a transaction error for the given lifecycle stage
    pub fn transaction(stage: &str, message: impl Into<String>) -> Self {
        Neo4jError::TransactionError {
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for Neo4j operations
pub type Result<T> = std::result::Result<T, Neo4jError>;

impl From<String> for Neo4jError {
    fn from(s: String) -> Self {
        Neo4jError::Other(s)
    }
}

impl From<&str> for Neo4jError {
    fn from(s: &str) -> Self {
        Neo4jError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for Neo4jError {
    fn from(e: serde_json::Error) -> Self {
        Neo4jError::SerializationError(e.to_string())
    }
}
