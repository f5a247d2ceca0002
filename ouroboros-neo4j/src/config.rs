//! Connection configuration
//!
//! Connection settings are handed to the driver unchanged. Pool sizing and
//! fetch size are driver knobs; this crate only carries them.

use crate::error::{Neo4jError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::debug;

/// URI schemes understood by Neo4j drivers
pub const SUPPORTED_SCHEMES: &[&str] = &["neo4j", "neo4j+s", "neo4j+scc", "bolt", "bolt+s", "bolt+ssc"];

/// Connection settings for a Neo4j instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neo4jConnection {
    /// URI scheme, e.g. `bolt` or `neo4j+s`
    pub scheme: String,
    /// Host name or address
    pub host: String,
    /// Bolt port
    pub port: u16,
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    pub password: String,
    /// Default database for sessions that do not name one
    pub database: Option<String>,
    /// Rows fetched per round trip
    pub fetch_size: usize,
    /// Upper bound of pooled connections per database
    pub max_connections: usize,
}

impl Default for Neo4jConnection {
    fn default() -> Self {
        Self {
            scheme: "bolt".to_string(),
            host: "localhost".to_string(),
            port: 7687,
            username: "neo4j".to_string(),
            password: "password".to_string(),
            database: None,
            fetch_size: 500,
            max_connections: 16,
        }
    }
}

impl Neo4jConnection {
    /// Create a new builder for connection settings
    pub fn builder() -> Neo4jConnectionBuilder {
        Neo4jConnectionBuilder::default()
    }

    /// Load settings from the process environment
    ///
    /// A `.env` file in the working directory is read first when present.
    /// Recognised variables: `NEO4J_SCHEME`, `NEO4J_HOST`, `NEO4J_PORT`,
    /// `NEO4J_USERNAME`, `NEO4J_PASSWORD`, `NEO4J_DATABASE`. Unset variables
    /// keep their default value.
    pub fn from_env() -> Result<Self> {
        if dotenv::dotenv().is_ok() {
            debug!("Loaded .env file");
        }

        let defaults = Self::default();
        let port = match env::var("NEO4J_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| {
                Neo4jError::ConfigError(format!("Invalid NEO4J_PORT '{}': {}", raw, e))
            })?,
            Err(_) => defaults.port,
        };

        let connection = Self {
            scheme: env::var("NEO4J_SCHEME").unwrap_or(defaults.scheme),
            host: env::var("NEO4J_HOST").unwrap_or(defaults.host),
            port,
            username: env::var("NEO4J_USERNAME").unwrap_or(defaults.username),
            password: env::var("NEO4J_PASSWORD").unwrap_or(defaults.password),
            database: env::var("NEO4J_DATABASE").ok().filter(|db| !db.is_empty()),
            fetch_size: defaults.fetch_size,
            max_connections: defaults.max_connections,
        };

        connection.validate()?;
        Ok(connection)
    }

    /// Connection URI in `scheme://host:port` form
    pub fn uri(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_SCHEMES.contains(&self.scheme.as_str()) {
            return Err(Neo4jError::ConfigError(format!(
                "Unsupported scheme '{}', expected one of {:?}",
                self.scheme, SUPPORTED_SCHEMES
            )));
        }

        if self.host.is_empty() {
            return Err(Neo4jError::ConfigError("host must not be empty".to_string()));
        }

        if self.port == 0 {
            return Err(Neo4jError::ConfigError("port must be greater than 0".to_string()));
        }

        if self.fetch_size == 0 {
            return Err(Neo4jError::ConfigError(
                "fetch_size must be greater than 0".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(Neo4jError::ConfigError(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for connection settings with validation
#[derive(Debug, Default)]
pub struct Neo4jConnectionBuilder {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
    fetch_size: Option<usize>,
    max_connections: Option<usize>,
}

impl Neo4jConnectionBuilder {
    /// Set the URI scheme
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Set the host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the bolt port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the username
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the default database
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the fetch size
    pub fn fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = Some(fetch_size);
        self
    }

    /// Set the connection pool upper bound
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Neo4jConnection> {
        let defaults = Neo4jConnection::default();
        let connection = Neo4jConnection {
            scheme: self.scheme.unwrap_or(defaults.scheme),
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            username: self.username.unwrap_or(defaults.username),
            password: self.password.unwrap_or(defaults.password),
            database: self.database.or(defaults.database),
            fetch_size: self.fetch_size.unwrap_or(defaults.fetch_size),
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
        };

        connection.validate()?;
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_connection() {
        let connection = Neo4jConnection::default();

        assert_eq!(connection.uri(), "bolt://localhost:7687");
        assert_eq!(connection.database, None);
        assert_eq!(connection.fetch_size, 500);
        assert_eq!(connection.max_connections, 16);
        assert!(connection.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let connection = Neo4jConnection::builder()
            .scheme("neo4j+s")
            .host("graph.internal")
            .port(7688)
            .username("app")
            .password("secret")
            .database("movies")
            .build()
            .unwrap();

        assert_eq!(connection.uri(), "neo4j+s://graph.internal:7688");
        assert_eq!(connection.database.as_deref(), Some("movies"));
        assert_eq!(connection.username, "app");
    }

    #[test]
    fn test_validation() {
        assert!(Neo4jConnection::builder().scheme("http").build().is_err());
        assert!(Neo4jConnection::builder().host("").build().is_err());
        assert!(Neo4jConnection::builder().port(0).build().is_err());
        assert!(Neo4jConnection::builder().max_connections(0).build().is_err());
        assert!(Neo4jConnection::builder().fetch_size(0).build().is_err());
    }
}
