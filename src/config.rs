// ABOUTME: Connection configuration for one database on one PostgreSQL server
// ABOUTME: Deserializes from TOML and derives administrative / sibling-database variants

use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The server's always-present default database
pub const ADMIN_DATABASE: &str = "postgres";

/// Identifies one target database on one server
///
/// `database` is optional: a configuration without it addresses the server
/// rather than a specific database, and must be scoped with
/// [`Configuration::with_database`] before connecting.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub address: String,
    pub port: u16,
    pub user: String,
    #[serde(rename = "pass", alias = "password")]
    pub password: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default, alias = "extentions")]
    pub extensions: Vec<String>,
}

impl Configuration {
    /// Parse a configuration from TOML text
    ///
    /// # Examples
    ///
    /// ```
    /// # use postgres_provisioner::Configuration;
    /// let cfg = Configuration::from_toml_str(r#"
    ///     address = "localhost"
    ///     port = 5432
    ///     user = "wiki"
    ///     pass = "secret"
    ///     database = "wiki"
    ///     extensions = ["pgcrypto"]
    /// "#).unwrap();
    /// assert_eq!(cfg.database.as_deref(), Some("wiki"));
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ProvisionError::Configuration(format!("invalid configuration: {}", e)))
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Configuration(format!(
                "cannot read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Same server and credentials, scoped to `database`
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..self.clone()
        }
    }

    /// Same server and credentials, scoped to the administrative database
    pub fn admin(&self) -> Self {
        Self {
            extensions: Vec::new(),
            ..self.with_database(ADMIN_DATABASE)
        }
    }

    /// `host:port/database` for log and error messages (never the password)
    pub fn target(&self) -> String {
        format!(
            "{}:{}/{}",
            self.address,
            self.port,
            self.database.as_deref().unwrap_or("")
        )
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("extensions", &self.extensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Configuration {
        Configuration {
            address: "db.internal".to_string(),
            port: 5433,
            user: "wiki".to_string(),
            password: "hunter2".to_string(),
            database: Some("wiki".to_string()),
            extensions: vec!["pgcrypto".to_string()],
        }
    }

    #[test]
    fn test_parse_with_historical_field_names() {
        let cfg = Configuration::from_toml_str(
            r#"
            address = "db.internal"
            port = 5433
            user = "wiki"
            pass = "hunter2"
            database = "wiki"
            extentions = ["pgcrypto"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg, sample());
    }

    #[test]
    fn test_parse_optional_fields_default() {
        let cfg = Configuration::from_toml_str(
            r#"
            address = "localhost"
            port = 5432
            user = "postgres"
            password = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.database, None);
        assert!(cfg.extensions.is_empty());
    }

    #[test]
    fn test_parse_invalid_is_configuration_error() {
        let err = Configuration::from_toml_str("address = 1").unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));

        let err = Configuration::from_file("/nonexistent/provisioner.toml").unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
    }

    #[test]
    fn test_admin_keeps_server_and_credentials() {
        let admin = sample().admin();
        assert_eq!(admin.database.as_deref(), Some(ADMIN_DATABASE));
        assert_eq!(admin.address, "db.internal");
        assert_eq!(admin.port, 5433);
        assert_eq!(admin.password, "hunter2");
        assert!(admin.extensions.is_empty());
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
        assert_eq!(sample().target(), "db.internal:5433/wiki");
    }
}
