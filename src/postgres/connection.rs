// ABOUTME: PostgreSQL connection utilities for provisioning
// ABOUTME: Builds the connection descriptor from configuration and manages connection lifecycle

use crate::config::Configuration;
use crate::error::{ProvisionError, Result};
use tokio_postgres::config::SslMode;
use tokio_postgres::{Client, Config, NoTls};

const APPLICATION_NAME: &str = "postgres-provisioner";

/// Build the connection descriptor for a configuration
///
/// Pure function: no network access happens here. TLS negotiation is
/// disabled on the wire transport.
///
/// # Errors
///
/// Returns [`ProvisionError::Configuration`] when no database name is set.
pub fn connection_config(cfg: &Configuration) -> Result<Config> {
    let database = match cfg.database.as_deref() {
        Some(database) if !database.is_empty() => database,
        _ => {
            return Err(ProvisionError::Configuration(
                "cannot connect to unspecified database".to_string(),
            ))
        }
    };

    let mut config = Config::new();
    config
        .host(&cfg.address)
        .port(cfg.port)
        .user(&cfg.user)
        .password(&cfg.password)
        .dbname(database)
        .ssl_mode(SslMode::Disable)
        .application_name(APPLICATION_NAME);
    Ok(config)
}

/// Connect to the database named in the configuration
///
/// The returned client owns the connection; dropping it closes the socket.
///
/// # Errors
///
/// - [`ProvisionError::Configuration`] if the database name is empty (no
///   network attempt is made)
/// - [`ProvisionError::Connection`] if the server cannot be reached or
///   rejects the credentials
///
/// # Examples
///
/// ```no_run
/// # use postgres_provisioner::{postgres, Configuration};
/// # async fn example(cfg: Configuration) -> postgres_provisioner::Result<()> {
/// let client = postgres::connect(&cfg).await?;
/// postgres::ping(&client).await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect(cfg: &Configuration) -> Result<Client> {
    let config = connection_config(cfg)?;

    let (client, connection) =
        config
            .connect(NoTls)
            .await
            .map_err(|source| ProvisionError::Connection {
                target: cfg.target(),
                source,
            })?;

    // Spawn connection handler
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    tracing::debug!("Connected to {}", cfg.target());
    Ok(client)
}

/// Lightweight liveness probe
pub async fn ping(client: &Client) -> Result<()> {
    client
        .simple_query("SELECT 1")
        .await
        .map_err(ProvisionError::query("liveness probe"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_postgres::config::Host;

    fn cfg(database: Option<&str>) -> Configuration {
        Configuration {
            address: "localhost".to_string(),
            port: 15432,
            user: "postgres".to_string(),
            password: "secret".to_string(),
            database: database.map(str::to_string),
            extensions: Vec::new(),
        }
    }

    #[test]
    fn test_connection_config_carries_every_field() {
        let config = connection_config(&cfg(Some("wiki"))).unwrap();

        assert_eq!(config.get_hosts(), &[Host::Tcp("localhost".to_string())]);
        assert_eq!(config.get_ports(), &[15432]);
        assert_eq!(config.get_user(), Some("postgres"));
        assert_eq!(config.get_password(), Some("secret".as_bytes()));
        assert_eq!(config.get_dbname(), Some("wiki"));
        assert_eq!(config.get_ssl_mode(), SslMode::Disable);
        assert_eq!(config.get_application_name(), Some(APPLICATION_NAME));
    }

    #[test]
    fn test_connection_config_requires_database() {
        assert!(matches!(
            connection_config(&cfg(None)),
            Err(ProvisionError::Configuration(_))
        ));
        assert!(matches!(
            connection_config(&cfg(Some(""))),
            Err(ProvisionError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_without_database_fails_fast() {
        let result = connect(&cfg(None)).await;
        assert!(matches!(result, Err(ProvisionError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_is_connection_error() {
        let mut unreachable = cfg(Some("postgres"));
        unreachable.address = "127.0.0.1".to_string();
        unreachable.port = 1;

        let err = connect(&unreachable).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Connection { .. }));
        assert!(err.to_string().contains("127.0.0.1:1/postgres"));
        assert!(!err.to_string().contains("secret"));
    }
}
