// ABOUTME: PostgreSQL provisioning module
// ABOUTME: Exports connection management and the idempotent database/extension/table steps

pub mod connection;
pub mod database;
pub mod extensions;
pub mod tables;

pub use connection::{connect, connection_config, ping};
pub use database::{database_exists, drop_database, init_database};
pub use extensions::{ensure_extensions, extension_exists};
pub use tables::{ensure_table, TableSpec, TableStep};

use crate::config::Configuration;
use crate::error::Result;
use tokio_postgres::Client;

/// Provision the configured database and return a connection to it
///
/// Runs the steps in the order each one depends on:
/// 1. Ensures the database exists (through the administrative database)
/// 2. Connects to the database itself
/// 3. Ensures the configured extensions are installed
///
/// Calling this again on an already provisioned database performs no
/// creation and succeeds.
///
/// # Examples
///
/// ```no_run
/// # use postgres_provisioner::{postgres, Configuration};
/// # async fn example() -> postgres_provisioner::Result<()> {
/// let cfg = Configuration::from_file("provisioner.toml")?;
/// let client = postgres::initialize_and_connect(&cfg).await?;
/// postgres::ensure_table(
///     &client,
///     &postgres::TableSpec::for_table("pages", "id UUID NOT NULL", &cfg.user)?,
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn initialize_and_connect(cfg: &Configuration) -> Result<Client> {
    tracing::info!("Provisioning database {}", cfg.target());

    init_database(cfg).await?;
    let client = connect(cfg).await?;
    ensure_extensions(&client, &cfg.extensions).await?;

    tracing::info!("✓ Database {} ready", cfg.target());
    Ok(client)
}
