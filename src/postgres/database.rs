// ABOUTME: Database existence checks, creation and removal
// ABOUTME: Always works through the administrative database since the target may not exist yet

use super::connection::connect;
use crate::config::Configuration;
use crate::error::{ProvisionError, Result};
use crate::utils::{validate_identifier, validate_role};
use tokio_postgres::Client;

/// Check whether a database exists on the connected server
pub async fn database_exists(client: &Client, database: &str) -> Result<bool> {
    let row = client
        .query_one(
            "SELECT EXISTS(SELECT * FROM pg_database WHERE datname = $1)",
            &[&database],
        )
        .await
        .map_err(ProvisionError::query(format!(
            "checking existence of database '{}'",
            database
        )))?;

    Ok(row.get(0))
}

/// Ensure the database named in the configuration exists
///
/// Connects to the administrative database on the same server, checks the
/// catalog and, when the target is missing, creates it owned by the
/// configured user with UTF8 encoding and no connection limit. An existing
/// database is left untouched.
///
/// The administrative connection is closed before returning on every path.
///
/// # Errors
///
/// - [`ProvisionError::Configuration`] if no database name or user is configured
/// - [`ProvisionError::Validation`] if the database or user name fails the
///   identifier policy (checked only when creation is needed)
/// - [`ProvisionError::Connection`] / [`ProvisionError::Query`] on server failures
pub async fn init_database(cfg: &Configuration) -> Result<()> {
    let database = target_database(cfg)?;
    if cfg.user.is_empty() {
        return Err(ProvisionError::Configuration(
            "no user configured to own the database".to_string(),
        ));
    }
    let client = connect(&cfg.admin()).await?;

    if database_exists(&client, database).await? {
        tracing::debug!("Database '{}' already exists", database);
        return Ok(());
    }

    validate_identifier("database name", database)?;
    validate_role("username", &cfg.user)?;

    let statement = format!(
        "CREATE DATABASE {} WITH OWNER = {} ENCODING = 'UTF8' CONNECTION LIMIT = -1",
        database, cfg.user
    );
    client
        .batch_execute(&statement)
        .await
        .map_err(ProvisionError::query(format!(
            "creating database {} with owner {}",
            database, cfg.user
        )))?;

    tracing::info!("✓ Created database '{}' owned by '{}'", database, cfg.user);
    Ok(())
}

/// Drop the database named in the configuration if it exists
///
/// Missing databases are a no-op. Like [`init_database`], this runs against
/// the administrative database.
pub async fn drop_database(cfg: &Configuration) -> Result<()> {
    let database = target_database(cfg)?;
    let client = connect(&cfg.admin()).await?;

    if !database_exists(&client, database).await? {
        tracing::debug!("Database '{}' does not exist, nothing to drop", database);
        return Ok(());
    }

    validate_identifier("database name", database)?;

    client
        .batch_execute(&format!("DROP DATABASE {}", database))
        .await
        .map_err(ProvisionError::query(format!(
            "dropping database {}",
            database
        )))?;

    tracing::info!("✓ Dropped database '{}'", database);
    Ok(())
}

fn target_database(cfg: &Configuration) -> Result<&str> {
    match cfg.database.as_deref() {
        Some(database) if !database.is_empty() => Ok(database),
        _ => Err(ProvisionError::Configuration(
            "no target database configured".to_string(),
        )),
    }
}
