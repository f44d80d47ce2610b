// ABOUTME: Server extension installation for provisioned databases
// ABOUTME: Installs each required extension that is missing from pg_extension

use crate::error::{ProvisionError, Result};
use crate::utils::validate_extension_name;
use tokio_postgres::Client;

/// Check whether an extension is installed in the connected database
pub async fn extension_exists(client: &Client, extension: &str) -> Result<bool> {
    let row = client
        .query_one(
            "SELECT EXISTS(SELECT * FROM pg_extension WHERE extname = $1)",
            &[&extension],
        )
        .await
        .map_err(ProvisionError::query(format!(
            "checking existence of extension {}",
            extension
        )))?;

    Ok(row.get(0))
}

/// Ensure every listed extension is installed, in order
///
/// An empty list is a no-op. The first failure aborts the remaining entries.
/// Each name is checked against the extension naming policy before any
/// statement mentions it.
///
/// # Errors
///
/// - [`ProvisionError::Validation`] for a name outside the policy
/// - [`ProvisionError::Query`] if the lookup or `CREATE EXTENSION` fails
pub async fn ensure_extensions<S: AsRef<str>>(client: &Client, extensions: &[S]) -> Result<()> {
    for extension in extensions {
        let extension = extension.as_ref();
        validate_extension_name(extension)?;

        if extension_exists(client, extension).await? {
            tracing::debug!("Extension '{}' already installed", extension);
            continue;
        }

        client
            .batch_execute(&format!("CREATE EXTENSION \"{}\"", extension))
            .await
            .map_err(ProvisionError::query(format!(
                "creating extension {}",
                extension
            )))?;
        tracing::info!("✓ Installed extension '{}'", extension);
    }
    Ok(())
}
