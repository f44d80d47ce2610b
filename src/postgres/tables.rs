// ABOUTME: Idempotent table creation with explicit ownership
// ABOUTME: Runs caller-supplied existence, create and set-owner statements

use crate::error::{ProvisionError, Result};
use crate::utils::{validate_identifier, validate_role};
use std::collections::HashMap;
use std::fmt;
use tokio_postgres::Client;

/// Placeholder replaced by the owner in the set-owner statement
const OWNER_PLACEHOLDER: &str = "$1";

/// One statement of a table definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableStep {
    /// Returns a single boolean: does the table exist?
    Existence,
    Create,
    /// Contains one `$1` placeholder for the owner
    SetOwner,
}

impl fmt::Display for TableStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableStep::Existence => write!(f, "Existence"),
            TableStep::Create => write!(f, "Create"),
            TableStep::SetOwner => write!(f, "Set-Owner"),
        }
    }
}

/// Statements and owner describing one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub statements: HashMap<TableStep, String>,
    pub owner: String,
}

impl TableSpec {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            statements: HashMap::new(),
            owner: owner.into(),
        }
    }

    pub fn with_statement(mut self, step: TableStep, statement: impl Into<String>) -> Self {
        self.statements.insert(step, statement.into());
        self
    }

    /// Generate the three statements for `public.<name>`
    ///
    /// `columns` is the column list of the `CREATE TABLE` statement and is
    /// used verbatim; only pass trusted DDL.
    ///
    /// # Examples
    ///
    /// ```
    /// # use postgres_provisioner::postgres::{TableSpec, TableStep};
    /// let spec = TableSpec::for_table("pages", "id UUID NOT NULL", "wiki").unwrap();
    /// assert_eq!(
    ///     spec.statement(TableStep::Create).unwrap(),
    ///     "CREATE TABLE public.pages (id UUID NOT NULL)"
    /// );
    /// ```
    pub fn for_table(name: &str, columns: &str, owner: impl Into<String>) -> Result<Self> {
        validate_identifier("table name", name)?;
        let owner = owner.into();
        validate_role("owner", &owner)?;

        Ok(Self::new(owner)
            .with_statement(
                TableStep::Existence,
                format!(
                    "SELECT EXISTS(SELECT * FROM pg_tables WHERE schemaname = 'public' AND tablename = '{}')",
                    name
                ),
            )
            .with_statement(
                TableStep::Create,
                format!("CREATE TABLE public.{} ({})", name, columns),
            )
            .with_statement(
                TableStep::SetOwner,
                format!("ALTER TABLE public.{} OWNER TO {}", name, OWNER_PLACEHOLDER),
            ))
    }

    /// Look up the statement for a step
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Configuration`] when the step is missing.
    pub fn statement(&self, step: TableStep) -> Result<&str> {
        self.statements
            .get(&step)
            .map(String::as_str)
            .ok_or_else(|| {
                ProvisionError::Configuration(format!(
                    "a statement should exist under the '{}' key",
                    step
                ))
            })
    }

    /// Render the set-owner statement with the validated owner substituted
    pub fn owner_statement(&self) -> Result<String> {
        let template = self.statement(TableStep::SetOwner)?;
        validate_role("owner", &self.owner)?;
        Ok(template.replace(OWNER_PLACEHOLDER, &self.owner))
    }
}

/// Ensure a table exists with the requested owner
///
/// When the existence statement reports the table present, nothing else
/// runs: an existing table keeps its schema and owner. Otherwise the table
/// is created and then handed to the owner. The two statements are not
/// wrapped in a transaction.
///
/// # Errors
///
/// - [`ProvisionError::Configuration`] if a required statement is missing or
///   the existence statement does not return a boolean
/// - [`ProvisionError::Validation`] if the owner is empty or fails the
///   identifier policy
/// - [`ProvisionError::Query`] if any statement fails
pub async fn ensure_table(client: &Client, spec: &TableSpec) -> Result<()> {
    let existence = spec.statement(TableStep::Existence)?;
    let row = client
        .query_one(existence, &[])
        .await
        .map_err(ProvisionError::query("checking table existence"))?;

    let exists: bool = row.try_get(0).map_err(|e| {
        ProvisionError::Configuration(format!(
            "the '{}' statement must return a single boolean: {}",
            TableStep::Existence,
            e
        ))
    })?;

    if exists {
        tracing::debug!("Table already exists, leaving it untouched");
        return Ok(());
    }

    let create = spec.statement(TableStep::Create)?;
    // Resolve before creating so a bad owner never leaves an orphan table
    let set_owner = spec.owner_statement()?;

    client
        .batch_execute(create)
        .await
        .map_err(ProvisionError::query("creating table"))?;

    client
        .batch_execute(&set_owner)
        .await
        .map_err(ProvisionError::query(format!(
            "setting table owner to {}",
            spec.owner
        )))?;

    tracing::info!("✓ Created table owned by '{}'", spec.owner);
    Ok(())
}
