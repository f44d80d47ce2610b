// ABOUTME: Identifier policy shared by every statement that interpolates a name
// ABOUTME: Validates database, role, table and extension names before they reach SQL text

use crate::error::{ProvisionError, Result};

/// Pattern enforced on database, owner and table names
pub const IDENTIFIER_PATTERN: &str = "^[a-z0-9_]*$";

/// Pattern enforced on role names, which cannot be empty
pub const ROLE_PATTERN: &str = "^[a-z0-9_]+$";

/// Pattern enforced on extension names (hyphens allowed for `uuid-ossp` and friends)
pub const EXTENSION_PATTERN: &str = "^[a-z0-9_-]+$";

/// Validate an identifier against [`IDENTIFIER_PATTERN`]
///
/// Identifiers cannot be bound as statement parameters, so anything that ends
/// up inside `CREATE DATABASE`, `ALTER TABLE ... OWNER TO` and similar
/// statements must go through this check first.
///
/// # Arguments
///
/// * `kind` - What the identifier names (used in the error message)
/// * `identifier` - The candidate name
///
/// # Errors
///
/// Returns [`ProvisionError::Validation`] if the identifier contains anything
/// other than lowercase ASCII letters, digits or underscores.
///
/// # Examples
///
/// ```
/// # use postgres_provisioner::utils::validate_identifier;
/// assert!(validate_identifier("database name", "wi_ki").is_ok());
/// assert!(validate_identifier("database name", "Wiki").is_err());
/// ```
pub fn validate_identifier(kind: &'static str, identifier: &str) -> Result<()> {
    let valid = identifier
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !valid {
        return Err(ProvisionError::Validation {
            kind,
            value: sanitize_identifier(identifier),
            pattern: IDENTIFIER_PATTERN,
        });
    }
    Ok(())
}

/// Validate a role name (database owner, table owner)
///
/// Same policy as [`validate_identifier`], but an empty name is rejected:
/// `OWNER TO ` with nothing after it only fails once the server parses it.
pub fn validate_role(kind: &'static str, role: &str) -> Result<()> {
    if role.is_empty() {
        return Err(ProvisionError::Validation {
            kind,
            value: String::new(),
            pattern: ROLE_PATTERN,
        });
    }
    validate_identifier(kind, role)
}

/// Validate an extension name against [`EXTENSION_PATTERN`]
///
/// Extension names are double-quoted when interpolated, so a hyphen is safe
/// here while quotes and whitespace are not.
pub fn validate_extension_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

    if !valid {
        return Err(ProvisionError::Validation {
            kind: "extension name",
            value: sanitize_identifier(name),
            pattern: EXTENSION_PATTERN,
        });
    }
    Ok(())
}

/// Sanitize an identifier for display
///
/// Removes control characters and limits length so that a hostile name
/// cannot forge log lines or flood error messages.
///
/// # Examples
///
/// ```
/// # use postgres_provisioner::utils::sanitize_identifier;
/// assert_eq!(sanitize_identifier("normal_table"), "normal_table");
/// assert_eq!(sanitize_identifier("table\nname"), "tablename");
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}
