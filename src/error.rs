// ABOUTME: Error taxonomy for provisioning operations
// ABOUTME: Separates caller mistakes (configuration, naming) from transport and runtime failures

use std::time::Duration;
use thiserror::Error;

/// Errors returned by every provisioning entry point.
///
/// `Configuration` and `Validation` are caller mistakes and retrying them is
/// pointless. `Connection`, `Query` and `Container` wrap the underlying
/// failure together with the operation and identifier involved.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid {kind} '{value}' (should match `{pattern}`)")]
    Validation {
        kind: &'static str,
        value: String,
        pattern: &'static str,
    },

    #[error("failed to connect to {target}: {}", describe(.source))]
    Connection {
        target: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("{context}: {}", describe(.source))]
    Query {
        context: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error(
        "timeout after {waited:?} while waiting for database to come up (last error: {})",
        .last_error.as_deref().unwrap_or("none")
    )]
    Timeout {
        waited: Duration,
        last_error: Option<String>,
    },

    #[cfg(feature = "test-support")]
    #[error("container runtime error while {context}: {source}")]
    Container {
        context: String,
        #[source]
        source: testcontainers::TestcontainersError,
    },
}

impl ProvisionError {
    /// Build a `map_err` adapter that wraps a driver error with `context`.
    pub(crate) fn query(
        context: impl Into<String>,
    ) -> impl FnOnce(tokio_postgres::Error) -> ProvisionError {
        let context = context.into();
        move |source| ProvisionError::Query { context, source }
    }

    /// True for errors the caller has to fix before calling again.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ProvisionError::Configuration(_) | ProvisionError::Validation { .. }
        )
    }
}

/// Driver error text, with the server's message when the server sent one
///
/// `tokio_postgres::Error` renders server-side failures as just "db error".
fn describe(source: &tokio_postgres::Error) -> String {
    let Some(db) = source.as_db_error() else {
        return source.to_string();
    };

    let mut text = format!("{} ({})", db.message(), db.code().code());
    if let Some(detail) = db.detail() {
        text.push_str(&format!("; detail: {}", detail));
    }
    if let Some(hint) = db.hint() {
        text.push_str(&format!("; hint: {}", hint));
    }
    text
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
