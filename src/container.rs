// ABOUTME: Disposable PostgreSQL instances for integration tests
// ABOUTME: Launches a container on a free port, waits for readiness and tears it down

use crate::config::{Configuration, ADMIN_DATABASE};
use crate::error::{ProvisionError, Result};
use crate::postgres::{connect, connection_config, ping};
use std::fmt;
use std::net::TcpListener;
use std::str::FromStr;
use std::time::{Duration, Instant};
use testcontainers::core::ContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tokio_postgres::Client;
use uuid::Uuid;

const IMAGE_NAME: &str = "postgres";
const DEFAULT_IMAGE_TAG: &str = "16-alpine";
const POSTGRES_PORT: u16 = 5432;
const ADMIN_USER: &str = "postgres";

/// Interval between two readiness probes
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long a fresh instance gets to accept connections
pub const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Inclusive range of host ports a disposable instance may be exposed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start > end {
            return Err(ProvisionError::Configuration(format!(
                "invalid port range: {} is greater than {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// First port of the range nothing is listening on locally
    pub fn find_free_port(&self) -> Result<u16> {
        (self.start..=self.end)
            .find(|port| TcpListener::bind(("127.0.0.1", *port)).is_ok())
            .ok_or_else(|| {
                ProvisionError::Configuration(format!("no free port in range {}", self))
            })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{};{}]", self.start, self.end)
    }
}

impl FromStr for PortRange {
    type Err = ProvisionError;

    /// Accepts `[15432;15440]` and `15432-15440`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            ProvisionError::Configuration(format!(
                "invalid port range '{}' (expected [start;end] or start-end)",
                s
            ))
        };

        let trimmed = s.trim();
        let (start, end) = match trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            Some(inner) => inner.split_once(';').ok_or_else(invalid)?,
            None => trimmed.split_once('-').ok_or_else(invalid)?,
        };

        let start = start.trim().parse().map_err(|_| invalid())?;
        let end = end.trim().parse().map_err(|_| invalid())?;
        Self::new(start, end)
    }
}

/// Knobs for [`deploy_with`]
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub image_tag: String,
    pub readiness_timeout: Duration,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            readiness_timeout: READINESS_TIMEOUT,
        }
    }
}

/// A running disposable instance
///
/// Must be released with [`remove_container`]. Dropping the handle also
/// removes the container, but without reporting failures.
pub struct ContainerHandle {
    identifier: String,
    container: ContainerAsync<GenericImage>,
}

impl ContainerHandle {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("identifier", &self.identifier)
            .finish()
    }
}

/// Launch a disposable PostgreSQL instance with default options
///
/// See [`deploy_with`].
pub async fn deploy(prefix: &str, ports: PortRange) -> Result<(Configuration, ContainerHandle)> {
    deploy_with(prefix, ports, &DeployOptions::default()).await
}

/// Launch a disposable PostgreSQL instance on a free port of `ports`
///
/// A random password is generated for the `postgres` superuser. Once the
/// server answers a liveness probe, the probing connection is closed and the
/// configuration is returned. The configuration carries no database name:
/// callers pick one with [`Configuration::with_database`].
///
/// If the instance cannot be reached before `options.readiness_timeout`
/// elapses the container is removed and [`ProvisionError::Timeout`] is
/// returned. A failure to remove it at that point panics.
///
/// # Errors
///
/// - [`ProvisionError::Configuration`] if no port of the range is free
/// - [`ProvisionError::Container`] if the container runtime rejects the launch
/// - [`ProvisionError::Timeout`] if the server never became ready
pub async fn deploy_with(
    prefix: &str,
    ports: PortRange,
    options: &DeployOptions,
) -> Result<(Configuration, ContainerHandle)> {
    let password = Uuid::new_v4().to_string();
    let host_port = ports.find_free_port()?;
    let name = format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..8]);

    tracing::info!(
        "Starting disposable PostgreSQL container '{}' on port {}...",
        name,
        host_port
    );

    let container = GenericImage::new(IMAGE_NAME, options.image_tag.as_str())
        .with_env_var("POSTGRES_PASSWORD", password.as_str())
        .with_mapped_port(host_port, ContainerPort::Tcp(POSTGRES_PORT))
        .with_container_name(name.as_str())
        .start()
        .await
        .map_err(|source| ProvisionError::Container {
            context: format!("deploying postgres container {}", name),
            source,
        })?;

    let handle = ContainerHandle {
        identifier: container.id().to_string(),
        container,
    };

    let cfg = match instance_configuration(&handle, password).await {
        Ok(cfg) => cfg,
        Err(e) => {
            must_remove_container(handle).await;
            return Err(e);
        }
    };

    match wait_for_postgres(&cfg, options.readiness_timeout).await {
        Ok(client) => drop(client),
        Err(e) => {
            tracing::warn!("Container '{}' never became ready: {}", name, e);
            must_remove_container(handle).await;
            return Err(e);
        }
    }

    tracing::info!("✓ PostgreSQL container '{}' ready", handle.identifier);

    Ok((
        Configuration {
            database: None,
            ..cfg
        },
        handle,
    ))
}

async fn instance_configuration(
    handle: &ContainerHandle,
    password: String,
) -> Result<Configuration> {
    let container_error = |context: &str| {
        let context = format!("{} of container {}", context, handle.identifier);
        move |source: testcontainers::TestcontainersError| ProvisionError::Container {
            context,
            source,
        }
    };

    let address = handle
        .container
        .get_host()
        .await
        .map_err(container_error("reading host"))?;
    let port = handle
        .container
        .get_host_port_ipv4(ContainerPort::Tcp(POSTGRES_PORT))
        .await
        .map_err(container_error("reading mapped port"))?;

    let cfg = Configuration {
        address: address.to_string(),
        port,
        user: ADMIN_USER.to_string(),
        password,
        database: Some(ADMIN_DATABASE.to_string()),
        extensions: Vec::new(),
    };
    // Reject an unusable descriptor before polling
    connection_config(&cfg)?;
    Ok(cfg)
}

/// Poll the server until it answers a liveness probe or `timeout` elapses
async fn wait_for_postgres(cfg: &Configuration, timeout: Duration) -> Result<Client> {
    let start = Instant::now();
    let mut last_error = None;

    while let Some(remaining) = timeout.checked_sub(start.elapsed()) {
        match tokio::time::timeout(remaining, probe(cfg)).await {
            Ok(Ok(client)) => return Ok(client),
            Ok(Err(e)) => last_error = Some(e.to_string()),
            Err(_) => break,
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    Err(ProvisionError::Timeout {
        waited: timeout,
        last_error,
    })
}

async fn probe(cfg: &Configuration) -> Result<Client> {
    let client = connect(cfg).await?;
    ping(&client).await?;
    Ok(client)
}

/// Force-remove a disposable instance
pub async fn remove_container(handle: ContainerHandle) -> Result<()> {
    let ContainerHandle {
        identifier,
        container,
    } = handle;

    container
        .rm()
        .await
        .map_err(|source| ProvisionError::Container {
            context: format!("removing container {}", identifier),
            source,
        })?;

    tracing::info!("✓ Removed container '{}'", identifier);
    Ok(())
}

/// Force-remove a disposable instance, panicking on failure
///
/// Only for test fixtures: a container that cannot be removed leaves the
/// test environment in an unknown state.
pub async fn must_remove_container(handle: ContainerHandle) {
    let identifier = handle.identifier.clone();
    if let Err(e) = remove_container(handle).await {
        panic!("could not remove container {}: {}", identifier, e);
    }
}

/// Test fixture: deploy an instance on `[15432;15440]` or panic
pub async fn test_deploy() -> (Configuration, ContainerHandle) {
    let ports = PortRange {
        start: 15432,
        end: 15440,
    };
    match deploy("test-postgres", ports).await {
        Ok(deployed) => deployed,
        Err(e) => panic!("could not deploy postgres database: {}", e),
    }
}

/// Test fixture: remove an instance or panic
pub async fn test_remove_container(handle: ContainerHandle) {
    must_remove_container(handle).await
}
