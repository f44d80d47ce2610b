// ABOUTME: Library module for postgres-provisioner
// ABOUTME: Exports database provisioning steps and disposable test instances

pub mod config;
#[cfg(feature = "test-support")]
pub mod container;
pub mod error;
pub mod postgres;
pub mod utils;

pub use config::Configuration;
pub use error::{ProvisionError, Result};
