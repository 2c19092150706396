// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Client side of the coordination service's admin protocol.
//!
//! The network client itself lives outside this crate; the scaler only needs
//! to connect, read the dynamic configuration and replace the member list.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("coordination service error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A PKCS#12 store file and the passphrase that opens it
#[derive(Clone, PartialEq, Eq)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub password: String,
}

impl std::fmt::Debug for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLocation")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Settings for a mutually authenticated admin connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminClientConfig {
    pub connect_string: String,
    /// Use the TLS-capable socket transport
    pub client_secure: bool,
    pub sasl_enabled: bool,
    pub trust_store: StoreLocation,
    pub key_store: StoreLocation,
    pub request_timeout: Duration,
}

/// An open admin session against the ensemble
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EnsembleAdmin: Send + Sync {
    fn is_alive(&self) -> bool;

    fn is_connected(&self) -> bool;

    /// Current dynamic configuration as newline separated `key=value` text
    async fn get_config(&self) -> Result<Vec<u8>, AdminError>;

    /// Replace the whole member list, without a version check.
    /// Returns the resulting configuration in the same format as `get_config`.
    async fn reconfigure(&self, new_members: Vec<String>) -> Result<Vec<u8>, AdminError>;

    async fn close(&self, timeout: Duration) -> Result<(), AdminError>;
}

/// Opens admin sessions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdminClientFactory: Send + Sync {
    async fn connect(&self, config: &AdminClientConfig) -> Result<Box<dyn EnsembleAdmin>, AdminError>;
}
