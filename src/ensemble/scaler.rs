// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Scales a running ensemble by reconfiguring its live membership.

use crate::config::OperatorConfig;
use crate::ensemble::admin::{AdminClientConfig, AdminClientFactory, EnsembleAdmin};
use crate::ensemble::credentials::{CaBundle, ClientIdentity, CredentialStores};
use crate::ensemble::membership::{generate_config, is_different, parse_config, servers_map_to_list};
use crate::error::{OperatorError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

/// Maps a pod ordinal to the network address of that ensemble member
pub type AddressFn = Box<dyn Fn(usize) -> String + Send + Sync>;

/// Drives the membership of one ensemble to a target replica count.
///
/// Owns two temporary credential store files for its whole lifetime. Call
/// [`close`](Self::close) when done; dropping the scaler also removes them.
pub struct EnsembleScaler {
    connect_string: String,
    address: AddressFn,
    stores: CredentialStores,
    factory: Arc<dyn AdminClientFactory>,
    operation_timeout: Duration,
    connect_poll_interval: Duration,
}

impl EnsembleScaler {
    pub async fn new(
        factory: Arc<dyn AdminClientFactory>,
        connect_string: String,
        address: AddressFn,
        ca: CaBundle,
        identity: ClientIdentity,
        config: &OperatorConfig,
    ) -> Result<Self> {
        let stores = tokio::task::spawn_blocking(move || CredentialStores::materialize(&ca, &identity))
            .await
            .map_err(|e| {
                OperatorError::Credentials(format!("credential store creation did not finish: {}", e))
            })??;

        Ok(Self {
            connect_string,
            address,
            stores,
            factory,
            operation_timeout: config.operation_timeout,
            connect_poll_interval: config.connect_poll_interval,
        })
    }

    fn client_config(&self) -> AdminClientConfig {
        AdminClientConfig {
            connect_string: self.connect_string.clone(),
            client_secure: true,
            sasl_enabled: false,
            trust_store: self.stores.trust_store(),
            key_store: self.stores.key_store(),
            request_timeout: self.operation_timeout,
        }
    }

    /// Reconfigure the ensemble to `replicas` members, if its membership differs
    #[instrument(skip(self), fields(ensemble = %self.connect_string))]
    pub async fn scale(&self, replicas: usize) -> Result<()> {
        let admin = self.connect().await?;

        let result = self.reconcile_membership(admin.as_ref(), replicas).await;
        // The close outcome never changes the reported result
        close_quietly(admin.as_ref(), self.operation_timeout).await;

        result
    }

    /// Create the admin client and wait until it is live, both within one
    /// operation timeout
    async fn connect(&self) -> Result<Box<dyn EnsembleAdmin>> {
        let config = self.client_config();
        let mut admin: Option<Box<dyn EnsembleAdmin>> = None;

        let connected = timeout(self.operation_timeout, async {
            let client = self.factory.connect(&config).await.map_err(|e| {
                OperatorError::scaling(
                    format!("Failed to create admin client for {}", self.connect_string),
                    e,
                )
            })?;
            let client = admin.insert(client);
            while !(client.is_alive() && client.is_connected()) {
                sleep(self.connect_poll_interval).await;
            }
            Ok::<(), OperatorError>(())
        })
        .await;

        match (connected, admin) {
            (Ok(Ok(())), Some(admin)) => {
                debug!("Connected to ensemble");
                Ok(admin)
            }
            (Ok(Err(e)), _) => Err(e),
            (_, admin) => {
                if let Some(admin) = admin {
                    close_quietly(admin.as_ref(), self.operation_timeout).await;
                }
                Err(OperatorError::scaling(
                    format!("Failed to connect to ensemble {}", self.connect_string),
                    OperatorError::Timeout(format!("connection to ensemble {}", self.connect_string)),
                ))
            }
        }
    }

    async fn reconcile_membership(&self, admin: &dyn EnsembleAdmin, replicas: usize) -> Result<()> {
        let raw = admin
            .get_config()
            .await
            .map_err(|e| OperatorError::scaling("Failed to read ensemble configuration", e))?;
        let current = parse_config(&raw);
        let desired = generate_config(replicas, &self.address);

        if !is_different(&current, &desired) {
            debug!("Ensemble already has {} member(s), nothing to do", replicas);
            return Ok(());
        }

        info!(
            "Reconfiguring ensemble from {} to {} member(s)",
            current.len(),
            desired.len()
        );
        debug!("Current members: {:?}, desired members: {:?}", current, desired);

        let raw = admin
            .reconfigure(servers_map_to_list(&desired))
            .await
            .map_err(|e| OperatorError::scaling("Failed to reconfigure ensemble", e))?;
        let updated = parse_config(&raw);
        info!("Ensemble reconfigured, members are now {:?}", updated);

        Ok(())
    }

    /// Delete the temporary credential stores
    pub fn close(self) {
        self.stores.close();
    }
}

async fn close_quietly(admin: &dyn EnsembleAdmin, close_timeout: Duration) {
    if let Err(e) = admin.close(close_timeout).await {
        warn!("Failed to close ensemble admin connection: {}", e);
    }
}
