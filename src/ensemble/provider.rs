// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::config::OperatorConfig;
use crate::constants::ensemble::CLIENT_TLS_PORT;
use crate::constants::secrets::{cluster_ca_cert, operator_certs, OPERATOR_IDENTITY};
use crate::ensemble::admin::AdminClientFactory;
use crate::ensemble::credentials::{CaBundle, ClientIdentity};
use crate::ensemble::scaler::{AddressFn, EnsembleScaler};
use crate::error::{OperatorError, Result};
use crate::resources::{ResourceOperator, ResourceStore};
use k8s_openapi::api::core::v1::Secret;
use std::sync::Arc;
use tracing::{debug, instrument};

/// DNS name of ensemble member `ordinal` behind the headless nodes service
pub fn ensemble_pod_address(cluster: &str, namespace: &str, ordinal: usize) -> String {
    format!(
        "{cluster}-zookeeper-{ordinal}.{cluster}-zookeeper-nodes.{namespace}.svc",
        cluster = cluster,
        ordinal = ordinal,
        namespace = namespace
    )
}

pub fn ensemble_connect_string(cluster: &str, namespace: &str) -> String {
    format!("{}-zookeeper-client.{}:{}", cluster, namespace, CLIENT_TLS_PORT)
}

/// Creates [`EnsembleScaler`]s sharing one admin client factory and configuration
pub struct EnsembleScalerProvider {
    factory: Arc<dyn AdminClientFactory>,
    config: OperatorConfig,
}

impl EnsembleScalerProvider {
    pub fn new(factory: Arc<dyn AdminClientFactory>, config: OperatorConfig) -> Self {
        Self { factory, config }
    }

    pub async fn create(
        &self,
        connect_string: String,
        address: AddressFn,
        ca: CaBundle,
        identity: ClientIdentity,
    ) -> Result<EnsembleScaler> {
        EnsembleScaler::new(
            self.factory.clone(),
            connect_string,
            address,
            ca,
            identity,
            &self.config,
        )
        .await
    }

    /// Scaler for `cluster`, with credentials read from the cluster's secrets
    #[instrument(skip(self, secrets))]
    pub async fn for_cluster<S>(
        &self,
        secrets: &ResourceOperator<Secret, S>,
        cluster: &str,
        namespace: &str,
    ) -> Result<EnsembleScaler>
    where
        S: ResourceStore<Secret>,
    {
        let ca = CaBundle::from_secret(&required_secret(secrets, &cluster_ca_cert(cluster)).await?)?;
        let identity = ClientIdentity::from_secret(
            &required_secret(secrets, &operator_certs(cluster)).await?,
            OPERATOR_IDENTITY,
        )?;
        debug!("Loaded ensemble credentials for cluster {}", cluster);

        let address_cluster = cluster.to_string();
        let address_namespace = namespace.to_string();
        let address: AddressFn = Box::new(move |ordinal| {
            ensemble_pod_address(&address_cluster, &address_namespace, ordinal)
        });

        self.create(ensemble_connect_string(cluster, namespace), address, ca, identity)
            .await
    }
}

async fn required_secret<S: ResourceStore<Secret>>(
    secrets: &ResourceOperator<Secret, S>,
    name: &str,
) -> Result<Secret> {
    secrets
        .get(name)
        .await?
        .ok_or_else(|| OperatorError::Credentials(format!("secret {} not found", name)))
}
