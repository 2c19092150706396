// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Operator for custom resource kinds.
//!
//! Custom resources are confirmed deleted by polling rather than watching, and
//! expose their status subresource separately from spec patches.

use crate::config::OperatorConfig;
use crate::error::Result;
use crate::resources::operator::ResourceOperator;
use crate::resources::store::{DeletionConfirmation, KubeStore, ManagedResource};
use k8s_openapi::NamespaceResourceScope;
use kube::{Client, CustomResourceExt, Resource, ResourceExt};
use tracing::{debug, instrument};

pub type CrdOperator<K> = ResourceOperator<K, KubeStore<K>>;

impl<K> ResourceOperator<K, KubeStore<K>>
where
    K: ManagedResource + CustomResourceExt + Resource<Scope = NamespaceResourceScope>,
{
    pub fn custom(client: Client, namespace: &str, config: &OperatorConfig) -> Self {
        Self::new(
            KubeStore::namespaced(client, namespace),
            DeletionConfirmation::Poll {
                interval: config.deletion_poll_interval,
            },
            config,
        )
    }

    /// Replace the status of `resource` without touching its spec
    #[instrument(skip(self, resource), fields(kind = %K::kind(&()), name = %resource.name_any()))]
    pub async fn update_status(&self, resource: &K) -> Result<K> {
        let updated = self.store().replace_status(resource).await?;
        debug!(
            "Status updated, resource version is now {:?}",
            updated.resource_version()
        );
        Ok(updated)
    }
}
