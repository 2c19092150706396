// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The store capability the reconciliation engine is built on, and its
//! Kubernetes API implementation.

use crate::constants::OPERATOR_NAME;
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Api, Client, Resource, ResourceExt,
};
use kube_runtime::wait::await_condition;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::debug;

/// Bounds shared by every resource kind the engine manages
pub trait ManagedResource:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> ManagedResource for K where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Cascade propagation applied to dependents when a resource is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cascade {
    #[default]
    Foreground,
    Orphan,
}

/// How the engine observes that a deletion took effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionConfirmation {
    /// Watch the named resource until it disappears
    Watch,
    /// Re-fetch the resource at a fixed interval until it is absent
    Poll { interval: std::time::Duration },
}

/// Operations a resource kind supplies to the reconciliation engine.
///
/// Every method addresses resources by name within the store's scope (a
/// namespace, or the whole cluster).
#[async_trait]
pub trait ResourceStore<K: Send + Sync + 'static>: Send + Sync {
    /// Namespace the store is bound to, `None` for cluster-scoped kinds
    fn namespace(&self) -> Option<&str>;

    async fn fetch(&self, name: &str) -> Result<Option<K>>;

    /// List resources matching a label selector, all of them when `None`
    async fn list(&self, selector: Option<&str>) -> Result<Vec<K>>;

    async fn create(&self, resource: &K) -> Result<K>;

    async fn patch(&self, name: &str, resource: &K) -> Result<K>;

    /// Issue the delete request. Succeeds if the resource is already gone.
    async fn delete(&self, name: &str, cascade: Cascade) -> Result<()>;

    /// Resolve once the named resource (with `uid`, if given) no longer exists.
    /// Kinds without watch support keep the default and are confirmed by polling.
    async fn await_deleted(&self, name: &str, uid: Option<String>) -> Result<()> {
        let _ = uid;
        Err(OperatorError::InvalidRequest(format!(
            "watching {} is not supported by this store",
            name
        )))
    }
}

/// True if `resource` is absent, or has been replaced by an object with another uid
pub(crate) fn is_gone<K: Resource>(resource: Option<&K>, uid: Option<&str>) -> bool {
    match resource {
        None => true,
        Some(r) => uid.is_some() && r.meta().uid.as_deref() != uid,
    }
}

/// Kubernetes API backed store
#[derive(Clone)]
pub struct KubeStore<K> {
    api: Api<K>,
    namespace: Option<String>,
}

impl<K: ManagedResource> KubeStore<K> {
    pub fn namespaced(client: Client, namespace: &str) -> Self
    where
        K: Resource<Scope = NamespaceResourceScope>,
    {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: Some(namespace.to_string()),
        }
    }

    pub fn cluster_scoped(client: Client) -> Self
    where
        K: Resource<Scope = ClusterResourceScope>,
    {
        Self {
            api: Api::all(client),
            namespace: None,
        }
    }

    pub fn api(&self) -> &Api<K> {
        &self.api
    }
}

#[async_trait]
impl<K: ManagedResource> ResourceStore<K> for KubeStore<K> {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    async fn fetch(&self, name: &str) -> Result<Option<K>> {
        Ok(self.api.get_opt(name).await?)
    }

    async fn list(&self, selector: Option<&str>) -> Result<Vec<K>> {
        let lp = match selector {
            Some(selector) => ListParams::default().labels(selector),
            None => ListParams::default(),
        };
        Ok(self.api.list(&lp).await?.items)
    }

    async fn create(&self, resource: &K) -> Result<K> {
        Ok(self.api.create(&PostParams::default(), resource).await?)
    }

    async fn patch(&self, name: &str, resource: &K) -> Result<K> {
        let pp = PatchParams::apply(OPERATOR_NAME).force();
        Ok(self.api.patch(name, &pp, &Patch::Apply(resource)).await?)
    }

    async fn delete(&self, name: &str, cascade: Cascade) -> Result<()> {
        let dp = match cascade {
            Cascade::Foreground => DeleteParams::foreground(),
            Cascade::Orphan => DeleteParams::orphan(),
        };

        match self.api.delete(name, &dp).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!("{} {} was already deleted", K::kind(&()), name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn await_deleted(&self, name: &str, uid: Option<String>) -> Result<()> {
        let deleted = move |obj: Option<&K>| is_gone(obj, uid.as_deref());
        await_condition(self.api.clone(), name, deleted).await?;
        Ok(())
    }
}

impl<K: ManagedResource> KubeStore<K> {
    /// Replace the status subresource with the status carried by `resource`
    pub async fn replace_status(&self, resource: &K) -> Result<K> {
        let name = resource.name_any();
        let body = serde_json::to_vec(resource).map_err(|e| {
            OperatorError::InvalidRequest(format!(
                "{} {} cannot be serialized: {}",
                K::kind(&()),
                name,
                e
            ))
        })?;
        Ok(self
            .api
            .replace_status(&name, &PostParams::default(), body)
            .await?)
    }
}
