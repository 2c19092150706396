// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Generic reconciliation engine.
//!
//! A [`ResourceOperator`] decides between create, patch, delete and no-op for a
//! single named resource and confirms deletions before reporting them.

use crate::config::OperatorConfig;
use crate::error::{OperatorError, Result};
use crate::resources::diff::{default_ignorable_paths, ResourceDiff};
use crate::resources::readiness::Readiness;
use crate::resources::result::ReconcileResult;
use crate::resources::store::{
    is_gone, Cascade, DeletionConfirmation, KubeStore, ManagedResource, ResourceStore,
};
use futures::future::try_join_all;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Client, Resource, ResourceExt};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument};

pub struct ResourceOperator<K, S = KubeStore<K>> {
    store: S,
    confirmation: DeletionConfirmation,
    operation_timeout: Duration,
    ignorable: Regex,
    locks: NameLocks,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ManagedResource> ResourceOperator<K, KubeStore<K>> {
    /// Operator for a namespaced kind, confirming deletions with a watch
    pub fn namespaced(client: Client, namespace: &str, config: &OperatorConfig) -> Self
    where
        K: Resource<Scope = NamespaceResourceScope>,
    {
        Self::new(
            KubeStore::namespaced(client, namespace),
            DeletionConfirmation::Watch,
            config,
        )
    }

    /// Operator for a cluster-scoped kind, confirming deletions with a watch
    pub fn cluster_scoped(client: Client, config: &OperatorConfig) -> Self
    where
        K: Resource<Scope = ClusterResourceScope>,
    {
        Self::new(
            KubeStore::cluster_scoped(client),
            DeletionConfirmation::Watch,
            config,
        )
    }
}

impl<K, S> ResourceOperator<K, S>
where
    K: ManagedResource,
    S: ResourceStore<K>,
{
    pub fn new(store: S, confirmation: DeletionConfirmation, config: &OperatorConfig) -> Self {
        Self {
            store,
            confirmation,
            operation_timeout: config.operation_timeout,
            ignorable: default_ignorable_paths().clone(),
            locks: NameLocks::default(),
            _kind: PhantomData,
        }
    }

    /// Replace the paths excluded from diffing
    pub fn with_ignorable_paths(mut self, ignorable: Regex) -> Self {
        self.ignorable = ignorable;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn kind() -> String {
        K::kind(&()).to_string()
    }

    fn describe(&self, name: &str) -> String {
        match self.store.namespace() {
            Some(namespace) => format!("{} {}/{}", Self::kind(), namespace, name),
            None => format!("{} {}", Self::kind(), name),
        }
    }

    /// Drive the resource `name` towards `desired`; `None` means it should not exist
    pub async fn reconcile(&self, name: &str, desired: Option<K>) -> Result<ReconcileResult<K>> {
        self.reconcile_with(name, desired, Cascade::default()).await
    }

    /// Like [`reconcile`](Self::reconcile), with an explicit cascade policy for deletion
    #[instrument(skip(self, desired), fields(kind = %Self::kind(), namespace = ?self.store.namespace()))]
    pub async fn reconcile_with(
        &self,
        name: &str,
        desired: Option<K>,
        cascade: Cascade,
    ) -> Result<ReconcileResult<K>> {
        validate_name(name)?;
        if let Some(desired) = &desired {
            let desired_name = desired.meta().name.as_deref();
            if desired_name != Some(name) {
                return Err(OperatorError::InvalidRequest(format!(
                    "{} has name {:?}, but reconcile was requested for {}",
                    Self::kind(),
                    desired_name,
                    self.describe(name)
                )));
            }
        }

        let _guard = self.locks.acquire(name).await;
        let current = self.store.fetch(name).await?;

        match (current, desired) {
            (None, Some(desired)) => {
                info!("{} does not exist, creating it", self.describe(name));
                let created = self.store.create(&desired).await?;
                Ok(ReconcileResult::Created(created))
            }
            (Some(current), Some(desired)) => self.patch(name, current, desired).await,
            (Some(current), None) => {
                info!("{} should be deleted", self.describe(name));
                self.delete(name, &current, cascade).await?;
                Ok(ReconcileResult::Deleted)
            }
            (None, None) => {
                debug!("{} does not exist and should not exist", self.describe(name));
                Ok(ReconcileResult::NoOp(None))
            }
        }
    }

    /// Reconcile a resource that must exist, addressed by its own name
    pub async fn create_or_update(&self, resource: K) -> Result<ReconcileResult<K>> {
        let name = resource.meta().name.clone().ok_or_else(|| {
            OperatorError::InvalidRequest(format!("{} has no name", Self::kind()))
        })?;
        self.reconcile(&name, Some(resource)).await
    }

    async fn patch(&self, name: &str, current: K, desired: K) -> Result<ReconcileResult<K>> {
        let diff = ResourceDiff::new(&Self::kind(), name, &current, &desired, &self.ignorable)?;
        if diff.is_empty() {
            debug!("{} is up to date", self.describe(name));
            return Ok(ReconcileResult::NoOp(Some(current)));
        }

        info!(
            "{} differs at {} path(s), patching it",
            self.describe(name),
            diff.changed_paths().len()
        );
        let patched = self.store.patch(name, &desired).await?;

        if version_changed(&current, &patched) {
            Ok(ReconcileResult::Patched(patched))
        } else {
            debug!("Patch of {} produced no new revision", self.describe(name));
            Ok(ReconcileResult::NoOp(Some(patched)))
        }
    }

    async fn delete(&self, name: &str, current: &K, cascade: Cascade) -> Result<()> {
        self.store.delete(name, cascade).await?;
        self.confirm_deletion(name, current.uid()).await?;
        info!("{} has been deleted", self.describe(name));
        Ok(())
    }

    async fn confirm_deletion(&self, name: &str, uid: Option<String>) -> Result<()> {
        let confirmed = async {
            match self.confirmation {
                DeletionConfirmation::Watch => {
                    let remaining = self.store.fetch(name).await?;
                    if is_gone(remaining.as_ref(), uid.as_deref()) {
                        return Ok::<(), OperatorError>(());
                    }
                    self.store.await_deleted(name, uid.clone()).await
                }
                DeletionConfirmation::Poll { interval } => loop {
                    let remaining = self.store.fetch(name).await?;
                    if is_gone(remaining.as_ref(), uid.as_deref()) {
                        return Ok(());
                    }
                    sleep(interval).await;
                },
            }
        };

        timeout(self.operation_timeout, confirmed)
            .await
            .map_err(|_| OperatorError::Timeout(format!("deletion of {}", self.describe(name))))?
    }

    pub async fn get(&self, name: &str) -> Result<Option<K>> {
        validate_name(name)?;
        self.store.fetch(name).await
    }

    /// All resources matching `selector`, in no particular order
    pub async fn list(&self, selector: Option<&str>) -> Result<Vec<K>> {
        self.store.list(selector).await
    }

    /// Reconcile every desired resource, and delete resources matching `selector`
    /// that are not desired. The selector must name the label set owned by the
    /// caller; only resources carrying it are ever deleted.
    pub async fn batch_reconcile(
        &self,
        desired: Vec<K>,
        selector: &str,
    ) -> Result<Vec<ReconcileResult<K>>> {
        if selector.trim().is_empty() {
            return Err(OperatorError::InvalidRequest(format!(
                "batch reconcile of {} needs a label selector",
                Self::kind()
            )));
        }

        let desired_names: HashSet<String> = desired.iter().map(ResourceExt::name_any).collect();
        let stale: Vec<String> = self
            .list(Some(selector))
            .await?
            .iter()
            .map(ResourceExt::name_any)
            .filter(|name| !desired_names.contains(name))
            .collect();

        debug!(
            "Batch reconciling {} desired and {} stale {}",
            desired.len(),
            stale.len(),
            Self::kind()
        );

        let upserts = desired.into_iter().map(|resource| self.create_or_update(resource));
        let deletes = stale.iter().map(|name| self.reconcile(name, None));

        let (mut results, deleted) = tokio::try_join!(try_join_all(upserts), try_join_all(deletes))?;
        results.extend(deleted);
        Ok(results)
    }

    /// Poll `name` until `predicate` holds, failing with a timeout after `timeout_after`
    pub async fn wait_for<P>(
        &self,
        name: &str,
        what: &str,
        poll_interval: Duration,
        timeout_after: Duration,
        predicate: P,
    ) -> Result<()>
    where
        P: Fn(Option<&K>) -> bool + Send + Sync,
    {
        validate_name(name)?;
        let satisfied = async {
            loop {
                let resource = self.store.fetch(name).await?;
                if predicate(resource.as_ref()) {
                    return Ok::<(), OperatorError>(());
                }
                sleep(poll_interval).await;
            }
        };

        timeout(timeout_after, satisfied)
            .await
            .map_err(|_| OperatorError::Timeout(format!("{} of {}", what, self.describe(name))))?
    }
}

impl<K, S> ResourceOperator<K, S>
where
    K: ManagedResource + Readiness,
    S: ResourceStore<K>,
{
    /// False when the resource does not exist
    pub async fn is_ready(&self, name: &str) -> Result<bool> {
        Ok(self.get(name).await?.is_some_and(|r| r.is_ready()))
    }

    /// Wait until the resource exists and is ready
    pub async fn readiness(
        &self,
        name: &str,
        poll_interval: Duration,
        timeout_after: Duration,
    ) -> Result<()> {
        self.wait_for(name, "readiness", poll_interval, timeout_after, |r| {
            r.is_some_and(Readiness::is_ready)
        })
        .await
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(OperatorError::InvalidRequest(
            "resource name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// A missing version on either side counts as a change
fn version_changed<K: Resource>(before: &K, after: &K) -> bool {
    match (&before.meta().resource_version, &after.meta().resource_version) {
        (Some(before), Some(after)) => before != after,
        _ => true,
    }
}

/// Serializes reconciliations of the same name within one operator.
///
/// Only weak handles are kept; an entry lives while a reconcile holds or
/// waits for its lock, and is pruned on a later `acquire`.
#[derive(Default)]
struct NameLocks {
    locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl NameLocks {
    async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| lock.strong_count() > 0);
            match locks.get(name).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    locks.insert(name.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
