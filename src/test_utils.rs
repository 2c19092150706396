// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a recording mock of the Kubernetes API, an in-memory
//! resource store and fixtures.

use crate::config::OperatorConfig;
use crate::ensemble::ClientIdentity;
use crate::error::{OperatorError, Result};
use crate::resources::store::{is_gone, Cascade, ResourceStore};
use async_trait::async_trait;
use http::{Request, Response};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::core::ErrorResponse;
use kube::{Client, CustomResource, Resource, ResourceExt};
use openssl::asn1::Asn1Time;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Name, X509};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// A request seen by [`MockService`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub body: Vec<u8>,
}

/// A mock HTTP service that returns predefined responses based on request
/// method and path, and records every request it receives.
#[derive(Clone, Default)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Respond to `watch=true` GET requests with newline separated watch events
    pub fn on_watch(self, path: &str, events: &[serde_json::Value]) -> Self {
        let body: String = events.iter().map(|e| format!("{}\n", e)).collect();
        self.on("WATCH", path, 200, &body)
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    /// Exact match first, then the longest registered prefix
    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        responses
            .iter()
            .filter(|((m, p), _)| m == method && path.starts_with(p.as_str()))
            .max_by_key(|((_, p), _)| p.len())
            .map(|(_, resp)| resp.clone())
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or_default().to_string();

        let route = if query.split('&').any(|p| p == "watch=true") {
            "WATCH"
        } else {
            method.as_str()
        };
        let response = self.find_response(route, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let body = req.into_body().collect().await?.to_bytes().to_vec();
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                query,
                body,
            });

            let (status, body) = response.unwrap_or_else(|| {
                // Default 404 for unmatched requests
                (404, not_found_json("resource", "unknown"))
            });
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

pub fn config_map_json(name: &str, namespace: &str, resource_version: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": format!("uid-{}", name),
            "resourceVersion": resource_version
        },
        "data": {}
    })
    .to_string()
}

pub fn config_map_list_json(resource_version: &str, items: &[&str]) -> String {
    let items: Vec<serde_json::Value> = items
        .iter()
        .map(|item| serde_json::from_str(item).unwrap())
        .collect();
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMapList",
        "metadata": { "resourceVersion": resource_version },
        "items": items
    })
    .to_string()
}

pub fn make_config_map(name: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
        ..Default::default()
    }
}

pub fn with_labels(mut resource: ConfigMap, labels: &[(&str, &str)]) -> ConfigMap {
    resource.metadata.labels = Some(
        labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    );
    resource
}

/// Short bounds so timeout paths finish quickly
pub fn test_config() -> OperatorConfig {
    OperatorConfig {
        operation_timeout: Duration::from_millis(200),
        deletion_poll_interval: Duration::from_millis(10),
        connect_poll_interval: Duration::from_millis(5),
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Custom resource used to exercise the custom resource operator
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "test.quorum.io",
    version = "v1",
    kind = "Ensemble",
    namespaced,
    status = "EnsembleStatus",
    derive = "PartialEq"
)]
pub struct EnsembleSpec {
    pub replicas: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleStatus {
    pub ready_replicas: Option<i32>,
}

pub fn make_ensemble(name: &str, replicas: i32) -> Ensemble {
    let mut ensemble = Ensemble::new(name, EnsembleSpec { replicas });
    ensemble.metadata.namespace = Some("default".to_string());
    ensemble.status = Some(EnsembleStatus {
        ready_replicas: Some(replicas),
    });
    ensemble
}

pub fn ensemble_json(name: &str, replicas: i32, resource_version: &str) -> String {
    serde_json::json!({
        "apiVersion": "test.quorum.io/v1",
        "kind": "Ensemble",
        "metadata": {
            "name": name,
            "namespace": "default",
            "uid": format!("uid-{}", name),
            "resourceVersion": resource_version
        },
        "spec": { "replicas": replicas },
        "status": { "readyReplicas": replicas }
    })
    .to_string()
}

/// Short-lived self-signed certificate on a fresh P-256 key
fn self_signed(common_name: &str) -> (PKey<Private>, X509) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509Name::builder().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

/// A PEM bundle with a single CA certificate
pub fn test_ca_pem() -> Vec<u8> {
    self_signed("test-ca").1.to_pem().unwrap()
}

/// PKCS#12 archive with a client key and certificate, protected by `changeit`
pub fn test_identity_archive() -> Vec<u8> {
    let (key, certificate) = self_signed("cluster-operator");
    Pkcs12::builder()
        .name("cluster-operator")
        .pkey(&key)
        .cert(&certificate)
        .build2("changeit")
        .unwrap()
        .to_der()
        .unwrap()
}

pub fn test_identity() -> ClientIdentity {
    ClientIdentity::new(test_identity_archive(), "changeit".to_string())
}

fn api_error(code: u16, reason: &str, message: String) -> OperatorError {
    OperatorError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

struct FakeState<K> {
    objects: BTreeMap<String, K>,
    calls: Vec<String>,
    next_version: u64,
}

/// In-memory [`ResourceStore`] bound to namespace `default`. Clones share state.
pub struct FakeStore<K> {
    state: Arc<Mutex<FakeState<K>>>,
    inert_patches: bool,
    stuck_deletes: bool,
    deletion_delay: Option<Duration>,
    failing_fetches: bool,
}

impl<K> Clone for FakeStore<K> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            inert_patches: self.inert_patches,
            stuck_deletes: self.stuck_deletes,
            deletion_delay: self.deletion_delay,
            failing_fetches: self.failing_fetches,
        }
    }
}

impl<K: Resource + Clone> FakeStore<K> {
    pub fn new() -> Self {
        Self::with(Vec::new())
    }

    /// Store pre-populated with `objects`, each given a version and uid
    pub fn with(objects: Vec<K>) -> Self {
        let mut state = FakeState {
            objects: BTreeMap::new(),
            calls: Vec::new(),
            next_version: 1,
        };
        for mut object in objects {
            let name = object.name_any();
            stamp(&mut object, state.next_version);
            state.next_version += 1;
            state.objects.insert(name, object);
        }

        Self {
            state: Arc::new(Mutex::new(state)),
            inert_patches: false,
            stuck_deletes: false,
            deletion_delay: None,
            failing_fetches: false,
        }
    }

    /// Patches succeed without changing anything
    pub fn inert_patches(mut self) -> Self {
        self.inert_patches = true;
        self
    }

    /// Delete requests are accepted but the object never goes away
    pub fn stuck_deletes(mut self) -> Self {
        self.stuck_deletes = true;
        self
    }

    /// Delete requests are accepted and the object disappears after `delay`
    pub fn delayed_deletes(mut self, delay: Duration) -> Self {
        self.deletion_delay = Some(delay);
        self
    }

    pub fn failing_fetches(mut self) -> Self {
        self.failing_fetches = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn get(&self, name: &str) -> Option<K> {
        self.state.lock().unwrap().objects.get(name).cloned()
    }

    fn record(&self, call: &str) -> std::sync::MutexGuard<'_, FakeState<K>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        state
    }
}

fn stamp<K: Resource>(object: &mut K, version: u64) {
    let meta = object.meta_mut();
    meta.resource_version = Some(version.to_string());
    if meta.uid.is_none() {
        meta.uid = Some(format!("uid-{}", version));
    }
}

fn matches_selector<K: Resource>(object: &K, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    let labels = object.meta().labels.clone().unwrap_or_default();
    selector.split(',').all(|term| match term.split_once('=') {
        Some((key, value)) => labels.get(key.trim()).map(String::as_str) == Some(value.trim()),
        None => labels.contains_key(term.trim()),
    })
}

#[async_trait]
impl<K> ResourceStore<K> for FakeStore<K>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    fn namespace(&self) -> Option<&str> {
        Some("default")
    }

    async fn fetch(&self, name: &str) -> Result<Option<K>> {
        let state = self.record("fetch");
        if self.failing_fetches {
            return Err(api_error(500, "InternalError", "etcd unavailable".to_string()));
        }
        Ok(state.objects.get(name).cloned())
    }

    async fn list(&self, selector: Option<&str>) -> Result<Vec<K>> {
        let state = self.record("list");
        Ok(state
            .objects
            .values()
            .filter(|o| matches_selector(*o, selector))
            .cloned()
            .collect())
    }

    async fn create(&self, resource: &K) -> Result<K> {
        let mut state = self.record("create");
        let name = resource.name_any();
        if state.objects.contains_key(&name) {
            return Err(api_error(409, "AlreadyExists", format!("{} already exists", name)));
        }
        let mut created = resource.clone();
        created.meta_mut().uid = None;
        let version = state.next_version;
        state.next_version += 1;
        stamp(&mut created, version);
        state.objects.insert(name, created.clone());
        Ok(created)
    }

    async fn patch(&self, name: &str, resource: &K) -> Result<K> {
        let mut state = self.record("patch");
        let Some(current) = state.objects.get(name).cloned() else {
            return Err(api_error(404, "NotFound", format!("{} not found", name)));
        };
        if self.inert_patches {
            return Ok(current);
        }
        let mut patched = resource.clone();
        patched.meta_mut().uid = current.meta().uid.clone();
        let version = state.next_version;
        state.next_version += 1;
        stamp(&mut patched, version);
        state.objects.insert(name.to_string(), patched.clone());
        Ok(patched)
    }

    async fn delete(&self, name: &str, _cascade: Cascade) -> Result<()> {
        let mut state = self.record("delete");
        if self.stuck_deletes {
            return Ok(());
        }
        match self.deletion_delay {
            Some(delay) => {
                let shared = self.state.clone();
                let name = name.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    shared.lock().unwrap().objects.remove(&name);
                });
            }
            None => {
                state.objects.remove(name);
            }
        }
        Ok(())
    }

    async fn await_deleted(&self, name: &str, uid: Option<String>) -> Result<()> {
        drop(self.record("await_deleted"));
        loop {
            let gone = {
                let state = self.state.lock().unwrap();
                is_gone(state.objects.get(name), uid.as_deref())
            };
            if gone {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}
