// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mocked Kubernetes API, an in-memory object store and fixtures.

use crate::constants::annotations;
use crate::error::{OperatorError, Result};
use crate::retry::RetryPolicy;
use crate::store::ObjectStore;
use crate::types::module::{Module, ModuleSpec};
use async_trait::async_trait;
use http::{Request, Response};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::{Client, ResourceExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

type RecordedRequest = (String, String, Vec<u8>);

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
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

    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    /// Requests received so far as (method, path, body)
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
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
        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let body = req
                .into_body()
                .collect()
                .await
                .map(|c| c.to_bytes().to_vec())
                .unwrap_or_default();
            requests.lock().unwrap().push((method, path, body));

            // Unmatched requests get a 404
            let (status, body) =
                response.unwrap_or_else(|| (404, status_json(404, "NotFound", "not found")));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a Kubernetes Status failure body
pub fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

/// Retry policy with a short pause so conflict tests stay fast
pub fn fast_retry(steps: u32) -> RetryPolicy {
    RetryPolicy {
        steps,
        interval: Duration::from_millis(1),
        factor: 1.0,
    }
}

pub fn make_module(namespace: &str, name: &str, module: &str) -> Module {
    let mut m = Module::new(
        name,
        ModuleSpec {
            cu: "test".to_string(),
            module: module.to_string(),
            sidecar: PodSpec {
                containers: vec![Container {
                    name: "sidecar".to_string(),
                    image: Some("busybox:1".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            },
            lst: vec![],
        },
    );
    m.metadata.namespace = Some(namespace.to_string());
    m.metadata.uid = Some(format!("uid-{}", name));
    m
}

pub fn make_pod(namespace: &str, name: &str, module_annotation: Option<&str>) -> Pod {
    let annotations = module_annotation.map(|v| {
        BTreeMap::from([
            (annotations::MODULE.to_string(), v.to_string()),
            ("keep.this/annotation".to_string(), "value".to_string()),
        ])
    });

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations,
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "app".to_string(),
                image: Some("nginx".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[derive(Default)]
struct FakeState {
    modules: BTreeMap<(String, String), Module>,
    pods: BTreeMap<(String, String), Pod>,
    next_version: u64,
    pod_conflicts: u32,
    status_conflicts: u32,
    pod_creates: u32,
    pod_replaces: u32,
    status_replaces: u32,
}

impl FakeState {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

fn key_of<K: ResourceExt>(obj: &K) -> (String, String) {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

/// In-memory object store with resource versions and injectable conflicts.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<FakeState>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a module as if a user had applied it
    pub fn put_module(&self, mut module: Module) {
        let mut state = self.state.lock().unwrap();
        module.metadata.resource_version = Some(state.bump());
        state.modules.insert(key_of(&module), module);
    }

    /// Store a pod as if it had been created outside the operator
    pub fn put_pod(&self, mut pod: Pod) {
        let mut state = self.state.lock().unwrap();
        pod.metadata.resource_version = Some(state.bump());
        if pod.metadata.uid.is_none() {
            pod.metadata.uid = Some(format!("uid-pod-{}", pod.name_any()));
        }
        state.pods.insert(key_of(&pod), pod);
    }

    pub fn remove_pod(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.pods.remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn module(&self, namespace: &str, name: &str) -> Option<Module> {
        let state = self.state.lock().unwrap();
        state
            .modules
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        let state = self.state.lock().unwrap();
        state
            .pods
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn pods(&self, namespace: &str) -> Vec<Pod> {
        let state = self.state.lock().unwrap();
        state
            .pods
            .values()
            .filter(|p| p.namespace().as_deref() == Some(namespace))
            .cloned()
            .collect()
    }

    /// Make the next `n` pod replacements fail with a conflict, each one
    /// simulating a concurrent writer that touched the pod
    pub fn conflict_pod_replaces(&self, n: u32) {
        self.state.lock().unwrap().pod_conflicts = n;
    }

    pub fn conflict_status_replaces(&self, n: u32) {
        self.state.lock().unwrap().status_conflicts = n;
    }

    pub fn pod_creates(&self) -> u32 {
        self.state.lock().unwrap().pod_creates
    }

    pub fn pod_replaces(&self) -> u32 {
        self.state.lock().unwrap().pod_replaces
    }

    pub fn status_replaces(&self) -> u32 {
        self.state.lock().unwrap().status_replaces
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn get_module(&self, namespace: &str, name: &str) -> Result<Option<Module>> {
        Ok(self.module(namespace, name))
    }

    async fn list_modules(&self, namespace: &str) -> Result<Vec<Module>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .modules
            .values()
            .filter(|m| m.namespace().as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn replace_module_status(&self, module: &Module) -> Result<Module> {
        let mut state = self.state.lock().unwrap();
        let key = key_of(module);
        let what = format!("module {}/{}", key.0, key.1);

        if state.status_conflicts > 0 {
            state.status_conflicts -= 1;
            let version = state.bump();
            if let Some(stored) = state.modules.get_mut(&key) {
                stored.metadata.resource_version = Some(version);
            }
            return Err(OperatorError::Conflict(what));
        }

        let version = state.bump();
        let Some(stored) = state.modules.get_mut(&key) else {
            return Err(OperatorError::Conflict(what));
        };
        if stored.metadata.resource_version != module.metadata.resource_version {
            return Err(OperatorError::Conflict(what));
        }

        stored.status = module.status.clone();
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        state.status_replaces += 1;
        Ok(updated)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        Ok(self.pod(namespace, name))
    }

    async fn create_pod(&self, pod: &Pod) -> Result<Pod> {
        let mut state = self.state.lock().unwrap();
        let key = key_of(pod);
        if state.pods.contains_key(&key) {
            return Err(OperatorError::AlreadyExists(format!("pod {}/{}", key.0, key.1)));
        }

        let mut created = pod.clone();
        created.metadata.resource_version = Some(state.bump());
        created.metadata.uid = Some(format!("uid-pod-{}-{}", key.1, state.next_version));
        state.pods.insert(key, created.clone());
        state.pod_creates += 1;
        Ok(created)
    }

    async fn replace_pod(&self, pod: &Pod) -> Result<Pod> {
        let mut state = self.state.lock().unwrap();
        let key = key_of(pod);
        let what = format!("pod {}/{}", key.0, key.1);

        if state.pod_conflicts > 0 {
            state.pod_conflicts -= 1;
            let version = state.bump();
            if let Some(stored) = state.pods.get_mut(&key) {
                stored
                    .metadata
                    .labels
                    .get_or_insert_with(BTreeMap::new)
                    .insert("touched-by".to_string(), "someone-else".to_string());
                stored.metadata.resource_version = Some(version);
            }
            return Err(OperatorError::Conflict(what));
        }

        let version = state.bump();
        let Some(stored) = state.pods.get_mut(&key) else {
            return Err(OperatorError::Conflict(what));
        };
        if stored.metadata.resource_version != pod.metadata.resource_version {
            return Err(OperatorError::Conflict(what));
        }

        let mut updated = pod.clone();
        updated.metadata.resource_version = Some(version);
        *stored = updated.clone();
        state.pod_replaces += 1;
        Ok(updated)
    }
}
