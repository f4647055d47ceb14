// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Object store backed by the Kubernetes API server

use crate::error::{OperatorError, Result};
use crate::store::ObjectStore;
use crate::types::module::Module;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{ListParams, PostParams},
    Api, Client, Resource, ResourceExt,
};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn modules(&self, namespace: &str) -> Api<Module> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Namespace and name of an object about to be written
fn object_key<K: Resource>(obj: &K) -> Result<(String, String)> {
    let meta = obj.meta();
    let namespace = meta
        .namespace
        .clone()
        .ok_or(OperatorError::MissingObjectKey("metadata.namespace"))?;
    let name = meta
        .name
        .clone()
        .ok_or(OperatorError::MissingObjectKey("metadata.name"))?;
    Ok((namespace, name))
}

/// Translate write failures the reconcilers react to into their own variants
fn write_error(err: kube::Error, what: String) -> OperatorError {
    match err {
        kube::Error::Api(e) if e.code == 409 && e.reason == "AlreadyExists" => {
            OperatorError::AlreadyExists(what)
        }
        kube::Error::Api(e) if e.code == 409 => OperatorError::Conflict(what),
        e => OperatorError::KubeError(e),
    }
}

async fn get_opt<K>(api: &Api<K>, name: &str) -> Result<Option<K>>
where
    K: Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(err)) if err.code == 404 => {
            debug!("{} not found", name);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    #[instrument(skip(self))]
    async fn get_module(&self, namespace: &str, name: &str) -> Result<Option<Module>> {
        get_opt(&self.modules(namespace), name).await
    }

    #[instrument(skip(self))]
    async fn list_modules(&self, namespace: &str) -> Result<Vec<Module>> {
        let list = self.modules(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    #[instrument(skip(self, module), fields(module = %module.name_any()))]
    async fn replace_module_status(&self, module: &Module) -> Result<Module> {
        let (namespace, name) = object_key(module)?;
        let data = serde_json::to_vec(module)?;

        self.modules(&namespace)
            .replace_status(&name, &PostParams::default(), data)
            .await
            .map_err(|e| write_error(e, format!("module {}/{}", namespace, name)))
    }

    #[instrument(skip(self))]
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        get_opt(&self.pods(namespace), name).await
    }

    #[instrument(skip(self, pod), fields(pod = %pod.name_any()))]
    async fn create_pod(&self, pod: &Pod) -> Result<Pod> {
        let (namespace, name) = object_key(pod)?;

        self.pods(&namespace)
            .create(&PostParams::default(), pod)
            .await
            .map_err(|e| write_error(e, format!("pod {}/{}", namespace, name)))
    }

    #[instrument(skip(self, pod), fields(pod = %pod.name_any()))]
    async fn replace_pod(&self, pod: &Pod) -> Result<Pod> {
        let (namespace, name) = object_key(pod)?;

        self.pods(&namespace)
            .replace(&name, &PostParams::default(), pod)
            .await
            .map_err(|e| write_error(e, format!("pod {}/{}", namespace, name)))
    }
}
