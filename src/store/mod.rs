// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Access to the cluster object store used by the reconcilers.

pub mod client;

pub use client::KubeStore;

use crate::error::Result;
use crate::types::module::Module;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;

/// Read and write operations the reconcilers need from the object store.
///
/// Lookups return `Ok(None)` for objects that do not exist. Replacements carry
/// the resource version of the object they were derived from and fail with
/// [`OperatorError::Conflict`](crate::error::OperatorError::Conflict) when the
/// stored object has moved on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_module(&self, namespace: &str, name: &str) -> Result<Option<Module>>;

    async fn list_modules(&self, namespace: &str) -> Result<Vec<Module>>;

    /// Persist the status of a module
    async fn replace_module_status(&self, module: &Module) -> Result<Module>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>>;

    async fn create_pod(&self, pod: &Pod) -> Result<Pod>;

    async fn replace_pod(&self, pod: &Pod) -> Result<Pod>;
}
