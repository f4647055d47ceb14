// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod fanout;
pub mod module;
pub mod pod;

pub use module::{reconcile_module, ModuleOutcome, ModuleReconciler};
pub use pod::{reconcile_pod, PodOutcome, PodReconciler};

use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};

/// Api for a namespaced kind, limited to one namespace when configured
pub(crate) fn watched_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}
