// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Mapping from Module events to the Pods whose annotation they affect.

use crate::types::module::Module;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;
use std::sync::Arc;

/// Every cached pod sharing the module's namespace needs its annotation re-checked
pub fn pods_for_module(module: &Module, pods: &[Arc<Pod>]) -> Vec<ObjectRef<Pod>> {
    let namespace = module.namespace();

    pods.iter()
        .filter(|pod| pod.namespace() == namespace)
        .map(|pod| ObjectRef::from_obj(pod.as_ref()))
        .collect()
}
