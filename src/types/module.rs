// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::SIDECAR_POD_NAME;
use crate::error::{OperatorError, Result};
use k8s_openapi::api::core::v1::{ObjectReference, Pod, PodSpec};
use kube::api::ObjectMeta;
use kube::{CustomResource, Resource, ResourceExt};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const CU_MAX_LEN: usize = 15;
const MODULE_MAX_LEN: usize = 20;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "sample.alien4cloud", version = "v1", kind = "Module")]
#[kube(namespaced)]
#[kube(status = "ModuleStatus")]
#[kube(shortname = "mod")]
#[kube(printcolumn = r#"{"name":"CU", "type":"string", "jsonPath":".spec.cu"}"#)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSpec {
    #[serde(default = "default_cu")]
    #[schemars(length(max = 15))]
    pub cu: String,

    #[schemars(length(min = 1, max = 20))]
    pub module: String,

    /// Template for the sidecar Pod
    pub sidecar: PodSpec,

    #[serde(default)]
    #[schemars(schema_with = "keyed_list_schema")]
    pub lst: Vec<SubModuleSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubModuleSpec {
    pub val1: String,
    pub val2: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStatus {
    /// Reference to the sidecar Pod owned by this module
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<ObjectReference>,
}

fn default_cu() -> String {
    "test".to_string()
}

/// `lst` is a list-map keyed by `val1`, so the API server merges entries by key
fn keyed_list_schema(gen: &mut SchemaGenerator) -> Schema {
    let mut schema = gen.subschema_for::<Vec<SubModuleSpec>>().into_object();
    schema
        .extensions
        .insert("x-kubernetes-list-type".into(), serde_json::json!("map"));
    schema
        .extensions
        .insert("x-kubernetes-list-map-keys".into(), serde_json::json!(["val1"]));
    Schema::Object(schema)
}

impl ModuleSpec {
    /// Check the bounds the CRD schema enforces at admission time
    pub fn validate(&self) -> Result<()> {
        if self.cu.chars().count() > CU_MAX_LEN {
            return Err(OperatorError::InvalidSpec(format!(
                "cu must be at most {} characters",
                CU_MAX_LEN
            )));
        }

        let module_len = self.module.chars().count();
        if module_len == 0 || module_len > MODULE_MAX_LEN {
            return Err(OperatorError::InvalidSpec(format!(
                "module must be between 1 and {} characters",
                MODULE_MAX_LEN
            )));
        }

        let mut keys = HashSet::new();
        if let Some(dup) = self.lst.iter().find(|e| !keys.insert(e.val1.as_str())) {
            return Err(OperatorError::InvalidSpec(format!(
                "duplicate lst key '{}'",
                dup.val1
            )));
        }

        Ok(())
    }
}

impl Module {
    /// The sidecar reference recorded in status, if any
    pub fn sidecar_ref(&self) -> Option<&ObjectReference> {
        self.status.as_ref().and_then(|s| s.sidecar.as_ref())
    }

    /// Build the sidecar Pod for this module, controlled by the module
    pub fn build_sidecar_pod(&self) -> Result<Pod> {
        let owner = self
            .controller_owner_ref(&())
            .ok_or(OperatorError::MissingObjectKey("metadata.uid"))?;
        let namespace = self
            .namespace()
            .ok_or(OperatorError::MissingObjectKey("metadata.namespace"))?;

        Ok(Pod {
            metadata: ObjectMeta {
                name: Some(SIDECAR_POD_NAME.to_string()),
                namespace: Some(namespace),
                owner_references: Some(vec![owner]),
                ..Default::default()
            },
            spec: Some(self.spec.sidecar.clone()),
            ..Default::default()
        })
    }

    /// Check whether this module is the controlling owner of the Pod
    pub fn controls(&self, pod: &Pod) -> bool {
        let Some(uid) = self.uid() else {
            return false;
        };
        pod.owner_references()
            .iter()
            .any(|o| o.controller == Some(true) && o.uid == uid)
    }

    /// Compare the Pod's first container with the template's first container
    pub fn sidecar_matches(&self, pod: &Pod) -> bool {
        let live = pod.spec.as_ref().and_then(|s| s.containers.first());
        live == self.spec.sidecar.containers.first()
    }
}
