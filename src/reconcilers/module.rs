// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Module reconciler - keeps one sidecar Pod per Module and records it in status.

use crate::config::Config;
use crate::constants::SIDECAR_POD_NAME;
use crate::error::{OperatorError, Result};
use crate::reconcilers::watched_api;
use crate::retry::{retry_on_conflict, RetryPolicy};
use crate::store::{KubeStore, ObjectStore};
use crate::types::module::{Module, ModuleStatus};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ObjectReference, Pod};
use kube::{
    runtime::{controller::Action, Controller},
    Api, Client, Resource, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What a single Module reconciliation did
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleOutcome {
    /// The module no longer exists
    Deleted,
    /// No sidecar was recorded; one was created (or adopted) and recorded
    SidecarCreated(ObjectReference),
    /// The recorded sidecar was missing and has been replaced
    SidecarRecreated(ObjectReference),
    InSync,
    /// The live sidecar differs from the template; only logged
    DriftDetected,
}

pub struct ModuleReconciler {
    client: Client,
    store: KubeStore,
    config: Config,
    retry: RetryPolicy,
}

impl ModuleReconciler {
    pub fn new(client: Client, config: Config) -> Self {
        let retry = RetryPolicy::with_steps(config.conflict_retry_steps);
        Self {
            store: KubeStore::new(client.clone()),
            client,
            config,
            retry,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let namespace = self.config.watch_namespace.clone();
        let modules: Api<Module> = watched_api(self.client.clone(), namespace.as_deref());
        let pods: Api<Pod> = watched_api(self.client.clone(), namespace.as_deref());
        let context = Arc::new(self);

        Controller::new(modules, WatcherConfig::default())
            .owns(pods, WatcherConfig::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled module: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(module: Arc<Module>, ctx: Arc<ModuleReconciler>) -> Result<Action> {
    let namespace = module
        .namespace()
        .ok_or(OperatorError::MissingObjectKey("metadata.namespace"))?;

    reconcile_module(&ctx.store, &ctx.retry, &namespace, &module.name_any()).await?;

    // Owned pod events and module edits both retrigger us
    Ok(Action::await_change())
}

fn error_policy(_module: Arc<Module>, error: &OperatorError, ctx: Arc<ModuleReconciler>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(ctx.config.error_requeue)
}

/// Drive the sidecar of module `namespace/name` toward its spec.
///
/// The module is re-read from the store, so a stale trigger is harmless. At
/// most one Pod is created and one status write persisted per call.
#[instrument(skip(store, retry))]
pub async fn reconcile_module<S: ObjectStore>(
    store: &S,
    retry: &RetryPolicy,
    namespace: &str,
    name: &str,
) -> Result<ModuleOutcome> {
    let Some(module) = store.get_module(namespace, name).await? else {
        info!("Module {}/{} deleted, its sidecar is garbage collected", namespace, name);
        return Ok(ModuleOutcome::Deleted);
    };

    let Some(sidecar) = module.sidecar_ref() else {
        info!("Creating sidecar pod for module {}/{}", namespace, name);
        let reference = launch_sidecar(store, &module).await?;
        record_sidecar(store, retry, &module, &reference).await?;
        return Ok(ModuleOutcome::SidecarCreated(reference));
    };

    let pod_namespace = sidecar.namespace.as_deref().unwrap_or(namespace);
    let live = match sidecar.name.as_deref() {
        Some(pod_name) => store.get_pod(pod_namespace, pod_name).await?,
        None => None,
    };

    match live {
        None => {
            info!("Sidecar pod of module {}/{} is missing, recreating", namespace, name);
            let reference = launch_sidecar(store, &module).await?;
            record_sidecar(store, retry, &module, &reference).await?;
            Ok(ModuleOutcome::SidecarRecreated(reference))
        }
        Some(pod) if !module.controls(&pod) => {
            warn!(
                "Pod {}/{} recorded as sidecar of module {}/{} is not controlled by it",
                pod_namespace,
                pod.name_any(),
                namespace,
                name
            );
            Err(OperatorError::SidecarNameTaken(format!(
                "{}/{}",
                pod_namespace,
                pod.name_any()
            )))
        }
        Some(pod) if pod.metadata.uid != sidecar.uid => {
            info!(
                "Sidecar pod {}/{} was replaced, recording the new one",
                pod_namespace,
                pod.name_any()
            );
            let reference = pod.object_ref(&());
            record_sidecar(store, retry, &module, &reference).await?;
            Ok(ModuleOutcome::SidecarRecreated(reference))
        }
        Some(pod) if module.sidecar_matches(&pod) => {
            debug!("Sidecar pod {}/{} matches spec", pod_namespace, pod.name_any());
            Ok(ModuleOutcome::InSync)
        }
        Some(pod) => {
            info!(
                "Sidecar pod {}/{} differs from module spec, leaving it unchanged",
                pod_namespace,
                pod.name_any()
            );
            Ok(ModuleOutcome::DriftDetected)
        }
    }
}

/// Create the sidecar Pod, adopting one this module already controls
async fn launch_sidecar<S: ObjectStore>(store: &S, module: &Module) -> Result<ObjectReference> {
    let pod = module.build_sidecar_pod()?;

    let created = match store.create_pod(&pod).await {
        Ok(created) => created,
        Err(OperatorError::AlreadyExists(what)) => {
            let namespace = pod.namespace().unwrap_or_default();
            let Some(existing) = store.get_pod(&namespace, SIDECAR_POD_NAME).await? else {
                return Err(OperatorError::AlreadyExists(what));
            };
            if !module.controls(&existing) {
                return Err(OperatorError::SidecarNameTaken(what));
            }
            info!("Adopting existing sidecar {}", what);
            existing
        }
        Err(e) => return Err(e),
    };

    Ok(created.object_ref(&()))
}

/// Write the sidecar reference into the module status, re-reading on conflict
async fn record_sidecar<S: ObjectStore>(
    store: &S,
    retry: &RetryPolicy,
    module: &Module,
    reference: &ObjectReference,
) -> Result<()> {
    let namespace = module.namespace().unwrap_or_default();
    let name = module.name_any();
    let (namespace, name) = (namespace.as_str(), name.as_str());

    retry_on_conflict(retry, |attempt| async move {
        let mut current = if attempt == 0 {
            module.clone()
        } else {
            match store.get_module(namespace, name).await? {
                Some(m) => m,
                None => {
                    debug!("Module {}/{} vanished before status update", namespace, name);
                    return Ok(());
                }
            }
        };

        current
            .status
            .get_or_insert_with(ModuleStatus::default)
            .sidecar = Some(reference.clone());
        store.replace_module_status(&current).await?;
        Ok::<(), OperatorError>(())
    })
    .await
}
