// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pod reconciler - stamps every Pod with the name of its namespace's Module.

use crate::config::Config;
use crate::constants::annotations;
use crate::error::{OperatorError, Result};
use crate::reconcilers::fanout::pods_for_module;
use crate::reconcilers::watched_api;
use crate::retry::{retry_on_conflict, RetryPolicy};
use crate::store::{KubeStore, ObjectStore};
use crate::types::module::Module;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    runtime::{controller::Action, Controller},
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What a single Pod reconciliation did
#[derive(Debug, Clone, PartialEq)]
pub enum PodOutcome {
    PodGone,
    /// No module lives in the pod's namespace
    NoModule,
    AlreadyAnnotated,
    Annotated,
}

pub struct PodReconciler {
    client: Client,
    store: KubeStore,
    config: Config,
    retry: RetryPolicy,
}

impl PodReconciler {
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
        let pods: Api<Pod> = watched_api(self.client.clone(), namespace.as_deref());
        let modules: Api<Module> = watched_api(self.client.clone(), namespace.as_deref());

        let controller = Controller::new(pods, WatcherConfig::default());
        let pod_cache = controller.store();
        let context = Arc::new(self);

        controller
            .watches(modules, WatcherConfig::default(), move |module| {
                pods_for_module(&module, &pod_cache.state())
            })
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled pod: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(pod: Arc<Pod>, ctx: Arc<PodReconciler>) -> Result<Action> {
    let namespace = pod
        .namespace()
        .ok_or(OperatorError::MissingObjectKey("metadata.namespace"))?;

    reconcile_pod(&ctx.store, &ctx.retry, &namespace, &pod.name_any()).await?;

    Ok(Action::await_change())
}

fn error_policy(_pod: Arc<Pod>, error: &OperatorError, ctx: Arc<PodReconciler>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(ctx.config.error_requeue)
}

/// Make the `a4c/module` annotation of pod `namespace/name` match the module
/// living in the same namespace.
#[instrument(skip(store, retry))]
pub async fn reconcile_pod<S: ObjectStore>(
    store: &S,
    retry: &RetryPolicy,
    namespace: &str,
    name: &str,
) -> Result<PodOutcome> {
    let Some(pod) = store.get_pod(namespace, name).await? else {
        debug!("Pod {}/{} deleted, nothing to do", namespace, name);
        return Ok(PodOutcome::PodGone);
    };

    let Some(module) = namespace_module(store, namespace).await? else {
        debug!("No module in namespace {}", namespace);
        return Ok(PodOutcome::NoModule);
    };

    annotate(store, retry, &pod, &module.spec.module).await
}

/// Pick the module owning a namespace.
///
/// With several candidates the oldest one wins, ties broken by name, so every
/// pod in the namespace agrees regardless of list order.
async fn namespace_module<S: ObjectStore>(store: &S, namespace: &str) -> Result<Option<Module>> {
    let mut modules = store.list_modules(namespace).await?;

    if modules.len() > 1 {
        warn!(
            "Found {} modules in namespace {}, using the oldest one",
            modules.len(),
            namespace
        );
    }

    modules.sort_by_key(|m| (m.creation_timestamp().map(|t| t.0), m.name_any()));
    Ok(modules.into_iter().next())
}

/// Compare-and-set the module annotation, re-reading the pod after a conflict
async fn annotate<S: ObjectStore>(
    store: &S,
    retry: &RetryPolicy,
    pod: &Pod,
    module: &str,
) -> Result<PodOutcome> {
    let namespace = pod.namespace().unwrap_or_default();
    let name = pod.name_any();
    let (namespace, name) = (namespace.as_str(), name.as_str());

    retry_on_conflict(retry, |attempt| async move {
        let mut current = if attempt == 0 {
            pod.clone()
        } else {
            match store.get_pod(namespace, name).await? {
                Some(p) => p,
                None => return Ok(PodOutcome::PodGone),
            }
        };

        let values = current.annotations_mut();
        match values.get(annotations::MODULE) {
            Some(v) if v == module => return Ok(PodOutcome::AlreadyAnnotated),
            Some(v) => info!(
                "Updating annotation {} on pod {}/{} from {} to {}",
                annotations::MODULE,
                namespace,
                name,
                v,
                module
            ),
            None => info!(
                "Creating annotation {}={} on pod {}/{}",
                annotations::MODULE,
                module,
                namespace,
                name
            ),
        }
        values.insert(annotations::MODULE.to_string(), module.to_string());

        store.replace_pod(&current).await?;
        Ok::<_, OperatorError>(PodOutcome::Annotated)
    })
    .await
}
