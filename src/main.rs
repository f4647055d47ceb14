// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use a4c_operator::config::Config;
use a4c_operator::kubernetes::wait_for_module_crd;
use a4c_operator::reconcilers::{ModuleReconciler, PodReconciler};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting a4c operator");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: watch_namespace={}, error_requeue={:?}, conflict_retry_steps={}",
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.error_requeue,
        config.conflict_retry_steps
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for Module CRD to become available...");
    wait_for_module_crd(&client).await?;

    let module_reconciler = ModuleReconciler::new(client.clone(), config.clone());
    let pod_reconciler = PodReconciler::new(client, config);

    info!("Starting reconcilers...");

    tokio::try_join!(module_reconciler.run(), pod_reconciler.run())?;

    // This should never be reached as reconcilers run forever
    warn!("All reconcilers stopped unexpectedly");
    Ok(())
}
