// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use watchkeeper::kubernetes::KubeClients;
use watchkeeper::{Owner, Settings, StaticRegistry, WatchManager};

fn pod_phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("Unknown")
}

/// Logs the life of pods labelled `watchkeeper.io/watched=true`
fn pod_watcher() -> Owner {
    Owner::new("PodWatcher")
        .res_labels(["watchkeeper.io/watched=true"])
        .on_add::<Pod, _, _>("onAdd", |pod| async move {
            info!("Pod {}/{} added", pod.namespace().unwrap_or_default(), pod.name_any());
            anyhow::Ok(())
        })
        .on_update::<Pod, _, _>("onUpdate", |old, new| async move {
            if old.resource_version() != new.resource_version() && pod_phase(&new) == "Running" {
                info!("Pod {}/{} is running", new.namespace().unwrap_or_default(), new.name_any());
            }
            anyhow::Ok(())
        })
        .on_delete::<Pod, _, _>("onDelete", |pod| async move {
            if pod_phase(&pod) == "Succeeded" {
                info!("Pod {}/{} completed", pod.namespace().unwrap_or_default(), pod.name_any());
            }
            anyhow::Ok(())
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting watchkeeper");

    let settings = Settings::from_env()?;
    info!(
        "Settings loaded: {} named configs, {} clients, drain on shutdown={}",
        settings.config.names().count(),
        settings.clients.len(),
        settings.shutdown.drain
    );

    let clients = KubeClients::from_settings(&settings)
        .await
        .context("Failed to create Kubernetes clients")?;
    info!("Created clients {:?}", clients.names());

    let registry = StaticRegistry::new().register(pod_watcher());
    let mut manager = WatchManager::new(Arc::new(registry), Arc::new(clients), settings);

    manager
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {}", e);
            }
        })
        .await?;

    info!("Shut down cleanly");
    Ok(())
}
