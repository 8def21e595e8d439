// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Named Kubernetes client registry

use crate::config::{ClientSettings, Settings};
use crate::constants::DEFAULT_CLIENT_NAME;
use crate::error::{Result, WatchkeeperError};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Resolves a client name to a configured client
pub trait ClientRegistry: Send + Sync {
    fn client(&self, name: &str) -> Option<Client>;

    fn contains(&self, name: &str) -> bool {
        self.client(name).is_some()
    }
}

/// Clients keyed by name
#[derive(Clone, Default)]
pub struct KubeClients {
    clients: HashMap<String, Client>,
}

impl KubeClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, name: &str, client: Client) -> Self {
        self.insert(name, client);
        self
    }

    pub fn insert(&mut self, name: &str, client: Client) {
        self.clients.insert(name.to_string(), client);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build every client declared in the settings. A `default` client is
    /// inferred from the environment when the settings do not declare one.
    #[instrument(skip(settings))]
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let mut clients = Self::new();

        for (name, client_settings) in &settings.clients {
            info!("Creating Kubernetes client '{}'", name);
            let client = create_client(name, client_settings).await?;
            clients.insert(name, client);
        }

        if !clients.contains(DEFAULT_CLIENT_NAME) {
            info!("No default client configured, inferring one from the environment");
            clients.insert(DEFAULT_CLIENT_NAME, Client::try_default().await?);
        }

        Ok(clients)
    }
}

impl ClientRegistry for KubeClients {
    fn client(&self, name: &str) -> Option<Client> {
        self.clients.get(name).cloned()
    }
}

/// Create a client from an explicit kubeconfig file or the default lookup
async fn create_client(name: &str, settings: &ClientSettings) -> Result<Client> {
    let options = KubeConfigOptions {
        context: settings.context.clone(),
        ..Default::default()
    };

    let config = match &settings.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                WatchkeeperError::KubeconfigError(format!(
                    "Failed to read kubeconfig {} for client {}: {}",
                    path.display(),
                    name,
                    e
                ))
            })?;
            KConfig::from_custom_kubeconfig(kubeconfig, &options).await
        }
        None => KConfig::from_kubeconfig(&options).await,
    }
    .map_err(|e| {
        WatchkeeperError::KubeconfigError(format!(
            "Failed to create config for client {}: {}",
            name, e
        ))
    })?;

    Client::try_from(config).map_err(|e| {
        WatchkeeperError::KubeconfigError(format!("Failed to create client {}: {}", name, e))
    })
}
