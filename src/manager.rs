// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Drives the whole pipeline from validation to shutdown.

use crate::config::Settings;
use crate::dispatch::{DispatchFailure, Dispatcher};
use crate::error::{Result, WatchkeeperError};
use crate::kubernetes::{ClientRegistry, KubeNamespaces, KubeWatchProvider, NamespaceProvider, WatchProvider};
use crate::registry::HandlerRegistry;
use crate::resolver::resolve;
use crate::topology::{TopologyBuilder, WatchSubscription};
use crate::validate::Validator;
use futures::future::try_join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Stopped,
    Validating,
    Building,
    Starting,
    Syncing,
    Running,
    Stopping,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Stopped => "STOPPED",
            Phase::Validating => "VALIDATING",
            Phase::Building => "BUILDING",
            Phase::Starting => "STARTING",
            Phase::Syncing => "SYNCING",
            Phase::Running => "RUNNING",
            Phase::Stopping => "STOPPING",
        };
        f.write_str(name)
    }
}

/// Owns every subscription and dispatch queue of the process
pub struct WatchManager {
    registry: Arc<dyn HandlerRegistry>,
    clients: Arc<dyn ClientRegistry>,
    settings: Settings,
    namespaces: Arc<dyn NamespaceProvider>,
    watches: Arc<dyn WatchProvider>,
    dispatcher: Dispatcher,
    subscriptions: Vec<WatchSubscription>,
    phase: Phase,
}

impl WatchManager {
    pub fn new(
        registry: Arc<dyn HandlerRegistry>,
        clients: Arc<dyn ClientRegistry>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            clients,
            settings,
            namespaces: Arc::new(KubeNamespaces),
            watches: Arc::new(KubeWatchProvider),
            dispatcher: Dispatcher::new(),
            subscriptions: Vec::new(),
            phase: Phase::Stopped,
        }
    }

    pub fn with_namespace_provider(mut self, provider: Arc<dyn NamespaceProvider>) -> Self {
        self.namespaces = provider;
        self
    }

    pub fn with_watch_provider(mut self, provider: Arc<dyn WatchProvider>) -> Self {
        self.watches = provider;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Running, and every subscription is still active
    pub fn is_alive(&self) -> bool {
        self.phase == Phase::Running && self.subscriptions.iter().all(|s| s.is_running())
    }

    /// Handler invocations that failed from now on
    pub fn failures(&self) -> broadcast::Receiver<DispatchFailure> {
        self.dispatcher.failures()
    }

    fn enter(&mut self, phase: Phase) {
        debug!("{} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Validate, build, start and wait for the initial sync of every
    /// subscription. Any failure tears down what was built and leaves the
    /// manager stopped.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.phase != Phase::Stopped {
            return Err(WatchkeeperError::InvalidState {
                expected: Phase::Stopped.to_string(),
                actual: self.phase.to_string(),
            });
        }

        match self.bring_up().await {
            Ok(()) => {
                self.enter(Phase::Running);
                info!("Running with {} subscriptions", self.subscriptions.len());
                Ok(())
            }
            Err(e) => {
                error!("Startup failed in {}: {}", self.phase, e);
                self.tear_down(false).await;
                Err(e)
            }
        }
    }

    async fn bring_up(&mut self) -> Result<()> {
        self.enter(Phase::Validating);
        let owners = self.registry.owners();
        Validator::new(self.clients.as_ref(), &self.settings.config).validate(&owners)?;
        info!("Validated {} owners", owners.len());

        self.enter(Phase::Building);
        let builder = TopologyBuilder::new(self.namespaces.as_ref(), self.watches.as_ref());
        for owner in &owners {
            let config = resolve(&owner.declaration, &self.settings.config);
            let client = self.clients.client(&config.client_name).ok_or_else(|| {
                WatchkeeperError::UnknownClient {
                    owner: owner.name().to_string(),
                    client: config.client_name.clone(),
                }
            })?;
            let built = builder
                .build(owner, &config, &client, &mut self.dispatcher)
                .await?;
            self.subscriptions.extend(built);
        }

        self.enter(Phase::Starting);
        for subscription in &mut self.subscriptions {
            subscription.start()?;
        }

        self.enter(Phase::Syncing);
        info!("Waiting for {} subscriptions to sync", self.subscriptions.len());
        let synced = try_join_all(self.subscriptions.iter().map(|s| s.synced()));
        match self.settings.sync_timeout() {
            Some(limit) => tokio::time::timeout(limit, synced)
                .await
                .map_err(|_| WatchkeeperError::SyncTimeout(limit))??,
            None => synced.await?,
        };
        Ok(())
    }

    /// Close every subscription, then let the dispatch queues finish what
    /// was already queued. Waits for that only when draining is configured.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        match self.phase {
            Phase::Stopped => return Ok(()),
            Phase::Running => {}
            other => {
                return Err(WatchkeeperError::InvalidState {
                    expected: Phase::Running.to_string(),
                    actual: other.to_string(),
                })
            }
        }

        info!("Stopping {} subscriptions", self.subscriptions.len());
        self.tear_down(self.settings.shutdown.drain).await;
        info!("Stopped");
        Ok(())
    }

    async fn tear_down(&mut self, drain: bool) {
        self.enter(Phase::Stopping);
        for mut subscription in self.subscriptions.drain(..) {
            subscription.stop();
        }
        let timeout = self.settings.shutdown.drain_timeout();
        self.dispatcher.shutdown(drain, timeout).await;
        self.enter(Phase::Stopped);
    }

    /// Start, run until `signal` completes, then stop
    pub async fn run_until<F>(&mut self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        signal.await;
        info!("Shutdown requested");
        self.stop().await
    }
}
