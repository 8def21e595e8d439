// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Expands an owner's effective configuration into watch subscriptions.

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::kubernetes::{EventCallback, NamespaceProvider, Subscription, WatchProvider, WatchRequest};
use crate::router::EventRouter;
use crate::types::{EffectiveConfig, HandlerDeclaration, Owner, ResourceKind};
use kube::Client;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Pick the namespaces to watch. Explicit names win over a label query,
/// which wins over watching every namespace.
pub async fn select_namespaces(
    config: &EffectiveConfig,
    client: &Client,
    provider: &dyn NamespaceProvider,
) -> Result<BTreeSet<String>> {
    if !config.ns_names.is_empty() {
        return Ok(config.ns_names.clone());
    }
    if !config.ns_labels.is_empty() {
        return provider.namespaces(client, Some(&config.ns_labels)).await;
    }
    provider.namespaces(client, None).await
}

/// Distinct resource kinds the handlers react to, in a stable order
pub fn resource_kinds(handlers: &[HandlerDeclaration]) -> BTreeSet<ResourceKind> {
    handlers.iter().map(|h| h.resource.clone()).collect()
}

/// One request per (namespace, resource kind) pair
pub fn plan(
    owner: &str,
    config: &EffectiveConfig,
    namespaces: &BTreeSet<String>,
    handlers: &[HandlerDeclaration],
) -> Vec<WatchRequest> {
    let kinds = resource_kinds(handlers);
    namespaces
        .iter()
        .flat_map(|namespace| {
            kinds.iter().map(move |resource| WatchRequest {
                owner: owner.to_string(),
                resource: resource.clone(),
                namespace: namespace.clone(),
                labels: config.res_labels.clone(),
                resync_period: config.resync_period(),
            })
        })
        .collect()
}

/// An opened subscription together with what it watches
pub struct WatchSubscription {
    pub request: WatchRequest,
    handle: Box<dyn Subscription>,
}

impl WatchSubscription {
    pub fn new(request: WatchRequest, handle: Box<dyn Subscription>) -> Self {
        Self { request, handle }
    }

    pub fn start(&mut self) -> Result<()> {
        self.handle.start()
    }

    pub fn stop(&mut self) {
        self.handle.stop()
    }

    pub fn has_synced(&self) -> bool {
        self.handle.has_synced()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub async fn synced(&self) -> Result<()> {
        self.handle.synced().await
    }
}

pub struct TopologyBuilder<'a> {
    namespaces: &'a dyn NamespaceProvider,
    watches: &'a dyn WatchProvider,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(namespaces: &'a dyn NamespaceProvider, watches: &'a dyn WatchProvider) -> Self {
        Self { namespaces, watches }
    }

    /// Open (but do not start) every subscription of `owner`, each routing
    /// into the owner's dispatch queue. Owners without handlers get none.
    #[instrument(skip(self, owner, config, client, dispatcher), fields(owner = %owner.name()))]
    pub async fn build(
        &self,
        owner: &Owner,
        config: &EffectiveConfig,
        client: &Client,
        dispatcher: &mut Dispatcher,
    ) -> Result<Vec<WatchSubscription>> {
        if owner.handlers.is_empty() {
            debug!("No handlers, skipping");
            return Ok(Vec::new());
        }

        let namespaces = select_namespaces(config, client, self.namespaces).await?;
        if namespaces.is_empty() {
            warn!("No namespaces selected, nothing will be watched");
            return Ok(Vec::new());
        }
        info!("Watching namespaces {:?}", namespaces);

        let handlers: Vec<Arc<HandlerDeclaration>> =
            owner.handlers.iter().cloned().map(Arc::new).collect();
        let queue = dispatcher.queue(owner.name());

        let mut subscriptions = Vec::new();
        for request in plan(owner.name(), config, &namespaces, &owner.handlers) {
            let router: Arc<dyn EventCallback> =
                Arc::new(EventRouter::new(&request.resource, &handlers, queue.clone()));
            let handle = self.watches.open(client, &request, router).await?;
            debug!("Opened watch on {} in {}", request.resource, request.namespace);
            subscriptions.push(WatchSubscription::new(request, handle));
        }

        Ok(subscriptions)
    }
}
