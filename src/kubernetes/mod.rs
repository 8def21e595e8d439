// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes-facing collaborators: named clients, namespace queries and watch subscriptions.

pub mod clients;
pub mod namespaces;
pub mod watch;

pub use clients::{ClientRegistry, KubeClients};
pub use namespaces::{KubeNamespaces, NamespaceProvider};
pub use watch::{EventCallback, KubeWatchProvider, Subscription, WatchProvider, WatchRequest};

use std::collections::BTreeMap;

/// Render an equality label selector (`a=b,c=d`), `None` when there are no labels
pub fn label_selector(labels: &BTreeMap<String, String>) -> Option<String> {
    if labels.is_empty() {
        return None;
    }
    let parts: Vec<String> = labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    Some(parts.join(","))
}
