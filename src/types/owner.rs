// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{DEFAULT_CLIENT_NAME, DEFAULT_CONFIG_NAME};
use crate::types::handler::{
    add_handler, delete_handler, delete_with_state_handler, update_handler, HandlerDeclaration,
};
use kube::Resource;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

/// Inline defaults of an owner, before any configuration override is applied.
///
/// Labels are kept as raw `key=value` entries so malformed ones can be
/// reported by the validator instead of being dropped silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerDeclaration {
    pub owner: String,
    pub config_name: String,
    pub client_name: String,
    pub ns_names: Vec<String>,
    pub ns_labels: Vec<String>,
    pub res_labels: Vec<String>,
    pub resync_period_ms: Option<u64>,
}

impl OwnerDeclaration {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            config_name: DEFAULT_CONFIG_NAME.to_string(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            ns_names: Vec::new(),
            ns_labels: Vec::new(),
            res_labels: Vec::new(),
            resync_period_ms: None,
        }
    }
}

/// Fully merged configuration of one owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub client_name: String,
    pub ns_names: BTreeSet<String>,
    pub ns_labels: BTreeMap<String, String>,
    pub res_labels: BTreeMap<String, String>,
    pub resync_period_ms: u64,
}

impl EffectiveConfig {
    pub fn resync_period(&self) -> Duration {
        Duration::from_millis(self.resync_period_ms)
    }
}

/// An owner declaration together with its handlers.
///
/// Handlers of one owner never run concurrently and run in the order their
/// notifications arrived.
#[derive(Debug, Clone)]
pub struct Owner {
    pub declaration: OwnerDeclaration,
    pub handlers: Vec<HandlerDeclaration>,
}

fn strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl Owner {
    pub fn new(name: &str) -> Self {
        Self {
            declaration: OwnerDeclaration::new(name),
            handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.owner
    }

    pub fn config_name(mut self, name: &str) -> Self {
        self.declaration.config_name = name.to_string();
        self
    }

    pub fn client_name(mut self, name: &str) -> Self {
        self.declaration.client_name = name.to_string();
        self
    }

    pub fn ns_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declaration.ns_names = strings(names);
        self
    }

    /// Namespace label entries in `key=value` form
    pub fn ns_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declaration.ns_labels = strings(labels);
        self
    }

    /// Resource label entries in `key=value` form
    pub fn res_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declaration.res_labels = strings(labels);
        self
    }

    pub fn resync_period_ms(mut self, period_ms: u64) -> Self {
        self.declaration.resync_period_ms = Some(period_ms);
        self
    }

    /// Register a pre-built declaration, e.g. one produced by generated code
    pub fn handler(mut self, handler: HandlerDeclaration) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn on_add<K, F, Fut>(self, method: &str, f: F) -> Self
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Send + 'static,
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler = add_handler::<K, F, Fut>(self.name(), method, f);
        self.handler(handler)
    }

    pub fn on_update<K, F, Fut>(self, method: &str, f: F) -> Self
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Send + 'static,
        F: Fn(K, K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler = update_handler::<K, F, Fut>(self.name(), method, f);
        self.handler(handler)
    }

    pub fn on_delete<K, F, Fut>(self, method: &str, f: F) -> Self
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Send + 'static,
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler = delete_handler::<K, F, Fut>(self.name(), method, f);
        self.handler(handler)
    }

    /// DELETE handler that also receives the tombstone flag
    pub fn on_delete_with_state<K, F, Fut>(self, method: &str, f: F) -> Self
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Send + 'static,
        F: Fn(K, bool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler = delete_with_state_handler::<K, F, Fut>(self.name(), method, f);
        self.handler(handler)
    }
}
