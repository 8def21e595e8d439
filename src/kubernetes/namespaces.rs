// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace queries

use crate::error::{Result, WatchkeeperError};
use crate::kubernetes::label_selector;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{api::ListParams, Api, Client, ResourceExt};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// Lists namespace names, optionally narrowed by an equality label filter
#[async_trait]
pub trait NamespaceProvider: Send + Sync {
    async fn namespaces(
        &self,
        client: &Client,
        labels: Option<&BTreeMap<String, String>>,
    ) -> Result<BTreeSet<String>>;
}

/// Lists namespaces through the Kubernetes API
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeNamespaces;

#[async_trait]
impl NamespaceProvider for KubeNamespaces {
    #[instrument(skip(self, client))]
    async fn namespaces(
        &self,
        client: &Client,
        labels: Option<&BTreeMap<String, String>>,
    ) -> Result<BTreeSet<String>> {
        let namespaces: Api<Namespace> = Api::all(client.clone());

        let mut params = ListParams::default();
        if let Some(selector) = labels.and_then(label_selector) {
            debug!("Listing namespaces with selector {}", selector);
            params = params.labels(&selector);
        }

        let list = namespaces.list(&params).await.map_err(|e| {
            WatchkeeperError::NamespaceQuery(format!(
                "Failed to list namespaces with labels {:?}: {}",
                labels, e
            ))
        })?;

        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }
}
