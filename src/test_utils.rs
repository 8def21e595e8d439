// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test doubles: a mock Kubernetes API and in-memory watch / namespace providers.

use crate::error::{Result, WatchkeeperError};
use crate::kubernetes::{EventCallback, NamespaceProvider, Subscription, WatchProvider, WatchRequest};
use crate::types::ResourceKind;
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::core::v1::Pod;
use kube::client::Body;
use kube::core::DynamicObject;
use kube::Client;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::watch;
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths
/// and records every request it sees.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(("GET".to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// `METHOD path?query` of every request received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        self.requests
            .lock()
            .unwrap()
            .push(format!("{} {}", method, req.uri()));

        let response = self.find_response(&method, &path);

        Box::pin(async move {
            let (status, body) = response.unwrap_or_else(|| {
                (
                    404,
                    r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#
                        .to_string(),
                )
            });
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a mock namespace list JSON response
pub fn namespace_list_json(names: &[&str]) -> String {
    let items: Vec<serde_json::Value> = names
        .iter()
        .map(|name| {
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "Namespace",
                "metadata": { "name": name, "uid": format!("uid-{}", name) }
            })
        })
        .collect();

    serde_json::json!({
        "apiVersion": "v1",
        "kind": "NamespaceList",
        "metadata": { "resourceVersion": "1" },
        "items": items
    })
    .to_string()
}

/// Create a mock pod list JSON response
pub fn pod_list_json(namespace: &str, names: &[&str]) -> String {
    let items: Vec<serde_json::Value> = names
        .iter()
        .map(|name| {
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": { "name": name, "namespace": namespace, "resourceVersion": "1" }
            })
        })
        .collect();

    serde_json::json!({
        "apiVersion": "v1",
        "kind": "PodList",
        "metadata": { "resourceVersion": "1" },
        "items": items
    })
    .to_string()
}

/// A `403 Forbidden` status body
pub fn forbidden_json() -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": "pods is forbidden",
        "reason": "Forbidden",
        "code": 403
    })
    .to_string()
}

/// A pod as the watch client would deliver it
pub fn make_pod(namespace: &str, name: &str) -> Arc<DynamicObject> {
    let mut obj = DynamicObject::new(name, &ResourceKind::of::<Pod>().api_resource()).within(namespace);
    obj.data = serde_json::json!({ "spec": { "containers": [] } });
    Arc::new(obj)
}

/// A client that must never be used to talk to a cluster
pub fn offline_client() -> Client {
    MockService::new().into_client()
}

/// Namespace provider returning fixed names and recording each query
#[derive(Default)]
pub struct FakeNamespaces {
    names: BTreeSet<String>,
    calls: Mutex<Vec<Option<BTreeMap<String, String>>>>,
    fail: bool,
}

impl FakeNamespaces {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Option<BTreeMap<String, String>>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NamespaceProvider for FakeNamespaces {
    async fn namespaces(
        &self,
        _client: &Client,
        labels: Option<&BTreeMap<String, String>>,
    ) -> Result<BTreeSet<String>> {
        self.calls.lock().unwrap().push(labels.cloned());
        if self.fail {
            return Err(WatchkeeperError::NamespaceQuery("namespace list refused".to_string()));
        }
        Ok(self.names.clone())
    }
}

/// Shared view of a subscription opened through [`FakeWatchProvider`]
#[derive(Clone)]
pub struct FakeHandle {
    pub request: WatchRequest,
    pub callback: Arc<dyn EventCallback>,
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    synced: Arc<watch::Sender<bool>>,
}

impl FakeHandle {
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn mark_synced(&self) {
        self.synced.send_replace(true);
    }
}

struct FakeSubscription {
    handle: FakeHandle,
    auto_sync: bool,
}

#[async_trait]
impl Subscription for FakeSubscription {
    fn start(&mut self) -> Result<()> {
        self.handle.started.store(true, Ordering::SeqCst);
        if self.auto_sync {
            self.handle.mark_synced();
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.handle.stopped.store(true, Ordering::SeqCst);
    }

    fn has_synced(&self) -> bool {
        *self.handle.synced.borrow()
    }

    fn is_running(&self) -> bool {
        self.handle.is_started() && !self.handle.is_stopped()
    }

    async fn synced(&self) -> Result<()> {
        let mut rx = self.handle.synced.subscribe();
        rx.wait_for(|synced| *synced)
            .await
            .map(|_| ())
            .map_err(|_| WatchkeeperError::Subscription("fake subscription dropped".to_string()))
    }
}

/// Watch provider recording every subscription it opens
pub struct FakeWatchProvider {
    opened: Mutex<Vec<FakeHandle>>,
    auto_sync: bool,
    fail_open: bool,
}

impl FakeWatchProvider {
    pub fn new() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            auto_sync: true,
            fail_open: false,
        }
    }

    /// Subscriptions only sync when the test calls [`FakeHandle::mark_synced`]
    pub fn manual_sync() -> Self {
        Self {
            auto_sync: false,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new()
        }
    }

    pub fn opened(&self) -> Vec<FakeHandle> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl WatchProvider for FakeWatchProvider {
    async fn open(
        &self,
        _client: &Client,
        request: &WatchRequest,
        callback: Arc<dyn EventCallback>,
    ) -> Result<Box<dyn Subscription>> {
        if self.fail_open {
            return Err(WatchkeeperError::Subscription(format!(
                "refused to watch {} in {}",
                request.resource, request.namespace
            )));
        }
        let handle = FakeHandle {
            request: request.clone(),
            callback,
            started: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            synced: Arc::new(watch::channel(false).0),
        };
        self.opened.lock().unwrap().push(handle.clone());
        Ok(Box::new(FakeSubscription {
            handle,
            auto_sync: self.auto_sync,
        }))
    }
}
