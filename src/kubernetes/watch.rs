// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch subscriptions: the provider seam and its `kube_runtime::watcher` implementation.

use crate::error::{Result, WatchkeeperError};
use crate::kubernetes::label_selector;
use crate::types::ResourceKind;
use async_trait::async_trait;
use futures::StreamExt;
use kube::core::DynamicObject;
use kube::{Api, Client, ResourceExt};
use kube_runtime::watcher::{self, Event};
use kube_runtime::WatchStreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Receives the notifications of one subscription. Implementations must
/// return quickly: they run on the delivery path.
pub trait EventCallback: Send + Sync {
    fn on_add(&self, obj: Arc<DynamicObject>);
    fn on_update(&self, old: Arc<DynamicObject>, new: Arc<DynamicObject>);
    fn on_delete(&self, obj: Arc<DynamicObject>, final_state_unknown: bool);
}

/// What to watch: one resource kind in one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
    pub owner: String,
    pub resource: ResourceKind,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub resync_period: Duration,
}

impl WatchRequest {
    pub fn label_selector(&self) -> Option<String> {
        label_selector(&self.labels)
    }
}

/// A single opened watch
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Begin delivering notifications
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
    /// Whether the initial list has been delivered
    fn has_synced(&self) -> bool;
    fn is_running(&self) -> bool;
    /// Resolves once the initial list has been delivered, fails if the
    /// initial list fails or the subscription ends before that
    async fn synced(&self) -> Result<()>;
}

#[async_trait]
pub trait WatchProvider: Send + Sync {
    async fn open(
        &self,
        client: &Client,
        request: &WatchRequest,
        callback: Arc<dyn EventCallback>,
    ) -> Result<Box<dyn Subscription>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SyncState {
    Pending,
    Synced,
    /// The initial list failed, the watch task has ended
    Failed(String),
    Stopped,
}

/// Opens subscriptions backed by `kube_runtime::watcher`
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeWatchProvider;

#[async_trait]
impl WatchProvider for KubeWatchProvider {
    #[instrument(skip(self, client, callback), fields(resource = %request.resource, namespace = %request.namespace))]
    async fn open(
        &self,
        client: &Client,
        request: &WatchRequest,
        callback: Arc<dyn EventCallback>,
    ) -> Result<Box<dyn Subscription>> {
        let api: Api<DynamicObject> = Api::namespaced_with(
            client.clone(),
            &request.namespace,
            &request.resource.api_resource(),
        );

        let mut config = watcher::Config::default();
        if let Some(selector) = request.label_selector() {
            debug!("Filtering on labels {}", selector);
            config = config.labels(&selector);
        }

        Ok(Box::new(KubeSubscription {
            api,
            config,
            request: request.clone(),
            callback,
            state: Arc::new(watch::channel(SyncState::Pending).0),
            task: None,
        }))
    }
}

struct KubeSubscription {
    api: Api<DynamicObject>,
    config: watcher::Config,
    request: WatchRequest,
    callback: Arc<dyn EventCallback>,
    state: Arc<watch::Sender<SyncState>>,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl Subscription for KubeSubscription {
    fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(WatchkeeperError::Subscription(format!(
                "watch on {} in {} already started",
                self.request.resource, self.request.namespace
            )));
        }

        info!(
            "Starting watch on {} in namespace {}",
            self.request.resource, self.request.namespace
        );
        self.task = Some(tokio::spawn(run_watch(
            self.api.clone(),
            self.config.clone(),
            self.request.resync_period,
            self.callback.clone(),
            self.state.clone(),
        )));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!(
                "Stopping watch on {} in namespace {}",
                self.request.resource, self.request.namespace
            );
            task.abort();
        }
        self.state.send_replace(SyncState::Stopped);
    }

    fn has_synced(&self) -> bool {
        matches!(*self.state.borrow(), SyncState::Synced)
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    async fn synced(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|state| *state != SyncState::Pending)
            .await
            .map(|state| state.clone())
            .unwrap_or(SyncState::Stopped);

        match state {
            SyncState::Synced => Ok(()),
            SyncState::Failed(reason) => Err(WatchkeeperError::Subscription(format!(
                "watch on {} in {} failed its initial list: {}",
                self.request.resource, self.request.namespace, reason
            ))),
            _ => Err(WatchkeeperError::Subscription(format!(
                "watch on {} in {} stopped before its initial sync",
                self.request.resource, self.request.namespace
            ))),
        }
    }
}

async fn run_watch(
    api: Api<DynamicObject>,
    config: watcher::Config,
    resync_period: Duration,
    callback: Arc<dyn EventCallback>,
    state: Arc<watch::Sender<SyncState>>,
) {
    let mut cache = ObjectCache::default();
    let stream = watcher::watcher(api, config).default_backoff();
    futures::pin_mut!(stream);

    // A zero period disables resync
    let mut resync_timer = (!resync_period.is_zero()).then(|| {
        let mut timer = interval_at(Instant::now() + resync_period, resync_period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    });

    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(Ok(event)) => {
                    if cache.apply(event, callback.as_ref()) {
                        state.send_replace(SyncState::Synced);
                    }
                }
                // Before the first sync nothing has been delivered yet, so
                // failing lets startup abort instead of waiting forever
                Some(Err(e)) if !cache.synced => {
                    warn!("Initial list failed: {}", e);
                    state.send_replace(SyncState::Failed(e.to_string()));
                    return;
                }
                Some(Err(e)) => warn!("Watch error, retrying with backoff: {}", e),
                None => break,
            },
            _ = tick(&mut resync_timer) => cache.resync(callback.as_ref()),
        }
    }

    warn!("Watch stream ended");
    state.send_replace(SyncState::Stopped);
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => futures::future::pending().await,
    }
}

/// Last known state of every watched object, used to pair updates with
/// their previous version and to detect objects that vanished across a relist
#[derive(Default)]
struct ObjectCache {
    objects: BTreeMap<String, Arc<DynamicObject>>,
    relist: Option<BTreeMap<String, Arc<DynamicObject>>>,
    synced: bool,
}

fn cache_key(obj: &DynamicObject) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

impl ObjectCache {
    /// Apply a watcher event and notify the callback. Returns true when the
    /// event completed the first full list.
    fn apply(&mut self, event: Event<DynamicObject>, callback: &dyn EventCallback) -> bool {
        match event {
            Event::Init => {
                self.relist = Some(BTreeMap::new());
                false
            }
            Event::InitApply(obj) => {
                self.relist
                    .get_or_insert_with(BTreeMap::new)
                    .insert(cache_key(&obj), Arc::new(obj));
                false
            }
            Event::InitDone => {
                let fresh = self.relist.take().unwrap_or_default();
                self.replace(fresh, callback);
                let first = !self.synced;
                self.synced = true;
                first
            }
            Event::Apply(obj) => {
                let obj = Arc::new(obj);
                match self.objects.insert(cache_key(&obj), obj.clone()) {
                    Some(old) => callback.on_update(old, obj),
                    None => callback.on_add(obj),
                }
                false
            }
            Event::Delete(obj) => {
                self.objects.remove(&cache_key(&obj));
                callback.on_delete(Arc::new(obj), false);
                false
            }
        }
    }

    fn replace(&mut self, fresh: BTreeMap<String, Arc<DynamicObject>>, callback: &dyn EventCallback) {
        for (key, obj) in &fresh {
            match self.objects.get(key) {
                Some(old) => callback.on_update(old.clone(), obj.clone()),
                None => callback.on_add(obj.clone()),
            }
        }
        for (key, old) in &self.objects {
            if !fresh.contains_key(key) {
                callback.on_delete(old.clone(), true);
            }
        }
        self.objects = fresh;
    }

    /// Replay every known object as an update of itself
    fn resync(&self, callback: &dyn EventCallback) {
        if !self.synced {
            return;
        }
        debug!("Resyncing {} objects", self.objects.len());
        for obj in self.objects.values() {
            callback.on_update(obj.clone(), obj.clone());
        }
    }
}
