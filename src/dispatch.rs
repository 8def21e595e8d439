// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-owner serialized execution of handler invocations.
//!
//! Every owner gets one FIFO queue drained by one worker task. Enqueueing
//! never waits on handler code, invocations of one owner never overlap and
//! run in enqueue order, and different owners run concurrently.

use crate::types::{EventKind, HandlerDeclaration, Notification};
use futures::future::{join_all, FutureExt};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A handler invocation that returned an error or panicked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    pub owner: String,
    pub method: String,
    pub event: EventKind,
    pub message: String,
}

struct Task {
    handler: Arc<HandlerDeclaration>,
    notification: Notification,
}

enum Message {
    Run(Task),
    /// Drain what is queued so far, then stop the worker
    Close,
}

/// Handle for enqueueing work on one owner's queue
#[derive(Clone)]
pub struct OwnerQueue {
    owner: Arc<str>,
    tx: mpsc::UnboundedSender<Message>,
}

impl OwnerQueue {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Queue one invocation of `handler`
    pub fn enqueue(&self, handler: Arc<HandlerDeclaration>, notification: Notification) {
        let task = Task {
            handler,
            notification,
        };
        if let Err(mpsc::error::SendError(Message::Run(task))) = self.tx.send(Message::Run(task)) {
            warn!(
                owner = %self.owner,
                "Dispatch queue closed, dropping call to {}",
                task.handler.method
            );
        }
    }
}

/// Owns the per-owner queues and their workers
pub struct Dispatcher {
    queues: HashMap<String, OwnerQueue>,
    workers: Vec<JoinHandle<()>>,
    failures: broadcast::Sender<DispatchFailure>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (failures, _) = broadcast::channel(256);
        Self {
            queues: HashMap::new(),
            workers: Vec::new(),
            failures,
        }
    }

    /// The queue of `owner`, spawning its worker on first use
    pub fn queue(&mut self, owner: &str) -> OwnerQueue {
        if let Some(queue) = self.queues.get(owner) {
            return queue.clone();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let queue = OwnerQueue {
            owner: Arc::from(owner),
            tx,
        };
        self.workers.push(tokio::spawn(run_worker(
            queue.owner.clone(),
            rx,
            self.failures.clone(),
        )));
        self.queues.insert(owner.to_string(), queue.clone());
        debug!(owner = %owner, "Created dispatch queue");
        queue
    }

    /// Subscribe to failed handler invocations from now on
    pub fn failures(&self) -> broadcast::Receiver<DispatchFailure> {
        self.failures.subscribe()
    }

    pub fn owners(&self) -> Vec<&str> {
        let mut owners: Vec<&str> = self.queues.keys().map(String::as_str).collect();
        owners.sort_unstable();
        owners
    }

    /// Close every queue. Already queued invocations still run. With `drain`
    /// this waits (up to `timeout`) for them to finish and returns whether
    /// they all did; without it, it returns immediately.
    pub async fn shutdown(&mut self, drain: bool, timeout: Duration) -> bool {
        for (_, queue) in self.queues.drain() {
            let _ = queue.tx.send(Message::Close);
        }
        let workers = std::mem::take(&mut self.workers);

        if !drain {
            debug!("Not waiting for {} dispatch workers", workers.len());
            return true;
        }

        info!("Waiting for {} dispatch queues to drain", workers.len());
        match tokio::time::timeout(timeout, join_all(workers)).await {
            Ok(_) => true,
            Err(_) => {
                warn!("Dispatch queues did not drain within {:?}", timeout);
                false
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker(
    owner: Arc<str>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    failures: broadcast::Sender<DispatchFailure>,
) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Run(task) => execute(&owner, task, &failures).await,
            Message::Close => break,
        }
    }
    debug!(owner = %owner, "Dispatch worker stopped");
}

async fn execute(owner: &str, task: Task, failures: &broadcast::Sender<DispatchFailure>) {
    let Task {
        handler,
        notification,
    } = task;

    let outcome = match catch_unwind(AssertUnwindSafe(|| (handler.invoke)(notification))) {
        Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
        Err(panic) => Err(panic),
    };

    let message = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => format!("{:#}", e),
        Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
    };

    error!(
        owner = %owner,
        method = %handler.method,
        event = %handler.event,
        "Handler failed: {}",
        message
    );
    // Nobody listening is fine, the failure is logged
    let _ = failures.send(DispatchFailure {
        owner: owner.to_string(),
        method: handler.method.clone(),
        event: handler.event,
        message,
    });
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_pod;
    use crate::types::{HandlerFn, ResourceKind};
    use k8s_openapi::api::core::v1::Pod;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Barrier;

    fn handler(owner: &str, method: &str, invoke: HandlerFn) -> Arc<HandlerDeclaration> {
        Arc::new(HandlerDeclaration::new(
            owner,
            method,
            EventKind::Add,
            ResourceKind::of::<Pod>(),
            vec![],
            invoke,
        ))
    }

    fn pod_name(n: &Notification) -> String {
        match n {
            Notification::Added(obj) => obj.metadata.name.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_owner_queue_is_fifo_and_never_overlaps() {
        let mut dispatcher = Dispatcher::new();
        let queue = dispatcher.queue("Owner");

        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicUsize::new(0));
        let executed = Arc::new(Mutex::new(Vec::new()));

        let (a, o, e) = (active.clone(), overlapped.clone(), executed.clone());
        let record = handler(
            "Owner",
            "record",
            Arc::new(move |n: Notification| {
                let (a, o, e) = (a.clone(), o.clone(), e.clone());
                async move {
                    if a.fetch_add(1, Ordering::SeqCst) > 0 {
                        o.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::task::yield_now().await;
                    e.lock().unwrap().push(pod_name(&n));
                    a.fetch_sub(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
                .boxed()
            }),
        );

        let enqueued = Arc::new(Mutex::new(Vec::new()));
        let threads: Vec<_> = (0..3)
            .map(|t| {
                let queue = queue.clone();
                let record = record.clone();
                let enqueued = enqueued.clone();
                std::thread::spawn(move || {
                    for i in 0..34 {
                        if t * 34 + i >= 100 {
                            break;
                        }
                        let name = format!("pod-{}-{}", t, i);
                        // Log and enqueue under one lock so the log is the enqueue order
                        let mut log = enqueued.lock().unwrap();
                        queue.enqueue(record.clone(), Notification::Added(make_pod("default", &name)));
                        log.push(name);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert!(dispatcher.shutdown(true, Duration::from_secs(5)).await);

        let executed = executed.lock().unwrap().clone();
        assert_eq!(executed.len(), 100);
        assert_eq!(executed, *enqueued.lock().unwrap());
        assert_eq!(overlapped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_different_owners_run_concurrently() {
        let mut dispatcher = Dispatcher::new();
        let barrier = Arc::new(Barrier::new(2));
        let passed = Arc::new(AtomicUsize::new(0));

        for owner in ["First", "Second"] {
            let (b, p) = (barrier.clone(), passed.clone());
            let wait = handler(
                owner,
                "wait",
                Arc::new(move |_: Notification| {
                    let (b, p) = (b.clone(), p.clone());
                    async move {
                        // Only completes if the other owner's handler is running too
                        b.wait().await;
                        p.fetch_add(1, Ordering::SeqCst);
                        anyhow::Ok(())
                    }
                    .boxed()
                }),
            );
            dispatcher
                .queue(owner)
                .enqueue(wait, Notification::Added(make_pod("default", "web-0")));
        }

        assert!(dispatcher.shutdown(true, Duration::from_secs(5)).await);
        assert_eq!(passed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_reported_and_queue_continues() {
        let mut dispatcher = Dispatcher::new();
        let mut failures = dispatcher.failures();
        let queue = dispatcher.queue("Owner");
        let ran = Arc::new(AtomicUsize::new(0));

        let failing = handler(
            "Owner",
            "failing",
            Arc::new(|_: Notification| async { Err::<(), _>(anyhow::anyhow!("boom")) }.boxed()),
        );
        let panicking = handler(
            "Owner",
            "panicking",
            Arc::new(|_: Notification| {
                async {
                    if true {
                        panic!("kaboom");
                    }
                    anyhow::Ok(())
                }
                .boxed()
            }),
        );
        let r = ran.clone();
        let counting = handler(
            "Owner",
            "counting",
            Arc::new(move |_: Notification| {
                r.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(()) }.boxed()
            }),
        );

        let pod = || Notification::Added(make_pod("default", "web-0"));
        queue.enqueue(failing, pod());
        queue.enqueue(panicking, pod());
        queue.enqueue(counting, pod());

        assert!(dispatcher.shutdown(true, Duration::from_secs(5)).await);
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        let first = failures.recv().await.unwrap();
        assert_eq!(first.method, "failing");
        assert!(first.message.contains("boom"));
        let second = failures.recv().await.unwrap();
        assert_eq!(second.method, "panicking");
        assert!(second.message.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_queue_is_reused_per_owner() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.queue("Owner");
        dispatcher.queue("Owner");
        dispatcher.queue("Other");

        assert_eq!(dispatcher.owners(), vec!["Other", "Owner"]);
        assert!(dispatcher.shutdown(true, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_dropped() {
        let mut dispatcher = Dispatcher::new();
        let queue = dispatcher.queue("Owner");
        dispatcher.shutdown(true, Duration::from_secs(1)).await;

        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let counting = handler(
            "Owner",
            "counting",
            Arc::new(move |_: Notification| {
                r.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(()) }.boxed()
            }),
        );
        queue.enqueue(counting, Notification::Added(make_pod("default", "web-0")));
        tokio::task::yield_now().await;

        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
