// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::resource::{EventKind, Notification, ParamType, ResourceKind};
use anyhow::anyhow;
use futures::future::{self, BoxFuture, FutureExt};
use kube::core::DynamicObject;
use kube::Resource;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Type-erased handler body, invoked once per routed notification
pub type HandlerFn = Arc<dyn Fn(Notification) -> HandlerFuture + Send + Sync>;

/// One handler of an owner, bound to an event kind and a resource kind
#[derive(Clone)]
pub struct HandlerDeclaration {
    pub owner: String,
    pub method: String,
    pub event: EventKind,
    pub resource: ResourceKind,
    /// Declared parameters, checked against `event` before anything starts
    pub params: Vec<ParamType>,
    pub invoke: HandlerFn,
}

impl HandlerDeclaration {
    pub fn new(
        owner: &str,
        method: &str,
        event: EventKind,
        resource: ResourceKind,
        params: Vec<ParamType>,
        invoke: HandlerFn,
    ) -> Self {
        Self {
            owner: owner.to_string(),
            method: method.to_string(),
            event,
            resource,
            params,
            invoke,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Rendered as `method(Pod, bool)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        format!("{}({})", self.method, params.join(", "))
    }
}

impl fmt::Debug for HandlerDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDeclaration")
            .field("owner", &self.owner)
            .field("method", &self.method)
            .field("event", &self.event)
            .field("resource", &self.resource)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Convert a dynamic object into the typed resource a handler asked for
fn typed<K: DeserializeOwned>(obj: &DynamicObject) -> anyhow::Result<K> {
    let value = serde_json::to_value(obj)?;
    Ok(serde_json::from_value(value)?)
}

fn unexpected(expected: EventKind, got: &Notification) -> HandlerFuture {
    let err = anyhow!("{} handler received a {} notification", expected, got.kind());
    future::ready(Err(err)).boxed()
}

fn run<Fut>(converted: anyhow::Result<Fut>) -> HandlerFuture
where
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    match converted {
        Ok(fut) => fut.boxed(),
        Err(e) => future::ready(Err(e)).boxed(),
    }
}

/// `handler(obj: K)` for ADD
pub(crate) fn add_handler<K, F, Fut>(owner: &str, method: &str, f: F) -> HandlerDeclaration
where
    K: Resource<DynamicType = ()> + DeserializeOwned + Send + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let resource = ResourceKind::of::<K>();
    let invoke: HandlerFn = Arc::new(move |n: Notification| match &n {
        Notification::Added(obj) => run(typed::<K>(obj).map(&f)),
        other => unexpected(EventKind::Add, other),
    });
    HandlerDeclaration::new(
        owner,
        method,
        EventKind::Add,
        resource.clone(),
        vec![ParamType::Resource(resource)],
        invoke,
    )
}

/// `handler(old: K, new: K)` for UPDATE
pub(crate) fn update_handler<K, F, Fut>(owner: &str, method: &str, f: F) -> HandlerDeclaration
where
    K: Resource<DynamicType = ()> + DeserializeOwned + Send + 'static,
    F: Fn(K, K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let resource = ResourceKind::of::<K>();
    let invoke: HandlerFn = Arc::new(move |n: Notification| match &n {
        Notification::Updated { old, new } => {
            let converted = typed::<K>(old).and_then(|o| Ok((o, typed::<K>(new)?)));
            run(converted.map(|(o, n)| f(o, n)))
        }
        other => unexpected(EventKind::Update, other),
    });
    HandlerDeclaration::new(
        owner,
        method,
        EventKind::Update,
        resource.clone(),
        vec![ParamType::Resource(resource.clone()), ParamType::Resource(resource)],
        invoke,
    )
}

/// `handler(obj: K)` for DELETE
pub(crate) fn delete_handler<K, F, Fut>(owner: &str, method: &str, f: F) -> HandlerDeclaration
where
    K: Resource<DynamicType = ()> + DeserializeOwned + Send + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let resource = ResourceKind::of::<K>();
    let invoke: HandlerFn = Arc::new(move |n: Notification| match &n {
        Notification::Deleted { obj, .. } => run(typed::<K>(obj).map(&f)),
        other => unexpected(EventKind::Delete, other),
    });
    HandlerDeclaration::new(
        owner,
        method,
        EventKind::Delete,
        resource.clone(),
        vec![ParamType::Resource(resource)],
        invoke,
    )
}

/// `handler(obj: K, final_state_unknown: bool)` for DELETE
pub(crate) fn delete_with_state_handler<K, F, Fut>(
    owner: &str,
    method: &str,
    f: F,
) -> HandlerDeclaration
where
    K: Resource<DynamicType = ()> + DeserializeOwned + Send + 'static,
    F: Fn(K, bool) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let resource = ResourceKind::of::<K>();
    let invoke: HandlerFn = Arc::new(move |n: Notification| match &n {
        Notification::Deleted {
            obj,
            final_state_unknown,
        } => {
            let unknown = final_state_unknown.unwrap_or(false);
            run(typed::<K>(obj).map(|k| f(k, unknown)))
        }
        other => unexpected(EventKind::Delete, other),
    });
    HandlerDeclaration::new(
        owner,
        method,
        EventKind::Delete,
        resource.clone(),
        vec![ParamType::Resource(resource), ParamType::Bool],
        invoke,
    )
}
