// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Fans watch notifications out to the handlers of one owner.

use crate::dispatch::OwnerQueue;
use crate::kubernetes::EventCallback;
use crate::types::{EventKind, HandlerDeclaration, Notification, ResourceKind};
use kube::core::DynamicObject;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::trace;

/// Callback attached to one subscription. Holds the owner's handlers for
/// the subscription's resource kind, grouped by event kind.
pub struct EventRouter {
    resource: ResourceKind,
    on_add: Vec<Arc<HandlerDeclaration>>,
    on_update: Vec<Arc<HandlerDeclaration>>,
    on_delete: Vec<Arc<HandlerDeclaration>>,
    queue: OwnerQueue,
}

impl EventRouter {
    pub fn new(resource: &ResourceKind, handlers: &[Arc<HandlerDeclaration>], queue: OwnerQueue) -> Self {
        let matching = |event: EventKind| -> Vec<Arc<HandlerDeclaration>> {
            handlers
                .iter()
                .filter(|h| h.event == event && &h.resource == resource)
                .cloned()
                .collect()
        };
        Self {
            resource: resource.clone(),
            on_add: matching(EventKind::Add),
            on_update: matching(EventKind::Update),
            on_delete: matching(EventKind::Delete),
            queue,
        }
    }

    pub fn handler_count(&self) -> usize {
        self.on_add.len() + self.on_update.len() + self.on_delete.len()
    }

    fn route(&self, handlers: &[Arc<HandlerDeclaration>], notification: Notification, obj: &DynamicObject) {
        trace!(
            owner = %self.queue.owner(),
            resource = %self.resource,
            event = %notification.kind(),
            "Routing {}/{} to {} handlers",
            obj.namespace().unwrap_or_default(),
            obj.name_any(),
            handlers.len()
        );
        for handler in handlers {
            self.queue.enqueue(handler.clone(), notification.clone());
        }
    }
}

impl EventCallback for EventRouter {
    fn on_add(&self, obj: Arc<DynamicObject>) {
        self.route(&self.on_add, Notification::Added(obj.clone()), &obj);
    }

    fn on_update(&self, old: Arc<DynamicObject>, new: Arc<DynamicObject>) {
        self.route(
            &self.on_update,
            Notification::Updated {
                old,
                new: new.clone(),
            },
            &new,
        );
    }

    fn on_delete(&self, obj: Arc<DynamicObject>, final_state_unknown: bool) {
        trace!(
            owner = %self.queue.owner(),
            resource = %self.resource,
            "Routing delete of {} to {} handlers",
            obj.name_any(),
            self.on_delete.len()
        );
        // Only handlers declaring the tombstone flag get to see it
        for handler in &self.on_delete {
            let flag = (handler.arity() == 2).then_some(final_state_unknown);
            self.queue.enqueue(
                handler.clone(),
                Notification::Deleted {
                    obj: obj.clone(),
                    final_state_unknown: flag,
                },
            );
        }
    }
}
