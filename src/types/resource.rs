// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Resource;
use std::fmt;
use std::sync::Arc;

/// The kind of change a handler reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Add,
    Update,
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Add => write!(f, "ADD"),
            EventKind::Update => write!(f, "UPDATE"),
            EventKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// A watchable resource type, identified by group, version and kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKind {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
}

impl ResourceKind {
    pub fn new(group: &str, version: &str, kind: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
        }
    }

    /// Resource kind of a statically typed Kubernetes object (k8s-openapi types, CRDs)
    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self {
            group: K::group(&()).into_owned(),
            version: K::version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            plural: K::plural(&()).into_owned(),
        }
    }

    /// The `ApiResource` used to build a dynamic `Api` for this kind
    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&self.group, &self.version, &self.kind);
        ApiResource::from_gvk_with_plural(&gvk, &self.plural)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// Declared type of a single handler parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// Accepts an object of any resource kind
    Any,
    Resource(ResourceKind),
    Bool,
    /// Anything else a registry may report; never valid
    Other(String),
}

impl ParamType {
    /// Whether an object of `resource` can be passed to this parameter
    pub fn accepts(&self, resource: &ResourceKind) -> bool {
        match self {
            ParamType::Any => true,
            ParamType::Resource(kind) => kind == resource,
            ParamType::Bool | ParamType::Other(_) => false,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Any => write!(f, "DynamicObject"),
            ParamType::Resource(kind) => write!(f, "{}", kind.kind),
            ParamType::Bool => write!(f, "bool"),
            ParamType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A single change delivered to a handler
#[derive(Debug, Clone)]
pub enum Notification {
    Added(Arc<DynamicObject>),
    Updated {
        old: Arc<DynamicObject>,
        new: Arc<DynamicObject>,
    },
    /// `final_state_unknown` is only set for handlers that declared the tombstone flag
    Deleted {
        obj: Arc<DynamicObject>,
        final_state_unknown: Option<bool>,
    },
}

impl Notification {
    pub fn kind(&self) -> EventKind {
        match self {
            Notification::Added(_) => EventKind::Add,
            Notification::Updated { .. } => EventKind::Update,
            Notification::Deleted { .. } => EventKind::Delete,
        }
    }
}
