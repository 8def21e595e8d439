// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Declaration records handed over by a handler registry.

pub mod handler;
pub mod owner;
pub mod resource;

pub use handler::{HandlerDeclaration, HandlerFn, HandlerFuture};
pub use owner::{EffectiveConfig, Owner, OwnerDeclaration};
pub use resource::{EventKind, Notification, ParamType, ResourceKind};
