// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod kubernetes;
pub mod manager;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod topology;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Settings;
pub use error::{Result, WatchkeeperError};
pub use manager::{Phase, WatchManager};
pub use registry::{HandlerRegistry, StaticRegistry};
pub use types::{EventKind, Owner};
