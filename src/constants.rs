// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Name of the configuration entry every owner falls back to
pub const DEFAULT_CONFIG_NAME: &str = "default";

/// Name of the client used when an owner does not ask for a specific one
pub const DEFAULT_CLIENT_NAME: &str = "default";

/// Separator between key and value in a `key=value` label entry
pub const LABEL_SEPARATOR: char = '=';

/// Resync period bounds, in milliseconds
pub mod resync {
    /// Smallest resync period an owner may declare
    pub const MIN_PERIOD_MS: u64 = 1000;
    /// Period used when neither the owner nor its configuration sets one
    pub const DEFAULT_PERIOD_MS: u64 = 1000;
}

/// Shutdown defaults
pub mod shutdown {
    /// Upper bound on waiting for owner queues to drain
    pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 30_000;
}

/// Environment variables read by [`crate::config::Settings::from_env`]
pub mod env {
    /// Path to the YAML settings file
    pub const CONFIG_PATH: &str = "WATCHKEEPER_CONFIG";
    /// Overrides `shutdown.drain`
    pub const DRAIN_ON_SHUTDOWN: &str = "WATCHKEEPER_DRAIN_ON_SHUTDOWN";
    /// Overrides `syncTimeoutMs`
    pub const SYNC_TIMEOUT_MS: &str = "WATCHKEEPER_SYNC_TIMEOUT_MS";
}
