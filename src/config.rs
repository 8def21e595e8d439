// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{env as vars, shutdown, DEFAULT_CONFIG_NAME};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Externally supplied configuration for owners that reference it by name.
/// Empty fields leave the owner's own declaration in effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverride {
    pub client_name: String,
    pub ns_names: BTreeSet<String>,
    pub ns_labels: BTreeMap<String, String>,
    pub res_labels: BTreeMap<String, String>,
    pub resync_period: Option<u64>,
}

/// Named overrides; a `default` entry always exists
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, ConfigOverride>")]
pub struct Overrides {
    default: ConfigOverride,
    named: BTreeMap<String, ConfigOverride>,
}

impl Overrides {
    pub fn new(mut named: BTreeMap<String, ConfigOverride>) -> Self {
        let default = named.remove(DEFAULT_CONFIG_NAME).unwrap_or_default();
        Self { default, named }
    }

    pub fn get(&self, name: &str) -> Option<&ConfigOverride> {
        if name == DEFAULT_CONFIG_NAME {
            Some(&self.default)
        } else {
            self.named.get(name)
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The override for `name`, or the `default` one when there is none
    pub fn for_config(&self, name: &str) -> &ConfigOverride {
        self.get(name).unwrap_or(&self.default)
    }

    pub fn insert(&mut self, name: &str, config: ConfigOverride) {
        if name == DEFAULT_CONFIG_NAME {
            self.default = config;
        } else {
            self.named.insert(name.to_string(), config);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(DEFAULT_CONFIG_NAME).chain(self.named.keys().map(String::as_str))
    }
}

impl Default for Overrides {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl From<BTreeMap<String, ConfigOverride>> for Overrides {
    fn from(entries: BTreeMap<String, ConfigOverride>) -> Self {
        Self::new(entries)
    }
}

/// How to build a named Kubernetes client
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Kubeconfig context, the current context when unset
    pub context: Option<String>,
    /// Kubeconfig file, the usual lookup (`KUBECONFIG`, `~/.kube/config`) when unset
    pub kubeconfig: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShutdownSettings {
    /// Wait for already queued handler invocations before `stop` returns
    pub drain: bool,
    pub drain_timeout_ms: u64,
}

impl ShutdownSettings {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            drain: true,
            drain_timeout_ms: shutdown::DEFAULT_DRAIN_TIMEOUT_MS,
        }
    }
}

/// Operator settings loaded from a YAML file and environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub config: Overrides,
    pub clients: BTreeMap<String, ClientSettings>,
    pub shutdown: ShutdownSettings,
    /// Bound on waiting for the initial sync, unbounded when unset
    pub sync_timeout_ms: Option<u64>,
}

impl Settings {
    /// Load settings from the file named by `WATCHKEEPER_CONFIG` (if any),
    /// then apply environment overrides
    pub fn from_env() -> Result<Self> {
        let mut settings = match env::var(vars::CONFIG_PATH) {
            Ok(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read settings file {}", path))?;
                Self::from_yaml(&content).with_context(|| format!("Invalid settings file {}", path))?
            }
            Err(_) => Self::default(),
        };
        settings.apply_env(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse settings")
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(drain) = lookup(vars::DRAIN_ON_SHUTDOWN) {
            self.shutdown.drain = drain
                .parse()
                .with_context(|| format!("{} must be true or false", vars::DRAIN_ON_SHUTDOWN))?;
        }
        if let Some(timeout) = lookup(vars::SYNC_TIMEOUT_MS) {
            let timeout: u64 = timeout
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds", vars::SYNC_TIMEOUT_MS))?;
            self.sync_timeout_ms = Some(timeout);
        }
        Ok(())
    }

    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_timeout_ms.map(Duration::from_millis)
    }
}
