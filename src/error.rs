// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchkeeperError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to load kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Could not find Kubernetes client with name '{client}' for {owner}")]
    UnknownClient { owner: String, client: String },

    #[error("Invalid label '{label}' in {owner}. Format has to be key=value")]
    InvalidLabel { owner: String, label: String },

    #[error("Duplicate key '{key}' found in {owner}. You defined the following keys: {keys:?}")]
    DuplicateKey {
        owner: String,
        key: String,
        keys: Vec<String>,
    },

    #[error("Resync period {period_ms}ms of {owner} is below the minimum of {floor_ms}ms")]
    ResyncPeriodTooSmall {
        owner: String,
        period_ms: u64,
        floor_ms: u64,
    },

    #[error("In {owner} configuration '{name}' is not defined under config.{name}")]
    UnknownConfigName { owner: String, name: String },

    #[error("Invalid handler {method} in {owner}: {reason}. Signature should be {expected}, got {actual}")]
    InvalidSignature {
        owner: String,
        method: String,
        reason: String,
        expected: String,
        actual: String,
    },

    #[error("Namespace query failed: {0}")]
    NamespaceQuery(String),

    #[error("Watch subscription failed: {0}")]
    Subscription(String),

    #[error("Subscriptions did not sync within {0:?}")]
    SyncTimeout(Duration),

    #[error("Invalid lifecycle state: expected {expected}, was {actual}")]
    InvalidState { expected: String, actual: String },
}

pub type Result<T> = std::result::Result<T, WatchkeeperError>;
