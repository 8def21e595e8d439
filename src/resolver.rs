// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Merges an owner's inline declaration with its named configuration override.

use crate::config::Overrides;
use crate::constants::{resync, LABEL_SEPARATOR};
use crate::types::{EffectiveConfig, OwnerDeclaration};
use std::collections::BTreeMap;

/// Split a `key=value` entry. Anything but exactly one separator with a
/// non-empty key is rejected.
/// Empty values are allowed, as Kubernetes label values may be empty.
pub fn parse_label(entry: &str) -> Option<(&str, &str)> {
    let mut parts = entry.split(LABEL_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), None) if !key.is_empty() => Some((key, value)),
        _ => None,
    }
}

/// Parse label entries into a map, skipping malformed ones
pub fn parse_labels(entries: &[String]) -> BTreeMap<String, String> {
    entries
        .iter()
        .filter_map(|entry| parse_label(entry))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Compute the effective configuration of an owner.
///
/// Each field comes from the override selected by the owner's config name
/// (or the `default` override) when it is set there, and from the owner's
/// declaration otherwise. Resync falls back to the default period when
/// neither sets it.
pub fn resolve(owner: &OwnerDeclaration, overrides: &Overrides) -> EffectiveConfig {
    let cfg = overrides.for_config(&owner.config_name);

    let client_name = if cfg.client_name.is_empty() {
        owner.client_name.clone()
    } else {
        cfg.client_name.clone()
    };

    let ns_names = if cfg.ns_names.is_empty() {
        owner.ns_names.iter().cloned().collect()
    } else {
        cfg.ns_names.clone()
    };

    let ns_labels = if cfg.ns_labels.is_empty() {
        parse_labels(&owner.ns_labels)
    } else {
        cfg.ns_labels.clone()
    };

    let res_labels = if cfg.res_labels.is_empty() {
        parse_labels(&owner.res_labels)
    } else {
        cfg.res_labels.clone()
    };

    let resync_period_ms = cfg
        .resync_period
        .or(owner.resync_period_ms)
        .unwrap_or(resync::DEFAULT_PERIOD_MS);

    EffectiveConfig {
        client_name,
        ns_names,
        ns_labels,
        res_labels,
        resync_period_ms,
    }
}
