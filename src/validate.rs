// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Static checks over every owner before any subscription is opened.

use crate::config::Overrides;
use crate::constants::resync::MIN_PERIOD_MS;
use crate::error::{Result, WatchkeeperError};
use crate::kubernetes::ClientRegistry;
use crate::resolver::{parse_label, resolve};
use crate::types::{EventKind, HandlerDeclaration, Owner, OwnerDeclaration, ParamType};
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub struct Validator<'a> {
    clients: &'a dyn ClientRegistry,
    overrides: &'a Overrides,
}

impl<'a> Validator<'a> {
    pub fn new(clients: &'a dyn ClientRegistry, overrides: &'a Overrides) -> Self {
        Self { clients, overrides }
    }

    /// Run the owner pass, then the handler pass. Stops at the first error.
    pub fn validate(&self, owners: &[Owner]) -> Result<()> {
        self.validate_owners(owners)?;
        self.validate_handlers(owners)?;
        debug!("Validated {} owners", owners.len());
        Ok(())
    }

    pub fn validate_owners(&self, owners: &[Owner]) -> Result<()> {
        for owner in owners {
            self.validate_owner(&owner.declaration)?;
        }
        Ok(())
    }

    pub fn validate_handlers(&self, owners: &[Owner]) -> Result<()> {
        for owner in owners {
            if owner.handlers.is_empty() {
                warn!(owner = %owner.name(), "Owner declares no handlers and will not watch anything");
                continue;
            }
            for handler in &owner.handlers {
                check_signature(handler)?;
            }
        }
        Ok(())
    }

    fn validate_owner(&self, owner: &OwnerDeclaration) -> Result<()> {
        if !self.overrides.contains(&owner.config_name) {
            return Err(WatchkeeperError::UnknownConfigName {
                owner: owner.owner.clone(),
                name: owner.config_name.clone(),
            });
        }

        let ns_labels = label_keys(&owner.owner, &owner.ns_labels)?;
        let res_labels = label_keys(&owner.owner, &owner.res_labels)?;
        check_unique(&owner.owner, &owner.ns_names)?;
        check_unique(&owner.owner, &ns_labels)?;
        check_unique(&owner.owner, &res_labels)?;

        let config = resolve(owner, self.overrides);
        if !self.clients.contains(&config.client_name) {
            return Err(WatchkeeperError::UnknownClient {
                owner: owner.owner.clone(),
                client: config.client_name,
            });
        }

        if config.resync_period_ms < MIN_PERIOD_MS {
            return Err(WatchkeeperError::ResyncPeriodTooSmall {
                owner: owner.owner.clone(),
                period_ms: config.resync_period_ms,
                floor_ms: MIN_PERIOD_MS,
            });
        }

        Ok(())
    }
}

fn label_keys(owner: &str, labels: &[String]) -> Result<Vec<String>> {
    labels
        .iter()
        .map(|label| {
            parse_label(label)
                .map(|(key, _)| key.to_string())
                .ok_or_else(|| WatchkeeperError::InvalidLabel {
                    owner: owner.to_string(),
                    label: label.clone(),
                })
        })
        .collect()
}

fn check_unique(owner: &str, keys: &[String]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for key in keys {
        if !seen.insert(key.as_str()) {
            return Err(WatchkeeperError::DuplicateKey {
                owner: owner.to_string(),
                key: key.clone(),
                keys: keys.to_vec(),
            });
        }
    }
    Ok(())
}

/// Check a handler's declared parameters against its event kind.
///
/// ADD takes the resource, UPDATE the old and new resource, DELETE the
/// resource and optionally a `bool` telling whether the final state is unknown.
pub fn check_signature(handler: &HandlerDeclaration) -> Result<()> {
    let resource = ParamType::Resource(handler.resource.clone());
    let (expected, reason) = match handler.event {
        EventKind::Add => (vec![resource], arity_reason(handler, &[1])),
        EventKind::Update => (vec![resource.clone(), resource], arity_reason(handler, &[2])),
        EventKind::Delete => {
            let expected = if handler.arity() == 2 {
                vec![resource, ParamType::Bool]
            } else {
                vec![resource]
            };
            (expected, arity_reason(handler, &[1, 2]))
        }
    };

    let reason = reason.or_else(|| {
        handler
            .params
            .iter()
            .zip(&expected)
            .position(|(actual, wanted)| !assignable(actual, wanted))
            .map(|i| format!("parameter {} should be {}", i + 1, expected[i]))
    });

    match reason {
        None => Ok(()),
        Some(reason) => {
            let params: Vec<String> = expected.iter().map(|p| p.to_string()).collect();
            Err(WatchkeeperError::InvalidSignature {
                owner: handler.owner.clone(),
                method: handler.method.clone(),
                reason,
                expected: format!("{}({})", handler.method, params.join(", ")),
                actual: handler.signature(),
            })
        }
    }
}

fn arity_reason(handler: &HandlerDeclaration, allowed: &[usize]) -> Option<String> {
    if allowed.contains(&handler.arity()) {
        return None;
    }
    let allowed: Vec<String> = allowed.iter().map(|n| n.to_string()).collect();
    Some(format!(
        "{} handlers take {} parameters, found {}",
        handler.event,
        allowed.join(" or "),
        handler.arity()
    ))
}

fn assignable(actual: &ParamType, wanted: &ParamType) -> bool {
    match wanted {
        ParamType::Resource(kind) => actual.accepts(kind),
        other => actual == other,
    }
}
