// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::Owner;

/// Source of the owners and handlers to watch for
pub trait HandlerRegistry: Send + Sync {
    fn owners(&self) -> Vec<Owner>;
}

/// Registry of owners registered in code at startup
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    owners: Vec<Owner>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, owner: Owner) -> Self {
        self.owners.push(owner);
        self
    }
}

impl HandlerRegistry for StaticRegistry {
    fn owners(&self) -> Vec<Owner> {
        self.owners.clone()
    }
}
