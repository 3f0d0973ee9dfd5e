// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permissions (spec.md §3/§7, expanded per SPEC_FULL.md's
//! `AbstractAuthorizingStore`-equivalent): a permission-name to set-of-tags
//! mapping attached to a [`crate::Value`] and mutable through
//! [`crate::store::PermissionedStore`].

use std::collections::{BTreeMap, BTreeSet};

/// permission-name → set of tags, e.g. `{"read": {"alice", "bob"}, "write":
/// {"alice"}}`. `BTreeMap`/`BTreeSet` rather than hash-based collections so
/// two `Permissions` values compare and serialize deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Permissions {
    pub owner: String,
    pub grants: BTreeMap<String, BTreeSet<String>>,
}

impl Permissions {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            grants: BTreeMap::new(),
        }
    }

    pub fn grant(mut self, permission: impl Into<String>, tag: impl Into<String>) -> Self {
        self.grants
            .entry(permission.into())
            .or_default()
            .insert(tag.into());
        self
    }

    pub fn allows(&self, permission: &str, tag: &str) -> bool {
        self.grants
            .get(permission)
            .map(|tags| tags.contains(tag))
            .unwrap_or(false)
    }

    /// Merge `patch` into `self`, matching `update_permissions`'s additive
    /// semantics: the owner is overwritten if `patch.owner` is non-empty, and
    /// every grant in `patch` is unioned into the existing grant set.
    pub fn merge(&mut self, patch: Permissions) {
        if !patch.owner.is_empty() {
            self.owner = patch.owner;
        }
        for (permission, tags) in patch.grants {
            self.grants.entry(permission).or_default().extend(tags);
        }
    }
}
